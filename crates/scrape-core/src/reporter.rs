//! Provider metrics
//!
//! Summarizes a settled session into one metric per tried provider and embed,
//! and ships it to a telemetry sink without ever blocking or failing the
//! session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::ProviderClient;
use crate::tracker::ScrapeSnapshot;
use crate::types::{ScrapeMedia, SourceDescriptor, SourceState, Status};

/// Outcome recorded for one provider or embed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    /// Produced a stream
    Success,
    /// Errored
    Failed,
    /// Content absent
    #[serde(rename = "notfound")]
    NotFound,
}

impl MetricStatus {
    fn from_status(status: Status) -> Option<Self> {
        match status {
            Status::Success => Some(MetricStatus::Success),
            Status::Failure => Some(MetricStatus::Failed),
            Status::NotFound => Some(MetricStatus::NotFound),
            Status::Pending | Status::Active => None,
        }
    }
}

/// One provider or embed attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetric {
    pub tmdb_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
    pub provider_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_id: Option<String>,
    pub status: MetricStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Metrics for one session, as posted to the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub items: Vec<ProviderMetric>,
}

impl MetricsReport {
    /// Whether nothing was tried
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Turn a settled session into metrics.
///
/// Providers come first in registry order, then embeds grouped by provider.
/// Entries still `pending` or `active`, and ids missing from the snapshot,
/// are left out.
pub fn summarize(media: &ScrapeMedia, order: &[SourceDescriptor], snapshot: &ScrapeSnapshot) -> MetricsReport {
    let mut items = Vec::new();

    for source in order {
        if let Some(metric) = snapshot
            .sources
            .get(&source.id)
            .and_then(|state| metric_for(media, &source.id, None, state))
        {
            items.push(metric);
        }
    }

    for source in order {
        for child in &source.children {
            let Some(state) = snapshot.sources.get(&child.id) else {
                continue;
            };
            let embed_id = state.embed_id.clone().unwrap_or_else(|| child.embed_id.clone());
            if let Some(metric) = metric_for(media, &source.id, Some(embed_id), state) {
                items.push(metric);
            }
        }
    }

    MetricsReport { items }
}

fn metric_for(
    media: &ScrapeMedia,
    provider_id: &str,
    embed_id: Option<String>,
    state: &SourceState,
) -> Option<ProviderMetric> {
    let status = MetricStatus::from_status(state.status)?;
    Some(ProviderMetric {
        tmdb_id: media.tmdb_id.clone(),
        kind: media.kind.as_str().to_string(),
        title: media.title.clone(),
        season_id: media.season.as_ref().map(|s| s.tmdb_id.clone()),
        episode_id: media.episode.as_ref().map(|e| e.tmdb_id.clone()),
        season_number: media.season.as_ref().map(|s| s.number),
        episode_number: media.episode.as_ref().map(|e| e.number),
        provider_id: provider_id.to_string(),
        embed_id,
        status,
        error_message: state.reason.clone().filter(|_| status != MetricStatus::Success),
    })
}

/// Destination for metrics; must return immediately
pub trait TelemetrySink: Send + Sync {
    /// Hand off a report. Never blocks, never fails.
    fn report(&self, report: MetricsReport);
}

/// Drops every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn report(&self, report: MetricsReport) {
        tracing::trace!(items = report.items.len(), "telemetry disabled, dropping report");
    }
}

/// Posts reports to the backend on a background task
pub struct HttpTelemetry {
    client: Arc<ProviderClient>,
    url: String,
}

impl HttpTelemetry {
    /// Post to `url` (absolute, or a path on the client's backend)
    pub fn new(client: Arc<ProviderClient>, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl TelemetrySink for HttpTelemetry {
    fn report(&self, report: MetricsReport) {
        if report.is_empty() {
            return;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!("no async runtime, dropping provider metrics");
                return;
            }
        };
        let client = self.client.clone();
        let url = self.url.clone();
        handle.spawn(async move {
            match client.post_json(&url, &report).await {
                Ok(()) => tracing::debug!(items = report.items.len(), "provider metrics sent"),
                Err(e) => tracing::warn!(error = %e, "failed to send provider metrics"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::tracker::SourceTracker;
    use crate::types::{EmbedDescriptor, EpisodeRef};
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order() -> Vec<SourceDescriptor> {
        vec![
            SourceDescriptor {
                id: "p1".to_string(),
                name: "P1".to_string(),
                children: vec![],
            },
            SourceDescriptor {
                id: "p2".to_string(),
                name: "P2".to_string(),
                children: vec![
                    EmbedDescriptor {
                        id: "p2-e1".to_string(),
                        embed_id: "e1".to_string(),
                        name: "E1".to_string(),
                    },
                    EmbedDescriptor {
                        id: "p2-e2".to_string(),
                        embed_id: "e2".to_string(),
                        name: "E2".to_string(),
                    },
                ],
            },
            SourceDescriptor {
                id: "p3".to_string(),
                name: "P3".to_string(),
                children: vec![],
            },
        ]
    }

    fn settled_snapshot() -> ScrapeSnapshot {
        let tracker = SourceTracker::new();
        tracker.initialize(&order()).unwrap();
        tracker.finish("p1", Status::Failure, Some("boom".to_string())).unwrap();
        tracker.set_status("p2", Status::Active, None).unwrap();
        tracker.finish("p2-e1", Status::NotFound, Some("gone".to_string())).unwrap();
        tracker.finish("p2-e2", Status::Success, None).unwrap();
        tracker.finish("p2", Status::Success, None).unwrap();
        tracker.snapshot()
    }

    #[test]
    fn test_summarize_order_and_statuses() {
        let media = ScrapeMedia::movie("27205", "Inception", 2010);
        let report = summarize(&media, &order(), &settled_snapshot());

        let rows: Vec<_> = report
            .items
            .iter()
            .map(|m| (m.provider_id.as_str(), m.embed_id.as_deref(), m.status))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("p1", None, MetricStatus::Failed),
                ("p2", None, MetricStatus::Success),
                ("p2", Some("e1"), MetricStatus::NotFound),
                ("p2", Some("e2"), MetricStatus::Success),
            ]
        );
        assert_eq!(report.items[0].error_message.as_deref(), Some("boom"));
        assert_eq!(report.items[0].kind, "movie");
        assert!(report.items[0].season_id.is_none());
    }

    #[test]
    fn test_summarize_show_fields() {
        let media = ScrapeMedia::episode(
            "1399",
            "Game of Thrones",
            2011,
            EpisodeRef { number: 1, tmdb_id: "3624".to_string() },
            EpisodeRef { number: 2, tmdb_id: "63057".to_string() },
        );
        let report = summarize(&media, &order(), &settled_snapshot());
        let first = &report.items[0];
        assert_eq!(first.kind, "show");
        assert_eq!(first.season_id.as_deref(), Some("3624"));
        assert_eq!(first.episode_number, Some(2));
    }

    #[test]
    fn test_summarize_missing_entries_skipped() {
        let media = ScrapeMedia::movie("27205", "Inception", 2010);
        let report = summarize(&media, &order(), &ScrapeSnapshot::default());
        assert!(report.is_empty());
    }

    #[test]
    fn test_metric_json_shape() {
        let media = ScrapeMedia::movie("27205", "Inception", 2010);
        let report = summarize(&media, &order(), &settled_snapshot());
        let json = serde_json::to_value(&report.items[2]).unwrap();
        assert_eq!(json["tmdbId"], "27205");
        assert_eq!(json["type"], "movie");
        assert_eq!(json["providerId"], "p2");
        assert_eq!(json["embedId"], "e1");
        assert_eq!(json["status"], "notfound");
        assert_eq!(json["errorMessage"], "gone");
        assert!(json.get("seasonId").is_none());
    }

    #[test]
    fn test_http_telemetry_without_runtime_is_silent() {
        let client = Arc::new(ProviderClient::new().unwrap());
        let sink = HttpTelemetry::new(client, "/metrics/providers");
        let media = ScrapeMedia::movie("27205", "Inception", 2010);
        sink.report(summarize(&media, &order(), &settled_snapshot()));
    }

    #[tokio::test]
    async fn test_http_telemetry_posts_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/metrics/providers"))
            .and(body_partial_json(serde_json::json!({"items": [{"providerId": "p1"}]})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = Arc::new(ProviderClient::with_config(ClientConfig::with_base_url(server.uri())).unwrap());
        let sink = HttpTelemetry::new(client, "/metrics/providers");
        let media = ScrapeMedia::movie("27205", "Inception", 2010);
        sink.report(summarize(&media, &order(), &settled_snapshot()));

        for _ in 0..50 {
            if !server.received_requests().await.unwrap_or_default().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn test_http_telemetry_failure_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = Arc::new(ProviderClient::with_config(ClientConfig::with_base_url(server.uri())).unwrap());
        let sink = HttpTelemetry::new(client, "/metrics/providers");
        let media = ScrapeMedia::movie("27205", "Inception", 2010);
        sink.report(summarize(&media, &order(), &settled_snapshot()));
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
