//! Probe backed by the provider HTTP backend

use std::sync::Arc;

use async_trait::async_trait;

use super::{Probe, Progress};
use crate::client::ProviderClient;
use crate::error::{Result, ScrapeError};
use crate::parser::{extract_referer, extract_stream, parse_source_page};
use crate::types::{EmbedDescriptor, MediaKind, ScrapeMedia, SourceDescriptor, SourceOutput, Stream};

/// Fetches provider and embed pages and parses them for streams
pub struct HttpProbe {
    client: Arc<ProviderClient>,
}

impl HttpProbe {
    /// Use a shared provider client
    pub fn new(client: Arc<ProviderClient>) -> Self {
        Self { client }
    }

    /// Backend path of a provider page for this media
    ///
    /// # Example
    /// ```
    /// use scrape_core::probe::HttpProbe;
    /// use scrape_core::ScrapeMedia;
    ///
    /// let media = ScrapeMedia::movie("27205", "Inception", 2010);
    /// assert_eq!(HttpProbe::source_path(&media, "alpha"), "/sources/alpha/movie/27205");
    /// ```
    pub fn source_path(media: &ScrapeMedia, source_id: &str) -> String {
        let mut path = format!(
            "/sources/{}/{}/{}",
            urlencoding::encode(source_id),
            media.kind.as_str(),
            urlencoding::encode(&media.tmdb_id)
        );
        if media.kind == MediaKind::Show {
            if let (Some(season), Some(episode)) = (&media.season, &media.episode) {
                path.push_str(&format!("?season={}&episode={}", season.number, episode.number));
            }
        }
        path
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe_source(
        &self,
        media: &ScrapeMedia,
        source: &SourceDescriptor,
        progress: &Progress,
    ) -> Result<SourceOutput> {
        let path = Self::source_path(media, &source.id);
        let html = self.client.fetch(&path).await?;
        progress.report(50);

        let output = parse_source_page(&html)?;
        progress.report(100);
        tracing::debug!(
            source = %source.id,
            direct = output.stream.is_some(),
            embeds = output.embeds.len(),
            "parsed provider page"
        );
        Ok(output)
    }

    async fn probe_embed(
        &self,
        _media: &ScrapeMedia,
        embed: &EmbedDescriptor,
        url: &str,
        progress: &Progress,
    ) -> Result<Stream> {
        let page = self.client.fetch(url).await?;
        progress.report(50);

        let mut stream = extract_stream(&page)
            .ok_or_else(|| ScrapeError::NotFound(format!("no stream in {} page", embed.embed_id)))?;
        if let Some(referer) = extract_referer(&page) {
            stream.headers.insert("Referer".to_string(), referer);
        }
        progress.report(100);
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::types::{EpisodeRef, StreamKind};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe(server: &MockServer) -> HttpProbe {
        let mut config = ClientConfig::with_base_url(server.uri());
        config.requests_per_second = 100.0;
        config.max_retries = 0;
        HttpProbe::new(Arc::new(ProviderClient::with_config(config).unwrap()))
    }

    fn source(id: &str) -> SourceDescriptor {
        SourceDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            children: vec![],
        }
    }

    fn embed(embed_id: &str) -> EmbedDescriptor {
        EmbedDescriptor {
            id: format!("p-{}", embed_id),
            embed_id: embed_id.to_string(),
            name: embed_id.to_string(),
        }
    }

    #[test]
    fn test_source_path_show() {
        let media = ScrapeMedia::episode(
            "1399",
            "Game of Thrones",
            2011,
            EpisodeRef { number: 2, tmdb_id: "3625".to_string() },
            EpisodeRef { number: 7, tmdb_id: "63062".to_string() },
        );
        assert_eq!(
            HttpProbe::source_path(&media, "my source"),
            "/sources/my%20source/show/1399?season=2&episode=7"
        );
    }

    #[tokio::test]
    async fn test_probe_source_with_embeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sources/alpha/movie/27205"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<iframe data-embed="upcloud" src="/embeds/upcloud/1"></iframe>"#,
            ))
            .mount(&server)
            .await;

        let media = ScrapeMedia::movie("27205", "Inception", 2010);
        let out = probe(&server)
            .probe_source(&media, &source("alpha"), &Progress::noop("alpha"))
            .await
            .unwrap();
        assert!(out.stream.is_none());
        assert_eq!(out.embeds.len(), 1);
        assert_eq!(out.embeds[0].embed_id, "upcloud");
    }

    #[tokio::test]
    async fn test_probe_source_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let media = ScrapeMedia::movie("27205", "Inception", 2010);
        let err = probe(&server)
            .probe_source(&media, &source("alpha"), &Progress::noop("alpha"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_probe_show_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sources/alpha/show/1399"))
            .and(query_param("season", "1"))
            .and(query_param("episode", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<video src="https://cdn.example/ep3.mp4"></video>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let media = ScrapeMedia::episode(
            "1399",
            "Game of Thrones",
            2011,
            EpisodeRef { number: 1, tmdb_id: "3624".to_string() },
            EpisodeRef { number: 3, tmdb_id: "63058".to_string() },
        );
        let out = probe(&server)
            .probe_source(&media, &source("alpha"), &Progress::noop("alpha"))
            .await
            .unwrap();
        assert_eq!(out.stream.unwrap().kind, StreamKind::File);
    }

    #[tokio::test]
    async fn test_probe_embed_stream_and_referer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/embeds/upcloud/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div data-referer="https://upcloud.example/"></div>
                   <script>load("https://cdn.example/master.m3u8")</script>"#,
            ))
            .mount(&server)
            .await;

        let media = ScrapeMedia::movie("27205", "Inception", 2010);
        let stream = probe(&server)
            .probe_embed(&media, &embed("upcloud"), "/embeds/upcloud/1", &Progress::noop("p-upcloud"))
            .await
            .unwrap();
        assert_eq!(stream.kind, StreamKind::Hls);
        assert_eq!(stream.headers.get("Referer").map(String::as_str), Some("https://upcloud.example/"));
    }

    #[tokio::test]
    async fn test_probe_embed_without_stream_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>removed</p>"))
            .mount(&server)
            .await;

        let media = ScrapeMedia::movie("27205", "Inception", 2010);
        let err = probe(&server)
            .probe_embed(&media, &embed("upcloud"), "/embeds/upcloud/1", &Progress::noop("p-upcloud"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
