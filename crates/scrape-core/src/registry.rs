//! Source registry construction
//!
//! Turns a provider catalog into the ordered list of sources a session will
//! probe. The order is fixed here and never changes for the session.

use std::collections::HashSet;

use crate::error::{Result, ScrapeError};
use crate::types::{EmbedDescriptor, ProviderEntry, ScrapeMedia, SourceDescriptor};

/// Session-unique id of an embed nested under `source_id`
pub fn child_id(source_id: &str, embed_id: &str) -> String {
    format!("{}-{}", source_id, embed_id)
}

/// Build the ordered registry for one request.
///
/// Disabled providers and providers that cannot serve the media kind are
/// dropped. The rest are ordered by rank (highest first), ties broken by id.
///
/// # Errors
/// * `ScrapeError::RegistryUnavailable` if no provider qualifies, or if the
///   catalog holds duplicate provider or child ids
pub fn build_registry(media: &ScrapeMedia, catalog: &[ProviderEntry]) -> Result<Vec<SourceDescriptor>> {
    let mut eligible: Vec<&ProviderEntry> = catalog
        .iter()
        .filter(|p| !p.disabled && p.media_types.contains(&media.kind))
        .collect();

    if eligible.is_empty() {
        return Err(ScrapeError::RegistryUnavailable(format!(
            "no providers for {} {}",
            media.kind.as_str(),
            media.tmdb_id
        )));
    }

    eligible.sort_by(|a, b| b.rank.cmp(&a.rank).then_with(|| a.id.cmp(&b.id)));

    let mut seen = HashSet::new();
    let mut registry = Vec::with_capacity(eligible.len());

    for provider in eligible {
        if !seen.insert(provider.id.clone()) {
            return Err(ScrapeError::RegistryUnavailable(format!(
                "duplicate provider id {}",
                provider.id
            )));
        }

        let mut children = Vec::with_capacity(provider.embeds.len());
        for embed in &provider.embeds {
            let id = child_id(&provider.id, &embed.id);
            if !seen.insert(id.clone()) {
                return Err(ScrapeError::RegistryUnavailable(format!("duplicate source id {}", id)));
            }
            children.push(EmbedDescriptor {
                id,
                embed_id: embed.id.clone(),
                name: embed.name.clone(),
            });
        }

        registry.push(SourceDescriptor {
            id: provider.id.clone(),
            name: provider.name.clone(),
            children,
        });
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmbedEntry, MediaKind};

    fn provider(id: &str, rank: i32, kinds: &[MediaKind], embeds: &[&str]) -> ProviderEntry {
        ProviderEntry {
            id: id.to_string(),
            name: id.to_uppercase(),
            rank,
            media_types: kinds.to_vec(),
            embeds: embeds
                .iter()
                .map(|e| EmbedEntry { id: e.to_string(), name: e.to_string() })
                .collect(),
            disabled: false,
        }
    }

    fn movie() -> ScrapeMedia {
        ScrapeMedia::movie("27205", "Inception", 2010)
    }

    #[test]
    fn test_orders_by_rank_then_id() {
        let catalog = vec![
            provider("low", 1, &[MediaKind::Movie], &[]),
            provider("zeta", 50, &[MediaKind::Movie], &[]),
            provider("alpha", 50, &[MediaKind::Movie], &[]),
        ];
        let registry = build_registry(&movie(), &catalog).unwrap();
        let ids: Vec<_> = registry.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "zeta", "low"]);
    }

    #[test]
    fn test_filters_media_kind_and_disabled() {
        let mut off = provider("off", 99, &[MediaKind::Movie], &[]);
        off.disabled = true;
        let catalog = vec![
            off,
            provider("shows", 10, &[MediaKind::Show], &[]),
            provider("movies", 5, &[MediaKind::Movie], &[]),
        ];
        let registry = build_registry(&movie(), &catalog).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry[0].id, "movies");
    }

    #[test]
    fn test_children_keep_catalog_order() {
        let catalog = vec![provider("p", 1, &[MediaKind::Movie], &["e2", "e1"])];
        let registry = build_registry(&movie(), &catalog).unwrap();
        let children: Vec<_> = registry[0].child_ids().collect();
        assert_eq!(children, vec!["p-e2", "p-e1"]);
        assert_eq!(registry[0].children[0].embed_id, "e2");
    }

    #[test]
    fn test_empty_registry_is_unavailable() {
        assert!(matches!(
            build_registry(&movie(), &[]),
            Err(ScrapeError::RegistryUnavailable(_))
        ));
        let catalog = vec![provider("shows", 10, &[MediaKind::Show], &[])];
        assert!(matches!(
            build_registry(&movie(), &catalog),
            Err(ScrapeError::RegistryUnavailable(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let catalog = vec![
            provider("p", 2, &[MediaKind::Movie], &[]),
            provider("p", 1, &[MediaKind::Movie], &[]),
        ];
        assert!(matches!(
            build_registry(&movie(), &catalog),
            Err(ScrapeError::RegistryUnavailable(_))
        ));

        let catalog = vec![provider("p", 1, &[MediaKind::Movie], &["e", "e"])];
        assert!(matches!(
            build_registry(&movie(), &catalog),
            Err(ScrapeError::RegistryUnavailable(_))
        ));
    }

    #[test]
    fn test_child_id_collision_with_provider() {
        let catalog = vec![
            provider("a-b", 2, &[MediaKind::Movie], &[]),
            provider("a", 1, &[MediaKind::Movie], &["b"]),
        ];
        assert!(matches!(
            build_registry(&movie(), &catalog),
            Err(ScrapeError::RegistryUnavailable(_))
        ));
    }
}
