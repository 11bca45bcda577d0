//! Provider catalogs
//!
//! A catalog lists every provider the backend knows about. The registry
//! filters and orders it per request.

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::ProviderClient;
use crate::error::{Result, ScrapeError};
use crate::types::ProviderEntry;

/// Path of the provider listing on the backend
const PROVIDERS_PATH: &str = "/providers";

/// Source of provider records
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// All known providers, in no particular order
    async fn list_providers(&self) -> Result<Vec<ProviderEntry>>;
}

/// Fixed, in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    providers: Vec<ProviderEntry>,
}

impl StaticCatalog {
    /// Wrap a provider list
    pub fn new(providers: Vec<ProviderEntry>) -> Self {
        Self { providers }
    }

    /// Parse a JSON array of provider records
    ///
    /// # Errors
    /// * `ScrapeError::ParseError` if the JSON does not match `ProviderEntry`
    pub fn from_json(json: &str) -> Result<Self> {
        let providers = serde_json::from_str(json).map_err(|e| ScrapeError::ParseError(e.to_string()))?;
        Ok(Self { providers })
    }
}

#[async_trait]
impl SourceCatalog for StaticCatalog {
    async fn list_providers(&self) -> Result<Vec<ProviderEntry>> {
        Ok(self.providers.clone())
    }
}

/// Catalog served by the provider backend at `GET /providers`
pub struct HttpCatalog {
    client: Arc<ProviderClient>,
}

impl HttpCatalog {
    /// Use a shared provider client
    pub fn new(client: Arc<ProviderClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceCatalog for HttpCatalog {
    async fn list_providers(&self) -> Result<Vec<ProviderEntry>> {
        self.client.fetch_json(PROVIDERS_PATH).await
    }
}
