//! Data types for the scrape coordinator
//!
//! This module contains the core data structures shared by the registry,
//! tracker, coordinator and reporter. All types implement Serialize and
//! Deserialize for JSON compatibility with Tauri.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};

/// Kind of title being resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Feature film
    Movie,
    /// Episodic show
    Show,
}

impl MediaKind {
    /// Lowercase name used in URLs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "show",
        }
    }
}

/// Season or episode reference within a show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRef {
    /// 1-based number
    pub number: u32,
    /// TMDB identifier of the season or episode
    pub tmdb_id: String,
}

/// The title a scrape session resolves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeMedia {
    /// Movie or show
    pub kind: MediaKind,
    /// Display title
    pub title: String,
    /// Year of first release
    pub release_year: u32,
    /// TMDB identifier of the title
    pub tmdb_id: String,
    /// IMDB identifier, when known
    #[serde(default)]
    pub imdb_id: Option<String>,
    /// Season, shows only
    #[serde(default)]
    pub season: Option<EpisodeRef>,
    /// Episode, shows only
    #[serde(default)]
    pub episode: Option<EpisodeRef>,
}

impl ScrapeMedia {
    /// Create a movie request
    pub fn movie(tmdb_id: impl Into<String>, title: impl Into<String>, release_year: u32) -> Self {
        Self {
            kind: MediaKind::Movie,
            title: title.into(),
            release_year,
            tmdb_id: tmdb_id.into(),
            imdb_id: None,
            season: None,
            episode: None,
        }
    }

    /// Create a show episode request
    pub fn episode(
        tmdb_id: impl Into<String>,
        title: impl Into<String>,
        release_year: u32,
        season: EpisodeRef,
        episode: EpisodeRef,
    ) -> Self {
        Self {
            kind: MediaKind::Show,
            title: title.into(),
            release_year,
            tmdb_id: tmdb_id.into(),
            imdb_id: None,
            season: Some(season),
            episode: Some(episode),
        }
    }

    /// Check the request is well formed before a session uses it.
    ///
    /// # Errors
    /// * `ScrapeError::InvalidMedia` if the TMDB id is blank, a show lacks
    ///   season/episode, or a movie carries one
    pub fn validate(&self) -> Result<()> {
        if self.tmdb_id.trim().is_empty() {
            return Err(ScrapeError::InvalidMedia("tmdb id cannot be empty".to_string()));
        }
        match self.kind {
            MediaKind::Show if self.season.is_none() || self.episode.is_none() => Err(
                ScrapeError::InvalidMedia("show requests need a season and an episode".to_string()),
            ),
            MediaKind::Movie if self.season.is_some() || self.episode.is_some() => Err(
                ScrapeError::InvalidMedia("movie requests cannot carry a season or episode".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

/// Embed scraper advertised by a provider in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedEntry {
    /// Embed scraper id (e.g. "upcloud")
    pub id: String,
    /// Display name
    pub name: String,
}

/// Raw provider record from the upstream catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Unique provider id
    pub id: String,
    /// Display name
    pub name: String,
    /// Higher ranks are probed first
    pub rank: i32,
    /// Media kinds this provider can resolve
    pub media_types: Vec<MediaKind>,
    /// Embeds this provider may hand off to, in preference order
    #[serde(default)]
    pub embeds: Vec<EmbedEntry>,
    /// Disabled providers never enter a registry
    #[serde(default)]
    pub disabled: bool,
}

/// Child source nested under a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedDescriptor {
    /// Session-unique id, `{source_id}-{embed_id}`
    pub id: String,
    /// Embed scraper id this child runs
    pub embed_id: String,
    /// Display name
    pub name: String,
}

/// One top-level provider in a session registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique provider id
    pub id: String,
    /// Display name
    pub name: String,
    /// Ordered child sources
    pub children: Vec<EmbedDescriptor>,
}

impl SourceDescriptor {
    /// Ids of the children in probe order
    pub fn child_ids(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|c| c.id.as_str())
    }

    /// Whether `id` is this provider or one of its children
    pub fn contains(&self, id: &str) -> bool {
        self.id == id || self.child_ids().any(|c| c == id)
    }
}

/// Status of one tracked source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Not yet reached
    Pending,
    /// Being probed
    Active,
    /// Yielded a playable stream
    Success,
    /// Probe errored
    Failure,
    /// Probe reported the content does not exist
    #[serde(rename = "notfound")]
    NotFound,
}

impl Status {
    /// Terminal states never change again within a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Success | Status::Failure | Status::NotFound)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "pending",
            Status::Active => "active",
            Status::Success => "success",
            Status::Failure => "failure",
            Status::NotFound => "notfound",
        };
        f.write_str(s)
    }
}

/// Live state of one provider or embed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    /// Provider or child id
    pub id: String,
    /// Display name
    pub name: String,
    /// Embed scraper id, children only
    pub embed_id: Option<String>,
    /// Current status
    pub status: Status,
    /// Progress, 0-100
    pub percentage: u8,
    /// Failure or not-found message
    pub reason: Option<String>,
}

impl SourceState {
    pub(crate) fn pending(id: &str, name: &str, embed_id: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            embed_id: embed_id.map(str::to_string),
            status: Status::Pending,
            percentage: 0,
            reason: None,
        }
    }
}

/// How a stream is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// HLS playlist
    Hls,
    /// Progressive file (mp4, webm)
    File,
}

/// A playable stream handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Delivery format
    pub kind: StreamKind,
    /// Playlist or file URL
    pub url: String,
    /// Headers the player must send
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Stream {
    /// Classify a URL by extension; `None` for anything unplayable
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        let kind = if path.ends_with(".m3u8") {
            StreamKind::Hls
        } else if path.ends_with(".mp4") || path.ends_with(".webm") {
            StreamKind::File
        } else {
            return None;
        };
        Some(Self {
            kind,
            url: url.to_string(),
            headers: HashMap::new(),
        })
    }
}

/// Link to an embed discovered on a provider page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedLink {
    /// Embed scraper id the link belongs to
    pub embed_id: String,
    /// Page URL to hand to the embed probe
    pub url: String,
}

/// What a provider probe produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutput {
    /// Stream served directly by the provider
    pub stream: Option<Stream>,
    /// Embeds to try when there is no direct stream
    pub embeds: Vec<EmbedLink>,
}

/// Winning source of a successful session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    /// Provider that succeeded
    pub source_id: String,
    /// Embed that produced the stream, if any
    pub embed_id: Option<String>,
    /// The stream
    pub stream: Stream,
}

/// Terminal payload of a scrape session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ScrapeResult {
    /// A source yielded a playable stream
    Found(RunOutput),
    /// Every source was tried and none produced a stream
    Exhausted,
}

impl ScrapeResult {
    /// The run output, if a stream was found
    pub fn output(&self) -> Option<&RunOutput> {
        match self {
            ScrapeResult::Found(out) => Some(out),
            ScrapeResult::Exhausted => None,
        }
    }
}
