//! HTML parsers for provider backend pages
//!
//! This module contains parsers for extracting playable data from pages:
//! - `source_page`: provider page with a direct video or embed links
//! - `embed_page`: embed player page with an inline stream URL

pub mod embed_page;
pub mod source_page;

// Re-export main parsing functions
pub use embed_page::{extract_referer, extract_stream};
pub use source_page::parse_source_page;
