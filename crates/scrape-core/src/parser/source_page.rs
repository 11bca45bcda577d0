//! Provider page parser
//!
//! A provider page either embeds a playable video directly or lists the
//! embed players it hands off to.

use std::collections::HashSet;

use scraper::{Html, Selector};

use crate::error::{Result, ScrapeError};
use crate::types::{EmbedLink, SourceOutput, Stream};

/// Parse a provider page into a direct stream and/or embed links.
///
/// Direct streams come from `<video src>` or `<source src>`. Embed links come
/// from elements carrying a `data-embed` attribute, with the URL in `src`,
/// `data-src` or `data-url`.
///
/// # Returns
/// * `Ok(SourceOutput)` - possibly empty when the page offers nothing
/// * `Err(ScrapeError::ParseError)` if a selector cannot be built
pub fn parse_source_page(html: &str) -> Result<SourceOutput> {
    let document = Html::parse_document(html);

    let video_selector = Selector::parse("video[src], video source[src], source[src]")
        .map_err(|e| ScrapeError::ParseError(format!("Invalid selector: {:?}", e)))?;
    let stream = document
        .select(&video_selector)
        .filter_map(|el| el.value().attr("src"))
        .find_map(|src| Stream::from_url(src.trim()));

    let embed_selector = Selector::parse("[data-embed]")
        .map_err(|e| ScrapeError::ParseError(format!("Invalid selector: {:?}", e)))?;

    let mut seen = HashSet::new();
    let mut embeds = Vec::new();
    for el in document.select(&embed_selector) {
        if let Some(link) = parse_embed_element(&el) {
            if seen.insert((link.embed_id.clone(), link.url.clone())) {
                embeds.push(link);
            }
        }
    }

    Ok(SourceOutput { stream, embeds })
}

/// Read one `data-embed` element.
fn parse_embed_element(element: &scraper::ElementRef) -> Option<EmbedLink> {
    let value = element.value();
    let embed_id = value.attr("data-embed")?.trim();
    if embed_id.is_empty() {
        return None;
    }

    let url = ["src", "data-src", "data-url"]
        .iter()
        .filter_map(|attr| value.attr(attr))
        .map(str::trim)
        .find(|u| !u.is_empty())?;

    Some(EmbedLink {
        embed_id: embed_id.to_string(),
        url: url.to_string(),
    })
}
