//! Embed player page parser
//!
//! Embed players rarely expose the stream in markup; the URL usually sits in
//! an inline script or JSON config. We scan the raw text instead.

use crate::types::{Stream, StreamKind};

/// Find the best playable stream URL in an embed page.
///
/// HLS playlists win over progressive files; within a kind the first match
/// wins. JSON-escaped slashes (`https:\/\/`) are handled.
///
/// # Examples
/// ```
/// use scrape_core::parser::extract_stream;
///
/// let page = r#"player.setup({file: "https:\/\/cdn.example\/v.m3u8"})"#;
/// assert_eq!(extract_stream(page).unwrap().url, "https://cdn.example/v.m3u8");
/// assert!(extract_stream("<p>nothing here</p>").is_none());
/// ```
pub fn extract_stream(page: &str) -> Option<Stream> {
    let text = page.replace("\\/", "/");
    let re = regex_lite::Regex::new(
        r#"(?i)https?://[^\s"'<>\\]+?\.(?:m3u8|mp4|webm)(?:\?[^\s"'<>\\]*)?"#,
    )
    .ok()?;

    let candidates: Vec<Stream> = re
        .find_iter(&text)
        .filter_map(|m| Stream::from_url(m.as_str()))
        .collect();

    candidates
        .iter()
        .find(|s| s.kind == StreamKind::Hls)
        .or_else(|| candidates.first())
        .cloned()
}

/// Pull a `Referer` hint out of an embed page, if it declares one.
///
/// Some hosts refuse playlist requests without the embed origin as referer.
pub fn extract_referer(page: &str) -> Option<String> {
    let re = regex_lite::Regex::new(r#"(?i)data-referer\s*=\s*["']([^"']+)["']"#).ok()?;
    let caps = re.captures(page)?;
    Some(caps.get(1)?.as_str().trim().to_string()).filter(|r| !r.is_empty())
}
