//! Tauri commands for the scrape coordinator
//!
//! This module contains all Tauri commands that can be invoked from the frontend.

use tauri::{AppHandle, Emitter, State};

use crate::{run_forwarding, ScrapeState, UPDATE_EVENT};
use scrape_core::{ScrapeMedia, ScrapeSnapshot, ScrapingView};

/// Scrape a movie or episode.
///
/// Replaces any running session. Every tracker write is emitted as a
/// `scrape://update` event carrying the snapshot, ending with the settled one.
///
/// # Arguments
/// * `media` - The movie or episode to find a stream for
///
/// # Returns
/// * `Ok(ScrapingView)` with the settled view (`found`, `notfound` or `failed`),
///   or the last progress view if the session was stopped
/// * `Err(String)` if the media request is malformed
#[tauri::command]
pub async fn start_scraping(
    app: AppHandle,
    state: State<'_, ScrapeState>,
    media: ScrapeMedia,
) -> Result<ScrapingView, String> {
    media.validate().map_err(|e| e.to_string())?;
    let part = state.mount(media).await;

    run_forwarding(&part, move |snapshot: &ScrapeSnapshot| {
        if let Err(e) = app.emit(UPDATE_EVENT, snapshot) {
            tracing::warn!(error = %e, "failed to emit scrape update");
        }
    })
    .await;
    Ok(part.view())
}

/// Render state of the running session.
///
/// # Returns
/// * `Some(ScrapingView)` while a part is mounted
/// * `None` otherwise
#[tauri::command]
pub async fn scrape_view(state: State<'_, ScrapeState>) -> Result<Option<ScrapingView>, String> {
    Ok(state.current().await.map(|part| part.view()))
}

/// Tear down the running session. Its callbacks and metrics are dropped.
#[tauri::command]
pub async fn stop_scraping(state: State<'_, ScrapeState>) -> Result<(), String> {
    state.unmount().await;
    Ok(())
}

/// A random hint for the loading screen.
#[tauri::command]
pub fn scrape_tip() -> String {
    scrape_core::random_tip().to_string()
}
