use std::sync::Arc;

use scrape_core::{ClientConfig, NoopTelemetry, ScrapeConfig, ScrapeMedia, Scraper, ScrapingPart, ScrapingView};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let scraper = Scraper::http(ClientConfig::from_env(), ScrapeConfig::from_env())?;
    let media = ScrapeMedia::movie("27205", "Inception", 2010);

    println!("🔍 Scraping '{}' ({})...", media.title, media.release_year);
    println!("💡 {}\n", scrape_core::random_tip());

    let part = Arc::new(ScrapingPart::new(&scraper, media, Arc::new(NoopTelemetry)).on_result(
        |sources, order| {
            for source in &order {
                if let Some(state) = sources.get(&source.id) {
                    println!("  {:<20} {}", source.name, state.status);
                }
                for child in &source.children {
                    if let Some(state) = sources.get(&child.id) {
                        println!("    └ {:<16} {}", child.name, state.status);
                    }
                }
            }
        },
    ));

    let mut rx = part.subscribe();
    let watcher = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if let Some(current) = &snapshot.current_source {
                let pct = snapshot.get(current).map(|s| s.percentage).unwrap_or(0);
                println!("  ⏳ {} {}%", current, pct);
            }
        }
    });

    part.run().await;
    watcher.abort();

    match part.view() {
        ScrapingView::Found(out) => {
            println!("\n✅ {} via {}", out.stream.url, out.source_id);
            if let Some(embed) = &out.embed_id {
                println!("   embed: {}", embed);
            }
        }
        ScrapingView::NotFound => println!("\n❌ No stream found"),
        ScrapingView::Failed { message } => println!("\n⚠️  {}", message),
        other => println!("\n{:?}", other),
    }

    Ok(())
}
