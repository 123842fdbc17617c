use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use newsclip::ai::Summarizer;
use newsclip::config::Config;
use newsclip::db::Repository;
use newsclip::error::Result;
use newsclip::ingest::Ingestor;
use newsclip::shorts::ShortsGenerator;
use newsclip::source::SourceClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let config = Config::load()?;
    let repository = Arc::new(Repository::new(&config.db_path).await?);

    // One-shot retention sweep, then exit. Needs no API credentials.
    if args.len() >= 2 && args[1] == "--cleanup" {
        let cutoff = Utc::now() - chrono::Duration::days(config.retention_days);
        let deleted = repository.delete_news_older_than(cutoff).await?;
        println!("Deleted {} expired articles", deleted);
        return Ok(());
    }

    let (client_id, client_secret) = config.source_credentials()?;
    let source = Arc::new(SourceClient::new(client_id, client_secret));
    let ingestor = Arc::new(Ingestor::new(repository.clone(), source, &config));

    let api_key = config.summarizer_key()?;
    let summarizer = Arc::new(Summarizer::new(api_key));
    let generator = Arc::new(ShortsGenerator::new(
        repository.clone(),
        summarizer,
        &config,
    ));

    // One-shot fetch + shorts pass, then exit.
    if args.len() >= 2 && args[1] == "--fetch" {
        run_pipeline(&ingestor, &generator).await;
        return Ok(());
    }

    info!(
        interval_hours = config.fetch_interval_hours,
        retention_days = config.retention_days,
        "starting scheduler"
    );

    // Populate immediately rather than waiting a full interval.
    run_pipeline(&ingestor, &generator).await;

    let fetch_interval = Duration::from_secs(config.fetch_interval_hours * 3600);
    let pipeline_ingestor = ingestor.clone();
    let pipeline = tokio::spawn(async move {
        let mut interval = tokio::time::interval(fetch_interval);
        // The first tick fires immediately and the startup run already
        // covered it.
        interval.tick().await;
        loop {
            interval.tick().await;
            run_pipeline(&pipeline_ingestor, &generator).await;
        }
    });

    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(24 * 3600));
        interval.tick().await;
        loop {
            interval.tick().await;
            match ingestor.cleanup_old_news().await {
                Ok(deleted) => info!(deleted, "retention sweep finished"),
                Err(e) => error!("retention sweep failed: {}", e),
            }
        }
    });

    let _ = tokio::join!(pipeline, sweeper);
    Ok(())
}

/// Fetches every category, then derives shorts. Shorts are skipped when
/// ingestion fails outright so they never summarize a stale window.
async fn run_pipeline(ingestor: &Ingestor, generator: &ShortsGenerator) {
    let started = Utc::now();
    match ingestor.fetch_all().await {
        Ok(inserted) => {
            info!(inserted, "ingestion pass finished");
            match generator.generate_all().await {
                Ok(generated) => info!(
                    generated,
                    elapsed_secs = (Utc::now() - started).num_seconds(),
                    "pipeline pass finished"
                ),
                Err(e) => error!("shorts generation failed: {}", e),
            }
        }
        Err(e) => {
            error!("ingestion failed; skipping shorts generation: {}", e);
        }
    }
}
