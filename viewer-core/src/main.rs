//! src/main.rs
//! Driver: serves a local media library through the file viewer data source
//! and prints every refresh as a JSON line.
//!
//! Usage: `fvds [LIBRARY_ROOT]`

use std::{
    path::PathBuf,
    sync::{Arc, Weak},
    time::Instant,
};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};

use viewer_core::{
    AppError, FileViewerDataSource, LoggerBuilder,
    cache::ViewerCacheContext,
    collab::{FileByteFetcher, LocalDownloadManager, scan_library},
    config::Config,
    metadata::{KamadakExifExtractor, exif_for_item_data},
    model::{FileId, MediaFile},
    probe::ImageDimensionProber,
};

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    let mut config = Config::load().await.unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        Config::default()
    });

    if let Some(root) = std::env::args().nth(1) {
        config.library.root = PathBuf::from(root);
    }

    let _guard = LoggerBuilder::new()
        .with_config(config.logging.clone())
        .build()
        .await
        .context("Failed to initialize logging")?;

    info!(
        root = %config.library.root.display(),
        "Starting file viewer data source driver"
    );

    let started = Instant::now();
    run(&config).await.context("Driver run failed")?;

    info!(
        elapsed_ms = started.elapsed().as_millis(),
        "Driver exited cleanly"
    );
    Ok(())
}

/// Refresh callback printing the current value of `id` as one JSON line.
fn print_on_refresh(ctx: &Arc<ViewerCacheContext>, id: FileId) -> impl Fn() + Send + Sync + 'static {
    let ctx: Weak<ViewerCacheContext> = Arc::downgrade(ctx);
    move || {
        let Some(data) = ctx.upgrade().and_then(|ctx| ctx.items().get(id)) else {
            return;
        };

        match serde_json::to_string(&json!({ "fileId": id, "item": data })) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(file_id = id, "Could not serialize refresh: {e}"),
        }
    }
}

fn request_all(source: &FileViewerDataSource, files: &[MediaFile]) {
    let ctx = source.context();
    for file in files {
        source.item_data_for_file(file, print_on_refresh(&ctx, file.id));
    }
}

async fn run(config: &Config) -> Result<(), AppError> {
    let downloads = Arc::new(LocalDownloadManager::new(&config.library));
    let prober = Arc::new(ImageDimensionProber::with_config(&config.probe));
    let source = FileViewerDataSource::new(downloads, prober)?;

    let files = scan_library(&config.library).await?;
    if files.is_empty() {
        warn!(
            originals = %config.library.originals_path().display(),
            "Library has no media files"
        );
        return Ok(());
    }

    request_all(&source, &files);
    source.settle().await;

    // One explicit retry, as a viewer does when the user comes back to a file.
    let forgotten = source.forget_failed_items();
    if forgotten > 0 {
        info!(forgotten, "Retrying failed items");
        request_all(&source, &files);
        source.settle().await;
    }

    let ctx = source.context();
    let stats = ctx.items().stats();
    info!(
        entries = ctx.items().len(),
        hit_rate = stats.hit_rate(),
        "All pipelines settled"
    );

    for file in &files {
        let Some(item) = ctx.items().get(file.id) else {
            continue;
        };

        let exif = exif_for_item_data(&item, &FileByteFetcher, &KamadakExifExtractor).await;
        let line = serde_json::to_string(&json!({
            "fileId": file.id,
            "fileType": file.file_type,
            "item": item,
            "exif": exif.parsed,
        }))?;
        println!("{line}");
    }

    Ok(())
}
