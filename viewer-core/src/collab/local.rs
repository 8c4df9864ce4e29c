//! Local-directory collaborators.
//!
//! A library laid out as
//!
//! ```text
//! <root>/<thumbnails_dir>/<stem>.jpg     pre-rendered thumbnails
//! <root>/<originals_dir>/<name>.<ext>    originals
//! ```
//!
//! where a live photo is an image and a video sharing a stem in the originals
//! directory. URLs handed out are `file://` URLs.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::fs as TokioFs;
use tracing::{debug, info, instrument};

use crate::{
    collab::download::{DownloadManager, LivePhotoSourceUrl, RenderableSourceUrls},
    config::LibraryConfig,
    error_core::{CoreError, CoreResult},
    metadata::ByteFetcher,
    model::media_file::{FileId, FileType, MediaFile},
    util::urls::{file_url, local_path},
};

const THUMBNAIL_EXTENSION: &str = "jpg";
const LIVE_PHOTO_IMAGE_EXTENSIONS: [&str; 5] = ["heic", "jpg", "jpeg", "png", "webp"];
const LIVE_PHOTO_VIDEO_EXTENSIONS: [&str; 2] = ["mov", "mp4"];

fn stem_of(locator: &str) -> &str {
    Path::new(locator)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(locator)
}

async fn existing_file_url(path: &Path) -> std::io::Result<String> {
    let meta = TokioFs::metadata(path).await?;
    if meta.is_file() {
        Ok(file_url(path))
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a file", path.display()),
        ))
    }
}

/// First `<dir>/<stem>.<ext>` that exists, trying `extensions` in order.
async fn first_existing(dir: &Path, stem: &str, extensions: &[&str]) -> Option<PathBuf> {
    for ext in extensions {
        let candidate = dir.join(format!("{stem}.{ext}"));
        if TokioFs::try_exists(&candidate).await.unwrap_or(false) {
            return Some(candidate);
        }
    }
    None
}

/// Serves thumbnails and originals straight from a library directory.
#[derive(Debug, Clone)]
pub struct LocalDownloadManager {
    thumbnails: PathBuf,
    originals: PathBuf,
}

impl LocalDownloadManager {
    #[must_use]
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            thumbnails: config.thumbnails_path(),
            originals: config.originals_path(),
        }
    }

    #[must_use]
    pub fn thumbnail_path(&self, file: &MediaFile) -> PathBuf {
        self.thumbnails
            .join(format!("{}.{THUMBNAIL_EXTENSION}", stem_of(&file.locator)))
    }
}

#[async_trait]
impl DownloadManager for LocalDownloadManager {
    #[instrument(skip(self, file), fields(file_id = file.id))]
    async fn renderable_thumbnail_url(&self, file: &MediaFile) -> CoreResult<String> {
        let path = self.thumbnail_path(file);
        existing_file_url(&path)
            .await
            .map_err(|e| CoreError::thumbnail_fetch(file.id, format!("{}: {e}", path.display())))
    }

    #[instrument(skip(self, file), fields(file_id = file.id, file_type = file.file_type.as_str()))]
    async fn renderable_source_urls(&self, file: &MediaFile) -> CoreResult<RenderableSourceUrls> {
        match file.file_type {
            FileType::Image | FileType::Video => {
                let path = self.originals.join(&*file.locator);
                let url = existing_file_url(&path).await.map_err(|e| {
                    CoreError::original_fetch(file.id, format!("{}: {e}", path.display()))
                })?;
                Ok(RenderableSourceUrls::single(url))
            }
            FileType::LivePhoto => Ok(RenderableSourceUrls::live_photo(LocalLivePhoto {
                file_id: file.id,
                dir: self.originals.clone(),
                stem: stem_of(&file.locator).to_owned(),
            })),
        }
    }
}

/// Live photo halves looked up on demand next to each other.
#[derive(Debug)]
struct LocalLivePhoto {
    file_id: FileId,
    dir: PathBuf,
    stem: String,
}

impl LocalLivePhoto {
    async fn resolve(&self, extensions: &[&str], half: &str) -> CoreResult<String> {
        let path = first_existing(&self.dir, &self.stem, extensions)
            .await
            .ok_or_else(|| {
                CoreError::original_fetch(
                    self.file_id,
                    format!("no live photo {half} for {} in {}", self.stem, self.dir.display()),
                )
            })?;
        Ok(file_url(&path))
    }
}

#[async_trait]
impl LivePhotoSourceUrl for LocalLivePhoto {
    async fn image(&self) -> CoreResult<String> {
        self.resolve(&LIVE_PHOTO_IMAGE_EXTENSIONS, "image").await
    }

    async fn video(&self) -> CoreResult<String> {
        self.resolve(&LIVE_PHOTO_VIDEO_EXTENSIONS, "video").await
    }
}

/// Reads the bytes behind `file://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileByteFetcher;

#[async_trait]
impl ByteFetcher for FileByteFetcher {
    async fn fetch(&self, url: &str) -> CoreResult<Vec<u8>> {
        let path = local_path(url).ok_or_else(|| CoreError::byte_fetch(url, "unsupported URL scheme"))?;
        TokioFs::read(&path)
            .await
            .map_err(|e| CoreError::byte_fetch(url, e))
    }
}

/// List the originals directory as media files.
///
/// Files sharing a stem as exactly one image and one video become a single
/// live photo; everything else is an image or a video on its own. IDs are
/// assigned from 1 in name order, so they are stable for an unchanged
/// library.
#[instrument(skip(config), fields(originals = %config.originals_path().display()))]
pub async fn scan_library(config: &LibraryConfig) -> CoreResult<Vec<MediaFile>> {
    let originals = config.originals_path();
    let mut by_stem: BTreeMap<String, Vec<(String, FileType)>> = BTreeMap::new();

    let mut entries = TokioFs::read_dir(&originals).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let Some(file_type) = FileType::from_path(&path) else {
            debug!("Skipping unsupported file {}", path.display());
            continue;
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        by_stem
            .entry(stem_of(name).to_owned())
            .or_default()
            .push((name.to_owned(), file_type));
    }

    let mut files = Vec::new();
    let mut next_id: FileId = 1;
    let mut push = |file_type: FileType, locator: String| {
        files.push(MediaFile::new(next_id, file_type, locator));
        next_id += 1;
    };

    for (stem, mut members) in by_stem {
        members.sort_by(|a, b| a.0.cmp(&b.0));

        let images = members.iter().filter(|(_, t)| *t == FileType::Image).count();
        let videos = members.iter().filter(|(_, t)| *t == FileType::Video).count();

        if images == 1 && videos == 1 && members.len() == 2 {
            push(FileType::LivePhoto, stem);
        } else {
            for (name, file_type) in members {
                push(file_type, name);
            }
        }
    }

    info!(count = files.len(), "Scanned library");
    Ok(files)
}
