//! Dimension probing.
//!
//! Given a renderable image URL, find its natural pixel size. Probes are
//! independent and uncached; a resolved size is kept by the item cache as
//! part of the `ItemData` it belongs to.

use std::{path::Path, time::Duration};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{
    config::ProbeConfig,
    error_core::{CoreError, CoreResult},
    model::item_data::Dimensions,
    util::urls::local_path,
};

/// Resolves the natural size of an image URL.
#[async_trait]
pub trait DimensionProber: Send + Sync {
    async fn probe(&self, url: &str) -> CoreResult<Dimensions>;
}

/// Probes local (`file://` or bare path) images by decoding only their
/// header with the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageDimensionProber {
    timeout: Duration,
}

impl ImageDimensionProber {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub const fn with_config(config: &ProbeConfig) -> Self {
        Self::new(config.timeout)
    }
}

impl Default for ImageDimensionProber {
    fn default() -> Self {
        Self::with_config(&ProbeConfig::default())
    }
}

fn read_dimensions(path: &Path) -> image::ImageResult<(u32, u32)> {
    image::ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
}

#[async_trait]
impl DimensionProber for ImageDimensionProber {
    #[instrument(skip(self), fields(timeout_ms = self.timeout.as_millis()))]
    async fn probe(&self, url: &str) -> CoreResult<Dimensions> {
        let path = local_path(url).ok_or_else(|| CoreError::probe(url, "unsupported URL scheme"))?;

        let task = tokio::task::spawn_blocking(move || read_dimensions(&path));

        let (width, height) = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(size))) => size,
            Ok(Ok(Err(e))) => return Err(CoreError::probe(url, e)),
            Ok(Err(join_err)) => return Err(CoreError::probe(url, join_err)),
            Err(_) => {
                return Err(CoreError::probe(
                    url,
                    format!("timed out after {:?}", self.timeout),
                ));
            }
        };

        debug!(width, height, "Probed image dimensions");
        Ok(Dimensions::new(width, height))
    }
}
