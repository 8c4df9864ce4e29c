pub mod error;

pub mod error_core;

pub mod config;

pub mod logging;
pub use logging::LoggerBuilder;

pub mod model {
    pub mod item_data;
    pub use item_data::{Dimensions, ItemData};

    pub mod media_file;
    pub use media_file::{FileId, FileType, MediaFile};
}

pub mod cache {
    pub mod item_cache;

    pub mod refresh_registry;

    pub mod context;
    pub use context::ViewerCacheContext;
}

pub mod collab {
    pub mod download;
    pub use download::{DownloadManager, LivePhotoSourceUrl, RenderableSourceUrls, SourceUrl};

    pub mod local;
    pub use local::{FileByteFetcher, LocalDownloadManager, scan_library};
}

pub mod probe;

pub mod fetch {
    pub mod state;

    pub mod pipeline;
}

pub mod tasks {
    pub mod fetch_task;
}

pub mod data_source;

pub mod metadata;

pub mod util {
    pub mod urls;
}

#[cfg(test)]
mod testing;

pub use data_source::FileViewerDataSource;
pub use error::AppError;
pub use error_core::{CoreError, CoreResult};
pub use metadata::{ExifData, KamadakExifExtractor, exif_for_item_data};
