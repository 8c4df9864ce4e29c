//! Metadata side-channel.
//!
//! Best-effort Exif for the info panel. Nothing here can fail the viewer:
//! every error is logged and downgraded to [`ExifData::unavailable`].

use std::{io::Cursor, time::Instant};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use compact_str::CompactString;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::{
    error_core::{CoreError, CoreResult},
    model::item_data::ItemData,
};

const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
const PRIMARY_IFD: u16 = 0;

/// Fetches the raw bytes behind a renderable URL.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> CoreResult<Vec<u8>>;
}

/// One tag as read from the file, before interpretation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawTag {
    /// IFD index; 0 is the main image, 1 the embedded thumbnail.
    pub ifd: u16,
    pub number: u16,
    pub name: CompactString,
    /// Human-readable value.
    pub text: String,
    /// Numeric components, when the value is numeric.
    pub numbers: SmallVec<[f64; 3]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawTags {
    pub tags: Vec<RawTag>,
}

impl RawTags {
    /// First main-image tag called `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&RawTag> {
        self.tags
            .iter()
            .find(|tag| tag.ifd == PRIMARY_IFD && tag.name == name)
    }

    fn text(&self, name: &str) -> Option<String> {
        self.find(name)
            .map(|tag| tag.text.trim().trim_matches('"').trim().to_owned())
            .filter(|text| !text.is_empty())
    }

    fn number(&self, name: &str) -> Option<f64> {
        self.find(name)?.numbers.first().copied()
    }

    fn integer(&self, name: &str) -> Option<u32> {
        self.number(name)
            .filter(|n| n.is_finite() && *n >= 0.0 && *n <= f64::from(u32::MAX))
            .map(|n| n as u32)
    }
}

/// The fields a viewer commonly shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedExif {
    pub make: Option<String>,
    pub model: Option<String>,
    pub date_time_original: Option<NaiveDateTime>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub orientation: Option<u32>,
    /// Seconds.
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    pub iso: Option<u32>,
    /// Millimetres.
    pub focal_length: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ParsedExif {
    #[must_use]
    pub const fn has_location(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Raw and parsed Exif of an item; both `None` when unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExifData {
    pub tags: Option<RawTags>,
    pub parsed: Option<ParsedExif>,
}

impl ExifData {
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            tags: None,
            parsed: None,
        }
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.tags.is_some()
    }
}

/// Turns image bytes into tags.
pub trait MetadataExtractor: Send + Sync {
    fn extract_raw_tags(&self, bytes: &[u8]) -> CoreResult<RawTags>;

    fn parse(&self, tags: &RawTags) -> ParsedExif {
        parse_raw_tags(tags)
    }
}

fn gps_coordinate(tags: &RawTags, value: &str, reference: &str, negative: char) -> Option<f64> {
    let tag = tags.find(value)?;
    let (deg, min, sec) = match tag.numbers.as_slice() {
        [deg, min, sec, ..] => (*deg, *min, *sec),
        [deg, min] => (*deg, *min, 0.0),
        [deg] => (*deg, 0.0, 0.0),
        [] => return None,
    };

    let magnitude = deg + min / 60.0 + sec / 3600.0;
    let south_or_west = tags
        .text(reference)
        .is_some_and(|r| r.starts_with(negative));

    Some(if south_or_west { -magnitude } else { magnitude })
}

/// Interpret the commonly shown tags. Missing or malformed tags stay `None`.
#[must_use]
pub fn parse_raw_tags(tags: &RawTags) -> ParsedExif {
    let date_time_original = tags
        .text("DateTimeOriginal")
        .or_else(|| tags.text("DateTime"))
        .and_then(|text| NaiveDateTime::parse_from_str(&text, EXIF_DATE_FORMAT).ok());

    ParsedExif {
        make: tags.text("Make"),
        model: tags.text("Model"),
        date_time_original,
        width: tags
            .integer("PixelXDimension")
            .or_else(|| tags.integer("ImageWidth")),
        height: tags
            .integer("PixelYDimension")
            .or_else(|| tags.integer("ImageLength")),
        orientation: tags.integer("Orientation"),
        exposure_time: tags.number("ExposureTime"),
        f_number: tags.number("FNumber"),
        iso: tags.integer("PhotographicSensitivity"),
        focal_length: tags.number("FocalLength"),
        latitude: gps_coordinate(tags, "GPSLatitude", "GPSLatitudeRef", 'S'),
        longitude: gps_coordinate(tags, "GPSLongitude", "GPSLongitudeRef", 'W'),
    }
}

/// Reads Exif from JPEG, HEIF, PNG, TIFF and WebP containers with
/// `kamadak-exif`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KamadakExifExtractor;

fn value_numbers(value: &exif::Value) -> SmallVec<[f64; 3]> {
    use exif::Value;

    match value {
        Value::Byte(v) => v.iter().map(|n| f64::from(*n)).collect(),
        Value::Short(v) => v.iter().map(|n| f64::from(*n)).collect(),
        Value::Long(v) => v.iter().map(|n| f64::from(*n)).collect(),
        Value::SByte(v) => v.iter().map(|n| f64::from(*n)).collect(),
        Value::SShort(v) => v.iter().map(|n| f64::from(*n)).collect(),
        Value::SLong(v) => v.iter().map(|n| f64::from(*n)).collect(),
        Value::Rational(v) => v.iter().map(exif::Rational::to_f64).collect(),
        Value::SRational(v) => v.iter().map(exif::SRational::to_f64).collect(),
        Value::Float(v) => v.iter().map(|n| f64::from(*n)).collect(),
        Value::Double(v) => v.iter().copied().collect(),
        _ => SmallVec::new(),
    }
}

fn value_text(field: &exif::Field) -> String {
    match &field.value {
        exif::Value::Ascii(parts) => parts
            .iter()
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect::<Vec<_>>()
            .join(" "),
        _ => field.display_value().to_string(),
    }
}

impl MetadataExtractor for KamadakExifExtractor {
    fn extract_raw_tags(&self, bytes: &[u8]) -> CoreResult<RawTags> {
        let mut cursor = Cursor::new(bytes);
        let exif = exif::Reader::new()
            .read_from_container(&mut cursor)
            .map_err(CoreError::metadata_extraction)?;

        let tags = exif
            .fields()
            .map(|field| RawTag {
                ifd: field.ifd_num.index(),
                number: field.tag.number(),
                name: CompactString::new(field.tag.to_string()),
                text: value_text(field),
                numbers: value_numbers(&field.value),
            })
            .collect();

        Ok(RawTags { tags })
    }
}

async fn fetch_and_extract(
    src: &str,
    fetcher: &dyn ByteFetcher,
    extractor: &dyn MetadataExtractor,
) -> CoreResult<ExifData> {
    let started = Instant::now();
    let bytes = fetcher.fetch(src).await?;
    debug!(
        bytes = bytes.len(),
        elapsed_ms = started.elapsed().as_millis(),
        "Fetched bytes for exif"
    );

    let tags = extractor.extract_raw_tags(&bytes)?;
    let parsed = extractor.parse(&tags);

    Ok(ExifData {
        tags: Some(tags),
        parsed: Some(parsed),
    })
}

/// Exif of the static image an item currently shows.
///
/// Items without a `src` (videos) are not applicable and nothing is fetched.
pub async fn exif_for_item_data(
    item: &ItemData,
    fetcher: &dyn ByteFetcher,
    extractor: &dyn MetadataExtractor,
) -> ExifData {
    let Some(src) = item.src.as_deref() else {
        debug!("No static image, exif not applicable");
        return ExifData::unavailable();
    };

    match fetch_and_extract(src, fetcher, extractor).await {
        Ok(data) => data,
        Err(e) => {
            warn!(
                marker = e.error_marker(),
                operation_type = e.operation_type(),
                src,
                error = %e,
                "Exif unavailable"
            );
            ExifData::unavailable()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use smallvec::smallvec;

    use super::*;
    use crate::model::item_data::Dimensions;

    fn tag(name: &str, text: &str, numbers: SmallVec<[f64; 3]>) -> RawTag {
        RawTag {
            ifd: PRIMARY_IFD,
            number: 0,
            name: CompactString::new(name),
            text: text.to_owned(),
            numbers,
        }
    }

    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ByteFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> CoreResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CoreError::byte_fetch(url, "connection reset"))
            } else {
                Ok(b"bytes".to_vec())
            }
        }
    }

    struct FixedExtractor;

    impl MetadataExtractor for FixedExtractor {
        fn extract_raw_tags(&self, _bytes: &[u8]) -> CoreResult<RawTags> {
            Ok(RawTags {
                tags: vec![tag("Make", "Acme", smallvec![])],
            })
        }
    }

    #[test]
    fn test_parse_raw_tags() {
        let tags = RawTags {
            tags: vec![
                tag("Make", "\"Acme\"", smallvec![]),
                tag("Model", "X100", smallvec![]),
                tag("DateTimeOriginal", "2021:03:04 10:11:12", smallvec![]),
                tag("PixelXDimension", "4000", smallvec![4000.0]),
                tag("PixelYDimension", "3000", smallvec![3000.0]),
                tag("Orientation", "row 0 at top", smallvec![1.0]),
                tag("ExposureTime", "1/250", smallvec![0.004]),
                tag("FNumber", "f/2.8", smallvec![2.8]),
                tag("PhotographicSensitivity", "200", smallvec![200.0]),
                tag("GPSLatitude", "", smallvec![52.0, 30.0, 0.0]),
                tag("GPSLatitudeRef", "N", smallvec![]),
                tag("GPSLongitude", "", smallvec![13.0, 15.0, 0.0]),
                tag("GPSLongitudeRef", "W", smallvec![]),
            ],
        };

        let parsed = parse_raw_tags(&tags);
        assert_eq!(parsed.make.as_deref(), Some("Acme"));
        assert_eq!(parsed.model.as_deref(), Some("X100"));
        assert_eq!(
            parsed.date_time_original.map(|d| d.to_string()).as_deref(),
            Some("2021-03-04 10:11:12")
        );
        assert_eq!((parsed.width, parsed.height), (Some(4000), Some(3000)));
        assert_eq!(parsed.orientation, Some(1));
        assert_eq!(parsed.iso, Some(200));
        assert_eq!(parsed.latitude, Some(52.5));
        assert_eq!(parsed.longitude, Some(-13.25));
        assert!(parsed.has_location());
        assert_eq!(parsed.focal_length, None);
    }

    #[test]
    fn test_thumbnail_ifd_is_ignored() {
        let mut thumb_width = tag("ImageWidth", "160", smallvec![160.0]);
        thumb_width.ifd = 1;
        let tags = RawTags {
            tags: vec![thumb_width],
        };

        assert_eq!(parse_raw_tags(&tags).width, None);
    }

    #[test]
    fn test_extractor_rejects_non_image_bytes() {
        let err = KamadakExifExtractor
            .extract_raw_tags(b"definitely not a jpeg")
            .unwrap_err();
        assert!(matches!(err, CoreError::MetadataExtraction(_)));
    }

    #[tokio::test]
    async fn test_video_item_is_not_applicable() {
        let fetcher = CountingFetcher::default();
        let data =
            exif_for_item_data(&ItemData::video("video://1"), &fetcher, &FixedExtractor).await;

        assert_eq!(data, ExifData::unavailable());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_downgraded() {
        let fetcher = CountingFetcher {
            fail: true,
            ..CountingFetcher::default()
        };
        let item = ItemData::image("orig://1", Dimensions::new(1, 1));
        let data = exif_for_item_data(&item, &fetcher, &FixedExtractor).await;

        assert!(!data.is_available());
        assert_eq!(data.parsed, None);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_extraction_failure_is_downgraded() {
        let item = ItemData::image("orig://1", Dimensions::new(1, 1));
        let data =
            exif_for_item_data(&item, &CountingFetcher::default(), &KamadakExifExtractor).await;
        assert_eq!(data, ExifData::unavailable());
    }

    #[tokio::test]
    async fn test_available_exif() {
        let item = ItemData::image("orig://1", Dimensions::new(1, 1));
        let data =
            exif_for_item_data(&item, &CountingFetcher::default(), &FixedExtractor).await;

        assert!(data.is_available());
        assert_eq!(
            data.parsed.and_then(|p| p.make).as_deref(),
            Some("Acme")
        );
    }
}
