use crate::archive::{ext_of, InspectedArchive};
use crate::error::{CoreError, CoreResult};
use crate::logging::LogContext;
use crate::outcome::{partition, EntryOutcome, Skip};
use crate::report::{Category, Check, Status};

/// Raster formats subject to the dimension limit. SVG is exempt.
pub const RASTER_EXTS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".webp"];
const MAX_LISTED: usize = 6;

/// Image decoding capability.
pub trait ImageDecoder: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool {
        true
    }

    /// Width and height in pixels.
    fn dimensions(&self, bytes: &[u8]) -> CoreResult<(u32, u32)>;
}

/// Stands in when no decoder is compiled in; the image check reports gray.
pub struct NullImageDecoder;

impl ImageDecoder for NullImageDecoder {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn dimensions(&self, _bytes: &[u8]) -> CoreResult<(u32, u32)> {
        Err(CoreError::CapabilityUnavailable(
            "image decoding not available".to_string(),
        ))
    }
}

#[cfg(feature = "images")]
pub struct RasterDecoder;

#[cfg(feature = "images")]
impl ImageDecoder for RasterDecoder {
    fn name(&self) -> &str {
        "image"
    }

    fn dimensions(&self, bytes: &[u8]) -> CoreResult<(u32, u32)> {
        image::ImageReader::new(std::io::Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CoreError::DecodeFailure(e.to_string()))?
            .into_dimensions()
            .map_err(|e| CoreError::DecodeFailure(e.to_string()))
    }
}

/// The best decoder this build offers.
pub fn default_decoder() -> Box<dyn ImageDecoder> {
    #[cfg(feature = "images")]
    {
        Box::new(RasterDecoder)
    }
    #[cfg(not(feature = "images"))]
    {
        Box::new(NullImageDecoder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasuredImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct ImageAudit {
    pub check: Check,
    pub measured: Vec<MeasuredImage>,
    pub skipped: Vec<Skip>,
}

pub struct ImageAuditor<'a> {
    decoder: &'a dyn ImageDecoder,
    max_side: u32,
}

impl<'a> ImageAuditor<'a> {
    pub fn new(decoder: &'a dyn ImageDecoder, max_side: u32) -> Self {
        Self { decoder, max_side }
    }

    pub fn audit(&self, archive: &InspectedArchive, ctx: &LogContext) -> ImageAudit {
        let id = "image_dimensions";
        let label = "Image Dimensions";
        if !self.decoder.is_available() {
            log::info!("{} CAPABILITY_UNAVAILABLE capability=images", ctx);
            return ImageAudit {
                check: Check::new(id, Category::Archive, label, Status::Gray, "—")
                    .with_help("Image decoding unavailable"),
                measured: Vec::new(),
                skipped: Vec::new(),
            };
        }

        let outcomes = archive
            .file_names()
            .filter(|n| is_raster(n))
            .map(|n| self.measure(archive, n));
        let (measured, skipped) = partition(outcomes);
        for s in &skipped {
            log::warn!("{} IMAGE_SKIPPED name={:?} reason={:?}", ctx, s.name, s.reason);
        }

        let oversized: Vec<String> = measured
            .iter()
            .filter(|m| m.width.max(m.height) > self.max_side)
            .map(|m| format!("{} ({}x{})", m.name, m.width, m.height))
            .collect();

        let check = if oversized.is_empty() {
            let help = match (measured.len(), skipped.len()) {
                (0, 0) => "No raster images".to_string(),
                (n, 0) => format!("{} checked", n),
                (n, k) => format!("{} checked, {} undecodable", n, k),
            };
            Check::new(id, Category::Archive, label, Status::Green, "OK").with_help(help)
        } else {
            let listed: Vec<&str> = oversized.iter().take(MAX_LISTED).map(|s| s.as_str()).collect();
            Check::new(id, Category::Archive, label, Status::Yellow, "Oversized")
                .with_help(listed.join("; "))
        };

        ImageAudit {
            check,
            measured,
            skipped,
        }
    }

    fn measure(&self, archive: &InspectedArchive, name: &str) -> EntryOutcome<MeasuredImage> {
        let Some(path) = archive.local_path(name) else {
            return EntryOutcome::skipped(name, "not extracted");
        };
        let r = std::fs::read(path)
            .map_err(CoreError::from)
            .and_then(|bytes| self.decoder.dimensions(&bytes))
            .map(|(width, height)| MeasuredImage {
                name: name.to_string(),
                width,
                height,
            });
        EntryOutcome::from_result(name, r)
    }
}

fn is_raster(name: &str) -> bool {
    ext_of(name)
        .map(|e| RASTER_EXTS.contains(&e.as_str()))
        .unwrap_or(false)
}
