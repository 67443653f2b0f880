//! # Signature Image Loading
//!
//! Resolves signature and logo references into images both renderers can
//! place. References may be `http(s)` URLs, data URIs, file paths, or raw
//! base64. JPEG images keep their original bytes (the PDF embeds them with
//! DCTDecode); PNG and WebP images are decoded to RGB pixels with a separate
//! alpha channel for SMask transparency.
//!
//! A failed reference never fails a render. [`SignatureLoader::load_set`]
//! logs the failure and leaves an empty slot, which both renderers draw as a
//! blank cell.

use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::FetchOptions;

/// A fully decoded/loaded image ready for embedding.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub pixel_data: ImagePixelData,
    pub width_px: u32,
    pub height_px: u32,
    /// The bytes as fetched, for the preview's inline data URI.
    pub encoded: Vec<u8>,
    pub mime: &'static str,
}

impl LoadedImage {
    /// `data:<mime>;base64,...` of the original bytes.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.encoded)
        )
    }
}

/// The pixel data in a format the PDF serializer can consume directly.
#[derive(Debug, Clone)]
pub enum ImagePixelData {
    /// Raw JPEG bytes, embedded directly with DCTDecode.
    Jpeg {
        data: Vec<u8>,
        color_space: JpegColorSpace,
    },
    /// Decoded RGB pixels + optional alpha channel.
    Decoded {
        /// width * height * 3 bytes (RGB)
        rgb: Vec<u8>,
        /// width * height bytes (grayscale alpha). None if fully opaque.
        alpha: Option<Vec<u8>>,
    },
}

/// JPEG color space for the PDF /ColorSpace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColorSpace {
    DeviceRGB,
    DeviceGray,
}

/// Why one image reference could not be resolved.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("invalid data URI: missing comma")]
    InvalidDataUri,
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },
    #[error("failed to read image file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("file path images are disabled: '{0}'")]
    FileAccessDisabled(String),
    #[error("image data too short")]
    TooShort,
    #[error("unsupported image format (expected JPEG, PNG or WebP)")]
    Unsupported,
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Loads image references with the configured timeout, file policy and
/// concurrency.
#[derive(Clone)]
pub struct SignatureLoader {
    fetch: FetchOptions,
    agent: ureq::Agent,
}

impl SignatureLoader {
    pub fn new(fetch: FetchOptions) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(fetch.timeout_secs)))
            .build();
        let agent: ureq::Agent = config.into();
        Self { fetch, agent }
    }

    /// Load a single reference.
    pub fn load(&self, src: &str) -> Result<LoadedImage, ImageError> {
        let raw_bytes = self.read_source_bytes(src.trim())?;
        decode_image_bytes(raw_bytes)
    }

    /// Load every distinct reference once. Failures are logged and leave an
    /// empty slot. All loads finish before this returns, so composition never
    /// sees a partially loaded set.
    pub fn load_set<'a, I>(&self, refs: I) -> ImageSet
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut distinct: Vec<&str> = Vec::new();
        for r in refs {
            if !index.contains_key(r) {
                index.insert(r.to_string(), distinct.len());
                distinct.push(r);
            }
        }

        let results = if self.fetch.fan_out <= 1 || distinct.len() <= 1 {
            distinct.iter().map(|r| self.load(r)).collect()
        } else {
            self.load_concurrently(&distinct)
        };

        let images: Vec<Option<LoadedImage>> = distinct
            .iter()
            .zip(results)
            .map(|(src, result)| match result {
                Ok(img) => Some(img),
                Err(e) => {
                    warn!(reference = %abbreviate(src), error = %e, "signature image unavailable, leaving blank");
                    None
                }
            })
            .collect();

        debug!(
            distinct = images.len(),
            loaded = images.iter().filter(|i| i.is_some()).count(),
            "loaded image set"
        );
        ImageSet { index, images }
    }

    fn load_concurrently(&self, refs: &[&str]) -> Vec<Result<LoadedImage, ImageError>> {
        let threads = self.fetch.fan_out.min(refs.len());
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| {
                use rayon::prelude::*;
                refs.par_iter().map(|r| self.load(r)).collect()
            }),
            Err(e) => {
                warn!(error = %e, "image thread pool unavailable, loading sequentially");
                refs.iter().map(|r| self.load(r)).collect()
            }
        }
    }

    /// Resolve the source string to raw image bytes.
    fn read_source_bytes(&self, src: &str) -> Result<Vec<u8>, ImageError> {
        // Data URI: data:image/png;base64,iVBOR...
        if src.starts_with("data:") {
            let comma_pos = src.find(',').ok_or(ImageError::InvalidDataUri)?;
            return base64_decode(&src[comma_pos + 1..]);
        }

        if src.starts_with("http://") || src.starts_with("https://") {
            return self.fetch_url(src);
        }

        // Only explicit path prefixes, since raw base64 may contain '/'.
        let path = src.strip_prefix("file://").unwrap_or(src);
        if path.starts_with('/') || path.starts_with("./") || path.starts_with("../") {
            if !self.fetch.allow_file_paths {
                return Err(ImageError::FileAccessDisabled(path.to_string()));
            }
            return std::fs::read(path).map_err(|source| ImageError::Read {
                path: path.to_string(),
                source,
            });
        }

        base64_decode(src)
    }

    fn fetch_url(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let fetch_error = |reason: String| ImageError::Fetch {
            url: url.to_string(),
            reason,
        };
        let mut response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| fetch_error(e.to_string()))?;
        response
            .body_mut()
            .read_to_vec()
            .map_err(|e| fetch_error(e.to_string()))
    }
}

impl std::fmt::Debug for SignatureLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureLoader")
            .field("fetch", &self.fetch)
            .finish_non_exhaustive()
    }
}

impl Default for SignatureLoader {
    fn default() -> Self {
        Self::new(FetchOptions::default())
    }
}

/// Loaded images addressed by their reference string.
#[derive(Debug, Clone, Default)]
pub struct ImageSet {
    index: HashMap<String, usize>,
    images: Vec<Option<LoadedImage>>,
}

impl ImageSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The image for a reference, if it was requested and loaded.
    pub fn get(&self, src: &str) -> Option<&LoadedImage> {
        self.slot(src).and_then(|i| self.images[i].as_ref())
    }

    /// Slot index of a reference, whether or not it loaded.
    pub fn slot(&self, src: &str) -> Option<usize> {
        self.index.get(src).copied()
    }

    /// Image by slot index.
    pub fn by_slot(&self, slot: usize) -> Option<&LoadedImage> {
        self.images.get(slot).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn abbreviate(src: &str) -> String {
    if src.len() > 64 && src.starts_with("data:") {
        format!("{}...", src.chars().take(40).collect::<String>())
    } else {
        src.to_string()
    }
}

fn base64_decode(input: &str) -> Result<Vec<u8>, ImageError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(input.trim())?)
}

/// Detect image format from magic bytes and decode accordingly.
fn decode_image_bytes(data: Vec<u8>) -> Result<LoadedImage, ImageError> {
    if data.len() < 4 {
        return Err(ImageError::TooShort);
    }

    if is_jpeg(&data) {
        decode_jpeg(data)
    } else if is_png(&data) {
        decode_raster(data, "image/png")
    } else if is_webp(&data) {
        decode_raster(data, "image/webp")
    } else {
        Err(ImageError::Unsupported)
    }
}

fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8
}

fn is_png(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == [0x89, 0x50, 0x4E, 0x47]
}

fn is_webp(data: &[u8]) -> bool {
    data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

/// JPEG: read dimensions and color space without decoding pixels.
fn decode_jpeg(data: Vec<u8>) -> Result<LoadedImage, ImageError> {
    let (width, height) = image::io::Reader::new(Cursor::new(&data))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(image::ImageError::IoError(e)))?
        .into_dimensions()?;

    let color_space = detect_jpeg_color_space(&data);

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Jpeg {
            data: data.clone(),
            color_space,
        },
        width_px: width,
        height_px: height,
        encoded: data,
        mime: "image/jpeg",
    })
}

/// Scan JPEG markers for the SOF segment and read its component count.
fn detect_jpeg_color_space(data: &[u8]) -> JpegColorSpace {
    let mut i = 2; // skip SOI marker (FF D8)
    while i + 1 < data.len() {
        if data[i] != 0xFF {
            break;
        }
        let marker = data[i + 1];
        // SOF markers: C0-C3, C5-C7, C9-CB, CD-CF
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof && i + 9 < data.len() {
            return if data[i + 9] == 1 {
                JpegColorSpace::DeviceGray
            } else {
                JpegColorSpace::DeviceRGB
            };
        }
        if i + 3 < data.len() {
            let seg_len = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
            i += 2 + seg_len;
        } else {
            break;
        }
    }
    JpegColorSpace::DeviceRGB
}

/// PNG/WebP: decode to RGBA, split into RGB + alpha.
fn decode_raster(data: Vec<u8>, mime: &'static str) -> Result<LoadedImage, ImageError> {
    let img = image::io::Reader::new(Cursor::new(&data))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(image::ImageError::IoError(e)))?
        .decode()?;

    let rgba = img.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();

    let pixel_count = (width * height) as usize;
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    let mut has_transparency = false;

    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
        has_transparency |= pixel[3] != 255;
    }

    Ok(LoadedImage {
        pixel_data: ImagePixelData::Decoded {
            rgb,
            alpha: has_transparency.then_some(alpha),
        },
        width_px: width,
        height_px: height,
        encoded: data,
        mime,
    })
}
