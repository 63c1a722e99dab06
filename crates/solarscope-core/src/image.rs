use crate::error::ImageError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// Identify the format from the file's magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
        const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

        if bytes.starts_with(PNG_MAGIC) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(JPEG_MAGIC) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageFormat::Png => write!(f, "png"),
            ImageFormat::Jpeg => write!(f, "jpeg"),
        }
    }
}

/// An uploaded rooftop photo or satellite tile, held in memory for one request.
#[derive(Clone, PartialEq, Eq)]
pub struct RooftopImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl RooftopImage {
    pub fn new(bytes: Vec<u8>, format: ImageFormat) -> Self {
        Self { bytes, format }
    }

    /// Read a png/jpg/jpeg file. Content wins over the extension when they disagree.
    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let display = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
            path: display.clone(),
            source,
        })?;

        if bytes.is_empty() {
            return Err(ImageError::Empty(display));
        }

        let format = ImageFormat::sniff(&bytes)
            .or_else(|| ImageFormat::from_extension(path))
            .ok_or(ImageError::UnsupportedFormat(display))?;

        Ok(Self { bytes, format })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Self-contained `data:` URL suitable for an `image_url` content part.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            BASE64.encode(&self.bytes)
        )
    }
}

impl fmt::Debug for RooftopImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RooftopImage")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}
