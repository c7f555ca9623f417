//! Image attachments carried by user messages.
//!
//! Attachments are references: either a URL, inline base64 data, or a key
//! into an external media store. The tree never decodes them.
//!
//! # Example
//!
//! ```
//! use tangent::types::image::{ImageAttachment, MediaType};
//!
//! let image = ImageAttachment::from_url("https://example.com/chart.png").unwrap();
//! assert_eq!(image.media_type, MediaType::Png);
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Maximum size of inline image data (20MB).
pub const MAX_INLINE_IMAGE_SIZE: usize = 20 * 1024 * 1024;

/// An image referenced by a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageAttachment {
    /// Where the image lives.
    pub source: ImageSource,

    /// The media type of the image.
    pub media_type: MediaType,

    /// Display name, usually the original file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ImageAttachment {
    /// Creates an attachment from raw bytes, detecting the format from magic bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is too large or the format is not recognized.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() > MAX_INLINE_IMAGE_SIZE {
            return Err(ImageError::TooLarge);
        }
        let media_type = detect_media_type(bytes).ok_or(ImageError::UnknownFormat)?;

        Ok(Self {
            source: ImageSource::Base64 {
                data: STANDARD.encode(bytes),
            },
            media_type,
            name: None,
        })
    }

    /// Creates an attachment that points at a URL.
    ///
    /// The media type is inferred from the URL's extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not a supported image type.
    pub fn from_url(url: &str) -> Result<Self, ImageError> {
        let media_type = infer_media_type_from_url(url)
            .ok_or_else(|| ImageError::InvalidUrl(url.to_string()))?;

        Ok(Self {
            source: ImageSource::Url {
                url: url.to_string(),
            },
            media_type,
            name: None,
        })
    }

    /// Creates an attachment stored under a key in an external media store.
    #[must_use]
    pub fn stored(key: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            source: ImageSource::Stored { key: key.into() },
            media_type,
            name: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The location of an image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// Inline base64 data.
    Base64 {
        /// The base64-encoded bytes.
        data: String,
    },

    /// A URL pointing to the image.
    Url {
        /// The URL of the image.
        url: String,
    },

    /// A key in an external media store.
    Stored {
        /// Storage key.
        key: String,
    },
}

/// Supported image media types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    /// `image/png`
    #[serde(rename = "image/png")]
    Png,
    /// `image/jpeg`
    #[serde(rename = "image/jpeg")]
    Jpeg,
    /// `image/gif`
    #[serde(rename = "image/gif")]
    Gif,
    /// `image/webp`
    #[serde(rename = "image/webp")]
    Webp,
}

impl MediaType {
    /// Returns the MIME type string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    /// Maps a file extension (case-insensitive) to a media type.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }
}

/// Errors that can occur when creating attachments.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    /// The inline data exceeds the maximum size.
    #[error("image size exceeds maximum of {MAX_INLINE_IMAGE_SIZE} bytes")]
    TooLarge,

    /// The URL does not name a supported image.
    #[error("unsupported image URL: {0}")]
    InvalidUrl(String),

    /// The bytes are not a recognized image format.
    #[error("could not detect image format from magic bytes")]
    UnknownFormat,
}

fn detect_media_type(bytes: &[u8]) -> Option<MediaType> {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Some(MediaType::Png);
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(MediaType::Jpeg);
    }
    if bytes.starts_with(b"GIF8") {
        return Some(MediaType::Gif);
    }
    // RIFF....WEBP
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some(MediaType::Webp);
    }
    None
}

fn infer_media_type_from_url(url: &str) -> Option<MediaType> {
    let path = url.split(['?', '#']).next()?;
    let (_, ext) = path.rsplit_once('.')?;
    MediaType::from_extension(ext)
}
