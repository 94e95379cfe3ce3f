//! Image payload model.
//!
//! Images are carried as raw bytes plus a format sniffed from the file
//! signature; the embedding and generation adapters both need the media type.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

/// Image encodings accepted by the embedding and generation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Sniff the format from the leading bytes of an encoded image.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
        if bytes.starts_with(PNG) {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub const fn media_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    /// File extensions treated as images when scanning directories.
    pub const EXTENSIONS: [&'static str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

/// An encoded image with a known format
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl ImageData {
    /// Wrap encoded image bytes, rejecting empty or unrecognised payloads.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, String> {
        if bytes.is_empty() {
            return Err("image file is empty".to_string());
        }
        let format = ImageFormat::detect(&bytes)
            .ok_or_else(|| "unsupported or corrupt image (unknown signature)".to_string())?;
        Ok(Self { bytes, format })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Standard base64 encoding of the raw bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:` URL form used by multimodal embedding APIs.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.media_type(), self.to_base64())
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_formats() {
        assert_eq!(
            ImageFormat::detect(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::detect(b"GIF89a\x01\0"), Some(ImageFormat::Gif));
        assert_eq!(
            ImageFormat::detect(b"RIFF\x24\0\0\0WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
    }

    #[test]
    fn test_rejects_unknown_and_empty() {
        assert!(ImageData::from_bytes(Vec::new()).is_err());
        assert!(ImageData::from_bytes(b"%PDF-1.7".to_vec()).is_err());
        assert!(ImageData::from_bytes(b"RIFF\0\0\0\0WAVE".to_vec()).is_err());
    }

    #[test]
    fn test_data_url() {
        let image = ImageData::from_bytes(b"GIF89a".to_vec()).unwrap();
        assert_eq!(image.to_data_url(), "data:image/gif;base64,R0lGODlh");
    }

    #[test]
    fn test_debug_hides_bytes() {
        let image = ImageData::from_bytes(b"GIF89a".to_vec()).unwrap();
        let debug = format!("{image:?}");
        assert!(debug.contains("len: 6"));
        assert!(!debug.contains("71"));
    }
}
