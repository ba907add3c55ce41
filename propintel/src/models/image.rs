//! Generated image model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a generated image, independent of entry identifiers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    /// Generate a fresh identifier (UUIDv7, time-ordered).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An image produced by the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// Unique identifier for the image.
    pub id: ImageId,
    /// Base64-encoded image bytes.
    pub image_data: String,
    /// Prompt the image was generated from.
    pub prompt: String,
    /// Style label.
    pub style: String,
    /// Generation seed, when the service reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// When the image was stored.
    pub timestamp: DateTime<Utc>,
    /// Generated by an automatic chain rather than an explicit request.
    #[serde(default)]
    pub is_auto_generated: bool,
}

impl GeneratedImage {
    /// Create a new image record stamped with the current time.
    pub fn new(
        image_data: String,
        prompt: String,
        style: String,
        seed: Option<u64>,
        is_auto_generated: bool,
    ) -> Self {
        Self {
            id: ImageId::generate(),
            image_data,
            prompt,
            style,
            seed,
            timestamp: Utc::now(),
            is_auto_generated,
        }
    }

    /// Base64 payload with any `data:` URL prefix removed.
    pub fn payload(&self) -> &str {
        strip_data_url(&self.image_data)
    }

    /// MIME type guessed from the payload's leading bytes.
    pub fn mime_type(&self) -> &'static str {
        let payload = self.payload();
        if payload.starts_with("/9j/") {
            "image/jpeg"
        } else if payload.starts_with("R0lGOD") {
            "image/gif"
        } else if payload.starts_with("UklGR") {
            "image/webp"
        } else {
            "image/png"
        }
    }

    /// Decoded payload size in bytes, estimated from the base64 length.
    pub fn estimated_bytes(&self) -> usize {
        self.payload().len() / 4 * 3
    }
}

/// Remove a `data:<mime>;base64,` prefix if present.
pub fn strip_data_url(data: &str) -> &str {
    if data.starts_with("data:") {
        if let Some(idx) = data.find(',') {
            return &data[idx + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_data_url_prefix() {
        assert_eq!(strip_data_url("data:image/png;base64,iVBOR"), "iVBOR");
        assert_eq!(strip_data_url("iVBOR"), "iVBOR");
    }

    #[test]
    fn guesses_mime_type() {
        let jpeg = GeneratedImage::new("/9j/4AAQ".into(), "p".into(), "s".into(), None, false);
        assert_eq!(jpeg.mime_type(), "image/jpeg");
        let png = GeneratedImage::new(
            "data:image/png;base64,iVBORw0".into(),
            "p".into(),
            "s".into(),
            Some(7),
            true,
        );
        assert_eq!(png.mime_type(), "image/png");
        assert_eq!(png.payload(), "iVBORw0");
    }

    #[test]
    fn estimated_size_ignores_data_url_prefix() {
        let bare = GeneratedImage::new("AAAAAAAA".into(), "p".into(), "s".into(), None, false);
        let wrapped = GeneratedImage::new(
            "data:image/png;base64,AAAAAAAA".into(),
            "p".into(),
            "s".into(),
            None,
            false,
        );
        assert_eq!(bare.estimated_bytes(), 6);
        assert_eq!(wrapped.estimated_bytes(), 6);
    }

    #[test]
    fn serializes_camel_case() {
        let img = GeneratedImage::new("AAAA".into(), "harbour".into(), "photo".into(), None, true);
        let json = serde_json::to_value(&img).unwrap();
        assert_eq!(json["imageData"], "AAAA");
        assert_eq!(json["isAutoGenerated"], true);
        assert!(json.get("seed").is_none());
    }
}
