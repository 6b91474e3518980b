use image::{DynamicImage, GenericImageView};
use reqwest::StatusCode;
use thiserror::Error;

pub mod decode;
pub mod fetcher;
pub mod transport;

pub use fetcher::{FetchHandle, ImageFetcher};
pub use transport::{ImageTransport, ReqwestTransport, TransportResponse};

#[derive(Error, Debug)]
pub enum ImageFetchError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Image request failed with status: {0}")]
    StatusError(StatusCode),

    #[error("Client error: {0}")]
    ClientError(String),

    #[error("Image response contained no data")]
    NoData,

    #[error("Data could not be decoded into an image: {0}")]
    DecodeError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl ImageFetchError {
    /// True for failures reported by the HTTP layer rather than by the
    /// response body.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::StatusError(_))
    }
}

/// A decoded image together with the display scale it was decoded for.
#[derive(Debug, Clone)]
pub struct RemoteImage {
    pixels: DynamicImage,
    scale: f32,
    content_type: String,
}

impl RemoteImage {
    pub fn new(pixels: DynamicImage, scale: f32, content_type: impl Into<String>) -> Self {
        Self {
            pixels,
            scale: sanitize_scale(scale),
            content_type: content_type.into(),
        }
    }

    /// Wraps an already decoded image, e.g. a placeholder built in memory.
    pub fn from_dynamic(pixels: DynamicImage, scale: f32) -> Self {
        Self::new(pixels, scale, "application/octet-stream")
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Size in display points, i.e. pixel size divided by scale.
    pub fn point_size(&self) -> (f32, f32) {
        let (width, height) = self.pixels.dimensions();
        (width as f32 / self.scale, height as f32 / self.scale)
    }
}

// Non-finite or non-positive scales would make point sizes meaningless
pub(crate) fn sanitize_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_size_divides_by_scale() {
        let image = RemoteImage::from_dynamic(DynamicImage::new_rgba8(200, 100), 2.0);
        assert_eq!(image.point_size(), (100.0, 50.0));
        assert_eq!((image.width(), image.height()), (200, 100));
    }

    #[test]
    fn invalid_scale_falls_back_to_one() {
        for scale in [0.0, -2.0, f32::NAN, f32::INFINITY] {
            let image = RemoteImage::from_dynamic(DynamicImage::new_rgba8(1, 1), scale);
            assert_eq!(image.scale(), 1.0);
        }
    }

    #[test]
    fn transport_classification() {
        assert!(ImageFetchError::StatusError(StatusCode::NOT_FOUND).is_transport());
        assert!(!ImageFetchError::NoData.is_transport());
        assert!(!ImageFetchError::DecodeError("bad".into()).is_transport());
        assert!(!ImageFetchError::ClientError("bad".into()).is_transport());
        assert!(!ImageFetchError::RuntimeError("bad".into()).is_transport());
    }
}
