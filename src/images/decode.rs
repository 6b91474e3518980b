use crate::images::{ImageFetchError, RemoteImage, TransportResponse};

const OCTET_STREAM: &str = "application/octet-stream";

/// Decodes raw bytes into an image for the given display scale.
pub fn decode_image(
    data: &[u8],
    scale: f32,
    content_type: Option<&str>,
) -> Result<RemoteImage, ImageFetchError> {
    if data.is_empty() {
        return Err(ImageFetchError::NoData);
    }

    let pixels = image::load_from_memory(data)
        .map_err(|e| ImageFetchError::DecodeError(format!("Failed to load image: {}", e)))?;

    // A generic or missing header is replaced by what the bytes say
    let content_type = match content_type {
        Some(ct) if !ct.is_empty() && ct != OCTET_STREAM => ct.to_string(),
        _ => detect_content_type(data).to_string(),
    };

    Ok(RemoteImage::new(pixels, scale, content_type))
}

/// Turns a validated response into an image: a non-2xx status is a transport
/// failure, an absent or empty body is `NoData`, anything else is decoded.
pub fn image_from_response(
    response: TransportResponse,
    scale: f32,
) -> Result<RemoteImage, ImageFetchError> {
    if !response.status.is_success() {
        return Err(ImageFetchError::StatusError(response.status));
    }

    let body = response.body.ok_or(ImageFetchError::NoData)?;
    decode_image(&body, scale, response.content_type.as_deref())
}

// Magic numbers of the formats the decoder understands
pub fn detect_content_type(data: &[u8]) -> &'static str {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if data.starts_with(b"GIF8") {
        "image/gif"
    } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP".as_slice()) {
        "image/webp"
    } else if data.starts_with(b"BM") {
        "image/bmp"
    } else if data.starts_with(&[0x49, 0x49, 0x2A, 0x00])
        || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
    {
        "image/tiff"
    } else if data.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        "image/x-icon"
    } else {
        OCTET_STREAM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};
    use reqwest::StatusCode;
    use std::io::Cursor;

    fn encode(format: ImageFormat) -> Vec<u8> {
        let mut output = Vec::new();
        DynamicImage::new_rgb8(4, 2)
            .write_to(&mut Cursor::new(&mut output), format)
            .unwrap();
        output
    }

    #[test]
    fn decodes_png_with_scale() {
        let image = decode_image(&encode(ImageFormat::Png), 2.0, None).unwrap();
        assert_eq!((image.width(), image.height()), (4, 2));
        assert_eq!(image.scale(), 2.0);
        assert_eq!(image.content_type(), "image/png");
    }

    #[test]
    fn keeps_specific_content_type_header() {
        let image = decode_image(&encode(ImageFormat::Png), 1.0, Some("image/png; q=1")).unwrap();
        assert_eq!(image.content_type(), "image/png; q=1");

        let image = decode_image(&encode(ImageFormat::Jpeg), 1.0, Some(OCTET_STREAM)).unwrap();
        assert_eq!(image.content_type(), "image/jpeg");
    }

    #[test]
    fn garbage_fails_to_decode() {
        let err = decode_image(b"<html>not an image</html>", 1.0, None).unwrap_err();
        assert!(matches!(err, ImageFetchError::DecodeError(_)));
    }

    #[test]
    fn empty_body_is_no_data() {
        assert!(matches!(decode_image(&[], 1.0, None), Err(ImageFetchError::NoData)));
    }

    #[test]
    fn response_validation() {
        let missing = TransportResponse {
            status: StatusCode::OK,
            content_type: None,
            body: None,
        };
        assert!(matches!(image_from_response(missing, 1.0), Err(ImageFetchError::NoData)));

        let not_found = TransportResponse {
            status: StatusCode::NOT_FOUND,
            content_type: None,
            body: Some(encode(ImageFormat::Png)),
        };
        assert!(matches!(
            image_from_response(not_found, 1.0),
            Err(ImageFetchError::StatusError(StatusCode::NOT_FOUND))
        ));
    }

    #[test]
    fn sniffs_signatures() {
        assert_eq!(detect_content_type(&encode(ImageFormat::Png)), "image/png");
        assert_eq!(detect_content_type(&encode(ImageFormat::Gif)), "image/gif");
        assert_eq!(detect_content_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(detect_content_type(b"plain"), OCTET_STREAM);
    }
}
