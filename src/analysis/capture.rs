use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, ImageReader};

use crate::error::{MeasureError, Result};

/// An encoded photo ready to hand to the analysis service.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    bytes: Arc<[u8]>,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl CapturedImage {
    /// Sniff the encoding and read the header. Bytes that are not a JPEG,
    /// PNG or WebP image are refused.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let bytes: Arc<[u8]> = bytes.into();
        let format = image::guess_format(&bytes)
            .map_err(|err| MeasureError::UnsupportedImage(err.to_string()))?;
        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP) {
            return Err(MeasureError::UnsupportedImage(format!(
                "{format:?} is not accepted for analysis"
            )));
        }
        let (width, height) = ImageReader::with_format(Cursor::new(&bytes[..]), format)
            .into_dimensions()
            .map_err(|err| MeasureError::UnsupportedImage(err.to_string()))?;

        Ok(Self {
            bytes,
            format,
            width,
            height,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::new(width, height);
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_is_recognised() {
        let image = CapturedImage::from_bytes(png_bytes(8, 6)).unwrap();
        assert_eq!(image.format(), ImageFormat::Png);
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.dimensions(), (8, 6));
        assert!(!image.bytes().is_empty());
    }

    #[test]
    fn garbage_is_unsupported() {
        let err = CapturedImage::from_bytes(b"definitely not an image".to_vec()).unwrap_err();
        assert!(matches!(err, MeasureError::UnsupportedImage(_)));
    }

    #[test]
    fn truncated_header_is_unsupported() {
        let mut bytes = png_bytes(8, 6);
        bytes.truncate(12);
        assert!(matches!(
            CapturedImage::from_bytes(bytes),
            Err(MeasureError::UnsupportedImage(_))
        ));
    }
}
