//! Image encoding: page image file → base64 `ImageData` for the vision API.
//!
//! The MIME type is identified from the file's magic bytes rather than its
//! extension, so a truncated or mislabeled file is caught here instead of
//! being rejected by the provider halfway through a large request.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::ImageFormat;
use std::path::Path;
use tracing::debug;

/// Why a page image could not be prepared.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot identify image type of {path}")]
    UnknownFormat { path: String },
    #[error("unsupported image type {format:?} for {path}")]
    Unsupported { path: String, format: ImageFormat },
}

/// Read a page image and wrap it as base64 `ImageData`.
///
/// `detail: "high"` matters for drawings: title-block text is small relative
/// to the sheet, and low-detail mode downsamples it away.
pub async fn encode_page_file(path: &Path) -> Result<ImageData, EncodeError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| EncodeError::Read {
        path: path.display().to_string(),
        source: e,
    })?;

    let mime = sniff_mime(&bytes).map_err(|format| match format {
        Some(format) => EncodeError::Unsupported {
            path: path.display().to_string(),
            format,
        },
        None => EncodeError::UnknownFormat {
            path: path.display().to_string(),
        },
    })?;

    let b64 = STANDARD.encode(&bytes);
    debug!("Encoded {} ({}) → {} bytes base64", path.display(), mime, b64.len());

    Ok(ImageData::new(b64, mime).with_detail("high"))
}

/// MIME type for bytes in a format the vision APIs accept.
///
/// `Err(Some(format))` for a recognised but unsupported format,
/// `Err(None)` when the bytes are not a recognised image.
fn sniff_mime(bytes: &[u8]) -> Result<&'static str, Option<ImageFormat>> {
    match image::guess_format(bytes) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)) => {
            Ok(format.to_mime_type())
        }
        Ok(other) => Err(Some(other)),
        Err(_) => Err(None),
    }
}
