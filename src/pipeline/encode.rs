//! Slide image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! Completion APIs accept images as base64 data-URIs embedded in the JSON
//! request body. PNG is used because it is lossless: pitch-deck slides are
//! mostly rendered text and charts, and compression artefacts on rendered
//! text measurably degrade what a vision model can read. `detail: "high"`
//! asks tiling models to spend their full tile budget on the slide so small
//! print (footnote metrics, axis labels) is not lost.

use crate::llm::ImageData;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered slide as a base64 PNG ready for the request body.
pub fn encode_slide(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded slide image: {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
