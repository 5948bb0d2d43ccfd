// src/enrich/qr.rs

//! QR image rendering.

use std::path::Path;

use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode, Version};

use crate::error::Result;

/// Render `data` as a PNG QR image at `path`.
///
/// The version is forced so every image in a batch comes out the same
/// size, and low error correction keeps the symbol sparse. No quiet
/// zone: the sleeves these end up on carry their own margin.
///
/// The image lands via a sibling temp file and a rename, so a crash
/// mid-write never leaves a truncated file at the final path for later
/// runs to adopt.
pub fn render_to_file(data: &str, path: &Path, version: i16, module_px: u32) -> Result<()> {
    let code = QrCode::with_version(data.as_bytes(), Version::Normal(version), EcLevel::L)?;
    let image = code
        .render::<Luma<u8>>()
        .module_dimensions(module_px, module_px)
        .quiet_zone(false)
        .build();
    let tmp = path.with_extension("tmp");
    image.save_with_format(&tmp, ImageFormat::Png)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
