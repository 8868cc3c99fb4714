use std::path::Path;

use anyhow::{Context, Result};
use eframe::egui::{self, ColorImage, TextureHandle};

/// Extensions offered by the upload dialog.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Decode an image file into egui's RGBA representation.
pub fn decode_image(path: &Path) -> Result<ColorImage> {
    let rgba = image::open(path)
        .with_context(|| format!("decoding image {}", path.display()))?
        .to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

/// Ask for an image file and upload it as a texture.
pub fn pick_image(ctx: &egui::Context) -> Option<Result<TextureHandle>> {
    let path = rfd::FileDialog::new()
        .set_title("Upload image")
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()?;

    Some(decode_image(&path).map(|img| {
        log::info!("Uploaded image {} ({}x{})", path.display(), img.size[0], img.size[1]);
        ctx.load_texture("uploaded_image", img, egui::TextureOptions::default())
    }))
}
