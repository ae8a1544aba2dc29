use eframe::egui::ColorImage;

use crate::model::VideoInfo;

/// Downloads and decodes the thumbnail for a fetched video.
///
/// Prefers the thumbnail URL from the metadata and falls back to the
/// predictable YouTube thumbnail location when only a video id is known.
/// Any network or decode problem just means no thumbnail.
pub fn fetch_thumbnail(info: &VideoInfo) -> Option<ColorImage> {
    let url = info.thumbnail_url.clone().or_else(|| {
        info.id
            .as_ref()
            .map(|id| format!("https://img.youtube.com/vi/{id}/hqdefault.jpg"))
    })?;
    let resp = reqwest::blocking::get(&url).ok()?.bytes().ok()?;
    let img = image::load_from_memory(&resp).ok()?.to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, &img))
}
