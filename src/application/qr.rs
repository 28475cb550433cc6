//! QR code rendering for menu links.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use qrcode::render::svg;
use thiserror::Error;
use url::Url;

use crate::domain::types::{QrFormat, QrSize};

#[derive(Debug, Error)]
pub enum QrError {
    #[error("failed to encode qr data: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("failed to write png: {0}")]
    Png(#[from] image::ImageError),
    #[error("invalid menu url: {0}")]
    Url(#[from] url::ParseError),
    #[error("qr render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct QrImage {
    pub bytes: Vec<u8>,
    pub format: QrFormat,
}

impl QrImage {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// `menu-{slug}-qr.{ext}`
    pub fn file_name(&self, slug: &str) -> String {
        format!("menu-{slug}-qr.{}", self.format.extension())
    }
}

#[derive(Debug, Clone)]
pub struct QrService {
    public_base_url: Url,
}

impl QrService {
    pub fn new(public_base_url: Url) -> Self {
        Self { public_base_url }
    }

    /// Public address a menu's QR code points at.
    pub fn menu_url(&self, slug: &str) -> Result<Url, QrError> {
        let mut base = self.public_base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(&format!("m/{slug}"))?)
    }

    pub async fn render(
        &self,
        slug: &str,
        format: QrFormat,
        size: QrSize,
    ) -> Result<QrImage, QrError> {
        let url = self.menu_url(slug)?;
        tokio::task::spawn_blocking(move || render_qr(url.as_str(), format, size)).await?
    }
}

pub fn render_qr(data: &str, format: QrFormat, size: QrSize) -> Result<QrImage, QrError> {
    let code = QrCode::new(data.as_bytes())?;
    let pixels = size.pixels();

    let bytes = match format {
        QrFormat::Svg => code
            .render::<svg::Color<'_>>()
            .min_dimensions(pixels, pixels)
            .quiet_zone(true)
            .build()
            .into_bytes(),
        QrFormat::Png => {
            let image = code
                .render::<Luma<u8>>()
                .min_dimensions(pixels, pixels)
                .quiet_zone(true)
                .build();
            let mut buffer = Cursor::new(Vec::new());
            DynamicImage::ImageLuma8(image).write_to(&mut buffer, ImageFormat::Png)?;
            buffer.into_inner()
        }
    };

    Ok(QrImage { bytes, format })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_url_joins_slug_under_m() {
        let service = QrService::new(Url::parse("https://menus.example.com").expect("url"));
        assert_eq!(
            service.menu_url("harbor-cafe").expect("url").as_str(),
            "https://menus.example.com/m/harbor-cafe"
        );

        let nested = QrService::new(Url::parse("https://example.com/app").expect("url"));
        assert_eq!(
            nested.menu_url("harbor-cafe").expect("url").as_str(),
            "https://example.com/app/m/harbor-cafe"
        );
    }

    #[test]
    fn png_output_has_png_signature() {
        let image = render_qr("https://menus.example.com/m/a", QrFormat::Png, QrSize::Small)
            .expect("png");
        assert_eq!(&image.bytes[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(image.content_type(), "image/png");
        assert_eq!(image.file_name("a-b"), "menu-a-b-qr.png");
    }

    #[test]
    fn svg_output_is_markup() {
        let image = render_qr("https://menus.example.com/m/a", QrFormat::Svg, QrSize::Medium)
            .expect("svg");
        let text = String::from_utf8(image.bytes).expect("utf8");
        assert!(text.contains("<svg"));
    }

    #[test]
    fn larger_sizes_produce_larger_png() {
        let decode = |size| {
            let image = render_qr("https://menus.example.com/m/a", QrFormat::Png, size)
                .expect("png");
            image::load_from_memory(&image.bytes).expect("decode").width()
        };
        let small = decode(QrSize::Small);
        let large = decode(QrSize::Large);
        assert!(small >= 200);
        assert!(large >= 800);
        assert!(large > small);
    }
}
