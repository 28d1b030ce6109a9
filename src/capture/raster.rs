//! Software rasterizer: display list to a `tiny_skia` pixmap to PNG

use std::collections::HashMap;
use std::sync::OnceLock;

use fontdue::{Font, FontSettings};
use tiny_skia::{Color, FilterQuality, IntSize, Paint, Pixmap, PixmapPaint, Rect, Transform};

use super::images::DecodedImage;
use super::layout::{CHAR_WIDTH, LINE_HEIGHT};
use super::paint::PaintCommand;
use super::Screenshot;
use crate::error::CaptureFault;
use crate::theme::Rgb;

/// Glyph size in CSS px; DejaVu Sans Mono advances about 7.8 px at this size
pub const FONT_SIZE: f32 = 13.0;

static FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSansMono.ttf");
static FONT: OnceLock<Font> = OnceLock::new();

fn font() -> Result<&'static Font, CaptureFault> {
    if let Some(font) = FONT.get() {
        return Ok(font);
    }
    let parsed = Font::from_bytes(FONT_DATA, FontSettings::default())
        .map_err(|e| CaptureFault::Render(format!("bundled font: {}", e)))?;
    Ok(FONT.get_or_init(|| parsed))
}

/// Device pixel size of a CSS length
pub fn device_px(css: u32, scale: f32) -> u32 {
    (css as f64 * scale as f64).ceil() as u32
}

/// Straight RGBA8 to the premultiplied layout `Pixmap::from_vec` expects
fn premultiply(rgba: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgba.len());
    for px in rgba.chunks_exact(4) {
        let a = px[3] as u32;
        let mul = |c: u8| ((c as u32 * a + 127) / 255) as u8;
        out.extend_from_slice(&[mul(px[0]), mul(px[1]), mul(px[2]), px[3]]);
    }
    out
}

/// Pixmap addressed in CSS px through a device scale
#[derive(Debug)]
pub struct Canvas {
    pixmap: Pixmap,
    scale: f32,
}

impl Canvas {
    /// Allocate a canvas of `css_width` x `css_height` scaled by `scale`,
    /// filled with `background`.
    pub fn new(css_width: u32, css_height: u32, scale: f32, background: Rgb, max_pixels: u64) -> Result<Self, CaptureFault> {
        let width = device_px(css_width, scale);
        let height = device_px(css_height, scale);
        if width as u64 * height as u64 > max_pixels {
            return Err(CaptureFault::ResourceExhausted { width, height, limit: max_pixels });
        }
        let mut pixmap = Pixmap::new(width, height)
            .ok_or_else(|| CaptureFault::Render(format!("cannot allocate a {}x{} canvas", width, height)))?;
        let (r, g, b, a) = background.rgba();
        pixmap.fill(Color::from_rgba8(r, g, b, a));
        Ok(Self { pixmap, scale })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Straight-alpha color at a device pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<(u8, u8, u8, u8)> {
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some((c.red(), c.green(), c.blue(), c.alpha()))
    }

    fn css(&self) -> Transform {
        Transform::from_scale(self.scale, self.scale)
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, rgba: (u8, u8, u8, u8)) {
        let Some(rect) = Rect::from_xywh(x as f32, y as f32, width as f32, height as f32) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color_rgba8(rgba.0, rgba.1, rgba.2, rgba.3);
        paint.anti_alias = false;
        let transform = self.css();
        self.pixmap.fill_rect(rect, &paint, transform, None);
    }

    pub fn stroke_rect(&mut self, x: i32, y: i32, width: u32, height: u32, rgba: (u8, u8, u8, u8)) {
        if width == 0 || height == 0 {
            return;
        }
        self.fill_rect(x, y, width, 1, rgba);
        self.fill_rect(x, y + height as i32 - 1, width, 1, rgba);
        self.fill_rect(x, y, 1, height, rgba);
        self.fill_rect(x + width as i32 - 1, y, 1, height, rgba);
    }

    /// Draw `text` one glyph per monospace cell, baseline centered in the line box
    pub fn draw_text(&mut self, x: i32, y: i32, text: &str, rgba: (u8, u8, u8, u8)) -> Result<(), CaptureFault> {
        let font = font()?;
        let s = self.scale;
        let px = FONT_SIZE * s;
        let (ascent, descent) = font
            .horizontal_line_metrics(px)
            .map(|m| (m.ascent, m.descent))
            .unwrap_or((px * 0.8, -px * 0.2));
        let line = LINE_HEIGHT as f32 * s;
        let baseline = y as f32 * s + (line - (ascent - descent)) / 2.0 + ascent;
        let cell = CHAR_WIDTH as f32 * s;

        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let (metrics, coverage) = font.rasterize(ch, px);
            if metrics.width == 0 || metrics.height == 0 {
                continue;
            }
            let Some(size) = IntSize::from_wh(metrics.width as u32, metrics.height as u32) else {
                continue;
            };
            let mut glyph = Vec::with_capacity(coverage.len() * 4);
            for c in coverage {
                let a = c as u32 * rgba.3 as u32 / 255;
                let mul = |v: u8| ((v as u32 * a + 127) / 255) as u8;
                glyph.extend_from_slice(&[mul(rgba.0), mul(rgba.1), mul(rgba.2), a as u8]);
            }
            let Some(glyph) = Pixmap::from_vec(glyph, size) else {
                continue;
            };
            let origin = x as f32 * s + i as f32 * cell + (cell - metrics.advance_width).max(0.0) / 2.0;
            let gx = (origin + metrics.xmin as f32).round() as i32;
            let gy = (baseline - metrics.ymin as f32 - metrics.height as f32).round() as i32;
            self.pixmap
                .draw_pixmap(gx, gy, glyph.as_ref(), &PixmapPaint::default(), Transform::identity(), None);
        }
        Ok(())
    }

    /// Nearest-neighbour blit of `image` into a CSS rect
    pub fn draw_image(&mut self, x: i32, y: i32, width: u32, height: u32, image: &DecodedImage) {
        if image.width == 0 || image.height == 0 || width == 0 || height == 0 {
            return;
        }
        let Some(size) = IntSize::from_wh(image.width, image.height) else {
            return;
        };
        let Some(src) = Pixmap::from_vec(premultiply(&image.rgba), size) else {
            log::warn!("skipping image with inconsistent buffer ({}x{})", image.width, image.height);
            return;
        };
        let s = self.scale;
        let transform = Transform::from_row(
            width as f32 * s / image.width as f32,
            0.0,
            0.0,
            height as f32 * s / image.height as f32,
            x as f32 * s,
            y as f32 * s,
        );
        let paint = PixmapPaint { quality: FilterQuality::Nearest, ..PixmapPaint::default() };
        self.pixmap.draw_pixmap(0, 0, src.as_ref(), &paint, transform, None);
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, CaptureFault> {
        self.pixmap.encode_png().map_err(|e| CaptureFault::Render(e.to_string()))
    }
}

/// Paint `commands` over `background` and encode the result as PNG.
pub fn rasterize(
    commands: &[PaintCommand],
    css_width: u32,
    css_height: u32,
    background: Rgb,
    scale: f32,
    max_pixels: u64,
    images: &HashMap<String, DecodedImage>,
) -> Result<Screenshot, CaptureFault> {
    let mut canvas = Canvas::new(css_width, css_height, scale, background, max_pixels)?;
    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect { x, y, width, height, rgba } => canvas.fill_rect(*x, *y, *width, *height, *rgba),
            PaintCommand::StrokeRect { x, y, width, height, rgba } => canvas.stroke_rect(*x, *y, *width, *height, *rgba),
            PaintCommand::Text { x, y, text, rgba } => canvas.draw_text(*x, *y, text, *rgba)?,
            PaintCommand::Image { x, y, width, height, src } => {
                if let Some(img) = images.get(src) {
                    canvas.draw_image(*x, *y, *width, *height, img);
                }
            }
        }
    }
    let png_data = canvas.encode_png()?;
    Ok(Screenshot { width: canvas.width(), height: canvas.height(), png_data })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: (u8, u8, u8, u8) = (255, 255, 255, 255);

    fn inked(c: &Canvas, x0: u32, x1: u32) -> usize {
        (x0..x1)
            .flat_map(|x| (0..c.height()).map(move |y| (x, y)))
            .filter(|&(x, y)| c.pixel(x, y) != Some(WHITE))
            .count()
    }

    #[test]
    fn canvas_starts_filled_with_background() {
        let c = Canvas::new(4, 2, 1.0, Rgb::hex(0xf0e0d6), 1_000).unwrap();
        assert_eq!((c.width(), c.height()), (4, 2));
        assert_eq!(c.pixel(3, 1), Some((0xf0, 0xe0, 0xd6, 255)));
        assert_eq!(c.pixel(4, 0), None);
    }

    #[test]
    fn scale_multiplies_device_pixels() {
        let c = Canvas::new(10, 5, 2.0, Rgb::WHITE, 1_000).unwrap();
        assert_eq!((c.width(), c.height()), (20, 10));
        let c = Canvas::new(3, 3, 1.5, Rgb::WHITE, 1_000).unwrap();
        assert_eq!((c.width(), c.height()), (5, 5));
    }

    #[test]
    fn oversized_canvas_is_resource_exhaustion() {
        let err = Canvas::new(100, 100, 1.0, Rgb::WHITE, 9_999).unwrap_err();
        assert_eq!(err, CaptureFault::ResourceExhausted { width: 100, height: 100, limit: 9_999 });
    }

    #[test]
    fn fill_rect_covers_scaled_area() {
        let mut c = Canvas::new(4, 4, 2.0, Rgb::WHITE, 1_000).unwrap();
        c.fill_rect(1, 1, 2, 2, (255, 0, 0, 255));
        assert_eq!(c.pixel(2, 2), Some((255, 0, 0, 255)));
        assert_eq!(c.pixel(5, 5), Some((255, 0, 0, 255)));
        assert_eq!(c.pixel(1, 1), Some(WHITE));
        assert_eq!(c.pixel(6, 6), Some(WHITE));
    }

    #[test]
    fn glyphs_ink_only_their_cells() {
        let mut c = Canvas::new(24, LINE_HEIGHT, 1.0, Rgb::WHITE, 10_000).unwrap();
        c.draw_text(0, 0, "a b", (0, 0, 0, 255)).unwrap();
        assert!(inked(&c, 0, 8) > 5, "first glyph left no ink");
        assert_eq!(inked(&c, 8, 16), 0, "space was drawn");
        assert!(inked(&c, 16, 24) > 5, "third glyph left no ink");
    }

    #[test]
    fn different_glyphs_differ() {
        let draw = |text: &str| {
            let mut c = Canvas::new(16, LINE_HEIGHT, 1.0, Rgb::WHITE, 10_000).unwrap();
            c.draw_text(0, 0, text, (0, 0, 0, 255)).unwrap();
            c.encode_png().unwrap()
        };
        assert_ne!(draw("il"), draw("mw"));
        assert_eq!(draw("il"), draw("il"));
    }

    #[test]
    fn images_are_scaled_into_their_rect() {
        let img = DecodedImage { width: 2, height: 1, rgba: vec![255, 0, 0, 255, 0, 0, 255, 255] };
        let mut c = Canvas::new(4, 2, 1.0, Rgb::WHITE, 1_000).unwrap();
        c.draw_image(0, 0, 4, 2, &img);
        assert_eq!(c.pixel(0, 1), Some((255, 0, 0, 255)));
        assert_eq!(c.pixel(3, 0), Some((0, 0, 255, 255)));
    }

    #[test]
    fn rasterize_emits_png() {
        let cmds = vec![PaintCommand::SolidRect { x: 0, y: 0, width: 2, height: 2, rgba: (255, 0, 0, 255) }];
        let shot = rasterize(&cmds, 4, 4, Rgb::WHITE, 1.0, 1_000, &HashMap::new()).unwrap();
        assert_eq!(&shot.png_data[0..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!((shot.width, shot.height), (4, 4));
    }
}
