//! Frame snapshots, delivered after the next `post_render`.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use super::Renderer;
use crate::color::Color;
use crate::context::GlContext;
use crate::error::{RenderError, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    #[default]
    Png,
    Jpeg,
}

/// A captured area of the drawing buffer.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub image: RgbaImage,
    pub format: SnapshotFormat,
    /// `image` encoded as `format`.
    pub encoded: Vec<u8>,
}

pub type SnapshotCallback = Box<dyn FnOnce(Result<Snapshot>)>;
pub type SnapshotPixelCallback = Box<dyn FnOnce(Result<Color>)>;

pub(super) enum SnapshotKind {
    Image { format: SnapshotFormat, quality: f32, callback: SnapshotCallback },
    Pixel { callback: SnapshotPixelCallback },
}

pub(super) struct SnapshotRequest {
    /// Device pixels, top-left origin; `None` is the whole buffer.
    area: Option<(u32, u32, u32, u32)>,
    kind: SnapshotKind,
}

impl<G: GlContext> Renderer<G> {
    /// Captures the whole drawing buffer at the end of the next frame.
    /// `quality` (0–1) only applies to JPEG.
    pub fn snapshot(
        &mut self,
        callback: impl FnOnce(Result<Snapshot>) + 'static,
        format: SnapshotFormat,
        quality: f32,
    ) {
        self.request_snapshot(SnapshotRequest {
            area: None,
            kind: SnapshotKind::Image { format, quality, callback: Box::new(callback) },
        });
    }

    /// Captures a `width × height` area at device pixel `(x, y)`.
    pub fn snapshot_area(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        callback: impl FnOnce(Result<Snapshot>) + 'static,
        format: SnapshotFormat,
        quality: f32,
    ) {
        self.request_snapshot(SnapshotRequest {
            area: Some((x, y, width, height)),
            kind: SnapshotKind::Image { format, quality, callback: Box::new(callback) },
        });
    }

    /// Reads the single pixel at device pixel `(x, y)`.
    pub fn snapshot_pixel(&mut self, x: u32, y: u32, callback: impl FnOnce(Result<Color>) + 'static) {
        self.request_snapshot(SnapshotRequest {
            area: Some((x, y, 1, 1)),
            kind: SnapshotKind::Pixel { callback: Box::new(callback) },
        });
    }

    fn request_snapshot(&mut self, request: SnapshotRequest) {
        if self.snapshot.is_some() {
            log::debug!("replacing pending snapshot request");
        }
        self.snapshot = Some(request);
    }

    pub(super) fn deliver_snapshot(&mut self, request: SnapshotRequest) {
        let (x, y, width, height) = request.area.unwrap_or((0, 0, self.core.width, self.core.height));

        self.set_framebuffer(None);
        let pixels = self.core.gl.read_pixels(x, y, width, height);

        match request.kind {
            SnapshotKind::Pixel { callback } => {
                callback(pixels.and_then(decode_pixel));
            }
            SnapshotKind::Image { format, quality, callback } => {
                callback(pixels.and_then(|p| encode(p, width, height, format, quality)));
            }
        }
    }
}

fn decode_pixel(bytes: Vec<u8>) -> Result<Color> {
    match bytes.get(..4) {
        Some(&[r, g, b, a]) => Ok(Color::from_rgba_u8(r, g, b, a)),
        _ => Err(RenderError::Readback(format!("short pixel readback ({} bytes)", bytes.len()))),
    }
}

fn encode(pixels: Vec<u8>, width: u32, height: u32, format: SnapshotFormat, quality: f32) -> Result<Snapshot> {
    let image = RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| RenderError::Readback(format!("short readback for {width}x{height}")))?;

    let mut encoded = Vec::new();
    match format {
        SnapshotFormat::Png => {
            PngEncoder::new(Cursor::new(&mut encoded)).write_image(
                image.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )?;
        }
        SnapshotFormat::Jpeg => {
            let rgb: Vec<u8> = image.pixels().flat_map(|p| [p[0], p[1], p[2]]).collect();
            let quality = (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8;
            JpegEncoder::new_with_quality(Cursor::new(&mut encoded), quality).write_image(
                &rgb,
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
    }

    Ok(Snapshot { image, format, encoded })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::renderer::test_support::headless;

    #[test]
    fn snapshot_is_delivered_after_post_render() {
        let mut r = headless(4, 2);
        r.set_background_color(Color::rgba(1.0, 0.0, 0.0, 1.0));
        let out: Rc<RefCell<Option<Snapshot>>> = Rc::default();
        {
            let out = Rc::clone(&out);
            r.snapshot(move |s| *out.borrow_mut() = s.ok(), SnapshotFormat::Png, 1.0);
        }

        r.pre_render().unwrap();
        assert!(out.borrow().is_none());
        r.post_render().unwrap();

        let snapshot = out.borrow_mut().take().unwrap();
        assert_eq!(snapshot.image.dimensions(), (4, 2));
        assert_eq!(snapshot.image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(&snapshot.encoded[1..4], b"PNG");
    }

    #[test]
    fn jpeg_snapshot_of_an_area() {
        let mut r = headless(8, 8);
        let out: Rc<RefCell<Option<Snapshot>>> = Rc::default();
        {
            let out = Rc::clone(&out);
            r.snapshot_area(2, 2, 4, 4, move |s| *out.borrow_mut() = s.ok(), SnapshotFormat::Jpeg, 0.8);
        }
        r.pre_render().unwrap();
        r.post_render().unwrap();

        let snapshot = out.borrow_mut().take().unwrap();
        assert_eq!(snapshot.image.dimensions(), (4, 4));
        assert_eq!(&snapshot.encoded[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn pixel_snapshot_reports_out_of_bounds() {
        let mut r = headless(8, 8);
        let out: Rc<RefCell<Option<Result<Color>>>> = Rc::default();
        {
            let out = Rc::clone(&out);
            r.snapshot_pixel(9, 0, move |c| *out.borrow_mut() = Some(c));
        }
        r.pre_render().unwrap();
        r.post_render().unwrap();

        assert!(matches!(out.borrow_mut().take(), Some(Err(RenderError::Readback(_)))));
    }

    #[test]
    fn short_pixel_readback_is_an_error() {
        assert!(matches!(decode_pixel(vec![1, 2, 3]), Err(RenderError::Readback(_))));
        assert_eq!(decode_pixel(vec![255, 0, 0, 255]).unwrap(), Color::from_rgba_u8(255, 0, 0, 255));
    }

    #[test]
    fn far_out_of_range_origin_is_a_readback_error() {
        let mut r = headless(8, 8);
        let pixel: Rc<RefCell<Option<Result<Color>>>> = Rc::default();
        {
            let pixel = Rc::clone(&pixel);
            r.snapshot_pixel(u32::MAX, 0, move |c| *pixel.borrow_mut() = Some(c));
        }
        r.pre_render().unwrap();
        r.post_render().unwrap();
        assert!(matches!(pixel.borrow_mut().take(), Some(Err(RenderError::Readback(_)))));

        let area: Rc<RefCell<Option<Result<Snapshot>>>> = Rc::default();
        {
            let area = Rc::clone(&area);
            r.snapshot_area(0, u32::MAX - 1, 4, 4, move |s| *area.borrow_mut() = Some(s), SnapshotFormat::Png, 1.0);
        }
        r.pre_render().unwrap();
        r.post_render().unwrap();
        assert!(matches!(area.borrow_mut().take(), Some(Err(RenderError::Readback(_)))));
    }
}
