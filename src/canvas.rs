use std::sync::Arc;

use eframe::egui;
use egui::{Color32, Pos2, Vec2};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Fully transparent ink: a pixel nothing has been painted on.
pub const EMPTY_INK: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub fn color_to_rgba(color: Color32) -> Rgba<u8> {
    Rgba(color.to_srgba_unmultiplied())
}

pub fn rgba_to_color(pixel: Rgba<u8>) -> Color32 {
    let [r, g, b, a] = pixel.0;
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

/// Source-over of one unmultiplied RGBA pixel onto another.
#[inline]
fn blend_over(top: [u8; 4], base: [u8; 4]) -> [u8; 4] {
    match top[3] {
        255 => top,
        0 => base,
        ta => {
            let ta = ta as f32 / 255.0;
            let ba = base[3] as f32 / 255.0;
            let out_a = ta + ba * (1.0 - ta);
            if out_a <= 0.0 {
                return [0, 0, 0, 0];
            }
            let mut out = [0u8; 4];
            for c in 0..3 {
                let v = (top[c] as f32 * ta + base[c] as f32 * ba * (1.0 - ta)) / out_a;
                out[c] = v.round().clamp(0.0, 255.0) as u8;
            }
            out[3] = (out_a * 255.0).round() as u8;
            out
        }
    }
}

/// Fill `background` over the whole raster, then composite `ink` on top.
pub fn composite_over(ink: &RgbaImage, background: Rgba<u8>) -> RgbaImage {
    let (w, h) = ink.dimensions();
    let mut out = RgbaImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }
    let row_len = w as usize * 4;
    out.par_chunks_mut(row_len)
        .zip(ink.as_raw().par_chunks(row_len))
        .for_each(|(dst_row, ink_row)| {
            for (dst, src) in dst_row.chunks_exact_mut(4).zip(ink_row.chunks_exact(4)) {
                let px = blend_over([src[0], src[1], src[2], src[3]], background.0);
                dst.copy_from_slice(&px);
            }
        });
    out
}

// ============================================================================
// FRAME — immutable committed snapshot
// ============================================================================

/// One committed state of the drawing: the ink raster plus the background it
/// is displayed over. Frames are never mutated; clones share the pixel data.
#[derive(Clone, Debug)]
pub struct Frame {
    ink: Arc<RgbaImage>,
    background: Rgba<u8>,
    description: String,
}

impl Frame {
    pub fn new(ink: RgbaImage, background: Rgba<u8>, description: impl Into<String>) -> Self {
        Self {
            ink: Arc::new(ink),
            background,
            description: description.into(),
        }
    }

    /// A frame with no ink at all: its composite is a plain background fill.
    pub fn blank(width: u32, height: u32, background: Rgba<u8>, description: impl Into<String>) -> Self {
        Self::new(
            RgbaImage::from_pixel(width, height, EMPTY_INK),
            background,
            description,
        )
    }

    /// Same ink, different background. The pixel buffer is shared, not copied.
    pub fn with_background(&self, background: Rgba<u8>, description: impl Into<String>) -> Self {
        Self {
            ink: Arc::clone(&self.ink),
            background,
            description: description.into(),
        }
    }

    pub fn ink(&self) -> &RgbaImage {
        &self.ink
    }

    pub fn background(&self) -> Rgba<u8> {
        self.background
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn width(&self) -> u32 {
        self.ink.width()
    }

    pub fn height(&self) -> u32 {
        self.ink.height()
    }

    /// The pixels this frame displays.
    pub fn composite(&self) -> RgbaImage {
        composite_over(&self.ink, self.background)
    }

    pub fn shares_pixels_with(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.ink, &other.ink)
    }

    pub fn memory_bytes(&self) -> usize {
        self.ink.as_raw().len() + self.description.len()
    }
}

// ============================================================================
// SURFACE — the live, mutable buffer strokes are drawn into
// ============================================================================

/// The live drawing buffer. Between gestures its ink equals the ink of the
/// frame history currently displays; during a stroke it holds the preview.
pub struct Surface {
    ink: RgbaImage,
    background: Rgba<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        Self {
            ink: RgbaImage::from_pixel(width, height, EMPTY_INK),
            background,
        }
    }

    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            ink: frame.ink().clone(),
            background: frame.background(),
        }
    }

    pub fn width(&self) -> u32 {
        self.ink.width()
    }

    pub fn height(&self) -> u32 {
        self.ink.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.ink.dimensions()
    }

    pub fn ink(&self) -> &RgbaImage {
        &self.ink
    }

    pub fn ink_mut(&mut self) -> &mut RgbaImage {
        &mut self.ink
    }

    pub fn background(&self) -> Rgba<u8> {
        self.background
    }

    pub fn set_background(&mut self, background: Rgba<u8>) {
        self.background = background;
    }

    /// Show `frame`: its ink and its background replace the live state.
    /// Frames of a different size are placed at the origin, clipped or padded
    /// with empty ink to the surface size.
    pub fn load_frame(&mut self, frame: &Frame) {
        self.background = frame.background();
        if frame.ink().dimensions() == self.ink.dimensions() {
            self.ink.copy_from_slice(frame.ink().as_raw());
        } else {
            let (w, h) = self.ink.dimensions();
            self.reseed(frame, w, h);
        }
    }

    /// Rebuild the buffer at `width`×`height` from `frame`, origin aligned.
    pub fn reseed(&mut self, frame: &Frame, width: u32, height: u32) {
        let mut ink = RgbaImage::from_pixel(width, height, EMPTY_INK);
        let src = frame.ink();
        let copy_w = src.width().min(width);
        let copy_h = src.height().min(height);
        for y in 0..copy_h {
            for x in 0..copy_w {
                ink.put_pixel(x, y, *src.get_pixel(x, y));
            }
        }
        self.ink = ink;
        self.background = frame.background();
    }

    /// Copy of the ink, taken before a stroke so shape previews can restore it.
    pub fn snapshot(&self) -> RgbaImage {
        self.ink.clone()
    }

    /// Put back a snapshot taken with [`Surface::snapshot`]. Returns `false`
    /// (and leaves the buffer alone) if the sizes no longer match.
    pub fn restore(&mut self, snapshot: &RgbaImage) -> bool {
        if snapshot.dimensions() != self.ink.dimensions() {
            return false;
        }
        self.ink.copy_from_slice(snapshot.as_raw());
        true
    }

    /// Erase all ink; the composite becomes a plain background fill.
    pub fn clear_ink(&mut self) {
        let w = self.ink.width() as usize;
        if w == 0 || self.ink.height() == 0 {
            return;
        }
        self.ink
            .par_chunks_mut(w * 4)
            .for_each(|row| row.fill(0));
    }

    /// Write one pixel, ignoring coordinates outside the buffer.
    #[inline]
    pub fn put(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if x >= 0 && y >= 0 && (x as u64) < self.ink.width() as u64 && (y as u64) < self.ink.height() as u64 {
            self.ink.put_pixel(x as u32, y as u32, color);
        }
    }

    /// Freeze the live buffer into a committable frame.
    pub fn to_frame(&self, description: impl Into<String>) -> Frame {
        Frame::new(self.ink.clone(), self.background, description)
    }

    /// The repaint: background fill, ink at identity on top.
    pub fn render(&self) -> RgbaImage {
        composite_over(&self.ink, self.background)
    }
}

// ============================================================================
// VIEW TRANSFORM — pan & zoom
// ============================================================================

/// Zoom limits and wheel step factors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    pub zoom_in_factor: f32,
    pub zoom_out_factor: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 10.0,
            zoom_in_factor: 1.1,
            zoom_out_factor: 0.9,
        }
    }
}

impl ZoomConfig {
    /// Wheel scrolling down (positive delta) zooms out, anything else zooms in.
    pub fn factor_for_wheel(&self, delta_y: f32) -> f32 {
        if delta_y > 0.0 {
            self.zoom_out_factor
        } else {
            self.zoom_in_factor
        }
    }
}

/// Maps drawing space to screen space: `screen = drawing * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub offset: Vec2,
    pub scale: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: 1.0,
        }
    }
}

impl ViewTransform {
    pub fn map_to_drawing_space(&self, screen: Pos2) -> Pos2 {
        ((screen.to_vec2() - self.offset) / self.scale).to_pos2()
    }

    pub fn map_to_screen_space(&self, drawing: Pos2) -> Pos2 {
        (drawing.to_vec2() * self.scale + self.offset).to_pos2()
    }

    /// Anchor for a pan gesture starting with the pointer at `pointer`.
    pub fn pan_anchor(&self, pointer: Pos2) -> Vec2 {
        pointer.to_vec2() - self.offset
    }

    pub fn pan_to(&mut self, pointer: Pos2, anchor: Vec2) {
        self.offset = pointer.to_vec2() - anchor;
    }

    /// Multiply the scale by `factor`, keeping the drawing point under
    /// `cursor` fixed on screen. The scale is clamped to `limits`, and the
    /// offset follows the clamped (effective) factor so the anchor holds even
    /// at the limits. Returns `true` if the view changed.
    pub fn zoom_at(&mut self, cursor: Pos2, factor: f32, limits: &ZoomConfig) -> bool {
        let old_scale = self.scale;
        let new_scale = (old_scale * factor).clamp(limits.min_scale, limits.max_scale);
        if new_scale == old_scale {
            return false;
        }
        let effective = new_scale / old_scale;
        let cursor = cursor.to_vec2();
        self.offset = cursor - (cursor - self.offset) * effective;
        self.scale = new_scale;
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
