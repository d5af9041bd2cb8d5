use eframe::egui;
use egui::{Color32, Pos2, Vec2};
use image::RgbaImage;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canvas::{Frame, Surface, ViewTransform, color_to_rgba};
use crate::ops::shapes;

/// Marks scattered per spray move event.
pub const SPRAY_DENSITY: usize = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    Spray,
    Calligraphy,
    Line,
    Rectangle,
    Circle,
    Pan,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Eraser => "Eraser",
            Tool::Spray => "Spray",
            Tool::Calligraphy => "Calligraphy",
            Tool::Line => "Line",
            Tool::Rectangle => "Rectangle",
            Tool::Circle => "Circle",
            Tool::Pan => "Pan",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[
            Tool::Brush,
            Tool::Eraser,
            Tool::Spray,
            Tool::Calligraphy,
            Tool::Line,
            Tool::Rectangle,
            Tool::Circle,
            Tool::Pan,
        ]
    }

    /// Shape tools redraw one figure from the stroke start on every move.
    pub fn is_shape(&self) -> bool {
        matches!(self, Tool::Line | Tool::Rectangle | Tool::Circle)
    }
}

/// Settings the UI layer supplies; read on every event.
#[derive(Clone, Debug)]
pub struct ToolProperties {
    pub tool: Tool,
    pub foreground: Color32,
    pub background: Color32,
    /// Apparent stroke width in screen pixels; always >= 1.
    pub brush_size: f32,
    pub spray_density: usize,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self {
            tool: Tool::Brush,
            foreground: Color32::BLACK,
            background: Color32::WHITE,
            brush_size: 5.0,
            spray_density: SPRAY_DENSITY,
        }
    }
}

impl ToolProperties {
    pub fn set_brush_size(&mut self, size: f32) {
        self.brush_size = if size.is_finite() { size.max(1.0) } else { 1.0 };
    }

    /// Stroke width in drawing-space units: constant apparent width under zoom.
    pub fn line_width(&self, view: &ViewTransform) -> f32 {
        self.brush_size / view.scale
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrokeError {
    #[error("pre-stroke snapshot is {snapshot:?} but the surface is now {surface:?}")]
    StaleSnapshot {
        snapshot: (u32, u32),
        surface: (u32, u32),
    },
}

/// One in-progress drawing gesture, from pointer-down to pointer-up.
pub struct Stroke {
    tool: Tool,
    /// Fixed anchor for shape tools (drawing space).
    start: Pos2,
    /// Previous pointer position for incremental tools (drawing space).
    last: Pos2,
    pre_stroke: RgbaImage,
}

impl Stroke {
    pub fn begin(tool: Tool, point: Pos2, surface: &Surface) -> Self {
        Self {
            tool,
            start: point,
            last: point,
            pre_stroke: surface.snapshot(),
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn start(&self) -> Pos2 {
        self.start
    }

    /// Apply one pointer move at drawing-space `point`.
    pub fn extend<R: Rng + ?Sized>(
        &mut self,
        point: Pos2,
        surface: &mut Surface,
        view: &ViewTransform,
        props: &ToolProperties,
        rng: &mut R,
    ) {
        let foreground = color_to_rgba(props.foreground);
        let background = color_to_rgba(props.background);
        // Geometry is recorded in drawing space and rasterized through the view.
        let width_px = props.line_width(view) * view.scale;
        let to_px = |p: Pos2| view.map_to_screen_space(p);

        match self.tool {
            Tool::Brush | Tool::Calligraphy => {
                shapes::draw_segment(surface, to_px(self.last), to_px(point), width_px, foreground);
            }
            Tool::Eraser => {
                shapes::draw_segment(surface, to_px(self.last), to_px(point), width_px, background);
            }
            Tool::Spray => {
                let radius = props.brush_size * 0.5;
                let side = view.scale.max(1.0);
                for offset in shapes::spray_offsets(rng, props.spray_density, radius) {
                    shapes::fill_square(surface, to_px(point + offset), side, foreground);
                }
            }
            Tool::Line => {
                surface.restore(&self.pre_stroke);
                shapes::draw_segment(surface, to_px(self.start), to_px(point), width_px, foreground);
            }
            Tool::Rectangle => {
                surface.restore(&self.pre_stroke);
                shapes::stroke_rect(surface, to_px(self.start), to_px(point), width_px, foreground);
            }
            Tool::Circle => {
                surface.restore(&self.pre_stroke);
                let radius = (point - self.start).length() * view.scale;
                shapes::stroke_circle(surface, to_px(self.start), radius, width_px, foreground);
            }
            Tool::Pan => {}
        }
        self.last = point;
    }

    /// Freeze the surface into the frame this stroke commits.
    pub fn finish(self, surface: &Surface) -> Result<Frame, StrokeError> {
        let snapshot = self.pre_stroke.dimensions();
        if snapshot != surface.dimensions() {
            return Err(StrokeError::StaleSnapshot {
                snapshot,
                surface: surface.dimensions(),
            });
        }
        Ok(surface.to_frame(self.tool.label()))
    }

    /// Drop the stroke, putting the pre-stroke pixels back when possible.
    pub fn abandon(self, surface: &mut Surface) -> bool {
        surface.restore(&self.pre_stroke)
    }
}

/// What the pointer is doing between down and up.
#[derive(Default)]
pub enum ActionState {
    #[default]
    Idle,
    Drawing(Stroke),
    Panning { anchor: Vec2 },
}

impl ActionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ActionState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::EMPTY_INK;
    use image::Rgba;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn props(tool: Tool) -> ToolProperties {
        ToolProperties {
            tool,
            foreground: Color32::from_rgb(200, 0, 0),
            brush_size: 2.0,
            ..Default::default()
        }
    }

    fn painted(surface: &Surface, x: u32, y: u32) -> bool {
        *surface.ink().get_pixel(x, y) != EMPTY_INK
    }

    #[test]
    fn shape_preview_keeps_only_latest_geometry() {
        let mut surface = Surface::new(100, 100, Rgba([255, 255, 255, 255]));
        let view = ViewTransform::default();
        let props = props(Tool::Rectangle);
        let mut rng = StdRng::seed_from_u64(1);

        let mut stroke = Stroke::begin(Tool::Rectangle, Pos2::new(10.0, 10.0), &surface);
        stroke.extend(Pos2::new(50.0, 40.0), &mut surface, &view, &props, &mut rng);
        assert!(painted(&surface, 50, 25));
        stroke.extend(Pos2::new(60.0, 60.0), &mut surface, &view, &props, &mut rng);

        // The intermediate right and bottom edges are gone.
        assert!(!painted(&surface, 50, 25));
        assert!(!painted(&surface, 30, 40));
        assert!(painted(&surface, 60, 30));
        assert!(painted(&surface, 30, 60));
        let frame = stroke.finish(&surface).expect("same size");
        assert_eq!(frame.description(), "Rectangle");
    }

    #[test]
    fn freehand_accumulates_segments() {
        let mut surface = Surface::new(60, 60, Rgba([255, 255, 255, 255]));
        let view = ViewTransform::default();
        let props = props(Tool::Brush);
        let mut rng = StdRng::seed_from_u64(1);

        let mut stroke = Stroke::begin(Tool::Brush, Pos2::new(5.0, 5.0), &surface);
        stroke.extend(Pos2::new(30.0, 5.0), &mut surface, &view, &props, &mut rng);
        stroke.extend(Pos2::new(30.0, 40.0), &mut surface, &view, &props, &mut rng);
        assert!(painted(&surface, 15, 5));
        assert!(painted(&surface, 30, 20));
    }

    #[test]
    fn width_is_constant_on_screen_under_zoom() {
        let view = ViewTransform {
            offset: Vec2::ZERO,
            scale: 4.0,
        };
        let props = props(Tool::Brush);
        assert_eq!(props.line_width(&view), 0.5);
        assert_eq!(props.line_width(&view) * view.scale, props.brush_size);
    }

    #[test]
    fn strokes_land_under_the_cursor_when_zoomed() {
        let mut surface = Surface::new(100, 100, Rgba([255, 255, 255, 255]));
        let view = ViewTransform {
            offset: Vec2::new(20.0, 10.0),
            scale: 2.0,
        };
        let props = props(Tool::Line);
        let mut rng = StdRng::seed_from_u64(1);
        let a = view.map_to_drawing_space(Pos2::new(30.0, 50.0));
        let b = view.map_to_drawing_space(Pos2::new(80.0, 50.0));

        let mut stroke = Stroke::begin(Tool::Line, a, &surface);
        stroke.extend(b, &mut surface, &view, &props, &mut rng);
        assert!(painted(&surface, 55, 50));
        assert!(!painted(&surface, 55, 40));
    }

    #[test]
    fn spray_marks_near_pointer() {
        let mut surface = Surface::new(50, 50, Rgba([255, 255, 255, 255]));
        let view = ViewTransform::default();
        let mut props = props(Tool::Spray);
        props.brush_size = 10.0;
        let mut rng = StdRng::seed_from_u64(3);

        let mut stroke = Stroke::begin(Tool::Spray, Pos2::new(25.0, 25.0), &surface);
        stroke.extend(Pos2::new(25.0, 25.0), &mut surface, &view, &props, &mut rng);
        let marks: Vec<(u32, u32)> = surface
            .ink()
            .enumerate_pixels()
            .filter(|(_, _, p)| **p != EMPTY_INK)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!marks.is_empty());
        assert!(marks.iter().all(|&(x, y)| (19..=31).contains(&x) && (19..=31).contains(&y)));
    }

    #[test]
    fn stale_snapshot_is_rejected() {
        let surface = Surface::new(10, 10, Rgba([255, 255, 255, 255]));
        let stroke = Stroke::begin(Tool::Brush, Pos2::ZERO, &surface);
        let resized = Surface::new(20, 10, Rgba([255, 255, 255, 255]));
        assert_eq!(
            stroke.finish(&resized).unwrap_err(),
            StrokeError::StaleSnapshot {
                snapshot: (10, 10),
                surface: (20, 10)
            }
        );
    }

    #[test]
    fn brush_size_is_clamped_positive() {
        let mut props = ToolProperties::default();
        props.set_brush_size(-3.0);
        assert_eq!(props.brush_size, 1.0);
        props.set_brush_size(f32::NAN);
        assert_eq!(props.brush_size, 1.0);
        props.set_brush_size(12.0);
        assert_eq!(props.brush_size, 12.0);
    }

    #[test]
    fn tool_tags_deserialize_lowercase() {
        let tool: Tool = serde_json::from_str("\"calligraphy\"").expect("tag");
        assert_eq!(tool, Tool::Calligraphy);
        assert!(Tool::Circle.is_shape());
        assert!(!Tool::Spray.is_shape());
    }
}
