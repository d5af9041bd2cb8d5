use eframe::egui;
use egui::{Color32, Pos2};
use image::RgbaImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::canvas::{Frame, Surface, ViewTransform, ZoomConfig, color_to_rgba, rgba_to_color};
use crate::components::history::HistoryManager;
use crate::components::tools::{ActionState, Stroke, Tool, ToolProperties};
use crate::io::{self, ExportError};
use crate::settings::AppSettings;

// ============================================================================
// COLORS & EVENTS
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid color {0:?}: expected #rrggbb or #rrggbbaa")]
pub struct ColorParseError(pub String);

/// A color written as `#rrggbb` or `#rrggbbaa` in gesture scripts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(pub Color32);

impl TryFrom<String> for HexColor {
    type Error = ColorParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::str::FromStr for HexColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(err());
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        let a = if hex.len() == 8 { byte(6)? } else { 255 };
        Ok(HexColor(Color32::from_rgba_unmultiplied(
            byte(0)?,
            byte(2)?,
            byte(4)?,
            a,
        )))
    }
}

impl From<HexColor> for String {
    fn from(c: HexColor) -> Self {
        let [r, g, b, a] = c.0.to_srgba_unmultiplied();
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

/// Everything the UI layer can tell a project. Pointer coordinates are
/// surface-local screen pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp,
    PointerLeave,
    Wheel { x: f32, y: f32, delta_y: f32 },
    Undo,
    Redo,
    Clear,
    SetTool { tool: Tool },
    SetForeground { color: HexColor },
    SetBackground { color: HexColor },
    SetBrushSize { size: f32 },
    Resize { width: u32, height: u32 },
}

/// The eraser paints background-colored ink over the background fill, which
/// only reproduces the fill exactly when the fill is opaque.
fn opaque(color: Color32) -> Color32 {
    let [r, g, b, _] = color.to_srgba_unmultiplied();
    Color32::from_rgb(r, g, b)
}

// ============================================================================
// PROJECT — one editing session
// ============================================================================

/// Single open drawing: live surface, history, view, tool settings and the
/// gesture in progress.
pub struct Project {
    pub id: Uuid,
    /// Display name ("Untitled-X" until exported).
    pub name: String,
    pub is_dirty: bool,
    surface: Surface,
    history: HistoryManager,
    view: ViewTransform,
    zoom: ZoomConfig,
    properties: ToolProperties,
    action: ActionState,
    rng: StdRng,
    needs_repaint: bool,
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, width: u32, height: u32, settings: &AppSettings) -> Self {
        let properties = ToolProperties {
            tool: Tool::Brush,
            foreground: settings.foreground,
            background: opaque(settings.background),
            brush_size: settings.brush_size.max(1.0),
            spray_density: settings.spray_density,
        };
        let background = color_to_rgba(properties.background);
        let mut history = HistoryManager::new()
            .with_depth_limit(settings.max_history_depth())
            .with_memory_limit(settings.max_history_bytes());
        history.commit(Frame::blank(width, height, background, "New"));

        Self {
            id: Uuid::new_v4(),
            name: format!("Untitled-{}", untitled_counter),
            is_dirty: false,
            surface: Surface::new(width, height, background),
            history,
            view: ViewTransform::default(),
            zoom: settings.zoom_config(),
            properties,
            action: ActionState::Idle,
            rng: StdRng::from_os_rng(),
            needs_repaint: true,
        }
    }

    /// Make spray scatter reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Route one input event to its handler.
    pub fn handle(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerDown { x, y } => self.pointer_down(Pos2::new(x, y)),
            InputEvent::PointerMove { x, y } => self.pointer_move(Pos2::new(x, y)),
            InputEvent::PointerUp => self.pointer_up(),
            InputEvent::PointerLeave => self.pointer_leave(),
            InputEvent::Wheel { x, y, delta_y } => self.wheel(Pos2::new(x, y), delta_y),
            InputEvent::Undo => {
                self.undo();
            }
            InputEvent::Redo => {
                self.redo();
            }
            InputEvent::Clear => self.clear(),
            InputEvent::SetTool { tool } => self.set_tool(tool),
            InputEvent::SetForeground { color } => self.properties.foreground = color.0,
            InputEvent::SetBackground { color } => self.set_background(color.0),
            InputEvent::SetBrushSize { size } => self.properties.set_brush_size(size),
            InputEvent::Resize { width, height } => self.resize(width, height),
        }
    }

    // -- Pointer gestures ------------------------------------------------

    pub fn pointer_down(&mut self, screen: Pos2) {
        if !self.action.is_idle() {
            self.finish_action();
        }
        self.action = match self.properties.tool {
            Tool::Pan => ActionState::Panning {
                anchor: self.view.pan_anchor(screen),
            },
            tool => ActionState::Drawing(Stroke::begin(
                tool,
                self.view.map_to_drawing_space(screen),
                &self.surface,
            )),
        };
    }

    pub fn pointer_move(&mut self, screen: Pos2) {
        match &mut self.action {
            ActionState::Idle => {}
            ActionState::Panning { anchor } => {
                self.view.pan_to(screen, *anchor);
                self.needs_repaint = true;
            }
            ActionState::Drawing(stroke) => {
                let point = self.view.map_to_drawing_space(screen);
                stroke.extend(point, &mut self.surface, &self.view, &self.properties, &mut self.rng);
                self.needs_repaint = true;
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.finish_action();
    }

    /// Leaving the surface mid-gesture ends it exactly like releasing the pointer.
    pub fn pointer_leave(&mut self) {
        self.finish_action();
    }

    pub fn wheel(&mut self, cursor: Pos2, delta_y: f32) {
        let factor = self.zoom.factor_for_wheel(delta_y);
        self.zoom_at(cursor, factor);
    }

    pub fn zoom_at(&mut self, cursor: Pos2, factor: f32) {
        if self.view.zoom_at(cursor, factor, &self.zoom) {
            self.needs_repaint = true;
        }
    }

    /// Complete whatever gesture is active: strokes commit, pans just end.
    fn finish_action(&mut self) {
        match std::mem::take(&mut self.action) {
            ActionState::Idle | ActionState::Panning { .. } => {}
            ActionState::Drawing(stroke) => match stroke.finish(&self.surface) {
                Ok(frame) => self.commit(frame),
                Err(e) => {
                    log_warn!("abandoned stroke: {}", e);
                    self.show_current_frame();
                }
            },
        }
    }

    /// Drop an in-flight stroke without committing it.
    fn abort_action(&mut self) {
        if let ActionState::Drawing(stroke) = std::mem::take(&mut self.action) {
            let tool = stroke.tool();
            if !stroke.abandon(&mut self.surface) {
                self.show_current_frame();
            }
            log_info!("aborted in-flight {} stroke", tool.label());
        }
    }

    // -- History ---------------------------------------------------------

    fn commit(&mut self, frame: Frame) {
        self.history.commit(frame);
        self.mark_dirty();
        self.needs_repaint = true;
    }

    pub fn undo(&mut self) -> bool {
        self.finish_action();
        match self.history.undo().cloned() {
            Some(frame) => {
                self.show_frame(&frame);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.finish_action();
        match self.history.redo().cloned() {
            Some(frame) => {
                self.show_frame(&frame);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    fn show_frame(&mut self, frame: &Frame) {
        self.surface.load_frame(frame);
        self.properties.background = rgba_to_color(frame.background());
        self.needs_repaint = true;
    }

    fn show_current_frame(&mut self) {
        if let Some(frame) = self.history.current().cloned() {
            self.show_frame(&frame);
        }
    }

    // -- Whole-surface actions -------------------------------------------

    /// Commit a frame that is a plain background fill.
    pub fn clear(&mut self) {
        self.finish_action();
        self.surface.set_background(color_to_rgba(self.properties.background));
        self.surface.clear_ink();
        let frame = self.surface.to_frame("Clear");
        self.commit(frame);
        log_info!("cleared {}", self.name);
    }

    /// Change the background and commit the existing drawing recomposited over
    /// it. An in-flight stroke is committed first so no live edits are lost.
    /// Backgrounds are always opaque; any alpha is dropped.
    pub fn set_background(&mut self, color: Color32) {
        self.finish_action();
        let color = opaque(color);
        let background = color_to_rgba(color);
        self.properties.background = color;
        if self.surface.background() == background {
            return;
        }
        self.surface.set_background(background);

        let frame = match self.history.current() {
            Some(current) if current.ink().dimensions() == self.surface.dimensions() => {
                current.with_background(background, "Background")
            }
            _ => self.surface.to_frame("Background"),
        };
        self.commit(frame);
        log_info!("background changed to {:?}", background.0);
    }

    /// Switching tools mid-gesture completes the gesture with the old tool.
    pub fn set_tool(&mut self, tool: Tool) {
        if tool != self.properties.tool {
            self.finish_action();
            self.properties.tool = tool;
        }
    }

    pub fn set_foreground(&mut self, color: Color32) {
        self.properties.foreground = color;
    }

    pub fn set_brush_size(&mut self, size: f32) {
        self.properties.set_brush_size(size);
    }

    /// Resize the live buffer. Any in-flight stroke is aborted; committed
    /// frames keep their own size and are shown origin-aligned.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.surface.dimensions() == (width, height) {
            return;
        }
        self.abort_action();
        let old = self.surface.dimensions();
        match self.history.current().cloned() {
            Some(frame) => self.surface.reseed(&frame, width, height),
            None => self.surface = Surface::new(width, height, color_to_rgba(self.properties.background)),
        }
        self.needs_repaint = true;
        log_info!("surface resized {:?} -> {:?}", old, (width, height));
    }

    // -- Output ----------------------------------------------------------

    /// The redraw: background fill with the live ink composited at identity.
    pub fn render(&self) -> RgbaImage {
        self.surface.render()
    }

    pub fn export_png(&self) -> Result<Vec<u8>, ExportError> {
        io::encode_png(&self.render())
    }

    /// Returns `true` once after anything visible changed.
    pub fn take_repaint(&mut self) -> bool {
        std::mem::take(&mut self.needs_repaint)
    }

    // -- Accessors -------------------------------------------------------

    pub fn map_to_drawing_space(&self, screen: Pos2) -> Pos2 {
        self.view.map_to_drawing_space(screen)
    }

    pub fn map_to_screen_space(&self, drawing: Pos2) -> Pos2 {
        self.view.map_to_screen_space(drawing)
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
        self.needs_repaint = true;
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn properties(&self) -> &ToolProperties {
        &self.properties
    }

    pub fn action(&self) -> &ActionState {
        &self.action
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn project() -> Project {
        Project::new_untitled(1, 100, 100, &AppSettings::default()).with_seed(5)
    }

    fn drag(p: &mut Project, points: &[(f32, f32)]) {
        let (x, y) = points[0];
        p.handle(InputEvent::PointerDown { x, y });
        for &(x, y) in &points[1..] {
            p.handle(InputEvent::PointerMove { x, y });
        }
        p.handle(InputEvent::PointerUp);
    }

    fn full_fill(p: &Project, color: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(p.width(), p.height(), color)
    }

    #[test]
    fn starts_with_one_blank_frame() {
        let p = project();
        assert_eq!(p.history().len(), 1);
        assert!(!p.can_undo());
        assert!(!p.can_redo());
        assert_eq!(p.render(), full_fill(&p, WHITE));
    }

    #[test]
    fn each_stroke_commits_once() {
        let mut p = project();
        drag(&mut p, &[(10.0, 10.0), (20.0, 20.0), (30.0, 10.0)]);
        assert_eq!(p.history().len(), 2);
        assert!(p.can_undo());
        assert!(p.is_dirty);
        assert_ne!(p.render(), full_fill(&p, WHITE));
    }

    #[test]
    fn pointer_leave_commits_like_pointer_up() {
        let mut p = project();
        p.handle(InputEvent::PointerDown { x: 10.0, y: 10.0 });
        p.handle(InputEvent::PointerMove { x: 40.0, y: 10.0 });
        p.handle(InputEvent::PointerLeave);
        assert!(p.action().is_idle());
        assert_eq!(p.history().len(), 2);
        // A stray up afterwards commits nothing.
        p.handle(InputEvent::PointerUp);
        assert_eq!(p.history().len(), 2);
    }

    #[test]
    fn undo_restores_previous_pixels_and_redo_reapplies() {
        let mut p = project();
        drag(&mut p, &[(10.0, 50.0), (90.0, 50.0)]);
        let drawn = p.render();
        assert!(p.undo());
        assert_eq!(p.render(), full_fill(&p, WHITE));
        assert!(p.redo());
        assert_eq!(p.render(), drawn);
        assert!(!p.redo());
    }

    #[test]
    fn drawing_after_undo_discards_redo() {
        let mut p = project();
        drag(&mut p, &[(10.0, 10.0), (20.0, 10.0)]);
        drag(&mut p, &[(10.0, 30.0), (20.0, 30.0)]);
        p.undo();
        drag(&mut p, &[(10.0, 60.0), (20.0, 60.0)]);
        assert_eq!(p.history().len(), 3);
        assert!(!p.can_redo());
        assert_eq!(*p.render().get_pixel(15, 30), WHITE);
    }

    #[test]
    fn rectangle_commit_has_only_final_shape() {
        let mut p = project();
        p.set_tool(Tool::Rectangle);
        p.set_brush_size(2.0);
        drag(&mut p, &[(10.0, 10.0), (50.0, 40.0), (60.0, 60.0)]);
        let frame = p.history().current().expect("committed").composite();
        assert_eq!(*frame.get_pixel(50, 25), WHITE);
        assert_eq!(*frame.get_pixel(30, 40), WHITE);
        assert_ne!(*frame.get_pixel(60, 30), WHITE);
        assert_ne!(*frame.get_pixel(30, 60), WHITE);
    }

    #[test]
    fn eraser_matches_background_fill() {
        let mut p = project();
        p.set_brush_size(6.0);
        p.set_foreground(Color32::from_rgb(255, 0, 0));
        let path = [(10.0, 50.0), (50.0, 50.0), (80.0, 70.0)];
        drag(&mut p, &path);
        p.set_tool(Tool::Eraser);
        drag(&mut p, &path);
        assert_eq!(p.render(), full_fill(&p, WHITE));
    }

    #[test]
    fn eraser_matches_background_fill_with_translucent_background() {
        let mut p = project();
        p.handle(InputEvent::SetBackground {
            color: "#ffffff80".parse().expect("hex"),
        });
        assert_eq!(p.properties().background, Color32::WHITE);
        // Opaque white was already the background: nothing to commit.
        assert_eq!(p.history().len(), 1);

        p.handle(InputEvent::SetBackground {
            color: "#3040c880".parse().expect("hex"),
        });
        let fill = Rgba([0x30, 0x40, 0xc8, 255]);
        p.set_brush_size(6.0);
        p.set_foreground(Color32::from_rgb(255, 0, 0));
        let path = [(10.0, 50.0), (50.0, 50.0), (80.0, 70.0)];
        drag(&mut p, &path);
        p.set_tool(Tool::Eraser);
        drag(&mut p, &path);
        assert_eq!(p.render(), full_fill(&p, fill));

        p.clear();
        assert_eq!(p.render(), full_fill(&p, fill));
    }

    #[test]
    fn clear_twice_makes_two_identical_entries() {
        let mut p = project();
        drag(&mut p, &[(10.0, 10.0), (60.0, 60.0)]);
        p.clear();
        p.clear();
        assert_eq!(p.history().len(), 4);
        let frames: Vec<&Frame> = p.history().frames().collect();
        let expected = full_fill(&p, WHITE);
        assert_eq!(frames[2].composite(), expected);
        assert_eq!(frames[3].composite(), expected);
        assert_eq!(p.render(), expected);
    }

    #[test]
    fn background_change_keeps_strokes_and_is_undoable() {
        let mut p = project();
        p.set_foreground(Color32::from_rgb(0, 0, 255));
        drag(&mut p, &[(10.0, 50.0), (90.0, 50.0)]);
        let stroke_px = *p.render().get_pixel(50, 50);

        let navy = Color32::from_rgb(0, 0, 80);
        p.set_background(navy);
        assert_eq!(p.history().len(), 3);
        let out = p.render();
        assert_eq!(*out.get_pixel(50, 50), stroke_px);
        assert_eq!(*out.get_pixel(5, 5), Rgba([0, 0, 80, 255]));

        p.undo();
        assert_eq!(*p.render().get_pixel(5, 5), WHITE);
        assert_eq!(p.properties().background, Color32::WHITE);
    }

    #[test]
    fn background_change_commits_in_flight_stroke_first() {
        let mut p = project();
        p.handle(InputEvent::PointerDown { x: 10.0, y: 10.0 });
        p.handle(InputEvent::PointerMove { x: 50.0, y: 10.0 });
        p.set_background(Color32::from_rgb(10, 10, 10));
        assert_eq!(p.history().len(), 3);
        assert!(p.action().is_idle());
        assert_ne!(*p.render().get_pixel(30, 10), Rgba([10, 10, 10, 255]));
    }

    #[test]
    fn same_background_is_not_a_commit() {
        let mut p = project();
        p.set_background(Color32::WHITE);
        assert_eq!(p.history().len(), 1);
    }

    #[test]
    fn pan_moves_view_without_committing() {
        let mut p = project();
        p.set_tool(Tool::Pan);
        p.handle(InputEvent::PointerDown { x: 10.0, y: 10.0 });
        p.handle(InputEvent::PointerMove { x: 40.0, y: 25.0 });
        p.handle(InputEvent::PointerUp);
        assert_eq!(p.view().offset, egui::Vec2::new(30.0, 15.0));
        assert_eq!(p.history().len(), 1);
    }

    #[test]
    fn wheel_zoom_keeps_cursor_anchor() {
        let mut p = project();
        let cursor = Pos2::new(40.0, 60.0);
        let before = p.map_to_drawing_space(cursor);
        p.handle(InputEvent::Wheel { x: 40.0, y: 60.0, delta_y: -1.0 });
        assert!((p.view().scale - 1.1).abs() < 1e-6);
        let after = p.map_to_drawing_space(cursor);
        assert!((before - after).length() < 1e-4);
    }

    #[test]
    fn resize_aborts_stroke_and_keeps_history() {
        let mut p = project();
        drag(&mut p, &[(5.0, 5.0), (20.0, 5.0)]);
        p.handle(InputEvent::PointerDown { x: 10.0, y: 80.0 });
        p.handle(InputEvent::PointerMove { x: 90.0, y: 80.0 });
        p.handle(InputEvent::Resize { width: 120, height: 60 });

        assert!(p.action().is_idle());
        assert_eq!(p.history().len(), 2);
        assert_eq!(p.history().current().unwrap().width(), 100);
        assert_eq!((p.width(), p.height()), (120, 60));
        // The committed stroke survives, origin-aligned.
        assert_ne!(*p.render().get_pixel(12, 5), WHITE);
        p.handle(InputEvent::PointerUp);
        assert_eq!(p.history().len(), 2);

        drag(&mut p, &[(100.0, 30.0), (115.0, 30.0)]);
        assert_eq!(p.history().current().unwrap().width(), 120);
    }

    #[test]
    fn export_rejects_zero_sized_surface() {
        let mut p = project();
        p.resize(0, 10);
        assert!(matches!(
            p.export_png(),
            Err(ExportError::InvalidGeometry { width: 0, height: 10 })
        ));
    }

    #[test]
    fn hex_colors_parse_and_print() {
        let c: HexColor = "#ff8000".parse().expect("rgb");
        assert_eq!(c.0, Color32::from_rgb(255, 128, 0));
        let c: HexColor = "#00000080".parse().expect("rgba");
        assert_eq!(c.0.to_srgba_unmultiplied()[3], 0x80);
        assert_eq!(String::from(HexColor(Color32::from_rgb(1, 2, 3))), "#010203");
        assert!("ff8000".parse::<HexColor>().is_err());
        assert!("#ff80".parse::<HexColor>().is_err());
        assert!("#gg0000".parse::<HexColor>().is_err());
    }

    #[test]
    fn events_deserialize_from_tagged_json() {
        let ev: InputEvent = serde_json::from_str(r##"{"type":"set_background","color":"#102030"}"##).expect("event");
        assert_eq!(
            ev,
            InputEvent::SetBackground {
                color: HexColor(Color32::from_rgb(0x10, 0x20, 0x30))
            }
        );
        let ev: InputEvent = serde_json::from_str(r#"{"type":"set_tool","tool":"circle"}"#).expect("event");
        assert_eq!(ev, InputEvent::SetTool { tool: Tool::Circle });
    }
}
