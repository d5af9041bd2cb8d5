use eframe::egui;
use egui::{Color32, ColorImage, Pos2, Rect, TextureOptions, Vec2};

use crate::components::tools::Tool;
use crate::io;
use crate::project::{HexColor, InputEvent, Project};
use crate::settings::AppSettings;

/// Desktop front end: a toolbar over one drawing surface.
pub struct SketchpadApp {
    project: Project,
    settings: AppSettings,
    untitled_counter: usize,
    /// Uploaded copy of `Project::render()`.
    texture: Option<egui::TextureHandle>,
    /// True between a primary press on the surface and its release/leave.
    gesture_active: bool,
    /// Background picked in the color popup, committed once the popup closes.
    pending_background: Option<Color32>,
    status: Option<String>,
}

impl SketchpadApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: AppSettings) -> Self {
        let project = Project::new_untitled(
            1,
            settings.canvas_width,
            settings.canvas_height,
            &settings,
        );
        Self {
            project,
            settings,
            untitled_counter: 1,
            texture: None,
            gesture_active: false,
            pending_background: None,
            status: None,
        }
    }

    fn new_drawing(&mut self) {
        self.untitled_counter += 1;
        self.project = Project::new_untitled(
            self.untitled_counter,
            self.project.width(),
            self.project.height(),
            &self.settings,
        );
        self.texture = None;
        self.status = None;
    }

    fn export(&mut self) {
        let Some(path) = io::pick_export_path() else { return };
        match io::write_png(&self.project.render(), &path) {
            Ok(()) => {
                log_info!("exported {}", path.display());
                if let Some(name) = path.file_name() {
                    self.project.name = name.to_string_lossy().into_owned();
                }
                self.project.mark_clean();
                self.status = Some(format!("Exported {}", path.display()));
            }
            Err(e) => {
                log_err!("export to {} failed: {}", path.display(), e);
                self.status = Some(format!("Export failed: {}", e));
            }
        }
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (undo, redo) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            let undo = cmd && !i.modifiers.shift && i.key_pressed(egui::Key::Z);
            let redo = cmd
                && ((i.modifiers.shift && i.key_pressed(egui::Key::Z)) || i.key_pressed(egui::Key::Y));
            (undo, redo)
        });
        if undo {
            self.project.handle(InputEvent::Undo);
        }
        if redo {
            self.project.handle(InputEvent::Redo);
        }
    }

    fn show_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            let current = self.project.properties().tool;
            for tool in Tool::all() {
                if ui.selectable_label(current == *tool, tool.label()).clicked() {
                    self.project.handle(InputEvent::SetTool { tool: *tool });
                }
            }
            ui.separator();

            let mut foreground = self.project.properties().foreground;
            ui.label("Color");
            if ui.color_edit_button_srgba(&mut foreground).changed() {
                self.project.handle(InputEvent::SetForeground {
                    color: HexColor(foreground),
                });
            }

            let background = self
                .pending_background
                .unwrap_or(self.project.properties().background);
            let mut rgb = [background.r(), background.g(), background.b()];
            ui.label("Background");
            if ui.color_edit_button_srgb(&mut rgb).changed() {
                self.pending_background = Some(Color32::from_rgb(rgb[0], rgb[1], rgb[2]));
            }

            let mut size = self.project.properties().brush_size;
            if ui
                .add(egui::Slider::new(&mut size, 1.0..=100.0).text("Size"))
                .changed()
            {
                self.project.handle(InputEvent::SetBrushSize { size });
            }
            ui.separator();

            if ui
                .add_enabled(self.project.can_undo(), egui::Button::new("Undo"))
                .clicked()
            {
                self.project.handle(InputEvent::Undo);
            }
            if ui
                .add_enabled(self.project.can_redo(), egui::Button::new("Redo"))
                .clicked()
            {
                self.project.handle(InputEvent::Redo);
            }
            if ui.button("Clear").clicked() {
                self.project.handle(InputEvent::Clear);
            }
            if ui.button("New").clicked() {
                self.new_drawing();
            }
            if ui.button("Export PNG").clicked() {
                self.export();
            }
            ui.separator();

            let zoom = self.project.view().scale;
            if ui
                .button(format!("{:.0}%", zoom * 100.0))
                .on_hover_text("Reset view")
                .clicked()
            {
                self.project.reset_view();
            }
        });

        // The color popup reports every drag step; commit once when it closes.
        if let Some(color) = self.pending_background
            && !ui.memory(|m| m.any_popup_open())
        {
            self.pending_background = None;
            self.project.handle(InputEvent::SetBackground {
                color: HexColor(color),
            });
        }
    }

    fn show_status(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let history = self.project.history();
            ui.label(format!(
                "{}  |  {}×{}  |  Undo: {} | Redo: {}  |  {:.1} MB",
                self.project.display_title(),
                self.project.width(),
                self.project.height(),
                history.undo_count(),
                history.redo_count(),
                history.memory_usage() as f64 / (1024.0 * 1024.0),
            ));
            if let Some(status) = &self.status {
                ui.separator();
                ui.label(status);
            }
        });
    }

    fn show_surface(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_size();
        let (response, painter) = ui.allocate_painter(available, egui::Sense::click_and_drag());
        let rect = response.rect;

        let width = rect.width().max(0.0).floor() as u32;
        let height = rect.height().max(0.0).floor() as u32;
        if (width, height) != (self.project.width(), self.project.height()) {
            self.gesture_active = false;
            self.project.handle(InputEvent::Resize { width, height });
        }

        self.feed_pointer(ui, rect);

        if width == 0 || height == 0 {
            return;
        }

        if self.project.take_repaint() || self.texture.is_none() {
            let rendered = self.project.render();
            let image = ColorImage::from_rgba_unmultiplied(
                [rendered.width() as usize, rendered.height() as usize],
                rendered.as_raw(),
            );
            match &mut self.texture {
                Some(texture) => texture.set(image, TextureOptions::NEAREST),
                None => {
                    self.texture = Some(ui.ctx().load_texture(
                        "sketchpad_surface",
                        image,
                        TextureOptions::NEAREST,
                    ))
                }
            }
        }

        if let Some(texture) = &self.texture {
            let size = texture.size_vec2();
            painter.image(
                texture.id(),
                Rect::from_min_size(rect.min, size),
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                Color32::WHITE,
            );
        }
    }

    /// Translate this frame's pointer state into surface-local events.
    fn feed_pointer(&mut self, ui: &egui::Ui, rect: Rect) {
        let (hover, pressed, released, delta, scroll) = ui.input(|i| {
            (
                i.pointer.hover_pos(),
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.delta(),
                i.scroll_delta.y,
            )
        });
        let local = |p: Pos2| p - rect.min.to_vec2();
        let inside = hover.filter(|p| rect.contains(*p));

        if pressed && let Some(p) = inside {
            let p = local(p);
            self.project.handle(InputEvent::PointerDown { x: p.x, y: p.y });
            self.gesture_active = true;
        }

        if self.gesture_active {
            match inside {
                Some(p) => {
                    if delta != Vec2::ZERO {
                        let p = local(p);
                        self.project.handle(InputEvent::PointerMove { x: p.x, y: p.y });
                    }
                    if released {
                        self.project.handle(InputEvent::PointerUp);
                        self.gesture_active = false;
                    }
                }
                None => {
                    self.project.handle(InputEvent::PointerLeave);
                    self.gesture_active = false;
                }
            }
        }

        // egui reports scrolling up as positive; wheel events use DOM sign.
        if scroll != 0.0 && let Some(p) = inside {
            let p = local(p);
            self.project.handle(InputEvent::Wheel {
                x: p.x,
                y: p.y,
                delta_y: -scroll,
            });
        }
    }
}

impl eframe::App for SketchpadApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
            "Sketchpad - {}",
            self.project.display_title()
        )));

        self.handle_shortcuts(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.show_toolbar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.show_status(ui));
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| self.show_surface(ui));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.settings.brush_size = self.project.properties().brush_size;
        self.settings.foreground = self.project.properties().foreground;
        self.settings.background = self.project.properties().background;
        self.settings.save();
        log_info!("session closed");
    }
}
