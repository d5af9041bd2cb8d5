use std::path::PathBuf;

use eframe::egui;
use egui::Color32;

use crate::canvas::ZoomConfig;
use crate::components::tools::SPRAY_DENSITY;

/// Per-user directory for the settings file and the session log.
/// On Linux:   ~/.config/sketchpad  (XDG_CONFIG_HOME respected)
/// On Windows: %APPDATA%\Sketchpad
/// On macOS:   ~/Library/Application Support/Sketchpad
pub(crate) fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let dir = std::env::var("APPDATA")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()
        .map(|base| PathBuf::from(base).join("Sketchpad"))?;
    #[cfg(target_os = "macos")]
    let dir = std::env::var("HOME").ok().map(|home| {
        PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("Sketchpad")
    })?;
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    let dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?
        .join("sketchpad");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Application settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Brush size in screen pixels
    pub brush_size: f32,
    pub foreground: Color32,
    pub background: Color32,
    /// Maximum number of frames kept in history (0 = unlimited)
    pub max_undo_steps: usize,
    /// History memory cap in MiB (0 = unlimited)
    pub max_history_mb: usize,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Scale multiplier per wheel notch towards the user
    pub zoom_in_factor: f32,
    pub zoom_out_factor: f32,
    /// Surface size for headless sessions (the GUI follows its panel size)
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Marks per spray move event
    pub spray_density: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            brush_size: 5.0,
            foreground: Color32::BLACK,
            background: Color32::WHITE,
            max_undo_steps: 0,
            max_history_mb: 256,
            min_zoom: 0.1,
            max_zoom: 10.0,
            zoom_in_factor: 1.1,
            zoom_out_factor: 0.9,
            canvas_width: 800,
            canvas_height: 800,
            spray_density: SPRAY_DENSITY,
        }
    }
}

impl AppSettings {
    /// Path to the settings file, inside [`config_dir`].
    pub(crate) fn settings_path() -> Option<PathBuf> {
        Some(config_dir()?.join("sketchpad_settings.cfg"))
    }

    /// Serialize a Color32 as "r,g,b,a"
    fn color_to_str(c: Color32) -> String {
        let [r, g, b, a] = c.to_srgba_unmultiplied();
        format!("{},{},{},{}", r, g, b, a)
    }

    /// Parse a Color32 from "r,g,b,a"
    fn str_to_color(s: &str) -> Option<Color32> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            let a = parts[3].trim().parse::<u8>().ok()?;
            Some(Color32::from_rgba_unmultiplied(r, g, b, a))
        } else {
            None
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "brush_size={}\n\
             foreground={}\n\
             background={}\n\
             max_undo_steps={}\n\
             max_history_mb={}\n\
             min_zoom={}\n\
             max_zoom={}\n\
             zoom_in_factor={}\n\
             zoom_out_factor={}\n\
             canvas_width={}\n\
             canvas_height={}\n\
             spray_density={}\n",
            self.brush_size,
            Self::color_to_str(self.foreground),
            Self::color_to_str(self.background),
            self.max_undo_steps,
            self.max_history_mb,
            self.min_zoom,
            self.max_zoom,
            self.zoom_in_factor,
            self.zoom_out_factor,
            self.canvas_width,
            self.canvas_height,
            self.spray_density,
        )
    }

    /// Parse `key=value` lines. Unknown keys and bad values keep their defaults.
    pub fn parse(content: &str) -> Self {
        let d = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "brush_size" => s.brush_size = val.parse().unwrap_or(d.brush_size),
                "foreground" => {
                    if let Some(c) = Self::str_to_color(val) { s.foreground = c; }
                }
                "background" => {
                    if let Some(c) = Self::str_to_color(val) { s.background = c; }
                }
                "max_undo_steps" => s.max_undo_steps = val.parse().unwrap_or(d.max_undo_steps),
                "max_history_mb" => s.max_history_mb = val.parse().unwrap_or(d.max_history_mb),
                "min_zoom" => s.min_zoom = val.parse().unwrap_or(d.min_zoom),
                "max_zoom" => s.max_zoom = val.parse().unwrap_or(d.max_zoom),
                "zoom_in_factor" => s.zoom_in_factor = val.parse().unwrap_or(d.zoom_in_factor),
                "zoom_out_factor" => s.zoom_out_factor = val.parse().unwrap_or(d.zoom_out_factor),
                "canvas_width" => s.canvas_width = val.parse().unwrap_or(d.canvas_width),
                "canvas_height" => s.canvas_height = val.parse().unwrap_or(d.canvas_height),
                "spray_density" => s.spray_density = val.parse().unwrap_or(d.spray_density),
                _ => {}
            }
        }
        s.sanitize();
        s
    }

    /// Pull nonsensical values back into range.
    fn sanitize(&mut self) {
        let d = Self::default();
        if !(self.brush_size.is_finite() && self.brush_size >= 1.0) {
            self.brush_size = d.brush_size;
        }
        let zoom_ok = self.min_zoom.is_finite()
            && self.max_zoom.is_finite()
            && self.min_zoom > 0.0
            && self.min_zoom <= self.max_zoom;
        if !zoom_ok {
            self.min_zoom = d.min_zoom;
            self.max_zoom = d.max_zoom;
        }
        if !(self.zoom_in_factor.is_finite() && self.zoom_in_factor > 1.0) {
            self.zoom_in_factor = d.zoom_in_factor;
        }
        if !(self.zoom_out_factor > 0.0 && self.zoom_out_factor < 1.0) {
            self.zoom_out_factor = d.zoom_out_factor;
        }
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            log_warn!("could not save settings to {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::parse(&content)
    }

    pub fn zoom_config(&self) -> ZoomConfig {
        ZoomConfig {
            min_scale: self.min_zoom,
            max_scale: self.max_zoom,
            zoom_in_factor: self.zoom_in_factor,
            zoom_out_factor: self.zoom_out_factor,
        }
    }

    pub fn max_history_depth(&self) -> Option<usize> {
        match self.max_undo_steps {
            0 => None,
            steps => Some(steps),
        }
    }

    pub fn max_history_bytes(&self) -> Option<usize> {
        match self.max_history_mb {
            0 => None,
            mb => Some(mb.saturating_mul(1024 * 1024)),
        }
    }
}
