//! Sketchpad: a freehand raster drawing surface with snapshot undo/redo,
//! pan/zoom, and PNG export. The GUI lives in [`app`]; everything else runs
//! headless.

#[macro_use]
pub mod logger;
pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod ops;
pub mod project;
pub mod settings;
