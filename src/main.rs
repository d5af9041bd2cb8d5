use eframe::egui;
use sketchpad::app::SketchpadApp;
use sketchpad::settings::AppSettings;
use sketchpad::{cli, log_info, logger};

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let settings = AppSettings::load();
    log_info!(
        "settings loaded: brush {} / history depth {:?}, cap {:?} bytes",
        settings.brush_size,
        settings.max_history_depth(),
        settings.max_history_bytes()
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 768.0])
            .with_title("Sketchpad"),
        ..Default::default()
    };

    eframe::run_native(
        "Sketchpad",
        options,
        Box::new(move |cc| Box::new(SketchpadApp::new(cc, settings))),
    )
}
