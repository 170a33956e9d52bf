//! PhishStop Desktop — application entry.

mod app;

fn main() -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([900.0, 640.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        "PhishStop",
        options,
        Box::new(|cc| Box::new(app::PhishStopApp::new(cc))),
    )
}
