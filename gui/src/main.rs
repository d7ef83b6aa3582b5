use gtk4::prelude::*;
use gtk4::Application;
use log::info;

mod config;
mod context;
mod system;
mod ui;

use config::app_info;

fn main() {
    if let Err(e) = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
    {
        eprintln!("Failed to initialize logger: {}", e);
    }

    info!("Starting {} v{}", app_info::NAME, app_info::VERSION);
    info!("Application ID: {}", app_info::ID);

    let app = Application::builder().application_id(app_info::ID).build();

    app.connect_activate(ui::setup_application_ui);

    app.run();
}
