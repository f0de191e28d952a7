#![windows_subsystem = "windows"]
#![forbid(unsafe_code)]

use client::content::ContentStore;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() {
    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    let _rt_guard = rt.enter();

    // Create the content store
    let content_store = ContentStore::default();
    content_store.create_req_dirs().expect("failed to create app dirs");

    let log_file = content_store.log_file();

    let term_logger = fmt::layer();
    let file_appender = tracing_appender::rolling::never(
        log_file.parent().expect("log file must have a parent dir"),
        log_file.file_name().expect("log file must have a name"),
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let file_logger = fmt::layer().with_ansi(false).with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info")))
        .with(term_logger)
        .with(file_logger)
        .init();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size(egui::vec2(1280.0, 720.0)),
        ..Default::default()
    };
    let result = eframe::run_native(
        "Colloquy",
        native_options,
        Box::new(move |cc| Box::new(colloquy::App::new(cc, content_store))),
    );
    if let Err(err) = result {
        eprintln!("failed to run app: {}", err);
    }
}
