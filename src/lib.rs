use std::env;
use std::str::FromStr;
use crate::gui::application::run_application;
use crate::error::AppRunError;

pub mod config;
pub mod device;
pub mod error;
pub mod gui;
pub mod pipeline;

pub fn init_logging() {
    let level = env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| log::LevelFilter::from_str(&level).ok())
        .unwrap_or(log::LevelFilter::Info);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

pub fn run(mut _args: env::Args) -> Result<(), AppRunError> {
    run_application()?;
    Ok(())
}
