use std::env;
use log::info;
use msgbox::IconType;
use hm10_force_gauge::{init_logging, run};
use hm10_force_gauge::error::{error_msgbox, AppRunError, ConfigError};

fn main() -> Result<(), AppRunError> {
    init_logging();
    info!(concat!("HM10 Force Gauge ", env!("CARGO_PKG_VERSION")));

    let args = env::args();

    match run(args) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            msgbox::create(
                concat!("HM10 Force Gauge ", env!("CARGO_PKG_VERSION")),
                "This application has already been started",
                IconType::Error,
            ).expect("Could not create msgbox");
            Ok(())
        },
        Err(err) => {
            error_msgbox("Unexpected error", &err);
            Err(err)
        }
        Ok(_) => Ok(())
    }
}
