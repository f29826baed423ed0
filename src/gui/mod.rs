pub mod application;
pub mod gauges;
pub mod style;
pub mod types;
