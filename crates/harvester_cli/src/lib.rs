//! Command-line front end: argument parsing, RON configuration and logger setup.
pub mod app;
pub mod args;
pub mod config;
pub mod logging;

pub use app::run;
pub use args::Args;
pub use config::AppConfig;
