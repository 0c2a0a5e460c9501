#![cfg(not(tarpaulin_include))]

use env_logger::Env;
use salesdash::app;
use salesdash::config::Config;

/// Main entry point for the sales dashboard web service
///
/// Reads `SALESDASH_*` settings from the environment and serves the JSON API.
/// Log verbosity follows `RUST_LOG`, defaulting to `info`.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    app::run(config).await
}
