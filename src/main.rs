use dotenv::dotenv;
use tracing::{error, info, warn};

use fechou_backend::app::app::App;
use fechou_backend::util::logger::Logger;

#[tokio::main]
async fn main() {
    // Load .env before the logger reads RUST_LOG and the file levels
    let dotenv_result = dotenv();

    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let _logger = match Logger::new(&log_dir) {
        Ok(logger) => Some(logger),
        Err(e) => {
            eprintln!("Failed to initialise logging: {}", e);
            None
        }
    };

    info!("Starting Fechou! backend");
    match dotenv_result {
        Ok(_) => info!("Loaded .env file"),
        Err(e) => warn!("No .env file loaded: {} (using system env vars)", e),
    }

    let app = match App::new().await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start application: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = app.start().await {
        error!("Server stopped with error: {}", e);
        std::process::exit(1);
    }
}
