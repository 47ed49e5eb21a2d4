use log::{error, info};

use omakase_monitor::config::load_config;
use omakase_monitor::monitor::MonitorService;
use omakase_monitor::notify::EmailNotifier;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    init_logging();
    info!("Starting Omakase Monitor...");

    let config = match load_config("config.yaml") {
        Ok(config) => config,
        Err(e) => {
            error!("Fatal error: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Loaded configuration for {} restaurants",
        config.restaurants.len()
    );

    let notifier = EmailNotifier::new(&config.notification.gmail);
    let mut service = MonitorService::new(config, notifier);

    tokio::select! {
        _ = service.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down gracefully...");
        }
    }
}
