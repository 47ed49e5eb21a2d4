use std::time::Duration;

use log::debug;
use rand::Rng;

/// Sleep a random amount of time to avoid predictable request timing.
pub async fn random_delay(min_seconds: f64, max_seconds: f64) {
    let delay = rand::thread_rng().gen_range(min_seconds..max_seconds);
    debug!("Random delay: {:.2}s", delay);
    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
}
