use std::collections::HashSet;
use std::time::Duration;

use chrono::Local;
use log::{error, info, warn};
use rand::Rng;

use crate::client::OmakaseClient;
use crate::config::Config;
use crate::models::{NotificationData, Restaurant, TimeSlot};
use crate::monitor::diff::DiffEngine;
use crate::notify::email::format_price;
use crate::notify::Notifier;
use crate::util::random_delay;

/// Drives the monitoring cycles: login once per cycle, then fetch, diff and
/// notify for each enabled restaurant in configured order, strictly
/// sequentially. One restaurant's failure never aborts the rest of the
/// cycle.
pub struct MonitorService<N: Notifier> {
    config: Config,
    diff: DiffEngine,
    notifier: N,
}

impl<N: Notifier> MonitorService<N> {
    pub fn new(config: Config, notifier: N) -> Self {
        info!(
            "MonitorService initialized with {} restaurants",
            config.restaurants.len()
        );
        Self {
            config,
            diff: DiffEngine::new(),
            notifier,
        }
    }

    /// Run cycles forever, sleeping a randomized interval in between.
    pub async fn run(&mut self) {
        if self.config.monitor.run_immediately {
            self.run_cycle().await;
        }
        loop {
            let wait = self.next_interval();
            info!("Next cycle in {}s", wait.as_secs());
            tokio::time::sleep(wait).await;
            self.run_cycle().await;
        }
    }

    fn next_interval(&self) -> Duration {
        let monitor = &self.config.monitor;
        let mut rng = rand::thread_rng();
        let minutes = rng.gen_range(monitor.interval_min..=monitor.interval_max);
        let jitter = rng.gen_range(0..=monitor.random_delay_max);
        Duration::from_secs(minutes * 60 + jitter)
    }

    /// One full pass over all enabled restaurants.
    pub async fn run_cycle(&mut self) {
        let client = match OmakaseClient::new() {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to build HTTP client: {}", e);
                return;
            }
        };
        self.run_cycle_with(&client).await;
    }

    pub async fn run_cycle_with(&mut self, client: &OmakaseClient) {
        info!("Starting monitoring cycle");

        let enabled: Vec<Restaurant> = self
            .config
            .restaurants
            .iter()
            .filter(|r| r.enabled)
            .cloned()
            .collect();
        if enabled.is_empty() {
            warn!("No enabled restaurants to monitor");
            return;
        }
        info!("Monitoring {} restaurants", enabled.len());

        // No session means no meaningful data: abort this cycle and let the
        // next scheduled one start over from the cookie file.
        if !client
            .login(&self.config.omakase.email, &self.config.omakase.password)
            .await
        {
            error!("Failed to login to omakase.in");
            return;
        }

        for restaurant in &enabled {
            self.check_restaurant(client, restaurant).await;
            // Space requests out to avoid upstream rate limiting
            random_delay(2.0, 5.0).await;
        }

        info!("Monitoring cycle completed");
    }

    async fn check_restaurant(&mut self, client: &OmakaseClient, restaurant: &Restaurant) {
        info!("Checking restaurant: {}", restaurant.name);

        let slots = match client.fetch_slots(&restaurant.slug).await {
            Ok(slots) => slots,
            Err(e) => {
                error!("Error monitoring restaurant {}: {}", restaurant.name, e);
                return;
            }
        };

        let Some(notification) = self.record_slots(restaurant, slots) else {
            return;
        };

        let recipient = self.config.notification.gmail.receiver_email.clone();
        if self.notifier.send(&recipient, &notification).await {
            info!(
                "Notification sent for {} ({} slots)",
                restaurant.name,
                notification.new_slots.len()
            );
        } else {
            // Not retried: the diff already counts these slots as seen, so
            // the next cycle stays quiet about them.
            error!("Failed to send notification for {}", restaurant.name);
        }
    }

    /// Feed one fetch result through the diff engine. Returns a payload
    /// only when genuinely new slots appeared.
    fn record_slots(
        &mut self,
        restaurant: &Restaurant,
        slots: Vec<TimeSlot>,
    ) -> Option<NotificationData> {
        if slots.is_empty() {
            info!("No available time slots for {}", restaurant.name);
            // Still overwrite the snapshot, so slots that reappear later
            // count as new instead of being suppressed by stale state
            self.diff.detect_new(&restaurant.slug, HashSet::new());
            return None;
        }

        info!("Found {} time slots for {}", slots.len(), restaurant.name);

        let new_slots = self
            .diff
            .detect_new(&restaurant.slug, slots.into_iter().collect());
        if new_slots.is_empty() {
            info!("No new time slots for {}", restaurant.name);
            return None;
        }

        let mut new_slots: Vec<TimeSlot> = new_slots.into_iter().collect();
        new_slots.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));

        info!(
            "Detected {} NEW time slots for {}!",
            new_slots.len(),
            restaurant.name
        );
        for slot in &new_slots {
            info!("  - {} {} ({})", slot.date, slot.time, format_price(slot.price));
        }

        Some(NotificationData {
            restaurant: restaurant.clone(),
            new_slots,
            timestamp: Local::now(),
        })
    }
}
