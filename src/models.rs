use std::hash::{Hash, Hasher};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Base URL for omakase.in.
/// Override at build time: OMAKASE_BASE_URL=https://example.com cargo build
pub const OMAKASE_BASE_URL: &str = match option_env!("OMAKASE_BASE_URL") {
    Some(url) => url,
    None => "https://omakase.in",
};

/// A single bookable reservation opportunity at a restaurant.
///
/// Identity is `(date, time)` only: a slot whose price or seat count changed
/// between polls is still the same slot and must not be re-notified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Calendar date, normalized to YYYY-MM-DD.
    pub date: String,
    /// Time of day, normalized to 24-hour HH:MM.
    pub time: String,
    /// Price in JPY.
    pub price: Option<u32>,
    pub booking_url: Option<String>,
    pub available_seats: Option<u32>,
}

impl PartialEq for TimeSlot {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date && self.time == other.time
    }
}

impl Eq for TimeSlot {}

impl Hash for TimeSlot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.date.hash(state);
        self.time.hash(state);
    }
}

/// A monitored restaurant. Deserializes straight out of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub name: String,
    /// URL slug on omakase.in (e.g. "bu286225").
    pub slug: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Restaurant {
    /// Full restaurant detail page URL.
    pub fn detail_url(&self) -> String {
        format!("{}/ja/r/{}", OMAKASE_BASE_URL, self.slug)
    }
}

/// Payload handed to the notifier when new slots appear.
#[derive(Debug, Clone)]
pub struct NotificationData {
    pub restaurant: Restaurant,
    /// Newly detected slots, sorted by (date, time).
    pub new_slots: Vec<TimeSlot>,
    pub timestamp: DateTime<Local>,
}
