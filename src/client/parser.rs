//! Normalizes omakase.in slot-listing responses.
//!
//! The upstream API's shape has never been contractually fixed, so the
//! parser tolerates three top-level layouts (flat list, grouped-by-date
//! object, wrapper object) and several alternate field names per logical
//! field, degrading to partial or empty results instead of erroring.

use chrono::{NaiveDate, NaiveTime};
use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::models::TimeSlot;

/// Accepted field names per logical slot field, checked in order.
/// First match wins. Extend these once the live schema is confirmed.
pub const DATE_KEYS: [&str; 4] = ["date", "day", "booking_date", "reservation_date"];
pub const TIME_KEYS: [&str; 4] = ["time", "start_time", "booking_time", "reservation_time"];
pub const PRICE_KEYS: [&str; 4] = ["price", "amount", "cost", "price_amount"];
pub const URL_KEYS: [&str; 5] = ["booking_url", "url", "link", "reservation_url", "booking_link"];
pub const SEAT_KEYS: [&str; 4] = ["available_seats", "seats", "capacity", "available"];

/// Wrapper object keys that may hold the real slot data.
pub const WRAPPER_KEYS: [&str; 5] = [
    "slots",
    "data",
    "time_slots",
    "availability",
    "online_stock_groups",
];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d", "%d-%m-%Y", "%d/%m/%Y"];
const TIME_FORMATS: [&str; 4] = ["%H:%M", "%H:%M:%S", "%I:%M %p", "%H%M"];

/// Top-level response layout, decided by inspection order:
/// null, then array, then wrapper-key scan, then grouped-by-date fallback.
enum Shape<'a> {
    Empty,
    FlatList(&'a [Value]),
    Wrapped(&'a str, Wrapped<'a>),
    GroupedByDate(&'a Map<String, Value>),
    Unrecognized,
}

enum Wrapped<'a> {
    List(&'a [Value]),
    Grouped(&'a Map<String, Value>),
}

fn classify(response: &Value) -> Shape<'_> {
    match response {
        Value::Null => Shape::Empty,
        Value::Array(items) => Shape::FlatList(items),
        Value::Object(map) => {
            // First wrapper key holding a container wins; scalar values
            // under a wrapper key don't stop the scan
            for key in WRAPPER_KEYS {
                match map.get(key) {
                    Some(Value::Array(items)) => return Shape::Wrapped(key, Wrapped::List(items)),
                    Some(Value::Object(grouped)) => {
                        return Shape::Wrapped(key, Wrapped::Grouped(grouped))
                    }
                    _ => {}
                }
            }
            Shape::GroupedByDate(map)
        }
        _ => Shape::Unrecognized,
    }
}

/// Parse time slots out of an API response of any recognized shape.
/// Never fails: unrecognized or malformed content yields an empty list.
pub fn parse_time_slots(response: &Value) -> Vec<TimeSlot> {
    match classify(response) {
        Shape::Empty => {
            info!("API response is empty - no time slots available");
            Vec::new()
        }
        Shape::FlatList(items) => parse_slot_list(items),
        Shape::Wrapped(key, inner) => {
            debug!("Slot data found under wrapper key '{}'", key);
            match inner {
                Wrapped::List(items) => parse_slot_list(items),
                Wrapped::Grouped(grouped) => parse_grouped_slots(grouped),
            }
        }
        Shape::GroupedByDate(map) => parse_grouped_slots(map),
        Shape::Unrecognized => {
            warn!("Unexpected API response shape: {:?}", response);
            Vec::new()
        }
    }
}

fn parse_slot_list(items: &[Value]) -> Vec<TimeSlot> {
    let mut slots = Vec::new();

    for item in items {
        let Some(obj) = item.as_object() else {
            warn!("Skipping non-object slot: {}", item);
            continue;
        };
        if let Some(slot) = parse_single_slot(obj, None) {
            slots.push(slot);
        }
    }

    info!("Parsed {} time slots from list", slots.len());
    slots
}

fn parse_grouped_slots(grouped: &Map<String, Value>) -> Vec<TimeSlot> {
    let mut slots = Vec::new();

    for (date_key, entries) in grouped {
        if !looks_like_date(date_key) {
            debug!("Skipping non-date key: {}", date_key);
            continue;
        }
        let Some(entries) = entries.as_array() else {
            warn!("Expected list for date {}, got {}", date_key, entries);
            continue;
        };
        for entry in entries {
            let Some(obj) = entry.as_object() else {
                continue;
            };
            if let Some(slot) = parse_single_slot(obj, Some(date_key)) {
                slots.push(slot);
            }
        }
    }

    info!("Parsed {} time slots from grouped data", slots.len());
    slots
}

/// Parse one slot object. `date_from_key` carries the group key in
/// grouped-by-date responses; an explicit `date` field always wins over it,
/// and the group key wins over the remaining date aliases.
fn parse_single_slot(obj: &Map<String, Value>, date_from_key: Option<&str>) -> Option<TimeSlot> {
    let raw_date = match (obj.get("date"), date_from_key) {
        (Some(value), _) => Some(value_as_string(value)),
        (None, Some(key)) => Some(key.to_string()),
        (None, None) => lookup_string(obj, &DATE_KEYS),
    };
    let raw_time = lookup_string(obj, &TIME_KEYS);

    let (Some(raw_date), Some(raw_time)) = (raw_date, raw_time) else {
        debug!("Missing required fields (date/time) in slot: {:?}", obj);
        return None;
    };

    Some(TimeSlot {
        date: normalize_date(&raw_date),
        time: normalize_time(&raw_time),
        price: lookup_u32(obj, &PRICE_KEYS),
        booking_url: lookup_string(obj, &URL_KEYS),
        available_seats: lookup_u32(obj, &SEAT_KEYS),
    })
}

fn lookup_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| obj.get(*key))
        .map(value_as_string)
}

/// First key whose value coerces to a non-negative integer wins; values that
/// fail coercion are treated as absent and the scan moves on.
fn lookup_u32(obj: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(coerce_u32)
}

fn coerce_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            let as_u64 = n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))?;
            u32::try_from(as_u64).ok()
        }
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Normalize a date to YYYY-MM-DD. Unparseable input passes through
/// unchanged with a warning - a sign the upstream contract may have drifted.
fn normalize_date(raw: &str) -> String {
    let s = raw.trim();

    // Already in canonical form
    let bytes = s.as_bytes();
    if bytes.len() == 10 && bytes[4] == b'-' && bytes[7] == b'-' {
        return s.to_string();
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    warn!("Could not normalize date: {}", s);
    s.to_string()
}

/// Normalize a time to 24-hour HH:MM, truncating seconds.
fn normalize_time(raw: &str) -> String {
    let s = raw.trim();

    let bytes = s.as_bytes();
    if bytes.len() == 5 && bytes[2] == b':' {
        return s.to_string();
    }
    // HH:MM:SS -> HH:MM
    if bytes.len() == 8 && bytes[2] == b':' && bytes[5] == b':' {
        return s[..5].to_string();
    }

    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(s, format) {
            return time.format("%H:%M").to_string();
        }
    }

    warn!("Could not normalize time: {}", s);
    s.to_string()
}

/// Heuristic check that a grouped-response key is a date and not some
/// unrelated metadata field.
fn looks_like_date(s: &str) -> bool {
    if !s.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let separators = ['-', '/', '年', '月', '日'];
    s.chars().any(|c| separators.contains(&c)) || s.chars().all(|c| c.is_ascii_digit())
}
