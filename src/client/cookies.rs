use std::collections::HashMap;
use std::path::PathBuf;

use log::{error, info, warn};

/// Default location of the persisted session cookies.
pub const COOKIES_FILE: &str = "cookies.json";

/// File-backed cookie blob: an opaque name → value map stored as JSON.
///
/// Load and save are best-effort. A missing or corrupt file just means
/// "no prior session"; a failed write leaves the session memory-only.
pub struct CookieFile {
    path: PathBuf,
}

impl CookieFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> HashMap<String, String> {
        if !self.path.exists() {
            return HashMap::new();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(cookies) => {
                    info!("Loaded cookies from {}", self.path.display());
                    cookies
                }
                Err(e) => {
                    warn!("Failed to parse cookie file: {}", e);
                    HashMap::new()
                }
            },
            Err(e) => {
                warn!("Failed to read cookie file: {}", e);
                HashMap::new()
            }
        }
    }

    pub fn save(&self, cookies: &HashMap<String, String>) {
        let json = match serde_json::to_string(cookies) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize cookies: {}", e);
                return;
            }
        };
        match std::fs::write(&self.path, json) {
            Ok(()) => info!("Saved cookies to {}", self.path.display()),
            Err(e) => error!("Failed to save cookies: {}", e),
        }
    }
}
