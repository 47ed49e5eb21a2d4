pub mod email;

pub use email::EmailNotifier;

use async_trait::async_trait;

use crate::models::NotificationData;

/// Notification transport. Reports success or failure synchronously; the
/// monitor never retries a failed send - by the time it could, the diff
/// state already counts the slots as seen.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, notification: &NotificationData) -> bool;
}
