use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::{error, info};

use crate::config::GmailSettings;
use crate::models::NotificationData;
use crate::notify::Notifier;

/// Sends new-slot notifications over SMTP (STARTTLS, app-password auth).
#[derive(Clone)]
pub struct EmailNotifier {
    smtp_server: String,
    smtp_port: u16,
    sender_email: String,
    app_password: String,
}

impl EmailNotifier {
    pub fn new(settings: &GmailSettings) -> Self {
        Self {
            smtp_server: settings.smtp_server.clone(),
            smtp_port: settings.smtp_port,
            sender_email: settings.sender_email.clone(),
            app_password: settings.app_password.clone(),
        }
    }

    fn send_sync(&self, recipient: &str, notification: &NotificationData) -> Result<(), String> {
        let subject = format!(
            "[Omakase] {} - New Reservations Available",
            notification.restaurant.name
        );
        let body = build_email_body(notification);

        let message = Message::builder()
            .from(
                self.sender_email
                    .parse()
                    .map_err(|e| format!("Invalid sender address: {}", e))?,
            )
            .to(recipient
                .parse()
                .map_err(|e| format!("Invalid recipient address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)
            .map_err(|e| format!("Failed to build message: {}", e))?;

        let mailer = SmtpTransport::starttls_relay(&self.smtp_server)
            .map_err(|e| format!("SMTP setup failed: {}", e))?
            .port(self.smtp_port)
            .credentials(Credentials::new(
                self.sender_email.clone(),
                self.app_password.clone(),
            ))
            .build();

        mailer
            .send(&message)
            .map_err(|e| format!("SMTP send failed: {}", e))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, recipient: &str, notification: &NotificationData) -> bool {
        let notifier = self.clone();
        let to = recipient.to_string();
        let payload = notification.clone();

        // SMTP is a blocking protocol; keep it off the async workers
        let result =
            tokio::task::spawn_blocking(move || notifier.send_sync(&to, &payload)).await;

        match result {
            Ok(Ok(())) => {
                info!("Notification sent successfully to {}", recipient);
                true
            }
            Ok(Err(e)) => {
                error!("Failed to send notification: {}", e);
                false
            }
            Err(e) => {
                error!("Notification task failed: {}", e);
                false
            }
        }
    }
}

/// "¥15,000" for a known price, "N/A" otherwise.
pub fn format_price(price: Option<u32>) -> String {
    match price {
        Some(price) => format!("¥{}", thousands(price)),
        None => "N/A".to_string(),
    }
}

fn thousands(n: u32) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render the notification as an HTML table. Every dynamic value is
/// escaped; booking links fall back to the restaurant detail page.
fn build_email_body(notification: &NotificationData) -> String {
    let restaurant_name = escape_html(&notification.restaurant.name);
    let detail_url = escape_html(&notification.restaurant.detail_url());

    let mut rows = String::new();
    for slot in &notification.new_slots {
        let link = escape_html(
            slot.booking_url
                .as_deref()
                .unwrap_or(&notification.restaurant.detail_url()),
        );
        rows.push_str(&format!(
            "<tr>\
             <td>{}</td>\
             <td>{}</td>\
             <td>{}</td>\
             <td><a href=\"{}\">Book Now</a></td>\
             </tr>\n",
            escape_html(&slot.date),
            escape_html(&slot.time),
            escape_html(&format_price(slot.price)),
            link,
        ));
    }

    format!(
        r#"<html>
<body>
    <h2>New Reservations Available: {restaurant_name}</h2>
    <p>Found {count} new time slot(s):</p>
    <table border="1" cellpadding="5" cellspacing="0">
        <tr><th>Date</th><th>Time</th><th>Price</th><th>Action</th></tr>
        {rows}
    </table>
    <p><a href="{detail_url}">View Restaurant Page</a></p>
    <p><small>Timestamp: {timestamp}</small></p>
</body>
</html>"#,
        restaurant_name = restaurant_name,
        count = notification.new_slots.len(),
        rows = rows,
        detail_url = detail_url,
        timestamp = notification.timestamp.format("%Y-%m-%d %H:%M:%S"),
    )
}
