use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::StatusCode;
use scraper::{Html, Selector};
use url::Url;

use crate::client::cookies::{CookieFile, COOKIES_FILE};
use crate::client::parser;
use crate::error::ClientError;
use crate::models::{TimeSlot, OMAKASE_BASE_URL};
use crate::retry::RetryPolicy;
use crate::util::random_delay;

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Authenticated HTTP session against omakase.in.
///
/// Owns the cookie jar exclusively: cookies are restored from disk at
/// construction and snapshotted back right after a successful login, so a
/// process restart does not force a fresh login.
pub struct OmakaseClient {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base_url: String,
    origin: Url,
    cookie_file: CookieFile,
    logged_in: AtomicBool,
    retry: RetryPolicy,
}

impl OmakaseClient {
    pub fn new() -> Result<Self, ClientError> {
        Self::with_base_url(OMAKASE_BASE_URL, COOKIES_FILE)
    }

    /// Build a client against an explicit base URL and cookie file.
    pub fn with_base_url(
        base_url: &str,
        cookie_path: impl Into<std::path::PathBuf>,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let origin = Url::parse(&base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ja,en-US;q=0.9,en;q=0.8"),
        );

        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        let client = Self {
            http,
            jar,
            base_url,
            origin,
            cookie_file: CookieFile::new(cookie_path),
            logged_in: AtomicBool::new(false),
            retry: RetryPolicy::new(3, 2.0),
        };
        client.restore_cookies();
        Ok(client)
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Relaxed)
    }

    // ── Auth ────────────────────────────────────────────────────────────

    /// Log in to omakase.in. Returns whether the session is authenticated;
    /// callers must check the result - a failed login is logged, not raised.
    ///
    /// A session restored from the cookie file short-circuits without any
    /// network round-trip. Otherwise the attempt (CSRF token fetch, jittered
    /// form POST) runs under the retry envelope, so transient network
    /// failures back off before the login is given up on.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        if self.is_logged_in() {
            info!("Using saved session");
            return true;
        }

        match self
            .retry
            .run("login", move || self.try_login(email, password))
            .await
        {
            Ok(true) => true,
            Ok(false) => false,
            Err(e) => {
                error!("Login failed: {}", e);
                false
            }
        }
    }

    async fn try_login(&self, email: &str, password: &str) -> Result<bool, ClientError> {
        info!("Attempting login for {}", email);

        let token = self.fetch_csrf_token().await?;

        // Mimic human behavior before submitting credentials
        random_delay(1.0, 2.0).await;

        let sign_in_url = format!("{}/users/sign_in", self.base_url);
        let form = [
            ("authenticity_token", token.as_str()),
            ("user[email]", email),
            ("user[password]", password),
            ("user[remember_me]", "1"),
            ("commit", "ログイン"),
        ];

        let response = self
            .http
            .post(&sign_in_url)
            .header(REFERER, sign_in_url.as_str())
            .form(&form)
            .send()
            .await?;

        let response = response.error_for_status()?;

        // A response that lands back on the sign-in page means the
        // credentials were rejected; that's an answer, not a failure to retry.
        if response.url().path().contains("/users/sign_in") {
            error!("Login failed: still on login page");
            return Ok(false);
        }

        self.persist_cookies();
        self.logged_in.store(true, Ordering::Relaxed);
        info!("Login successful");
        Ok(true)
    }

    // ── Slots ───────────────────────────────────────────────────────────

    /// Fetch available time slots for a restaurant.
    ///
    /// A 401 resets the session state so the next cycle's `login` call
    /// re-authenticates instead of short-circuiting. A body that is not
    /// valid JSON degrades to an empty list; other HTTP failures propagate
    /// once the retry envelope is exhausted.
    pub async fn fetch_slots(&self, slug: &str) -> Result<Vec<TimeSlot>, ClientError> {
        self.retry
            .run("fetch_slots", move || self.try_fetch_slots(slug))
            .await
    }

    async fn try_fetch_slots(&self, slug: &str) -> Result<Vec<TimeSlot>, ClientError> {
        if !self.is_logged_in() {
            warn!("Not logged in, time slots may not be available");
        }

        let api_url = format!(
            "{}/api/v1/omakase/r/{}/online_stock_groups",
            self.base_url, slug
        );
        debug!("Fetching time slots from {}", api_url);

        let response = self.http.get(&api_url).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            error!("Authentication required - login session may have expired");
            self.logged_in.store(false, Ordering::Relaxed);
            return Err(ClientError::SessionExpired);
        }
        let response = response.error_for_status()?;

        let body = response.text().await?;
        let value: serde_json::Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to parse JSON response: {}", e);
                return Ok(Vec::new());
            }
        };

        Ok(parser::parse_time_slots(&value))
    }

    async fn fetch_csrf_token(&self) -> Result<String, ClientError> {
        let response = self
            .http
            .get(format!("{}/users/sign_in", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;

        extract_csrf_token(&body).ok_or(ClientError::AuthTokenMissing)
    }

    // ── Cookie persistence ──────────────────────────────────────────────

    /// Seed the jar from the cookie file. Anything restored counts as a
    /// saved session; a 401 on the first fetch will correct an expired one.
    fn restore_cookies(&self) {
        let cookies = self.cookie_file.load();
        if cookies.is_empty() {
            return;
        }
        for (name, value) in &cookies {
            self.jar
                .add_cookie_str(&format!("{}={}", name, value), &self.origin);
        }
        self.logged_in.store(true, Ordering::Relaxed);
    }

    /// Snapshot the jar's cookies for the base origin into the cookie file.
    fn persist_cookies(&self) {
        let mut cookies = HashMap::new();
        if let Some(header) = self.jar.cookies(&self.origin) {
            if let Ok(joined) = header.to_str() {
                for pair in joined.split("; ") {
                    if let Some((name, value)) = pair.split_once('=') {
                        cookies.insert(name.to_string(), value.to_string());
                    }
                }
            }
        }
        self.cookie_file.save(&cookies);
    }
}

/// Pull the anti-forgery token out of the login page: the csrf-token meta
/// tag first, then the hidden authenticity_token form field.
fn extract_csrf_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let meta = Selector::parse(r#"meta[name="csrf-token"]"#).expect("static selector");
    if let Some(token) = document
        .select(&meta)
        .find_map(|el| el.value().attr("content"))
        .filter(|content| !content.is_empty())
    {
        return Some(token.to_string());
    }

    let input = Selector::parse(r#"input[name="authenticity_token"]"#).expect("static selector");
    if let Some(token) = document
        .select(&input)
        .find_map(|el| el.value().attr("value"))
        .filter(|value| !value.is_empty())
    {
        return Some(token.to_string());
    }

    error!("CSRF token not found in login page");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{any, body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOGIN_PAGE: &str = r#"
        <html><head>
            <meta name="csrf-token" content="tok-123" />
        </head><body>
            <form action="/users/sign_in" method="post">
                <input type="hidden" name="authenticity_token" value="tok-456" />
            </form>
        </body></html>
    "#;

    fn cookie_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
        dir.path().join("cookies.json")
    }

    #[test]
    fn test_extract_csrf_token_prefers_meta_tag() {
        assert_eq!(extract_csrf_token(LOGIN_PAGE).as_deref(), Some("tok-123"));
    }

    #[test]
    fn test_extract_csrf_token_falls_back_to_hidden_input() {
        let html = r#"
            <html><body>
                <input type="hidden" name="authenticity_token" value="tok-456" />
            </body></html>
        "#;
        assert_eq!(extract_csrf_token(html).as_deref(), Some("tok-456"));
    }

    #[test]
    fn test_extract_csrf_token_rejects_empty_and_missing() {
        let html = r#"<html><head><meta name="csrf-token" content="" /></head></html>"#;
        assert_eq!(extract_csrf_token(html), None);
        assert_eq!(extract_csrf_token("<html></html>"), None);
    }

    #[tokio::test]
    async fn test_login_success_persists_cookies() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let cookies = cookie_path(&dir);

        Mock::given(method("GET"))
            .and(path("/users/sign_in"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/sign_in"))
            .and(body_string_contains("authenticity_token=tok-123"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "/home")
                    .insert_header("set-cookie", "_omakase_session=abc123; Path=/"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/home"))
            .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OmakaseClient::with_base_url(&server.uri(), &cookies).unwrap();
        assert!(!client.is_logged_in());
        assert!(client.login("user@example.com", "hunter2").await);
        assert!(client.is_logged_in());

        let saved = CookieFile::new(&cookies).load();
        assert_eq!(saved.get("_omakase_session").map(String::as_str), Some("abc123"));
    }

    #[tokio::test]
    async fn test_login_rejected_credentials_not_retried() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/users/sign_in"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .expect(1)
            .mount(&server)
            .await;
        // 200 staying on the sign-in page signals rejected credentials
        Mock::given(method("POST"))
            .and(path("/users/sign_in"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            OmakaseClient::with_base_url(&server.uri(), cookie_path(&dir)).unwrap();
        assert!(!client.login("user@example.com", "wrong").await);
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_login_without_csrf_token_fails() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/users/sign_in"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client =
            OmakaseClient::with_base_url(&server.uri(), cookie_path(&dir)).unwrap();
        assert!(!client.login("user@example.com", "hunter2").await);
    }

    #[tokio::test]
    async fn test_saved_session_skips_network_entirely() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let cookies = cookie_path(&dir);
        std::fs::write(&cookies, r#"{"_omakase_session":"abc123"}"#).unwrap();

        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = OmakaseClient::with_base_url(&server.uri(), &cookies).unwrap();
        assert!(client.is_logged_in());
        assert!(client.login("user@example.com", "hunter2").await);
        assert!(client.login("user@example.com", "hunter2").await);
    }

    #[tokio::test]
    async fn test_fetch_slots_parses_grouped_response() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let cookies = cookie_path(&dir);
        std::fs::write(&cookies, r#"{"_omakase_session":"abc123"}"#).unwrap();

        Mock::given(method("GET"))
            .and(path("/api/v1/omakase/r/bu286225/online_stock_groups"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"2026-02-15": [{"time": "19:00", "price": 15000}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = OmakaseClient::with_base_url(&server.uri(), &cookies).unwrap();
        let slots = client.fetch_slots("bu286225").await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].date, "2026-02-15");
        assert_eq!(slots[0].time, "19:00");
        assert_eq!(slots[0].price, Some(15000));
    }

    #[tokio::test]
    async fn test_fetch_slots_sends_saved_cookie() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let cookies = cookie_path(&dir);
        std::fs::write(&cookies, r#"{"_omakase_session":"abc123"}"#).unwrap();

        Mock::given(method("GET"))
            .and(path("/api/v1/omakase/r/bu286225/online_stock_groups"))
            .and(wiremock::matchers::header("cookie", "_omakase_session=abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let client = OmakaseClient::with_base_url(&server.uri(), &cookies).unwrap();
        assert!(client.fetch_slots("bu286225").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_slots_on_401_resets_session_state() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let cookies = cookie_path(&dir);
        std::fs::write(&cookies, r#"{"_omakase_session":"stale"}"#).unwrap();

        Mock::given(method("GET"))
            .and(path("/api/v1/omakase/r/bu286225/online_stock_groups"))
            .respond_with(ResponseTemplate::new(401))
            .expect(3)
            .mount(&server)
            .await;

        let client = OmakaseClient::with_base_url(&server.uri(), &cookies).unwrap();
        assert!(client.is_logged_in());

        let err = client.fetch_slots("bu286225").await.unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired));
        assert!(!client.is_logged_in());
    }

    #[tokio::test]
    async fn test_fetch_slots_malformed_json_degrades_to_empty() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path("/api/v1/omakase/r/bu286225/online_stock_groups"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            OmakaseClient::with_base_url(&server.uri(), cookie_path(&dir)).unwrap();
        assert!(client.fetch_slots("bu286225").await.unwrap().is_empty());
    }
}
