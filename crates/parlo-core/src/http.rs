//! Shared HTTP client.
//!
//! One client for the whole process so connection pools are reused across
//! acquisition attempts.

use once_cell::sync::Lazy;
use reqwest::Client;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("parlo/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
});

/// Get the process-wide HTTP client.
pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
