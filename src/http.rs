//! Outbound HTTP shared by the adapters.
//!
//! One [`reqwest::Client`] is built per run and cloned into every source task.
//! [`fetch_text`] turns a request into a body string or a [`FetchError`]; it is
//! the only place that looks at status codes and empty bodies, so adapters
//! never touch a response that failed.

use crate::errors::FetchError;
use crate::utils::truncate_for_log;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, instrument};

/// Browser-like headers the HTML sources need to render a localized page.
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("pt-BR,pt;q=0.9"));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9"),
    );
    headers
}

/// Build the client shared by all sources.
pub fn build_client(timeout: Duration) -> Result<Client, FetchError> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Send `request` once and return its body.
///
/// Non-2xx statuses and blank bodies are errors.
#[instrument(level = "debug", skip_all)]
pub async fn fetch_text(request: RequestBuilder) -> Result<String, FetchError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() { FetchError::Timeout } else { FetchError::Http(e) }
    })?;

    let status = response.status();
    let url = response.url().to_string();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url,
        });
    }

    let body = response.text().await?;
    if body.trim().is_empty() {
        return Err(FetchError::EmptyBody);
    }
    debug!(%url, bytes = body.len(), preview = %truncate_for_log(&body, 200), "Fetched body");
    Ok(body)
}
