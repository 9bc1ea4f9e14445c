use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

use super::error::{DownloadError, QueryError};
use super::logger::Logger;

/// User-agent string derived from Cargo.toml version at compile time.
pub const APP_USER_AGENT: &str = concat!("selfupdater/", env!("CARGO_PKG_VERSION"));

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Client used by the query and download paths. Redirects are handled by
/// [`get_with_one_redirect`], so reqwest must not follow them on its own.
pub fn create_http_client() -> reqwest::Result<Client> {
    build_http_client(APP_USER_AGENT)
}

pub fn build_http_client(user_agent: &str) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(READ_TIMEOUT)
        .tcp_nodelay(true)
        .build()
}

pub fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
    )
}

pub fn status_message(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Unknown").to_string()
}

#[derive(Debug)]
pub enum FetchError {
    Connect { url: String, message: String },
    Status { code: u16, message: String },
    BadLocation { url: String, reason: String },
    TooManyRedirects(String),
}

impl From<FetchError> for QueryError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Connect { url, message } => {
                QueryError::ConnectionFailed(format!("{}: {}", url, message))
            }
            FetchError::Status { code, message } => QueryError::HttpStatus { code, message },
            FetchError::BadLocation { url, reason } => QueryError::InvalidUrl { url, reason },
            FetchError::TooManyRedirects(url) => QueryError::TooManyRedirects(url),
        }
    }
}

impl From<FetchError> for DownloadError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Connect { url, message } => DownloadError::ConnectionFailed { url, message },
            FetchError::Status { code, message } => DownloadError::Http { code, message },
            FetchError::BadLocation { url, reason } => DownloadError::InvalidUrl { url, reason },
            FetchError::TooManyRedirects(url) => DownloadError::TooManyRedirects(url),
        }
    }
}

async fn send_get(client: &Client, url: &Url) -> Result<Response, FetchError> {
    client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| FetchError::Connect {
            url: url.to_string(),
            message: e.to_string(),
        })
}

/// Resolve a `Location` header against the URL that produced it.
pub fn resolve_location(base: &Url, location: &str) -> Result<Url, FetchError> {
    base.join(location).map_err(|e| FetchError::BadLocation {
        url: location.to_string(),
        reason: e.to_string(),
    })
}

/// GET `url`, following at most one 301/302/303 hop. The `query` pairs are
/// appended to the redirect target. Anything other than 200 on the final
/// response is an error; a redirect answered by another redirect is
/// `TooManyRedirects`.
pub async fn get_with_one_redirect(
    client: &Client,
    url: &Url,
    query: &[(&str, &str)],
    logger: &dyn Logger,
) -> Result<Response, FetchError> {
    let response = send_get(client, url).await?;
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }
    if !is_redirect(status) {
        return Err(FetchError::Status {
            code: status.as_u16(),
            message: status_message(status),
        });
    }

    logger.info(&format!("HTTP {} - {}", status.as_u16(), status_message(status)));

    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| FetchError::BadLocation {
            url: url.to_string(),
            reason: "redirect without Location header".to_string(),
        })?
        .to_string();

    let mut target = resolve_location(url, &location)?;
    if !query.is_empty() {
        let mut pairs = target.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    logger.info(&format!("New URL: {}", target));

    let response = send_get(client, &target).await?;
    let status = response.status();
    if status == StatusCode::OK {
        Ok(response)
    } else if is_redirect(status) {
        Err(FetchError::TooManyRedirects(target.to_string()))
    } else {
        Err(FetchError::Status {
            code: status.as_u16(),
            message: status_message(status),
        })
    }
}
