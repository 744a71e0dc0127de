//! Reading named sources from disk or over HTTP.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use tracing::debug;

use crate::error::{AnalyticsError, Result};

/// `true` when `source` names an HTTP(S) resource rather than a local path.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Downloads `url` with `client`. Any transport failure or non-success
/// status means the source could not be found.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let parsed = url
        .parse()
        .map_err(|_| AnalyticsError::ParseError(format!("invalid url: {url}")))?;
    let req = reqwest::Request::new(reqwest::Method::GET, parsed);

    let resp = client
        .execute(req)
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| {
            debug!(url, error = %e, "Fetch failed");
            AnalyticsError::not_found(url)
        })?;

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| AnalyticsError::ParseError(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Loads raw bytes from a local file path or fetches them over HTTP.
#[tracing::instrument(fields(source = %source))]
pub async fn read_source(source: &str) -> Result<Vec<u8>> {
    if is_remote(source) {
        let client = BasicClient::new();
        return fetch_bytes(&client, source).await;
    }
    tokio::fs::read(source)
        .await
        .map_err(|_| AnalyticsError::not_found(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/pricing.csv"));
        assert!(is_remote("http://localhost:8000/delays.csv"));
        assert!(!is_remote("data/pricing.csv"));
        assert!(!is_remote("httpdata.csv"));
    }

    #[tokio::test]
    async fn test_read_source_local_file() {
        let path = format!("{}/getaround_fetch_local.csv", env::temp_dir().display());
        fs::write(&path, "a,b\n1,2\n").unwrap();

        let bytes = read_source(&path).await.unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_read_source_missing_file() {
        let path = format!("{}/getaround_fetch_missing.csv", env::temp_dir().display());
        let err = read_source(&path).await.unwrap_err();
        assert_eq!(err.kind(), "source_not_found");
    }
}
