use reqwest::header::{HeaderMap, ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProbeError;
use crate::utils::{get_filename_from_disposition, get_filename_from_url};

/// What a metadata request tells about the remote resource.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResourceMetadata {
    pub size: u64,
    pub name: String,
    pub range_supported: bool,
}

/// Sends a HEAD request to `url` and reads size, file name and range support
/// from the response headers.
pub async fn probe(client: &Client, url: &str) -> Result<ResourceMetadata, ProbeError> {
    let response = client.head(url).send().await?;

    let status = response.status();
    if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
        return Err(ProbeError::Status(status));
    }

    let headers = response.headers();
    let size = content_length(headers)?;
    let range_supported = accepts_byte_ranges(headers);

    let name = match headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(get_filename_from_disposition)
    {
        Some(name) => name,
        None => get_filename_from_url(url).map_err(|source| ProbeError::InvalidUrl {
            url: url.to_string(),
            source,
        })?,
    };

    info!(url, size, name = %name, range_supported, "probed resource");

    Ok(ResourceMetadata {
        size,
        name,
        range_supported,
    })
}

fn content_length(headers: &HeaderMap) -> Result<u64, ProbeError> {
    let value = headers.get(CONTENT_LENGTH).ok_or(ProbeError::MissingLength)?;
    let text = value
        .to_str()
        .map_err(|_| ProbeError::InvalidLength(String::from_utf8_lossy(value.as_bytes()).into_owned()))?;
    text.trim()
        .parse()
        .map_err(|_| ProbeError::InvalidLength(text.to_string()))
}

fn accepts_byte_ranges(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_RANGES)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"))
}
