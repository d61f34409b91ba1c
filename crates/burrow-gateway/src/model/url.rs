use burrow_core::{Incoming, Output, UserUrls};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequestItem {
    pub correlation_id: String,
    pub original_url: String,
}

impl From<BatchRequestItem> for Incoming {
    fn from(item: BatchRequestItem) -> Self {
        Incoming::new(item.correlation_id, item.original_url)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponseItem {
    pub correlation_id: String,
    pub short_url: String,
}

impl From<Output> for BatchResponseItem {
    fn from(output: Output) -> Self {
        Self {
            correlation_id: output.correlation_id,
            short_url: output.short_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserUrlResponse {
    pub short_url: String,
    pub original_url: String,
}

impl From<UserUrls> for UserUrlResponse {
    fn from(urls: UserUrls) -> Self {
        Self {
            short_url: urls.short_url,
            original_url: urls.original_url,
        }
    }
}
