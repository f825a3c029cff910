//! Shared HTTP plumbing for the API-backed channels.

use reqwest::{Client, RequestBuilder};
use tracing::debug;

use super::SendResult;
use crate::config::HttpConfig;
use crate::error::{ChannelError, NotifierError, Result};

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Build the client shared by every HTTP channel
pub fn build_client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| NotifierError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Send a prepared request and classify the response.
///
/// 2xx is success; transport failures and other statuses become a
/// [`ChannelError`] with the matching kind.
pub async fn execute(channel: &str, request: RequestBuilder) -> SendResult {
    let response = request
        .send()
        .await
        .map_err(|e| ChannelError::from_transport(&e))?;

    let status = response.status();
    if status.is_success() {
        debug!(channel, status = status.as_u16(), "Channel API accepted message");
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    let body = super::truncate_chars(&body, MAX_ERROR_BODY, "…");
    Err(ChannelError::from_status(status, &body))
}
