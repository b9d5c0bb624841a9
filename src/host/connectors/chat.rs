//! Chat delivery through the relay

use serde::Deserialize;

use crate::engine::error::UpstreamError;
use crate::engine::invoke::ChatMessage;

use super::client::RelayClient;

#[derive(Debug, Deserialize)]
struct DeliveryResponse {
    detail: String,
}

pub async fn send_message(
    client: &RelayClient,
    message: &ChatMessage,
) -> Result<String, UpstreamError> {
    log::info!("Sending message to {}", message.channel);
    let response: DeliveryResponse = client.post("slack", message).await?;
    Ok(response.detail)
}
