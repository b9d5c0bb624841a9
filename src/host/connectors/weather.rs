//! Weather lookups through the relay

use crate::engine::error::UpstreamError;
use crate::engine::invoke::{WeatherQuery, WeatherReport};

use super::client::RelayClient;

pub async fn get_weather(
    client: &RelayClient,
    query: &WeatherQuery,
) -> Result<WeatherReport, UpstreamError> {
    log::info!("Fetching weather for {}", query.city);
    client.post("weather", query).await
}
