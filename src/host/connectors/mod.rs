// SPDX-License-Identifier: MIT

//! Relay-backed connector invoker
//!
//! Every vendor call is a JSON POST to a relay service that holds the
//! vendor SDKs: `/weather`, `/jira` and `/slack`.

pub mod chat;
pub mod client;
pub mod issues;
pub mod weather;

use async_trait::async_trait;

use crate::engine::error::{FlowError, UpstreamError};
use crate::engine::invoke::{ConnectorInvoker, ConnectorOutput, Invocation};

pub use client::{parse_relay_url, RelayClient, DEFAULT_RELAY_URL};

/// `ConnectorInvoker` that forwards invocations to the relay
#[derive(Clone)]
pub struct RelayInvoker {
    client: RelayClient,
}

impl RelayInvoker {
    pub fn new(client: RelayClient) -> Self {
        Self { client }
    }

    pub fn from_env() -> Result<Self, FlowError> {
        Ok(Self::new(RelayClient::from_env()?))
    }
}

#[async_trait]
impl ConnectorInvoker for RelayInvoker {
    async fn invoke(&self, invocation: Invocation) -> Result<ConnectorOutput, UpstreamError> {
        match &invocation {
            Invocation::Weather(query) => weather::get_weather(&self.client, query)
                .await
                .map(ConnectorOutput::Weather),
            Invocation::Issues(query) => issues::fetch_issues(&self.client, query)
                .await
                .map(ConnectorOutput::Issues),
            Invocation::Chat(message) => chat::send_message(&self.client, message)
                .await
                .map(ConnectorOutput::Delivery),
        }
    }
}
