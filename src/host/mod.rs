// SPDX-License-Identifier: MIT

//! Everything around the engine: the relay invoker, flow documents and the
//! HTTP server.

pub mod connectors;
pub mod loader;
pub mod server;
