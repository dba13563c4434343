//! Redirect payment-gateway adapter for the Platron processor.
//!
//! The crate covers the full adapter lifecycle: signed payment initiation,
//! the server-to-server result callback, buyer redirect returns reconciled
//! against status polls, and the host-facing payment-method facade.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

pub mod callback;
pub mod client;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod fees;
pub mod handlers;
pub mod orders;
pub mod processor;
pub mod signature;
pub mod state_machine;

use callback::CallbackProcessor;
use client::GatewayClient;
use config::AppConfig;
use errors::GatewayError;
use orders::OrderService;
use processor::PlatronProcessor;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orders: Arc<dyn OrderService>,
    pub client: Arc<GatewayClient>,
    pub callback: Arc<CallbackProcessor>,
    pub processor: Arc<PlatronProcessor>,
}

impl AppState {
    /// Assemble the adapter around a host order service. Fails when the
    /// merchant credentials are missing.
    pub fn new(config: AppConfig, orders: Arc<dyn OrderService>) -> Result<Self, GatewayError> {
        let config = Arc::new(config);
        let client = Arc::new(GatewayClient::new(config.gateway.clone()));
        let callback = Arc::new(CallbackProcessor::new(
            orders.clone(),
            config.merchant.clone(),
        ));
        let processor = Arc::new(PlatronProcessor::new(
            client.clone(),
            config.merchant.clone(),
            config.site_base().to_string(),
        )?);
        Ok(Self {
            config,
            orders,
            client,
            callback,
            processor,
        })
    }
}
