//! Process configuration, read once from the environment at startup.
//!
//! Cryptographic functions never touch the environment themselves; they
//! receive the secret through this struct so they stay pure and testable.

use std::env;
use std::fmt;

use crate::crypto;
use crate::error::GatewayError;

const GATEWAY_URL_LIVE: &str = "https://sis.redsys.es/sis/realizarPago";
const GATEWAY_URL_TEST: &str = "https://sis-t.redsys.es:25443/sis/realizarPago";

#[derive(Clone)]
pub struct Config {
    /// Base64 merchant secret, validated at load. Never logged.
    pub secret_b64: String,
    /// Merchant code (FUC) assigned by the bank.
    pub merchant_code: String,
    pub terminal: String,
    /// True when pointed at the production gateway.
    pub live: bool,
    /// Base URL of the storefront the customer is sent back to.
    pub frontend_base: String,
    /// Fixed charge in integer cents.
    pub price_cents: String,
    /// Record-sink endpoint; rows are logged locally when unset.
    pub sink_url: Option<String>,
    pub sink_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, GatewayError> {
        let secret_b64 =
            env::var("REDSYS_SECRET_KEY").map_err(|_| GatewayError::InvalidSecret)?;
        // Reject a malformed secret here, not on the first payment.
        crypto::decode_secret(&secret_b64)?;

        Ok(Self {
            secret_b64,
            merchant_code: require("REDSYS_MERCHANT_CODE")?,
            terminal: require("REDSYS_TERMINAL")?,
            live: env::var("REDSYS_ENV").as_deref() == Ok("real"),
            frontend_base: env::var("FRONTEND_BASE_URL")
                .unwrap_or_else(|_| "https://shop.example".to_string()),
            price_cents: env::var("PRICE_CENTS").unwrap_or_else(|_| "100".to_string()),
            sink_url: env::var("RECORD_SINK_URL").ok(),
            sink_token: env::var("RECORD_SINK_TOKEN").ok(),
        })
    }

    pub fn gateway_url(&self) -> &'static str {
        if self.live {
            GATEWAY_URL_LIVE
        } else {
            GATEWAY_URL_TEST
        }
    }
}

fn require(name: &'static str) -> Result<String, GatewayError> {
    env::var(name).map_err(|_| GatewayError::MissingConfig(name))
}

// The secret must never reach the logs, Debug included.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("secret_b64", &"<redacted>")
            .field("merchant_code", &self.merchant_code)
            .field("terminal", &self.terminal)
            .field("live", &self.live)
            .field("frontend_base", &self.frontend_base)
            .field("price_cents", &self.price_cents)
            .field("sink_url", &self.sink_url)
            .field("sink_token", &self.sink_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
