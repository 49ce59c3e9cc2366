//! Record sink for verified notifications.
//!
//! The sink receives one ordered row of strings per verified payment. The
//! destination is an external collaborator behind an HTTP append endpoint;
//! without one configured, rows land in the log so nothing is dropped
//! silently during local runs.

use serde_json::json;

use crate::config::Config;

pub enum RecordSink {
    Http {
        client: reqwest::Client,
        url: String,
        token: Option<String>,
    },
    Log,
}

impl RecordSink {
    pub fn from_config(config: &Config) -> Self {
        match &config.sink_url {
            Some(url) => Self::Http {
                client: reqwest::Client::new(),
                url: url.clone(),
                token: config.sink_token.clone(),
            },
            None => {
                warn!("RECORD_SINK_URL not set, payment records will only be logged");
                Self::Log
            }
        }
    }

    /// Append one row. A non-2xx or transport failure is reported to the
    /// caller so the gateway gets a non-2xx back and redelivers.
    pub async fn append(&self, row: Vec<String>) -> Result<(), ()> {
        match self {
            Self::Log => {
                info!("payment record: {:?}", row);
                Ok(())
            }
            Self::Http { client, url, token } => {
                let payload = json!({ "values": [row] });
                let mut request = client
                    .post(url)
                    .header("Content-Type", "application/json")
                    .json(&payload);
                if let Some(token) = token {
                    request = request.bearer_auth(token);
                }

                let response = match request.send().await {
                    Ok(response) => response,
                    Err(e) => {
                        info!("Error placing request: {:?}", e);
                        return Err(());
                    }
                };

                if response.status().is_success() {
                    return Ok(());
                }
                info!("Record sink rejected row: {}", response.status());
                Err(())
            }
        }
    }
}
