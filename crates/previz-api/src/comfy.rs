use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComfyStatus {
    pub url: String,
    pub connected: bool,
    /// `system_stats` payload when reachable.
    pub stats: Option<Value>,
    pub error: Option<String>,
}

/// Connectivity check against a ComfyUI server.
pub struct ComfyProbe {
    base_url: String,
    client: reqwest::Client,
}

impl ComfyProbe {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn stats_url(&self) -> String {
        format!("{}/system_stats", self.base_url)
    }

    /// Never fails: an unreachable server is reported as disconnected.
    pub async fn check(&self) -> ComfyStatus {
        let url = self.stats_url();
        let outcome = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp
                .json::<Value>()
                .await
                .map_err(|e| format!("invalid system_stats payload: {e}")),
            Ok(resp) => Err(format!("ComfyUI недоступен (HTTP {})", resp.status().as_u16())),
            Err(e) => Err(format!("Ошибка подключения к ComfyUI: {e}")),
        };

        match outcome {
            Ok(stats) => ComfyStatus {
                url: self.base_url.clone(),
                connected: true,
                stats: Some(stats),
                error: None,
            },
            Err(error) => {
                warn!(target: "previz::comfy", %url, %error, "ComfyUI probe failed");
                ComfyStatus {
                    url: self.base_url.clone(),
                    connected: false,
                    stats: None,
                    error: Some(error),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_url_strips_trailing_slash() {
        let probe = ComfyProbe::new("http://127.0.0.1:8188/").unwrap();
        assert_eq!(probe.stats_url(), "http://127.0.0.1:8188/system_stats");
    }

    #[tokio::test]
    async fn unreachable_server_reports_disconnected() {
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let probe = ComfyProbe::new(&format!("http://{addr}")).unwrap();
        let status = probe.check().await;
        assert!(!status.connected);
        assert!(status.stats.is_none());
        assert!(status.error.unwrap().starts_with("Ошибка подключения к ComfyUI"));
    }
}
