// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! JSON client for the BandForge generation backend.
//!
//! Every endpoint answers with an envelope of the form
//! `{"success": bool, "error": "...", <payload fields>}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Endpoints, ServiceConfig};

use super::{
    BandService, CombineRequest, DirectionRequest, MemberPrompt, ServiceError, TrackRequest,
};

#[derive(Serialize)]
struct RosterRequest<'a> {
    instrument: &'a str,
}

#[derive(Deserialize)]
struct RosterReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    band_instruments: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct TrackReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    output_wav: Option<String>,
}

#[derive(Deserialize)]
struct CombineReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    final_mix_path: Option<String>,
}

#[derive(Deserialize)]
struct DirectionReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    per_member_prompts: Option<Vec<MemberPrompt>>,
}

/// Unwrap a reply envelope into its payload
fn unwrap_reply<T>(
    endpoint: &str,
    success: bool,
    error: Option<String>,
    payload: Option<T>,
) -> Result<T, ServiceError> {
    if !success {
        return Err(ServiceError::Rejected {
            endpoint: endpoint.to_string(),
            message: error.unwrap_or_else(|| "request failed".to_string()),
        });
    }
    payload.ok_or_else(|| ServiceError::Empty {
        endpoint: endpoint.to_string(),
    })
}

/// HTTP implementation of [`BandService`]
pub struct HttpStudio {
    client: Client,
    base_url: String,
    endpoints: Endpoints,
}

impl HttpStudio {
    /// Create a client for the configured backend
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ServiceError::Transport {
                endpoint: "client".to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            endpoints: config.endpoints.clone(),
        })
    }

    /// Full URL of an endpoint path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post<B, R>(&self, endpoint: &str, path: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(endpoint, %url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Transport {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<R>().await.map_err(|e| ServiceError::Malformed {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl BandService for HttpStudio {
    async fn generate_roster(&self, instrument: &str) -> Result<Vec<String>, ServiceError> {
        let reply: RosterReply = self
            .post("roster", &self.endpoints.roster, &RosterRequest { instrument })
            .await?;
        unwrap_reply("roster", reply.success, reply.error, reply.band_instruments)
    }

    async fn generate_track(&self, request: &TrackRequest) -> Result<String, ServiceError> {
        let reply: TrackReply = self.post("track", &self.endpoints.track, request).await?;
        unwrap_reply("track", reply.success, reply.error, reply.output_wav)
    }

    async fn combine_tracks(&self, request: &CombineRequest) -> Result<String, ServiceError> {
        let reply: CombineReply = self
            .post("combine", &self.endpoints.combine, request)
            .await?;
        unwrap_reply("combine", reply.success, reply.error, reply.final_mix_path)
    }

    async fn parse_overall_direction(
        &self,
        request: &DirectionRequest,
    ) -> Result<Vec<MemberPrompt>, ServiceError> {
        let reply: DirectionReply = self
            .post("direction", &self.endpoints.direction, request)
            .await?;
        unwrap_reply(
            "direction",
            reply.success,
            reply.error,
            reply.per_member_prompts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let config = ServiceConfig {
            base_url: "http://localhost:5000/".to_string(),
            ..ServiceConfig::default()
        };
        let studio = HttpStudio::new(&config).unwrap();
        assert_eq!(
            studio.url("/api/generate-band"),
            "http://localhost:5000/api/generate-band"
        );
        assert_eq!(studio.url("health"), "http://localhost:5000/health");
    }

    #[test]
    fn test_unwrap_reply() {
        let ok = unwrap_reply("track", true, None, Some("a.wav".to_string()));
        assert_eq!(ok.unwrap(), "a.wav");

        let rejected = unwrap_reply::<String>("track", false, Some("quota".into()), None);
        assert_eq!(
            rejected.unwrap_err(),
            ServiceError::Rejected {
                endpoint: "track".to_string(),
                message: "quota".to_string()
            }
        );

        let empty = unwrap_reply::<String>("track", true, None, None);
        assert!(matches!(empty, Err(ServiceError::Empty { .. })));
    }

    #[test]
    fn test_reply_envelope_parsing() {
        let yaml = "success: true\nband_instruments: [drums, bass_electric]\n";
        let reply: RosterReply = serde_yaml::from_str(yaml).unwrap();
        let instruments = unwrap_reply("roster", reply.success, reply.error, reply.band_instruments);
        assert_eq!(instruments.unwrap(), vec!["drums", "bass_electric"]);

        let yaml = "success: false\nerror: no model\n";
        let reply: TrackReply = serde_yaml::from_str(yaml).unwrap();
        assert!(unwrap_reply("track", reply.success, reply.error, reply.output_wav).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let config = ServiceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..ServiceConfig::default()
        };
        let studio = HttpStudio::new(&config).unwrap();
        let err = studio.generate_roster("piano").await.unwrap_err();
        assert!(matches!(err, ServiceError::Transport { .. }));
    }
}
