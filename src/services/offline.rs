// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! In-process studio for demos and tests.
//!
//! Picks a random complementary roster from the instrument catalog, hands
//! out a fresh `offline://` artifact for every generation, and splits a
//! conductor instruction into clauses that mention an instrument by name.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::band::instruments::{self, CATALOG};
use crate::config::OfflineConfig;
use crate::lock;

use super::{
    BandService, CombineRequest, DirectionRequest, MemberPrompt, ServiceError, TrackRequest,
};

/// Number of instruments in an offline roster
const ROSTER_SIZE: usize = 4;

/// Self-contained [`BandService`]
pub struct OfflineStudio {
    rng: Mutex<StdRng>,
    latency: Duration,
    counter: AtomicU64,
}

impl OfflineStudio {
    /// Create a studio from configuration
    pub fn new(config: &OfflineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
            latency: Duration::from_millis(config.latency_ms),
            counter: AtomicU64::new(0),
        }
    }

    /// Create a studio with a fixed seed and no latency
    pub fn seeded(seed: u64) -> Self {
        Self::new(&OfflineConfig {
            latency_ms: 0,
            seed: Some(seed),
        })
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn next_id(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Split an instruction into clauses on commas, semicolons and "and then"
fn clauses(text: &str) -> Vec<&str> {
    text.split([',', ';', '.'])
        .flat_map(|part| part.split(" and then "))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// Whether a clause mentions an instrument, by key or display name
fn mentions(clause: &str, instrument: &str) -> bool {
    let clause = clause.to_lowercase();
    let key = instrument.to_lowercase();
    clause.contains(&key) || clause.contains(&instruments::display_name(&key))
}

#[async_trait]
impl BandService for OfflineStudio {
    async fn generate_roster(&self, instrument: &str) -> Result<Vec<String>, ServiceError> {
        self.simulate_latency().await;
        let own = instruments::normalize(instrument);
        let candidates: Vec<&str> = CATALOG
            .iter()
            .map(|inst| inst.name)
            .filter(|name| *name != own)
            .collect();
        let mut rng = lock(&self.rng);
        let chosen: Vec<String> = candidates
            .choose_multiple(&mut *rng, ROSTER_SIZE)
            .map(|name| name.to_string())
            .collect();
        debug!(instrument, roster = ?chosen, "offline roster");
        Ok(chosen)
    }

    async fn generate_track(&self, request: &TrackRequest) -> Result<String, ServiceError> {
        self.simulate_latency().await;
        if request.instrument.trim().is_empty() {
            return Err(ServiceError::Rejected {
                endpoint: "track".to_string(),
                message: "missing instrument".to_string(),
            });
        }
        Ok(format!(
            "offline://{}/{}/take-{}.wav",
            request.session_id,
            request.instrument,
            self.next_id()
        ))
    }

    async fn combine_tracks(&self, request: &CombineRequest) -> Result<String, ServiceError> {
        self.simulate_latency().await;
        if request.artifact_uris.is_empty() {
            return Err(ServiceError::Rejected {
                endpoint: "combine".to_string(),
                message: "no tracks to combine".to_string(),
            });
        }
        Ok(format!(
            "offline://{}/final-mix/mix-{}.wav",
            request.session_id,
            self.next_id()
        ))
    }

    async fn parse_overall_direction(
        &self,
        request: &DirectionRequest,
    ) -> Result<Vec<MemberPrompt>, ServiceError> {
        self.simulate_latency().await;
        let clauses = clauses(&request.overall_prompt);
        if clauses.is_empty() {
            return Err(ServiceError::Empty {
                endpoint: "direction".to_string(),
            });
        }

        let prompts = request
            .members
            .iter()
            .filter_map(|member| {
                let matched: Vec<&str> = clauses
                    .iter()
                    .copied()
                    .filter(|clause| mentions(clause, &member.instrument))
                    .collect();
                if matched.is_empty() {
                    None
                } else {
                    Some(MemberPrompt::new(&member.instrument, matched.join(", ")))
                }
            })
            .collect();
        Ok(prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemberBrief;

    fn brief(instrument: &str) -> MemberBrief {
        MemberBrief {
            instrument: instrument.to_string(),
            current_prompt: String::new(),
        }
    }

    #[tokio::test]
    async fn test_roster_excludes_user_instrument() {
        let studio = OfflineStudio::seeded(42);
        for _ in 0..20 {
            let roster = studio.generate_roster("Piano").await.unwrap();
            assert_eq!(roster.len(), ROSTER_SIZE);
            assert!(!roster.iter().any(|name| name == "piano"));
        }
    }

    #[tokio::test]
    async fn test_seeded_rosters_repeat() {
        let a = OfflineStudio::seeded(7).generate_roster("violin").await.unwrap();
        let b = OfflineStudio::seeded(7).generate_roster("violin").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_tracks_are_unique_per_call() {
        let studio = OfflineStudio::seeded(1);
        let request = TrackRequest {
            session_id: "s".to_string(),
            instrument: "drums".to_string(),
            prompt: String::new(),
            user_reference: "u.mid".to_string(),
            is_regeneration: false,
        };
        let first = studio.generate_track(&request).await.unwrap();
        let second = studio.generate_track(&request).await.unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("offline://s/drums/"));
    }

    #[tokio::test]
    async fn test_combine_requires_tracks() {
        let studio = OfflineStudio::seeded(1);
        let request = CombineRequest {
            session_id: "s".to_string(),
            artifact_uris: Vec::new(),
            user_audio_uri: None,
        };
        assert!(studio.combine_tracks(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_direction_clauses() {
        let studio = OfflineStudio::seeded(1);
        let request = DirectionRequest {
            overall_prompt: "piano fast and energetic, guitar slow and melodic".to_string(),
            members: vec![brief("piano"), brief("guitar"), brief("drums")],
        };
        let prompts = studio.parse_overall_direction(&request).await.unwrap();
        assert_eq!(
            prompts,
            vec![
                MemberPrompt::new("piano", "piano fast and energetic"),
                MemberPrompt::new("guitar", "guitar slow and melodic"),
            ]
        );
    }

    #[tokio::test]
    async fn test_direction_matches_display_names() {
        let studio = OfflineStudio::seeded(1);
        let request = DirectionRequest {
            overall_prompt: "French horn swells; bass electric walks".to_string(),
            members: vec![brief("french_horn"), brief("bass_electric")],
        };
        let prompts = studio.parse_overall_direction(&request).await.unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0].prompt, "French horn swells");
    }

    #[tokio::test]
    async fn test_empty_direction_fails() {
        let studio = OfflineStudio::seeded(1);
        let request = DirectionRequest {
            overall_prompt: " , ; ".to_string(),
            members: vec![brief("piano")],
        };
        assert!(studio.parse_overall_direction(&request).await.is_err());
    }
}
