// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Conductor directions.
//!
//! One natural-language instruction is split into per-member prompts by
//! the parsing service, the prompts are applied, and every AI member with a
//! prompt is regenerated one after another with a fixed pause in between
//! to keep load on the generation backend bounded.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::BandError;
use crate::services::{DirectionRequest, MemberBrief, MemberPrompt};

use super::{Outcome, SessionEvent, TrackGenerationCoordinator};

/// Result of regenerating one member during a direction run
#[derive(Debug)]
pub struct MemberRun {
    /// Member key
    pub instrument: String,
    /// Generation result
    pub result: Result<Outcome<String>, BandError>,
}

/// Summary of a direction run
#[derive(Debug, Default)]
pub struct DirectionReport {
    /// Members whose prompt was changed by the direction
    pub updated: Vec<String>,
    /// Generation results in the order they ran
    pub runs: Vec<MemberRun>,
}

impl DirectionReport {
    /// Runs that failed
    pub fn failures(&self) -> impl Iterator<Item = &MemberRun> {
        self.runs.iter().filter(|run| run.result.is_err())
    }

    /// Number of runs whose artifact was applied
    pub fn applied_count(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| matches!(run.result, Ok(Outcome::Applied(_))))
            .count()
    }
}

/// Applies a conductor instruction across the band
pub struct OverallDirectionDispatcher {
    generation: TrackGenerationCoordinator,
    pacing: Duration,
}

impl OverallDirectionDispatcher {
    /// Create a dispatcher that waits `pacing` between generations
    pub fn new(generation: TrackGenerationCoordinator, pacing: Duration) -> Self {
        Self { generation, pacing }
    }

    /// Pause between successive generations
    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    /// Parse `overall_prompt`, apply the resulting prompts, then regenerate
    /// every AI member that has a non-empty prompt, sequentially.
    ///
    /// Only a failed parse aborts the run. A member's generation failure is
    /// recorded in the report and the run continues.
    pub async fn dispatch(&self, overall_prompt: &str) -> Result<DirectionReport, BandError> {
        let shared = &self.generation.shared;
        let request = {
            let state = shared.state();
            DirectionRequest {
                overall_prompt: overall_prompt.to_string(),
                members: state
                    .roster
                    .ai_members()
                    .map(|m| MemberBrief {
                        instrument: m.instrument.clone(),
                        current_prompt: m.prompt.clone(),
                    })
                    .collect(),
            }
        };
        info!(members = request.members.len(), "parsing overall direction");

        let prompts = shared
            .service
            .parse_overall_direction(&request)
            .await
            .map_err(|err| {
                warn!(error = %err, "direction parse failed");
                BandError::DirectionParseFailed(err)
            })?;

        let mut report = DirectionReport {
            updated: self.apply_prompts(&prompts),
            runs: Vec::new(),
        };

        let targets: Vec<String> = shared
            .state()
            .roster
            .ai_members()
            .filter(|m| !m.prompt.trim().is_empty())
            .map(|m| m.instrument.clone())
            .collect();

        for (index, instrument) in targets.into_iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                debug!(pacing_ms = self.pacing.as_millis() as u64, "pacing direction run");
                tokio::time::sleep(self.pacing).await;
            }
            let result = self.generation.generate(&instrument, true).await;
            if let Err(err) = &result {
                warn!(instrument = %instrument, error = %err, "member failed during direction run");
            }
            report.runs.push(MemberRun { instrument, result });
        }

        info!(
            updated = report.updated.len(),
            applied = report.applied_count(),
            failed = report.failures().count(),
            "direction run complete"
        );
        Ok(report)
    }

    /// Match parsed prompts to AI members by case-insensitive instrument
    /// name; unmatched entries are ignored. Returns the updated keys.
    fn apply_prompts(&self, prompts: &[MemberPrompt]) -> Vec<String> {
        let shared = &self.generation.shared;
        let mut state = shared.state();
        let mut updated = Vec::new();
        for prompt in prompts {
            match state.roster.find_ai_mut(&prompt.instrument) {
                Some(member) => {
                    member.prompt = prompt.prompt.clone();
                    if !updated.contains(&member.instrument) {
                        updated.push(member.instrument.clone());
                    }
                    shared.emit(SessionEvent::PromptUpdated {
                        instrument: member.instrument.clone(),
                    });
                }
                None => debug!(instrument = %prompt.instrument, "no member for parsed prompt"),
            }
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::{BandMember, GenerationState, Session};
    use crate::config::BandConfig;
    use crate::orchestrator::{BandState, Shared};
    use crate::playback::{PlaybackController, SimulatedBackend};
    use crate::services::{
        BandService, CombineRequest, OfflineStudio, ServiceError, TrackRequest,
    };
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use tokio::sync::broadcast;

    /// Parser that answers with fixed prompts and fails drums generation
    struct Conductor {
        prompts: Result<Vec<MemberPrompt>, ServiceError>,
        generated: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BandService for Conductor {
        async fn generate_roster(&self, _: &str) -> Result<Vec<String>, ServiceError> {
            Ok(Vec::new())
        }
        async fn generate_track(&self, request: &TrackRequest) -> Result<String, ServiceError> {
            crate::lock(&self.generated).push(request.instrument.clone());
            if request.instrument == "drums" {
                return Err(ServiceError::Rejected {
                    endpoint: "track".to_string(),
                    message: "drum machine jammed".to_string(),
                });
            }
            Ok(format!("{}-{}.wav", request.instrument, request.prompt.len()))
        }
        async fn combine_tracks(&self, _: &CombineRequest) -> Result<String, ServiceError> {
            Ok("mix.wav".to_string())
        }
        async fn parse_overall_direction(
            &self,
            _: &DirectionRequest,
        ) -> Result<Vec<MemberPrompt>, ServiceError> {
            self.prompts.clone()
        }
    }

    fn dispatcher(service: Arc<dyn BandService>, pacing: Duration) -> OverallDirectionDispatcher {
        let (events, _) = broadcast::channel(16);
        let mut state = BandState::default();
        state.roster.replace(vec![
            BandMember::user_track("user:violin", "mine.wav"),
            BandMember::new("piano", "old piano"),
            BandMember::new("drums", "old drums"),
            BandMember::new("bass", ""),
        ]);
        let shared = Arc::new(Shared {
            session: Session::new("violin", "u.mid").with_user_audio("mine.wav"),
            config: BandConfig::default(),
            service,
            playback: Arc::new(PlaybackController::new(Arc::new(SimulatedBackend::new()))),
            state: Mutex::new(state),
            events,
        });
        OverallDirectionDispatcher::new(TrackGenerationCoordinator::new(shared), pacing)
    }

    #[tokio::test]
    async fn test_prompts_applied_and_failures_isolated() {
        let conductor = Arc::new(Conductor {
            prompts: Ok(vec![
                MemberPrompt::new("PIANO", "fast and energetic"),
                MemberPrompt::new("theremin", "spooky"),
            ]),
            generated: Mutex::new(Vec::new()),
        });
        let dispatcher = dispatcher(conductor.clone(), Duration::ZERO);

        let report = dispatcher.dispatch("piano fast and energetic").await.unwrap();
        assert_eq!(report.updated, vec!["piano"]);

        // bass has an empty prompt and the user's track is never generated
        assert_eq!(*crate::lock(&conductor.generated), vec!["piano", "drums"]);
        assert_eq!(report.runs.len(), 2);
        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.failures().count(), 1);

        let state = dispatcher.generation.shared.state();
        let piano = state.roster.get("piano").unwrap();
        assert_eq!(piano.prompt, "fast and energetic");
        assert_eq!(piano.state(), GenerationState::Generated);
        let drums = state.roster.get("drums").unwrap();
        assert_eq!(drums.prompt, "old drums");
        assert_eq!(drums.state(), GenerationState::Failed);
        assert!(state.roster.members().iter().all(|m| !m.state().is_busy()));
    }

    #[tokio::test]
    async fn test_parse_failure_aborts() {
        let conductor = Arc::new(Conductor {
            prompts: Err(ServiceError::Status {
                endpoint: "direction".to_string(),
                status: 500,
            }),
            generated: Mutex::new(Vec::new()),
        });
        let dispatcher = dispatcher(conductor.clone(), Duration::ZERO);

        let err = dispatcher.dispatch("everyone louder").await.unwrap_err();
        assert!(matches!(err, BandError::DirectionParseFailed(_)));
        assert!(crate::lock(&conductor.generated).is_empty());
    }

    #[tokio::test]
    async fn test_runs_are_paced() {
        let dispatcher = dispatcher(Arc::new(OfflineStudio::seeded(5)), Duration::from_millis(40));
        let started = std::time::Instant::now();
        let report = dispatcher.dispatch("piano and drums together").await.unwrap();
        assert_eq!(report.runs.len(), 2);
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(dispatcher.pacing(), Duration::from_millis(40));
    }
}
