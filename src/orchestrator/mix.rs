// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Final mix combining.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::band::MixSelection;
use crate::error::BandError;
use crate::playback::FINAL_MIX_KEY;
use crate::services::CombineRequest;

use super::{Outcome, SessionEvent, Shared};

/// A combined mix of the members selected at combine time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalMix {
    /// Keys that contributed, in roster order
    pub contributing_keys: Vec<String>,
    /// URI of the combined audio
    pub artifact_uri: String,
    #[serde(skip)]
    sources: MixSelection,
}

impl FinalMix {
    /// Whether `selection` differs from what this mix was built from
    pub fn is_stale_against(&self, selection: &MixSelection) -> bool {
        self.sources != *selection
    }
}

/// Combines selected members' tracks into the final mix
pub struct MixCombiner {
    shared: Arc<Shared>,
}

impl MixCombiner {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Combine the current selection and register the result under
    /// [`FINAL_MIX_KEY`], replacing any previous mix.
    ///
    /// With nothing selected, fails with [`BandError::NoTracksSelected`]
    /// and leaves the previous mix alone.
    pub async fn combine(&self) -> Result<Outcome<FinalMix>, BandError> {
        let (ticket, selection) = {
            let mut state = self.shared.state();
            let selection = state.roster.selection();
            if selection.is_empty() {
                return Err(BandError::NoTracksSelected);
            }
            state.mix_requests += 1;
            (state.mix_requests, selection)
        };

        self.shared.playback.stop(FINAL_MIX_KEY);

        let request = CombineRequest {
            session_id: self.shared.session.session_id.clone(),
            artifact_uris: selection.artifacts.clone(),
            user_audio_uri: selection.user_audio.clone(),
        };
        info!(
            tracks = request.artifact_uris.len(),
            with_user_audio = request.user_audio_uri.is_some(),
            "combining final mix"
        );

        let uri = self
            .shared
            .service
            .combine_tracks(&request)
            .await
            .map_err(|err| {
                warn!(error = %err, "combine failed");
                BandError::CombineFailed(err)
            })?;

        let mut state = self.shared.state();
        if state.mix_requests != ticket {
            debug!(ticket, "discarding stale mix response");
            self.shared.emit(SessionEvent::ResponseDiscarded {
                key: FINAL_MIX_KEY.to_string(),
                epoch: ticket,
            });
            return Ok(Outcome::Superseded);
        }

        self.shared.playback.register(FINAL_MIX_KEY, &uri)?;
        let mix = FinalMix {
            contributing_keys: selection.keys.clone(),
            artifact_uri: uri,
            sources: selection,
        };
        state.final_mix = Some(mix.clone());
        info!(uri = %mix.artifact_uri, keys = ?mix.contributing_keys, "final mix ready");
        self.shared.emit(SessionEvent::FinalMixReady {
            uri: mix.artifact_uri.clone(),
            contributing_keys: mix.contributing_keys.clone(),
        });
        Ok(Outcome::Applied(mix))
    }

    /// Combine again against the current selection
    pub async fn regenerate(&self) -> Result<Outcome<FinalMix>, BandError> {
        self.combine().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::{BandMember, Session};
    use crate::config::BandConfig;
    use crate::orchestrator::BandState;
    use crate::playback::{PlaybackController, PlaybackState, SimulatedBackend};
    use crate::services::OfflineStudio;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    fn generated(instrument: &str) -> BandMember {
        let mut member = BandMember::new(instrument, "");
        member.begin_generation();
        member.finish_generation(format!("{instrument}.wav"));
        member
    }

    fn combiner(members: Vec<BandMember>, session: Session) -> MixCombiner {
        let (events, _) = broadcast::channel(16);
        let mut state = BandState::default();
        state.roster.replace(members);
        MixCombiner::new(Arc::new(Shared {
            session,
            config: BandConfig::default(),
            service: Arc::new(OfflineStudio::seeded(9)),
            playback: Arc::new(PlaybackController::new(Arc::new(SimulatedBackend::new()))),
            state: Mutex::new(state),
            events,
        }))
    }

    #[tokio::test]
    async fn test_combine_registers_final_mix() {
        let combiner = combiner(
            vec![generated("piano"), generated("drums"), BandMember::new("bass", "")],
            Session::new("violin", "u.mid"),
        );
        let mix = combiner.combine().await.unwrap().applied().unwrap();
        assert_eq!(mix.contributing_keys, vec!["piano", "drums"]);
        assert_eq!(
            combiner.shared.playback.source_uri(FINAL_MIX_KEY),
            Some(mix.artifact_uri.clone())
        );
        assert_eq!(combiner.shared.state().final_mix, Some(mix));
    }

    #[tokio::test]
    async fn test_user_recording_contributes() {
        let combiner = combiner(
            vec![BandMember::user_track("user:violin", "mine.wav"), generated("cello")],
            Session::new("violin", "u.mid").with_user_audio("mine.wav"),
        );
        let mix = combiner.combine().await.unwrap().applied().unwrap();
        assert_eq!(mix.contributing_keys, vec!["user:violin", "cello"]);
        assert_eq!(mix.sources.user_audio.as_deref(), Some("mine.wav"));
    }

    #[tokio::test]
    async fn test_nothing_selected_keeps_previous_mix() {
        let combiner = combiner(vec![generated("piano")], Session::new("violin", "u.mid"));
        let first = combiner.combine().await.unwrap().applied().unwrap();

        combiner
            .shared
            .state()
            .roster
            .get_mut("piano")
            .unwrap()
            .toggle_selection();
        assert!(matches!(
            combiner.combine().await,
            Err(BandError::NoTracksSelected)
        ));
        assert_eq!(combiner.shared.state().final_mix, Some(first.clone()));
        assert_eq!(
            combiner.shared.playback.source_uri(FINAL_MIX_KEY),
            Some(first.artifact_uri)
        );
    }

    #[tokio::test]
    async fn test_regenerate_stops_and_replaces_playing_mix() {
        let combiner = combiner(vec![generated("piano")], Session::new("violin", "u.mid"));
        let first = combiner.combine().await.unwrap().applied().unwrap();
        combiner.shared.playback.toggle(FINAL_MIX_KEY).unwrap();

        let second = combiner.regenerate().await.unwrap().applied().unwrap();
        assert_ne!(first.artifact_uri, second.artifact_uri);
        assert_eq!(combiner.shared.playback.currently_playing(), None);
        assert_eq!(
            combiner.shared.playback.state(FINAL_MIX_KEY),
            Some(PlaybackState::Idle)
        );
    }

    #[test]
    fn test_staleness() {
        let selection = MixSelection {
            keys: vec!["piano".to_string()],
            artifacts: vec!["piano.wav".to_string()],
            user_audio: None,
        };
        let mix = FinalMix {
            contributing_keys: selection.keys.clone(),
            artifact_uri: "mix.wav".to_string(),
            sources: selection.clone(),
        };
        assert!(!mix.is_stale_against(&selection));

        let mut moved = selection;
        moved.artifacts[0] = "piano-2.wav".to_string();
        assert!(mix.is_stale_against(&moved));
    }
}
