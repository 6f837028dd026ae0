// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Band composition orchestrator.
//!
//! This module provides:
//! - Roster generation for the user's instrument
//! - Per-member track generation with stale-response suppression
//! - Combining the selected tracks into a final mix
//! - Batch regeneration from a single conductor instruction
//! - [`BandSession`], the command and observation surface for a UI
//!
//! All commands take `&self`: a session can be driven from several
//! concurrent tasks. Shared state is only locked between suspension
//! points, never across one, and every asynchronous response is checked
//! against a request epoch before it is applied.

pub mod direction;
pub mod generation;
pub mod mix;
pub mod roster;

pub use direction::{DirectionReport, MemberRun, OverallDirectionDispatcher};
pub use generation::TrackGenerationCoordinator;
pub use mix::{FinalMix, MixCombiner};
pub use roster::BandRosterGenerator;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::band::{GenerationState, MemberView, Roster, Session};
use crate::config::BandConfig;
use crate::error::BandError;
use crate::lock;
use crate::playback::{PlaybackController, PlaybackState};
use crate::services::BandService;

/// Capacity of the session event channel
const EVENT_CAPACITY: usize = 256;

/// Result of an epoch-guarded asynchronous command
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The response was current and has been applied
    Applied(T),
    /// A newer request was issued meanwhile; this response was discarded
    Superseded,
}

impl<T> Outcome<T> {
    /// The applied value, if any
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Superseded => None,
        }
    }

    /// Whether the response was applied
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }
}

/// Notifications for observers of a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The whole roster was replaced
    RosterReplaced {
        /// Keys of the new roster, in order
        instruments: Vec<String>,
    },
    /// A member changed generation state
    MemberStateChanged {
        /// Member key
        instrument: String,
        /// New state
        state: GenerationState,
    },
    /// A member's prompt changed
    PromptUpdated {
        /// Member key
        instrument: String,
    },
    /// A member's selection changed
    SelectionChanged {
        /// Member key
        instrument: String,
        /// New selection
        selected: bool,
    },
    /// A stale response was dropped
    ResponseDiscarded {
        /// Member key, `final-mix`, or `roster`
        key: String,
        /// Epoch the response was issued under
        epoch: u64,
    },
    /// A final mix was registered
    FinalMixReady {
        /// Mix URI
        uri: String,
        /// Keys that contributed
        contributing_keys: Vec<String>,
    },
}

/// Mutable session state behind one lock
#[derive(Debug, Default)]
pub(crate) struct BandState {
    pub(crate) roster: Roster,
    pub(crate) roster_requests: u64,
    pub(crate) final_mix: Option<FinalMix>,
    pub(crate) mix_requests: u64,
}

/// Context shared by every coordinator of a session
pub(crate) struct Shared {
    pub(crate) session: Session,
    pub(crate) config: BandConfig,
    pub(crate) service: Arc<dyn BandService>,
    pub(crate) playback: Arc<PlaybackController>,
    pub(crate) state: Mutex<BandState>,
    pub(crate) events: broadcast::Sender<SessionEvent>,
}

impl Shared {
    pub(crate) fn state(&self) -> MutexGuard<'_, BandState> {
        lock(&self.state)
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Key of the user's own recording, when the session has one
    pub(crate) fn user_key(&self) -> Option<String> {
        self.session
            .user_audio_reference
            .as_ref()
            .map(|_| self.config.band.user_key(&self.session.user_instrument))
    }
}

/// Serializable view of a whole session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Backend session identifier
    pub session_id: String,
    /// Members in roster order
    pub roster: Vec<MemberView>,
    /// Key holding the playback slot
    pub currently_playing: Option<String>,
    /// Latest final mix
    pub final_mix: Option<FinalMix>,
    /// Whether the selection moved on since the mix was made
    pub final_mix_stale: bool,
}

/// A band-building session: commands plus read-only observable state
pub struct BandSession {
    shared: Arc<Shared>,
    roster: BandRosterGenerator,
    generation: TrackGenerationCoordinator,
    mix: MixCombiner,
    direction: OverallDirectionDispatcher,
}

impl BandSession {
    /// Create a session. The user's own recording, if any, is registered
    /// for playback immediately.
    pub fn new(
        session: Session,
        config: BandConfig,
        service: Arc<dyn BandService>,
        playback: Arc<PlaybackController>,
    ) -> Result<Self, BandError> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let pacing = config.direction.pacing();
        let shared = Arc::new(Shared {
            session,
            config,
            service,
            playback,
            state: Mutex::new(BandState::default()),
            events,
        });

        if let (Some(key), Some(uri)) = (
            shared.user_key(),
            shared.session.user_audio_reference.as_deref(),
        ) {
            shared.playback.register(&key, uri)?;
        }

        let generation = TrackGenerationCoordinator::new(Arc::clone(&shared));
        info!(
            session = %shared.session.session_id,
            instrument = %shared.session.user_instrument,
            "band session created"
        );
        Ok(Self {
            roster: BandRosterGenerator::new(Arc::clone(&shared)),
            mix: MixCombiner::new(Arc::clone(&shared)),
            direction: OverallDirectionDispatcher::new(generation.clone(), pacing),
            generation,
            shared,
        })
    }

    /// The recording session
    pub fn session(&self) -> &Session {
        &self.shared.session
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// The playback controller shared by every track
    pub fn playback(&self) -> &Arc<PlaybackController> {
        &self.shared.playback
    }

    /// Key of the user's own recording
    pub fn user_track_key(&self) -> Option<String> {
        self.shared.user_key()
    }

    // ---- Commands ----

    /// Replace the roster with a fresh set of complementary instruments
    pub async fn generate_roster(&self) -> Result<Outcome<Vec<String>>, BandError> {
        self.roster.generate().await
    }

    /// Generate a member's track
    pub async fn request_generation(&self, key: &str) -> Result<Outcome<String>, BandError> {
        self.generation.generate(key, false).await
    }

    /// Regenerate a member's track, asking the backend for a new take
    pub async fn request_regeneration(&self, key: &str) -> Result<Outcome<String>, BandError> {
        self.generation.generate(key, true).await
    }

    /// Edit a member's prompt
    pub fn update_prompt(&self, key: &str, text: &str) -> Result<(), BandError> {
        let mut state = self.shared.state();
        let member = state
            .roster
            .get_mut(key)
            .ok_or_else(|| BandError::UnknownMember(key.to_string()))?;
        if member.is_user_track() {
            return Err(BandError::NotRegenerable(key.to_string()));
        }
        member.prompt = text.to_string();
        self.shared.emit(SessionEvent::PromptUpdated {
            instrument: key.to_string(),
        });
        Ok(())
    }

    /// Flip a generated member's selection; returns the resulting selection
    pub fn toggle_selection(&self, key: &str) -> Result<bool, BandError> {
        let mut state = self.shared.state();
        let member = state
            .roster
            .get_mut(key)
            .ok_or_else(|| BandError::UnknownMember(key.to_string()))?;
        let before = member.is_selected();
        let selected = member.toggle_selection();
        if selected != before {
            self.shared.emit(SessionEvent::SelectionChanged {
                instrument: key.to_string(),
                selected,
            });
        }
        Ok(selected)
    }

    /// Combine the current selection into a final mix
    pub async fn request_combine(&self) -> Result<Outcome<FinalMix>, BandError> {
        self.mix.combine().await
    }

    /// Re-run the combine against the current selection
    pub async fn regenerate_mix(&self) -> Result<Outcome<FinalMix>, BandError> {
        self.mix.regenerate().await
    }

    /// Apply a conductor instruction to every member and regenerate them
    pub async fn request_overall_direction(&self, text: &str) -> Result<DirectionReport, BandError> {
        self.direction.dispatch(text).await
    }

    /// Play `key`, or pause it if it is the track currently playing
    pub fn play(&self, key: &str) -> Result<PlaybackState, BandError> {
        self.shared.playback.toggle(key).map_err(|err| {
            warn!(key = %key, error = %err, "playback failed");
            BandError::from(err)
        })
    }

    /// Stop every track
    pub fn stop_all(&self) {
        self.shared.playback.stop_all();
    }

    // ---- Observable state ----

    /// Members in roster order
    pub fn roster(&self) -> Vec<MemberView> {
        self.shared.state().roster.views()
    }

    /// A single member
    pub fn member(&self, key: &str) -> Option<MemberView> {
        self.shared.state().roster.get(key).map(|m| m.view())
    }

    /// Key holding the playback slot
    pub fn currently_playing_key(&self) -> Option<String> {
        self.shared.playback.currently_playing()
    }

    /// Latest final mix
    pub fn final_mix(&self) -> Option<FinalMix> {
        self.shared.state().final_mix.clone()
    }

    /// Whether the selection or artifacts changed since the last combine.
    /// Informational only; a stale mix still plays.
    pub fn final_mix_is_stale(&self) -> bool {
        let state = self.shared.state();
        match &state.final_mix {
            Some(mix) => mix.is_stale_against(&state.roster.selection()),
            None => false,
        }
    }

    /// Everything an observer needs in one value
    pub fn snapshot(&self) -> SessionSnapshot {
        let (roster, final_mix, final_mix_stale) = {
            let state = self.shared.state();
            let stale = state
                .final_mix
                .as_ref()
                .map(|mix| mix.is_stale_against(&state.roster.selection()))
                .unwrap_or(false);
            (state.roster.views(), state.final_mix.clone(), stale)
        };
        SessionSnapshot {
            session_id: self.shared.session.session_id.clone(),
            roster,
            currently_playing: self.currently_playing_key(),
            final_mix,
            final_mix_stale,
        }
    }
}
