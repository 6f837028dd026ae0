// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-member track generation.
//!
//! Drives one member through prompt -> generation call -> artifact ->
//! registered playback resource. Every call bumps the member's epoch when
//! it is issued; when the response arrives it is applied only if the epoch
//! (and the roster it belongs to) is still current. A slower, older
//! response therefore never overwrites a newer one.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{BandError, TrackFailure};
use crate::services::{ServiceError, TrackRequest};

use super::{Outcome, SessionEvent, Shared};

/// Identifies the request a response belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticket {
    instrument: String,
    roster_generation: u64,
    epoch: u64,
}

/// Generates and regenerates individual members' tracks
#[derive(Clone)]
pub struct TrackGenerationCoordinator {
    pub(super) shared: Arc<Shared>,
}

impl TrackGenerationCoordinator {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Generate `instrument`'s track with its current prompt.
    ///
    /// `regenerate` forces the backend's regeneration mode; a member that
    /// already holds an artifact is always regenerated.
    pub async fn generate(
        &self,
        instrument: &str,
        regenerate: bool,
    ) -> Result<Outcome<String>, BandError> {
        let (ticket, request) = self.begin(instrument, regenerate)?;
        let result = self.shared.service.generate_track(&request).await;
        self.complete(ticket, result)
    }

    /// Enter `Generating` and build the request
    fn begin(&self, instrument: &str, regenerate: bool) -> Result<(Ticket, TrackRequest), BandError> {
        let mut state = self.shared.state();
        let roster_generation = state.roster.generation();
        let member = state
            .roster
            .get_mut(instrument)
            .ok_or_else(|| BandError::UnknownMember(instrument.to_string()))?;
        if member.is_user_track() {
            return Err(BandError::NotRegenerable(instrument.to_string()));
        }

        let is_regeneration = regenerate || member.artifact().is_some();
        let epoch = member.begin_generation();
        let request = TrackRequest {
            session_id: self.shared.session.session_id.clone(),
            instrument: member.instrument.clone(),
            prompt: member.prompt.clone(),
            user_reference: self.shared.session.user_midi_reference.clone(),
            is_regeneration,
        };

        info!(instrument, epoch, is_regeneration, "generating track");
        self.shared.emit(SessionEvent::MemberStateChanged {
            instrument: instrument.to_string(),
            state: member.state(),
        });

        Ok((
            Ticket {
                instrument: instrument.to_string(),
                roster_generation,
                epoch,
            },
            request,
        ))
    }

    /// Apply a response if its ticket is still current
    fn complete(
        &self,
        ticket: Ticket,
        result: Result<String, ServiceError>,
    ) -> Result<Outcome<String>, BandError> {
        let mut state = self.shared.state();
        let roster_is_current = state.roster.generation() == ticket.roster_generation;
        let member = match state.roster.get_mut(&ticket.instrument) {
            Some(member) if roster_is_current && member.epoch() == ticket.epoch => member,
            _ => {
                debug!(
                    instrument = %ticket.instrument,
                    epoch = ticket.epoch,
                    "discarding stale generation response"
                );
                self.shared.emit(SessionEvent::ResponseDiscarded {
                    key: ticket.instrument,
                    epoch: ticket.epoch,
                });
                return Ok(Outcome::Superseded);
            }
        };

        let failure = match result {
            Ok(artifact) => match self.shared.playback.register(&ticket.instrument, &artifact) {
                Ok(()) => {
                    member.finish_generation(artifact.clone());
                    info!(instrument = %ticket.instrument, uri = %artifact, "track generated");
                    self.shared.emit(SessionEvent::MemberStateChanged {
                        instrument: ticket.instrument,
                        state: member.state(),
                    });
                    return Ok(Outcome::Applied(artifact));
                }
                Err(err) => TrackFailure::Playback(err),
            },
            Err(err) => TrackFailure::Service(err),
        };

        warn!(instrument = %ticket.instrument, error = %failure, "track generation failed");
        member.fail_generation(failure.to_string());
        self.shared.emit(SessionEvent::MemberStateChanged {
            instrument: ticket.instrument.clone(),
            state: member.state(),
        });
        Err(BandError::TrackGenerationFailed {
            member: ticket.instrument,
            cause: failure,
        })
    }
}
