// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Roster generation.
//!
//! Asks the instrument-selection service for complementary instruments and
//! replaces the whole member list with the answer. A failed call leaves the
//! previous roster untouched.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::band::{instruments, BandMember};
use crate::error::BandError;
use crate::services::ServiceError;

use super::{Outcome, SessionEvent, Shared};

/// Produces the session's roster
pub struct BandRosterGenerator {
    shared: Arc<Shared>,
}

impl BandRosterGenerator {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Request a roster and install it. Returns the new member keys.
    pub async fn generate(&self) -> Result<Outcome<Vec<String>>, BandError> {
        let ticket = {
            let mut state = self.shared.state();
            state.roster_requests += 1;
            state.roster_requests
        };
        let user_instrument = &self.shared.session.user_instrument;
        info!(instrument = %user_instrument, "requesting band roster");

        let names = self
            .shared
            .service
            .generate_roster(user_instrument)
            .await
            .map_err(|err| {
                warn!(error = %err, "roster generation failed");
                BandError::RosterGenerationFailed(err)
            })?;
        let members = self.build_members(&names)?;

        let mut state = self.shared.state();
        if state.roster_requests != ticket {
            debug!(ticket, "discarding stale roster response");
            self.shared.emit(SessionEvent::ResponseDiscarded {
                key: "roster".to_string(),
                epoch: ticket,
            });
            return Ok(Outcome::Superseded);
        }

        let user_key = self.shared.user_key();
        for old in state.roster.members() {
            if Some(&old.instrument) != user_key.as_ref() {
                self.shared.playback.unregister(&old.instrument);
            }
        }

        let keys: Vec<String> = members.iter().map(|m| m.instrument.clone()).collect();
        state.roster.replace(members);
        info!(roster = ?keys, "roster replaced");
        self.shared.emit(SessionEvent::RosterReplaced {
            instruments: keys.clone(),
        });
        Ok(Outcome::Applied(keys))
    }

    /// Turn service output into members: trimmed, deduplicated, without the
    /// user's own instrument, capped at the configured size, and preceded by
    /// the user's recording when the session has one.
    fn build_members(&self, names: &[String]) -> Result<Vec<BandMember>, BandError> {
        let config = &self.shared.config.band;
        let session = &self.shared.session;
        let own = instruments::normalize(&session.user_instrument);

        let mut picked: Vec<&str> = Vec::new();
        for name in names.iter().map(|n| n.trim()) {
            if name.is_empty() || instruments::normalize(name) == own {
                continue;
            }
            if picked.iter().any(|p| p.eq_ignore_ascii_case(name)) {
                continue;
            }
            if config.max_members > 0 && picked.len() >= config.max_members {
                break;
            }
            picked.push(name);
        }

        if picked.is_empty() {
            return Err(BandError::RosterGenerationFailed(ServiceError::Empty {
                endpoint: "roster".to_string(),
            }));
        }

        let mut members = Vec::with_capacity(picked.len() + 1);
        if let (Some(key), Some(uri)) = (self.shared.user_key(), &session.user_audio_reference) {
            members.push(BandMember::user_track(key, uri.clone()));
        }
        members.extend(picked.into_iter().map(|name| {
            BandMember::new(name, config.default_prompt(name, &session.user_instrument))
        }));
        Ok(members)
    }
}
