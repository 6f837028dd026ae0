// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! BandForge - turn a solo recording into a band arrangement.
//!
//! A roster of AI musicians is generated for the user's instrument, each
//! member's track is produced asynchronously, and a selected subset is
//! combined into a final mix. Every track shares one playback slot.

pub mod band;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod playback;
pub mod services;

pub use band::{BandMember, GenerationState, MemberView, Roster, Session};
pub use config::BandConfig;
pub use error::{BandError, TrackFailure};
pub use orchestrator::{BandSession, DirectionReport, FinalMix, Outcome, SessionEvent};
pub use playback::{PlaybackController, PlaybackState, FINAL_MIX_KEY};
pub use services::{BandService, HttpStudio, OfflineStudio, ServiceError};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a panicking holder poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
