// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Instrument catalog understood by the generation backend.
//!
//! A practical subset of General MIDI. Percussion has no program number;
//! it is rendered on the drum channel instead.

/// A band instrument the backend can render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    /// Canonical name (lowercase, underscores)
    pub name: &'static str,
    /// General MIDI program, `None` for the drum channel
    pub program: Option<u8>,
}

impl Instrument {
    const fn new(name: &'static str, program: u8) -> Self {
        Self {
            name,
            program: Some(program),
        }
    }

    /// Whether this instrument plays on the percussion channel
    pub fn is_percussion(&self) -> bool {
        self.program.is_none()
    }
}

/// Instruments the roster service may choose from
pub const CATALOG: &[Instrument] = &[
    Instrument::new("piano", 0),
    Instrument::new("electric_piano", 4),
    Instrument::new("organ", 16),
    Instrument::new("acoustic_guitar", 24),
    Instrument::new("electric_guitar", 27),
    Instrument::new("bass_acoustic", 32),
    Instrument::new("bass_electric", 33),
    Instrument::new("violin", 40),
    Instrument::new("cello", 42),
    Instrument::new("contrabass", 43),
    Instrument::new("harp", 46),
    Instrument::new("string_ensemble", 48),
    Instrument::new("trumpet", 56),
    Instrument::new("trombone", 57),
    Instrument::new("french_horn", 60),
    Instrument::new("sax", 65),
    Instrument::new("clarinet", 71),
    Instrument::new("flute", 73),
    Instrument::new("synth_lead", 80),
    Instrument::new("pad", 88),
    Instrument {
        name: "percussion_drums",
        program: None,
    },
];

/// Normalize a free-form instrument name ("Electric Guitar" -> "electric_guitar")
pub fn normalize(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Find a catalog entry by (normalized) name
pub fn lookup(name: &str) -> Option<&'static Instrument> {
    let normalized = normalize(name);
    CATALOG.iter().find(|inst| inst.name == normalized)
}

/// General MIDI program for an instrument; unknown names fall back to piano
pub fn program_number(name: &str) -> u8 {
    lookup(name).and_then(|inst| inst.program).unwrap_or(0)
}

/// Human-readable label ("bass_electric" -> "bass electric")
pub fn display_name(name: &str) -> String {
    name.replace('_', " ")
}
