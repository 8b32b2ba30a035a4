//! Cue translation: Mixxx cue records to Rekordbox `djmdCue` semantics.
//!
//! Pure functions, no I/O. Malformed numeric input is clamped or defaulted,
//! never an error.

use crate::types::{Cue, CueType, Track};

/// Assumed sample rate when the source has none recorded.
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 44_100.0;

/// Rekordbox cue slot semantics. Slot 0 is the memory/main cue; hotcue
/// slots start at 1, with slot 4 reserved for an auxiliary marker, so
/// hotcues at zero-based index 3 and up shift by one extra step.
pub fn cue_kind(cue_type: CueType, hotcue_number: i64) -> Option<i64> {
    match cue_type {
        CueType::MainCue => Some(0),
        CueType::HotCue => {
            let n = hotcue_number.max(0);
            Some(if n >= 3 { n + 2 } else { n + 1 })
        }
        _ => None,
    }
}

/// Convert a cue position (interleaved stereo sample frames) to
/// milliseconds at the track's sample rate. Falls back to 44.1 kHz when the
/// rate is unknown; negative or non-finite results clamp to 0.
pub fn cue_position_millis(position: f64, sample_rate_hz: f64) -> f64 {
    let rate = if sample_rate_hz.is_finite() && sample_rate_hz > 0.0 {
        sample_rate_hz
    } else {
        DEFAULT_SAMPLE_RATE_HZ
    };
    let millis = position / (rate * 2.0) * 1000.0;
    if millis.is_finite() && millis > 0.0 {
        millis
    } else {
        0.0
    }
}

/// Alternative conversion for cue positions that arrive pre-offset as raw
/// sample positions: `(position + 44.1^2) / 88.2`.
///
/// Preserved as its own function next to `cue_position_millis`; the two
/// formulas come from independently-derived import paths and are deliberately
/// not unified.
#[allow(dead_code)]
pub fn raw_position_millis(position: f64) -> f64 {
    let millis = (position + 44.1 * 44.1) / 88.2;
    if millis.is_finite() && millis > 0.0 {
        millis
    } else {
        0.0
    }
}

/// A cue in target shape, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedCue {
    pub kind: i64,
    pub in_msec: f64,
    /// Always -1: ranged cue types never reach the writer.
    pub out_msec: f64,
    pub color: i64,
    pub comment: String,
}

/// Translate one source cue. Returns `None` for cue types the target has no
/// counterpart for (explicit drop policy, not an error).
pub fn translate(cue: &Cue, track: &Track) -> Option<TranslatedCue> {
    let kind = cue_kind(cue.cue_type, cue.hotcue_number)?;
    Some(TranslatedCue {
        kind,
        in_msec: cue_position_millis(cue.position, track.sample_rate),
        out_msec: -1.0,
        color: cue.color,
        comment: cue.label.clone(),
    })
}
