use std::time::SystemTime;

/// Cue classification as stored in the Mixxx `cues.type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueType {
    Invalid,
    HotCue,
    MainCue,
    Loop,
    Jump,
    Intro,
    Outro,
    AudibleSound,
}

impl CueType {
    /// Convert from the Mixxx integer cue type code. Unknown codes map to
    /// `Invalid` (and are dropped by the translator downstream).
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => Self::HotCue,
            2 => Self::MainCue,
            4 => Self::Loop,
            5 => Self::Jump,
            6 => Self::Intro,
            7 => Self::Outro,
            8 => Self::AudibleSound,
            _ => Self::Invalid,
        }
    }
}

/// One cue point as read from the source library.
///
/// `position` is a raw interleaved sample-frame offset at the track's sample
/// rate across two channels; unit conversion happens in `cues`.
#[derive(Debug, Clone)]
pub struct Cue {
    pub id: String,
    pub cue_type: CueType,
    pub position: f64,
    /// Length in sample frames. Only meaningful for ranged cue types, all of
    /// which the translator drops.
    #[allow(dead_code)]
    pub length: f64,
    /// Zero-based hotcue slot, -1 when the cue is not a hotcue.
    pub hotcue_number: i64,
    pub label: String,
    /// Packed RGB color value.
    pub color: i64,
}

/// A track loaded from the source library. Read-only after load: target-side
/// identifiers live in a side table owned by the writer, never here.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub key: String,
    /// Sample rate in Hz, 0.0 when the source has none recorded.
    pub sample_rate: f64,
    /// Duration in seconds.
    pub duration: f64,
    pub bpm: f64,
    pub source_path: String,
    pub cues: Vec<Cue>,
    /// Filesystem metadata, fetched opportunistically. A missing file leaves
    /// these at their defaults.
    pub file_size: u64,
    pub file_created: Option<SystemTime>,
}

/// A playlist (or crate, modeled as a playlist with a name prefix and an id
/// offset past the largest real playlist id).
#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    /// Source-side timestamps, empty when the source has none.
    pub created: String,
    pub modified: String,
    /// Source track ids in membership order.
    pub track_ids: Vec<String>,
}
