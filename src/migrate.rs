//! Orchestration: drives a whole-library migration or a Serato cue import
//! over the source and target adapters, collecting a report as it goes.

use std::path::PathBuf;

use serde::Serialize;

use crate::mixxx::MixxxLibrary;
use crate::rekordbox::RekordboxLibrary;
use crate::serato::{self, SeratoTag};
use crate::tags::{self, TagError};

#[derive(Debug, Default, Serialize)]
pub struct MigrationReport {
    pub tracks: usize,
    pub cues_written: usize,
    pub cues_skipped: usize,
    pub playlists: usize,
    pub memberships: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct SeratoImportReport {
    pub files_scanned: usize,
    pub files_with_markers: usize,
    pub cues_written: usize,
    pub warnings: Vec<String>,
}

pub struct MigrateOptions {
    pub source: String,
    pub target: String,
    pub key: String,
    pub schema_dir: PathBuf,
    pub init: bool,
    pub from_prefix: Option<String>,
    pub to_prefix: Option<String>,
}

pub struct SeratoImportOptions {
    pub target: String,
    pub key: String,
    pub keep_existing: bool,
}

/// Rewrite a leading path prefix, for libraries moved between machines or
/// mount points. Paths outside `from` pass through untouched.
pub fn remap_path(path: &str, from: &str, to: &str) -> String {
    match path.strip_prefix(from) {
        Some(rest) => format!("{to}{rest}"),
        None => path.to_string(),
    }
}

/// Migrate every track, then every playlist, from `source` into `target`.
/// Tracks go first so playlist memberships can resolve their content ids.
pub fn migrate_library(
    source: &MixxxLibrary,
    target: &mut RekordboxLibrary,
    remap: Option<(&str, &str)>,
) -> Result<MigrationReport, rusqlite::Error> {
    let mut report = MigrationReport::default();

    let mut tracks = source.tracks()?;
    if let Some((from, to)) = remap {
        for track in &mut tracks {
            track.source_path = remap_path(&track.source_path, from, to);
        }
    }
    eprintln!("[migrate] {} tracks to migrate", tracks.len());

    for track in &tracks {
        let inserted = target.insert_track(track)?;
        report.tracks += 1;
        report.cues_written += inserted.cues_written;
        report.cues_skipped += inserted.cues_skipped;
    }

    let playlists = source.playlists(&tracks)?;
    eprintln!("[migrate] {} playlists to migrate", playlists.len());
    for playlist in &playlists {
        report.memberships += target.insert_playlist(playlist)?;
        report.playlists += 1;
    }

    report.warnings = target.warnings().to_vec();
    Ok(report)
}

pub fn run_migration(opts: &MigrateOptions) -> Result<MigrationReport, rusqlite::Error> {
    let source = MixxxLibrary::open(&opts.source)?;
    let mut target = RekordboxLibrary::open(&opts.target, &opts.key)?;
    if opts.init {
        target.initialize(&opts.schema_dir)?;
    }

    let remap = match (&opts.from_prefix, &opts.to_prefix) {
        (Some(from), Some(to)) => Some((from.as_str(), to.as_str())),
        _ => None,
    };
    let report = migrate_library(&source, &mut target, remap)?;

    source.close();
    target.close();
    eprintln!(
        "[migrate] done: {} tracks, {} cues, {} playlists",
        report.tracks, report.cues_written, report.playlists
    );
    Ok(report)
}

/// Re-create the target's cue table from Serato Markers2 GEOB frames found
/// in the content files' ID3v2 tags. Per-file tag trouble is a warning, not
/// a failure; only the target database can abort the run.
pub fn import_serato_cues(
    target: &mut RekordboxLibrary,
    keep_existing: bool,
) -> Result<SeratoImportReport, rusqlite::Error> {
    let mut report = SeratoImportReport::default();

    if !keep_existing {
        let dropped = target.clear_cues()?;
        eprintln!("[serato] cleared {dropped} existing cues");
    }

    for content in target.contents()? {
        report.files_scanned += 1;
        let markers = match tags::read_serato_markers(&content.folder_path) {
            Ok(markers) => markers,
            Err(TagError::NoMarkers(_)) | Err(TagError::NoId3v2(_)) => continue,
            Err(err) => {
                report.warnings.push(err.to_string());
                continue;
            }
        };
        let records = match serato::decode_markers(&markers) {
            Ok(records) => records,
            Err(err) => {
                report
                    .warnings
                    .push(format!("{}: {err}", content.folder_path));
                continue;
            }
        };

        report.files_with_markers += 1;
        for record in records {
            let SeratoTag::CuePoint {
                index,
                offset_ms,
                color,
                name,
            } = record
            else {
                continue;
            };
            match target.insert_serato_cue(&content, index, offset_ms, color, &name) {
                Ok(()) => report.cues_written += 1,
                Err(err) => report
                    .warnings
                    .push(format!("{}: {err}", content.folder_path)),
            }
        }
    }

    report.warnings.extend_from_slice(target.warnings());
    Ok(report)
}

pub fn run_serato_import(
    opts: &SeratoImportOptions,
) -> Result<SeratoImportReport, rusqlite::Error> {
    let mut target = RekordboxLibrary::open(&opts.target, &opts.key)?;
    let report = import_serato_cues(&mut target, opts.keep_existing)?;
    target.close();
    eprintln!(
        "[serato] done: {} of {} files had markers, {} cues written",
        report.files_with_markers, report.files_scanned, report.cues_written
    );
    Ok(report)
}
