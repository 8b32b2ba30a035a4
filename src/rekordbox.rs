//! Target-side adapter: writes tracks, artists, albums, cues and playlists
//! into an encrypted Rekordbox master.db. Owns the run-scoped id allocator,
//! the artist/album name caches and the source-id → content-id side table;
//! loaded `Track` values are never mutated to carry target identifiers.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::cues;
use crate::db;
use crate::ids::IdAllocator;
use crate::types::{CueType, Playlist, Track};

/// Result of writing one track.
pub struct TrackInsert {
    pub content_id: String,
    pub cues_written: usize,
    pub cues_skipped: usize,
}

/// One row of the target content table, as needed by the Serato import.
pub struct ContentRow {
    pub id: String,
    pub folder_path: String,
    pub uuid: String,
}

pub struct RekordboxLibrary {
    conn: Connection,
    ids: IdAllocator,
    artist_cache: HashMap<String, String>,
    album_cache: HashMap<String, String>,
    /// Side table: source track id → target content id.
    content_ids: HashMap<String, String>,
    warnings: Vec<String>,
}

impl RekordboxLibrary {
    /// Open the encrypted target store. Key and compatibility mode are set
    /// before any other statement; see `db::open_target`.
    pub fn open(path: &str, key: &str) -> Result<Self, rusqlite::Error> {
        eprintln!("[rekordbox] opening {path}");
        let conn = db::open_target(path, key)?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn,
            ids: IdAllocator::new(),
            artist_cache: HashMap::new(),
            album_cache: HashMap::new(),
            content_ids: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Self {
        let conn = db::open_test();
        conn.execute_batch(include_str!("../schema/rekordbox.sql"))
            .unwrap();
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Apply the target schema DDL. Requires a fresh store: id allocation
    /// restarts at 1 every run and is never reconciled with existing rows.
    pub fn initialize(&self, schema_dir: &Path) -> Result<(), rusqlite::Error> {
        db::load_schema(&self.conn, schema_dir, "rekordbox")
    }

    /// Per-cue insert failures accumulated so far, newest last.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Target content id previously issued for a source track id.
    pub fn content_id(&self, source_id: &str) -> Option<&str> {
        self.content_ids.get(source_id).map(String::as_str)
    }

    /// Exact-name lookup with an in-run cache; inserts a minimal artist row
    /// on miss. The same name never produces two rows within one run, and a
    /// populated target resolves to its existing ids across runs.
    pub fn resolve_artist(&mut self, name: &str) -> Result<String, rusqlite::Error> {
        resolve_entity(
            &self.conn,
            &mut self.ids,
            &mut self.artist_cache,
            "djmdArtist",
            name,
        )
    }

    pub fn resolve_album(&mut self, name: &str) -> Result<String, rusqlite::Error> {
        resolve_entity(
            &self.conn,
            &mut self.ids,
            &mut self.album_cache,
            "djmdAlbum",
            name,
        )
    }

    /// Write one track and its translatable cues. A failing cue insert is
    /// recorded as a warning and never aborts the track.
    pub fn insert_track(&mut self, track: &Track) -> Result<TrackInsert, rusqlite::Error> {
        eprintln!(
            "[+] {} - {} ({}, {} BPM, {})",
            if track.artist.is_empty() { "<unknown>" } else { &track.artist },
            if track.title.is_empty() { "<untitled>" } else { &track.title },
            if track.key.is_empty() { "-" } else { &track.key },
            track.bpm,
            if track.genre.is_empty() { "-" } else { &track.genre },
        );

        let artist_id = self.resolve_artist(&track.artist)?;
        let album_id = self.resolve_album(&track.album)?;
        let content_id = self.ids.next("djmdContent").to_string();
        let content_uuid = Uuid::new_v4().to_string();
        let now = db::timestamp_now();

        let file_name = Path::new(&track.source_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let date_created = track
            .file_created
            .map(db::date_from_system_time)
            .unwrap_or_else(db::date_today);

        self.conn.execute(
            "INSERT INTO djmdContent (
                ID, Title, ArtistID, AlbumID, FolderPath, FileNameL, FileType,
                FileSize, SampleRate, BPM, Length, Analysed, DateCreated,
                StockDate, HotCueAutoLoad, UUID, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?9, ?10, 0, ?11, ?12, 'on', ?13, ?14, ?14)",
            params![
                content_id,
                track.title,
                artist_id,
                album_id,
                track.source_path,
                file_name,
                track.file_size as i64,
                track.sample_rate,
                (track.bpm * 100.0).round() as i64,
                track.duration.round() as i64,
                date_created,
                db::date_today(),
                content_uuid,
                now,
            ],
        )?;

        let mut cues_written = 0;
        let mut cues_skipped = 0;
        for cue in &track.cues {
            let Some(translated) = cues::translate(cue, track) else {
                cues_skipped += 1;
                continue;
            };
            match self.insert_cue(&content_id, &content_uuid, &translated) {
                Ok(()) => cues_written += 1,
                Err(err) => {
                    self.warnings.push(format!(
                        "cue {} on track {}: {err}",
                        cue.id, track.id
                    ));
                }
            }
        }
        if cues_written > 0 {
            eprintln!("[+]   wrote {cues_written} cues");
        }

        self.content_ids
            .insert(track.id.clone(), content_id.clone());
        Ok(TrackInsert {
            content_id,
            cues_written,
            cues_skipped,
        })
    }

    fn insert_cue(
        &mut self,
        content_id: &str,
        content_uuid: &str,
        cue: &cues::TranslatedCue,
    ) -> Result<(), rusqlite::Error> {
        let id = self.ids.next("djmdCue").to_string();
        let now = db::timestamp_now();
        self.conn.execute(
            "INSERT INTO djmdCue (
                ID, ContentID, InMsec, InFrame, InMpegFrame, InMpegAbs,
                OutMsec, OutFrame, OutMpegFrame, OutMpegAbs,
                Kind, Color, Comment, ContentUUID, UUID, created_at, updated_at
             ) VALUES (?1, ?2, ?3, 0, 0, 0, ?4, 0, 0, 0, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                id,
                content_id,
                cue.in_msec,
                cue.out_msec,
                cue.kind,
                cue.color,
                cue.comment,
                content_uuid,
                Uuid::new_v4().to_string(),
                now,
            ],
        )?;
        Ok(())
    }

    /// Write one playlist row plus its membership rows in track order with
    /// 1-based sequence numbers. Source tracks that were never migrated are
    /// logged and skipped.
    pub fn insert_playlist(&mut self, playlist: &Playlist) -> Result<usize, rusqlite::Error> {
        eprintln!("[+] playlist {}", playlist.name);

        let playlist_id = self.ids.next("djmdPlaylist").to_string();
        let now = db::timestamp_now();
        let created_at = if playlist.created.is_empty() {
            now.clone()
        } else {
            playlist.created.clone()
        };
        let updated_at = if playlist.modified.is_empty() {
            now.clone()
        } else {
            playlist.modified.clone()
        };

        self.conn.execute(
            "INSERT INTO djmdPlaylist (
                ID, Seq, Name, Attribute, ParentID, UUID, created_at, updated_at
             ) VALUES (?1, 0, ?2, 0, 'root', ?3, ?4, ?5)",
            params![
                playlist_id,
                playlist.name,
                Uuid::new_v4().to_string(),
                created_at,
                updated_at,
            ],
        )?;

        let mut seq = 1usize;
        for source_id in &playlist.track_ids {
            let Some(content_id) = self.content_ids.get(source_id) else {
                eprintln!(
                    "[rekordbox] no migrated track for source id {source_id}, skipping membership in {}",
                    playlist.name
                );
                continue;
            };
            self.conn.execute(
                "INSERT INTO djmdSongPlaylist (
                    ID, PlaylistID, ContentID, TrackNo, UUID, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    Uuid::new_v4().to_string(),
                    playlist_id,
                    content_id,
                    seq as i64,
                    Uuid::new_v4().to_string(),
                    now,
                ],
            )?;
            seq += 1;
        }
        Ok(seq - 1)
    }

    /// All content rows, for tag-based cue recovery.
    pub fn contents(&self) -> Result<Vec<ContentRow>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT ID,
                    COALESCE(FolderPath, '') AS FolderPath,
                    COALESCE(UUID, '') AS UUID
             FROM djmdContent
             ORDER BY CAST(ID AS INTEGER)",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ContentRow {
                id: row.get("ID")?,
                folder_path: row.get("FolderPath")?,
                uuid: row.get("UUID")?,
            })
        })?;
        rows.collect()
    }

    /// Drop all cue rows. The Serato import replaces the cue table wholesale
    /// so recovered cues never duplicate previously written ones.
    pub fn clear_cues(&self) -> Result<usize, rusqlite::Error> {
        self.conn.execute("DELETE FROM djmdCue", [])
    }

    /// Insert one cue recovered from a decoded Serato CuePoint record. The
    /// record's offset is already in milliseconds.
    pub fn insert_serato_cue(
        &mut self,
        content: &ContentRow,
        index: u8,
        offset_ms: i32,
        color: u32,
        name: &str,
    ) -> Result<(), rusqlite::Error> {
        let Some(kind) = cues::cue_kind(CueType::HotCue, i64::from(index)) else {
            return Ok(());
        };
        let translated = cues::TranslatedCue {
            kind,
            in_msec: f64::from(offset_ms).max(0.0),
            out_msec: -1.0,
            color: i64::from(color),
            comment: name.to_string(),
        };
        let content_id = content.id.clone();
        let content_uuid = content.uuid.clone();
        self.insert_cue(&content_id, &content_uuid, &translated)
    }

    pub fn close(self) {
        let _ = self.conn.close();
    }
}

/// Shared artist/album resolution. `table` is one of the two fixed entity
/// table names, never user input.
fn resolve_entity(
    conn: &Connection,
    ids: &mut IdAllocator,
    cache: &mut HashMap<String, String>,
    table: &str,
    name: &str,
) -> Result<String, rusqlite::Error> {
    if let Some(id) = cache.get(name) {
        return Ok(id.clone());
    }

    let existing: Option<String> = conn
        .query_row(
            &format!("SELECT ID FROM {table} WHERE Name = ?1"),
            params![name],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    if let Some(id) = existing {
        cache.insert(name.to_string(), id.clone());
        return Ok(id);
    }

    let id = ids.next(table).to_string();
    let now = db::timestamp_now();
    conn.execute(
        &format!(
            "INSERT INTO {table} (ID, Name, UUID, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)"
        ),
        params![id, name, Uuid::new_v4().to_string(), now],
    )?;
    cache.insert(name.to_string(), id.clone());
    Ok(id)
}
