//! Source-side adapter: reads tracks, cues, playlists and crates out of a
//! Mixxx library database. Read-only; the connection is owned for the
//! duration of one run.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection};

use crate::db;
use crate::types::{Cue, CueType, Playlist, Track};

/// Crates share the playlist id space in the target, offset past the
/// largest real playlist id, and are marked by this name prefix.
pub const CRATE_NAME_PREFIX: &str = "[Crate] ";

pub struct MixxxLibrary {
    conn: Connection,
}

impl MixxxLibrary {
    /// Open a Mixxx library read-only. Every other operation requires the
    /// value this returns, so nothing can touch an unopened store.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        eprintln!("[mixxx] opening library {path}");
        let conn = db::open_source(path)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Self {
        let conn = db::open_test();
        conn.execute_batch(TEST_SCHEMA).unwrap();
        Self { conn }
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Load the full track list, cues attached, filesystem metadata fetched
    /// opportunistically (a missing file is not an error).
    pub fn tracks(&self) -> Result<Vec<Track>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT
                library.id,
                COALESCE(artist, '') AS artist,
                COALESCE(title, '') AS title,
                COALESCE(album, '') AS album,
                COALESCE(genre, '') AS genre,
                COALESCE(key, '') AS key,
                COALESCE(samplerate, 0) AS samplerate,
                COALESCE(duration, 0) AS duration,
                COALESCE(bpm, 0) AS bpm,
                COALESCE(track_locations.location, '') AS sourcePath
             FROM library
             JOIN track_locations ON library.location = track_locations.id
             ORDER BY library.id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Track {
                id: row.get::<_, i64>("id")?.to_string(),
                artist: row.get("artist")?,
                title: row.get("title")?,
                album: row.get("album")?,
                genre: row.get("genre")?,
                key: row.get("key")?,
                sample_rate: row.get("samplerate")?,
                duration: row.get("duration")?,
                bpm: row.get("bpm")?,
                source_path: row.get("sourcePath")?,
                cues: vec![],
                file_size: 0,
                file_created: None,
            })
        })?;

        let mut tracks: Vec<Track> = rows.collect::<Result<_, _>>()?;
        for track in &mut tracks {
            track.cues = self.cues_for_track(&track.id)?;
            if let Ok(metadata) = std::fs::metadata(&track.source_path) {
                track.file_size = metadata.len();
                track.file_created = metadata.created().ok();
            }
        }
        Ok(tracks)
    }

    fn cues_for_track(&self, track_id: &str) -> Result<Vec<Cue>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                COALESCE(type, 0) AS type,
                COALESCE(position, 0) AS position,
                COALESCE(length, 0) AS length,
                COALESCE(hotcue, -1) AS hotcue,
                COALESCE(label, '') AS label,
                COALESCE(color, 0) AS color
             FROM cues
             WHERE track_id = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![track_id], |row| {
            Ok(Cue {
                id: row.get::<_, i64>("id")?.to_string(),
                cue_type: CueType::from_raw(row.get("type")?),
                position: row.get("position")?,
                length: row.get("length")?,
                hotcue_number: row.get("hotcue")?,
                label: row.get("label")?,
                color: row.get("color")?,
            })
        })?;
        rows.collect()
    }

    /// Load playlists and crates against an already-loaded track set. A
    /// membership row referencing a track that is not in the set is logged
    /// and skipped.
    pub fn playlists(&self, tracks: &[Track]) -> Result<Vec<Playlist>, rusqlite::Error> {
        let known: HashSet<&str> = tracks.iter().map(|t| t.id.as_str()).collect();

        let mut playlists: Vec<Playlist> = Vec::new();
        let mut by_id: HashMap<i64, usize> = HashMap::new();
        let mut max_playlist_id = 0i64;

        let mut stmt = self.conn.prepare(
            "SELECT id,
                    COALESCE(name, 'Untitled Playlist') AS name,
                    COALESCE(date_created, '') AS date_created,
                    COALESCE(date_modified, '') AS date_modified
             FROM Playlists
             WHERE hidden = 0
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Playlist {
                id: row.get("id")?,
                name: row.get("name")?,
                created: row.get("date_created")?,
                modified: row.get("date_modified")?,
                track_ids: vec![],
            })
        })?;
        for playlist in rows {
            let playlist = playlist?;
            max_playlist_id = max_playlist_id.max(playlist.id);
            by_id.insert(playlist.id, playlists.len());
            playlists.push(playlist);
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, COALESCE(name, 'Untitled Crate') AS name FROM crates ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>("id")?, row.get::<_, String>("name")?))
        })?;
        for row in rows {
            let (crate_id, name) = row?;
            let playlist = Playlist {
                id: max_playlist_id + crate_id,
                name: format!("{CRATE_NAME_PREFIX}{name}"),
                created: String::new(),
                modified: String::new(),
                track_ids: vec![],
            };
            by_id.insert(playlist.id, playlists.len());
            playlists.push(playlist);
        }

        let mut stmt = self.conn.prepare(
            "SELECT playlist_id, track_id FROM PlaylistTracks ORDER BY playlist_id, position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>("playlist_id")?, row.get::<_, i64>("track_id")?))
        })?;
        for row in rows {
            let (playlist_id, track_id) = row?;
            let track_id = track_id.to_string();
            // Membership of a hidden playlist has no entry in the map.
            let Some(&slot) = by_id.get(&playlist_id) else {
                continue;
            };
            if !known.contains(track_id.as_str()) {
                eprintln!(
                    "[mixxx] track {track_id} not in library, skipping membership in playlist {playlist_id}"
                );
                continue;
            }
            playlists[slot].track_ids.push(track_id);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT crate_id, track_id FROM crate_tracks ORDER BY crate_id, track_id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>("crate_id")?, row.get::<_, i64>("track_id")?))
        })?;
        for row in rows {
            let (crate_id, track_id) = row?;
            let track_id = track_id.to_string();
            let Some(&slot) = by_id.get(&(max_playlist_id + crate_id)) else {
                continue;
            };
            if !known.contains(track_id.as_str()) {
                eprintln!(
                    "[mixxx] track {track_id} not in library, skipping membership in crate {crate_id}"
                );
                continue;
            }
            playlists[slot].track_ids.push(track_id);
        }

        Ok(playlists)
    }

    pub fn close(self) {
        let _ = self.conn.close();
    }
}

#[cfg(test)]
pub(crate) const TEST_SCHEMA: &str = "
CREATE TABLE library (
    id INTEGER PRIMARY KEY,
    artist TEXT, title TEXT, album TEXT, genre TEXT, key TEXT,
    samplerate INTEGER, duration REAL, bpm REAL,
    location INTEGER
);
CREATE TABLE track_locations (id INTEGER PRIMARY KEY, location TEXT);
CREATE TABLE cues (
    id INTEGER PRIMARY KEY,
    track_id INTEGER NOT NULL,
    type INTEGER, position REAL, length REAL, hotcue INTEGER, label TEXT, color INTEGER
);
CREATE TABLE Playlists (
    id INTEGER PRIMARY KEY,
    name TEXT, hidden INTEGER, date_created TEXT, date_modified TEXT
);
CREATE TABLE PlaylistTracks (
    id INTEGER PRIMARY KEY,
    playlist_id INTEGER, track_id INTEGER, position INTEGER
);
CREATE TABLE crates (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE crate_tracks (crate_id INTEGER, track_id INTEGER);
";

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_track(lib: &MixxxLibrary, id: i64, title: &str, path: &str) {
        lib.conn()
            .execute(
                "INSERT INTO track_locations (id, location) VALUES (?1, ?2)",
                params![id, path],
            )
            .unwrap();
        lib.conn()
            .execute(
                "INSERT INTO library (id, artist, title, album, genre, key, samplerate, duration, bpm, location)
                 VALUES (?1, 'Artist', ?2, 'Album', 'Techno', 'Am', 44100, 300.5, 128.0, ?1)",
                params![id, title],
            )
            .unwrap();
    }

    #[test]
    fn tracks_join_locations_and_attach_cues() {
        let lib = MixxxLibrary::open_in_memory();
        seed_track(&lib, 1, "One", "/music/one.mp3");
        lib.conn()
            .execute(
                "INSERT INTO cues (id, track_id, type, position, length, hotcue, label, color)
                 VALUES (10, 1, 1, 88200, 0, 0, 'Drop', 255)",
                [],
            )
            .unwrap();

        let tracks = lib.tracks().unwrap();
        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.id, "1");
        assert_eq!(track.title, "One");
        assert_eq!(track.source_path, "/music/one.mp3");
        assert_eq!(track.sample_rate, 44_100.0);
        assert_eq!(track.cues.len(), 1);
        assert_eq!(track.cues[0].cue_type, CueType::HotCue);
        assert_eq!(track.cues[0].hotcue_number, 0);
        assert_eq!(track.cues[0].label, "Drop");
        // Nonexistent file: metadata defaults stay.
        assert_eq!(track.file_size, 0);
        assert!(track.file_created.is_none());
    }

    #[test]
    fn null_columns_read_as_empty_or_defaults() {
        let lib = MixxxLibrary::open_in_memory();
        lib.conn()
            .execute(
                "INSERT INTO track_locations (id, location) VALUES (1, '/music/x.mp3')",
                [],
            )
            .unwrap();
        lib.conn()
            .execute(
                "INSERT INTO library (id, location) VALUES (1, 1)",
                [],
            )
            .unwrap();

        let tracks = lib.tracks().unwrap();
        assert_eq!(tracks[0].artist, "");
        assert_eq!(tracks[0].sample_rate, 0.0);
        assert_eq!(tracks[0].bpm, 0.0);
    }

    #[test]
    fn hidden_playlists_are_excluded() {
        let lib = MixxxLibrary::open_in_memory();
        lib.conn()
            .execute_batch(
                "INSERT INTO Playlists (id, name, hidden) VALUES (1, 'Visible', 0);
                 INSERT INTO Playlists (id, name, hidden) VALUES (2, 'Hidden', 1);",
            )
            .unwrap();

        let playlists = lib.playlists(&[]).unwrap();
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].name, "Visible");
    }

    #[test]
    fn crates_get_prefix_and_disjoint_id_space() {
        let lib = MixxxLibrary::open_in_memory();
        lib.conn()
            .execute_batch(
                "INSERT INTO Playlists (id, name, hidden) VALUES (7, 'Peak Time', 0);
                 INSERT INTO crates (id, name) VALUES (1, 'Bangers');
                 INSERT INTO crates (id, name) VALUES (2, 'Warmup');",
            )
            .unwrap();

        let playlists = lib.playlists(&[]).unwrap();
        assert_eq!(playlists.len(), 3);
        assert_eq!(playlists[1].name, "[Crate] Bangers");
        assert_eq!(playlists[1].id, 8);
        assert_eq!(playlists[2].id, 9);
        // Derived crate ids never collide with real playlist ids.
        for crate_playlist in &playlists[1..] {
            assert!(crate_playlist.id > 7);
        }
    }

    #[test]
    fn unknown_membership_rows_are_skipped() {
        let lib = MixxxLibrary::open_in_memory();
        seed_track(&lib, 1, "One", "/music/one.mp3");
        lib.conn()
            .execute_batch(
                "INSERT INTO Playlists (id, name, hidden) VALUES (1, 'P', 0);
                 INSERT INTO PlaylistTracks (playlist_id, track_id, position) VALUES (1, 1, 1);
                 INSERT INTO PlaylistTracks (playlist_id, track_id, position) VALUES (1, 999, 2);",
            )
            .unwrap();

        let tracks = lib.tracks().unwrap();
        let playlists = lib.playlists(&tracks).unwrap();
        assert_eq!(playlists[0].track_ids, vec!["1".to_string()]);
    }

    #[test]
    fn membership_keeps_position_order() {
        let lib = MixxxLibrary::open_in_memory();
        seed_track(&lib, 1, "One", "/music/one.mp3");
        seed_track(&lib, 2, "Two", "/music/two.mp3");
        lib.conn()
            .execute_batch(
                "INSERT INTO Playlists (id, name, hidden) VALUES (1, 'P', 0);
                 INSERT INTO PlaylistTracks (playlist_id, track_id, position) VALUES (1, 2, 1);
                 INSERT INTO PlaylistTracks (playlist_id, track_id, position) VALUES (1, 1, 2);",
            )
            .unwrap();

        let tracks = lib.tracks().unwrap();
        let playlists = lib.playlists(&tracks).unwrap();
        assert_eq!(
            playlists[0].track_ids,
            vec!["2".to_string(), "1".to_string()]
        );
    }
}
