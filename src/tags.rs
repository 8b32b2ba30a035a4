//! Recovery of the Serato Markers2 payload from audio file tags, using
//! `lofty`. The payload travels as an ID3v2 `GEOB` (binary attachment)
//! frame whose content description is `"Serato Markers2"`; its body is
//! base64 text (line-wrapped, with a short binary prefix) that decodes to
//! the buffer `serato::decode_markers` understands.

use std::fs::File;
use std::path::Path;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use lofty::config::ParseOptions;
use lofty::file::AudioFile;
use lofty::id3::v2::{Frame, Id3v2Tag};
use lofty::mpeg::MpegFile;
use thiserror::Error;

/// Content description of the GEOB frame carrying cue metadata.
pub const MARKERS2_DESCRIPTOR: &str = "Serato Markers2";

#[derive(Debug, Error)]
pub enum TagError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        source: lofty::error::LoftyError,
    },
    #[error("{0} is not an MP3 file")]
    UnsupportedFormat(String),
    #[error("no ID3v2 tag in {0}")]
    NoId3v2(String),
    #[error("no Serato Markers2 frame in {0}")]
    NoMarkers(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Read `path` and return the decoded Markers2 buffer, ready for
/// `serato::decode_markers`.
pub fn read_serato_markers(path: &str) -> Result<Vec<u8>, TagError> {
    if !Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"))
    {
        return Err(TagError::UnsupportedFormat(path.to_string()));
    }

    let mut reader = File::open(path).map_err(|source| TagError::Open {
        path: path.to_string(),
        source,
    })?;
    let mpeg = MpegFile::read_from(&mut reader, ParseOptions::new().read_properties(false))
        .map_err(|source| TagError::Parse {
            path: path.to_string(),
            source,
        })?;
    let tag = mpeg
        .id3v2()
        .ok_or_else(|| TagError::NoId3v2(path.to_string()))?;

    let payload = markers2_payload(tag).ok_or_else(|| TagError::NoMarkers(path.to_string()))?;
    decode_base64_payload(&payload)
}

/// Find the Markers2 GEOB frame among the tag's binary frames and return
/// its raw (still base64-encoded) payload. Binary frames that are not
/// GEOB-shaped, or GEOBs with other descriptors, are someone else's data.
fn markers2_payload(tag: &Id3v2Tag) -> Option<Vec<u8>> {
    for frame in tag {
        let Frame::Binary(binary) = frame else {
            continue;
        };
        if let Ok((descriptor, payload)) = geob_parts(&binary.data) {
            if descriptor == MARKERS2_DESCRIPTOR {
                return Some(payload.to_vec());
            }
        }
    }
    None
}

/// Split a GEOB frame body into its content description and payload.
///
/// Layout: encoding byte, then MIME type, filename and description as
/// null-terminated strings, then the payload. Serato writes encoding 0
/// (Latin-1), which is all this parser accepts.
pub fn geob_parts(body: &[u8]) -> Result<(String, &[u8]), &'static str> {
    let (&encoding, rest) = body.split_first().ok_or("empty frame body")?;
    if encoding != 0 && encoding != 3 {
        return Err("unsupported text encoding");
    }

    let mut cursor = rest;
    let mut take_string = || -> Result<String, &'static str> {
        let nul = cursor
            .iter()
            .position(|&b| b == 0)
            .ok_or("unterminated string")?;
        let s = cursor[..nul].iter().map(|&b| b as char).collect();
        cursor = &cursor[nul + 1..];
        Ok(s)
    };

    let _mime = take_string()?;
    let _filename = take_string()?;
    let descriptor = take_string()?;
    Ok((descriptor, cursor))
}

/// Decode the base64 text payload of a Markers2 GEOB.
///
/// The text is preceded by a short binary version prefix and wrapped with
/// newlines, and its padding is unreliable, so everything outside the
/// base64 alphabet is stripped before decoding.
pub fn decode_base64_payload(payload: &[u8]) -> Result<Vec<u8>, TagError> {
    let filtered: Vec<u8> = payload
        .iter()
        .copied()
        .filter(|b| b.is_ascii_alphanumeric() || *b == b'+' || *b == b'/')
        .collect();
    Ok(STANDARD_NO_PAD.decode(filtered)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serato::{decode_markers, SeratoTag};
    use base64::engine::general_purpose::STANDARD;

    fn geob_body(descriptor: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![0u8];
        body.extend_from_slice(b"application/octet-stream");
        body.push(0);
        body.push(0); // empty filename
        body.extend_from_slice(descriptor.as_bytes());
        body.push(0);
        body.extend_from_slice(payload);
        body
    }

    #[test]
    fn geob_parts_splits_descriptor_and_payload() {
        let body = geob_body(MARKERS2_DESCRIPTOR, b"DATA");
        let (descriptor, payload) = geob_parts(&body).unwrap();
        assert_eq!(descriptor, MARKERS2_DESCRIPTOR);
        assert_eq!(payload, b"DATA");
    }

    #[test]
    fn geob_parts_rejects_unterminated_body() {
        assert!(geob_parts(&[0u8, b'a', b'b']).is_err());
        assert!(geob_parts(&[]).is_err());
    }

    #[test]
    fn geob_parts_rejects_utf16_encodings() {
        let mut body = geob_body(MARKERS2_DESCRIPTOR, b"DATA");
        body[0] = 1;
        assert!(geob_parts(&body).is_err());
    }

    #[test]
    fn base64_payload_survives_prefix_and_line_wrapping() {
        let inner = b"\x01\x01hello markers";
        let encoded = STANDARD.encode(inner);
        let mut payload = vec![0x01, 0x01];
        for chunk in encoded.as_bytes().chunks(8) {
            payload.extend_from_slice(chunk);
            payload.push(b'\n');
        }
        assert_eq!(decode_base64_payload(&payload).unwrap(), inner);
    }

    #[test]
    fn full_payload_pipeline_yields_records() {
        // A BPMLOCK record, framed the way Serato stores it.
        let mut markers = vec![0x01, 0x01];
        markers.extend_from_slice(b"BPMLOCK\0");
        markers.extend_from_slice(&2u32.to_be_bytes());
        markers.extend_from_slice(&[0, 1]);

        let mut payload = vec![0x01, 0x01];
        payload.extend_from_slice(STANDARD.encode(&markers).as_bytes());
        let body = geob_body(MARKERS2_DESCRIPTOR, &payload);

        let (descriptor, raw) = geob_parts(&body).unwrap();
        assert_eq!(descriptor, MARKERS2_DESCRIPTOR);
        let decoded = decode_base64_payload(raw).unwrap();
        assert_eq!(
            decode_markers(&decoded).unwrap(),
            vec![SeratoTag::BpmLock(true)]
        );
    }

    #[test]
    fn non_mp3_paths_are_rejected() {
        assert!(matches!(
            read_serato_markers("/music/track.flac"),
            Err(TagError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn missing_file_is_an_open_error() {
        assert!(matches!(
            read_serato_markers("/nonexistent/track.mp3"),
            Err(TagError::Open { .. })
        ));
    }
}
