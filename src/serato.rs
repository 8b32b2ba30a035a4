//! Decoder for the binary "Serato Markers2" payload.
//!
//! The payload is a 2-byte header followed by a run of records, each a
//! null-terminated ASCII tag name, a 5-byte gap (the terminator plus a
//! 4-byte length field the decoder does not trust), and a fixed-width body.
//! Only the known tag names are decodable; there is no generic per-tag
//! length table, so an unrecognized name is a hard decode error — guessing
//! a skip length would desynchronize every record after it.

use thiserror::Error;

/// One decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeratoTag {
    Color(u32),
    CuePoint {
        /// Zero-based hotcue slot.
        index: u8,
        offset_ms: i32,
        /// Packed RGB, high byte masked off.
        color: u32,
        name: String,
    },
    BpmLock(bool),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeratoError {
    #[error("unknown tag {name:?} at offset {offset}")]
    UnknownTag { name: String, offset: usize },
    #[error("record truncated at offset {0}")]
    Truncated(usize),
}

const HEADER_LEN: usize = 2;
/// Null terminator plus the 4-byte length field after every tag name.
const NAME_GAP: usize = 5;
/// A CUE body always advances 13 bytes regardless of its name length; the
/// name is read separately from its fixed offset and any bytes past the
/// stride fall into the next record's name scan.
const CUE_STRIDE: usize = 13;
const CUE_NAME_OFFSET: usize = 12;
const COLOR_MASK: u32 = 0x00FF_FFFF;

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn find_nul(buf: &[u8], from: usize) -> Option<usize> {
    buf[from..].iter().position(|&b| b == 0).map(|p| from + p)
}

fn be_u32(buf: &[u8], at: usize) -> Result<u32, SeratoError> {
    let bytes: [u8; 4] = buf
        .get(at..at + 4)
        .ok_or(SeratoError::Truncated(at))?
        .try_into()
        .expect("slice of length 4");
    Ok(u32::from_be_bytes(bytes))
}

/// Decode a full Markers2 buffer into its ordered record sequence.
///
/// Terminates cleanly at end of buffer; trailing bytes too short to hold a
/// record header (leftovers of a long cue name) are ignored.
pub fn decode_markers(buf: &[u8]) -> Result<Vec<SeratoTag>, SeratoError> {
    let mut records = Vec::new();
    let mut idx = HEADER_LEN;

    while idx < buf.len() {
        let name_start = idx;
        let Some(nul) = find_nul(buf, idx) else {
            break;
        };
        let field = nul + NAME_GAP;
        if field > buf.len() {
            break;
        }

        match latin1(&buf[name_start..nul]).as_str() {
            "COLOR" => {
                records.push(SeratoTag::Color(be_u32(buf, field)?));
                idx = field + 4;
            }
            "CUE" => {
                if field + CUE_STRIDE > buf.len() {
                    return Err(SeratoError::Truncated(field));
                }
                let index = buf[field + 1];
                let offset_ms = be_u32(buf, field + 2)? as i32;
                let color = be_u32(buf, field + 6)? & COLOR_MASK;
                let name_at = field + CUE_NAME_OFFSET;
                let name_end =
                    find_nul(buf, name_at).ok_or(SeratoError::Truncated(name_at))?;
                records.push(SeratoTag::CuePoint {
                    index,
                    offset_ms,
                    color,
                    name: latin1(&buf[name_at..name_end]),
                });
                idx = field + CUE_STRIDE;
            }
            "BPMLOCK" => {
                let flag: [u8; 2] = buf
                    .get(field..field + 2)
                    .ok_or(SeratoError::Truncated(field))?
                    .try_into()
                    .expect("slice of length 2");
                records.push(SeratoTag::BpmLock(u16::from_be_bytes(flag) != 0));
                idx = field + 2;
            }
            other => {
                return Err(SeratoError::UnknownTag {
                    name: other.to_string(),
                    offset: name_start,
                });
            }
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `name\0` + 4 arbitrary length bytes + body.
    fn entry(name: &str, body: &[u8]) -> Vec<u8> {
        let mut out = name.as_bytes().to_vec();
        out.push(0);
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn buffer(entries: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0x01, 0x01];
        for e in entries {
            out.extend_from_slice(e);
        }
        out
    }

    fn cue_body(index: u8, offset_ms: i32, color: u32, name: &str) -> Vec<u8> {
        let mut body = vec![0u8];
        body.push(index);
        body.extend_from_slice(&offset_ms.to_be_bytes());
        body.extend_from_slice(&color.to_be_bytes());
        body.extend_from_slice(&[0, 0]);
        body.extend_from_slice(name.as_bytes());
        body.push(0);
        body
    }

    #[test]
    fn decodes_single_cue_record() {
        let buf = buffer(&[entry("CUE", &cue_body(2, 1500, 0x0011_2233, "Drop"))]);
        let records = decode_markers(&buf).unwrap();
        assert_eq!(
            records,
            vec![SeratoTag::CuePoint {
                index: 2,
                offset_ms: 1500,
                color: 0x0011_2233,
                name: "Drop".to_string(),
            }]
        );
    }

    #[test]
    fn cue_color_high_byte_is_masked() {
        let buf = buffer(&[entry("CUE", &cue_body(0, 0, 0xFFCC_0001, ""))]);
        let records = decode_markers(&buf).unwrap();
        assert_eq!(
            records,
            vec![SeratoTag::CuePoint {
                index: 0,
                offset_ms: 0,
                color: 0x00CC_0001,
                name: String::new(),
            }]
        );
    }

    #[test]
    fn decodes_color_record() {
        let buf = buffer(&[entry("COLOR", &0x00FF_8800u32.to_be_bytes())]);
        assert_eq!(
            decode_markers(&buf).unwrap(),
            vec![SeratoTag::Color(0x00FF_8800)]
        );
    }

    #[test]
    fn decodes_bpmlock_record() {
        let buf = buffer(&[entry("BPMLOCK", &[0, 1])]);
        assert_eq!(decode_markers(&buf).unwrap(), vec![SeratoTag::BpmLock(true)]);

        let buf = buffer(&[entry("BPMLOCK", &[0, 0])]);
        assert_eq!(decode_markers(&buf).unwrap(), vec![SeratoTag::BpmLock(false)]);
    }

    #[test]
    fn decodes_multiple_records_in_order() {
        // Empty cue names keep each body exactly one stride long.
        let buf = buffer(&[
            entry("COLOR", &0x0000_00FFu32.to_be_bytes()),
            entry("BPMLOCK", &[0, 1]),
            entry("CUE", &cue_body(0, 250, 1, "")),
            entry("CUE", &cue_body(1, 500, 2, "")),
        ]);
        let records = decode_markers(&buf).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0], SeratoTag::Color(0x0000_00FF));
        assert_eq!(records[1], SeratoTag::BpmLock(true));
        assert!(matches!(
            records[2],
            SeratoTag::CuePoint { index: 0, offset_ms: 250, .. }
        ));
        assert!(matches!(
            records[3],
            SeratoTag::CuePoint { index: 1, offset_ms: 500, .. }
        ));
    }

    #[test]
    fn unknown_tag_is_a_decode_error() {
        let buf = buffer(&[entry("FLIP", &[0xAB, 0xCD])]);
        assert_eq!(
            decode_markers(&buf),
            Err(SeratoError::UnknownTag {
                name: "FLIP".to_string(),
                offset: 2,
            })
        );
    }

    #[test]
    fn truncated_cue_body_is_a_decode_error() {
        let mut buf = buffer(&[entry("CUE", &cue_body(1, 100, 0, "Drop"))]);
        buf.truncate(2 + 4 + 4 + 8);
        assert!(matches!(
            decode_markers(&buf),
            Err(SeratoError::Truncated(_))
        ));
    }

    #[test]
    fn cue_name_without_terminator_is_a_decode_error() {
        let mut body = cue_body(1, 100, 0, "");
        // Replace the empty name's terminator with a dangling byte.
        body[12] = b'X';
        let buf = buffer(&[entry("CUE", &body)]);
        assert!(matches!(
            decode_markers(&buf),
            Err(SeratoError::Truncated(_))
        ));
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        assert_eq!(decode_markers(&[]).unwrap(), vec![]);
        assert_eq!(decode_markers(&[0x01, 0x01]).unwrap(), vec![]);
    }

    #[test]
    fn trailing_terminator_is_clean_end() {
        // Real payloads end with a lone null after the last record.
        let mut buf = buffer(&[entry("BPMLOCK", &[0, 1])]);
        buf.push(0);
        assert_eq!(decode_markers(&buf).unwrap(), vec![SeratoTag::BpmLock(true)]);
    }
}
