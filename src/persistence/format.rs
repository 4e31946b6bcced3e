//! On-disk format for buildable forests.
//!
//! # File Layout
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Header (20B, little-endian):            │
//! │   - Magic bytes (4B): "LSHF"            │
//! │   - Format version (u32)                │
//! │   - Hash value size (u32)               │
//! │   - Rows per band (u32)                 │
//! │   - Number of bands (u32)               │
//! ├─────────────────────────────────────────┤
//! │ num_bands band records, in band order   │
//! ├─────────────────────────────────────────┤
//! │ 1 key registry record                   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Each record is a `u64` little-endian payload length followed by a postcard
//! payload. The header is checked before any record is decoded, so loading
//! into a forest with a different geometry fails up front instead of
//! misreading band payloads.

use std::io::{ErrorKind, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{PersistenceError, PersistenceResult};
use crate::forest::SegmentKey;

/// Magic bytes for forest dumps.
pub const FOREST_MAGIC: &[u8; 4] = b"LSHF";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Upper bound on a single record payload; larger lengths are treated as corruption.
pub const MAX_RECORD_LEN: u64 = 1 << 34;

/// Forest geometry written at the start of every dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestHeader {
    pub format_version: u32,
    pub hash_value_size: u32,
    pub rows_per_band: u32,
    pub num_bands: u32,
}

impl ForestHeader {
    /// 4 (magic) + 4 * 4 (u32 fields)
    pub const SERIALIZED_SIZE: usize = 20;

    pub fn new(hash_value_size: usize, rows_per_band: usize, num_bands: usize) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            hash_value_size: hash_value_size as u32,
            rows_per_band: rows_per_band as u32,
            num_bands: num_bands as u32,
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> PersistenceResult<()> {
        writer.write_all(FOREST_MAGIC)?;
        writer.write_all(&self.format_version.to_le_bytes())?;
        writer.write_all(&self.hash_value_size.to_le_bytes())?;
        writer.write_all(&self.rows_per_band.to_le_bytes())?;
        writer.write_all(&self.num_bands.to_le_bytes())?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> PersistenceResult<Self> {
        let mut buf = [0u8; Self::SERIALIZED_SIZE];
        read_exact_or_truncated(reader, &mut buf, "header")?;

        if &buf[0..4] != FOREST_MAGIC {
            return Err(PersistenceError::Format(format!(
                "bad magic bytes {:?}",
                &buf[0..4]
            )));
        }
        let field = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        let header = Self {
            format_version: field(4),
            hash_value_size: field(8),
            rows_per_band: field(12),
            num_bands: field(16),
        };
        if header.format_version != FORMAT_VERSION {
            return Err(PersistenceError::Format(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                header.format_version
            )));
        }
        Ok(header)
    }

    /// Fail if `self` (read from a file) was written with another geometry.
    pub fn check_matches(&self, expected: &ForestHeader) -> PersistenceResult<()> {
        let fields = [
            ("hash_value_size", expected.hash_value_size, self.hash_value_size),
            ("rows_per_band", expected.rows_per_band, self.rows_per_band),
            ("num_bands", expected.num_bands, self.num_bands),
        ];
        for (field, expected, actual) in fields {
            if expected != actual {
                return Err(PersistenceError::ConfigMismatch {
                    field,
                    expected: expected.into(),
                    actual: actual.into(),
                });
            }
        }
        Ok(())
    }
}

/// One band's buckets, as written. Entries are sorted by key.
#[derive(Debug, Serialize)]
pub struct BandRecordRef<'a> {
    pub band: u32,
    pub entries: Vec<(&'a SegmentKey, &'a [String])>,
}

/// One band's buckets, as read back.
#[derive(Debug, Deserialize)]
pub struct BandRecord {
    pub band: u32,
    pub entries: Vec<(SegmentKey, Vec<String>)>,
}

/// Write `value` as a length-prefixed postcard record.
pub fn write_record<W: Write, T: Serialize>(
    writer: &mut W,
    value: &T,
) -> PersistenceResult<()> {
    let payload = postcard::to_stdvec(value)?;
    writer.write_all(&(payload.len() as u64).to_le_bytes())?;
    writer.write_all(&payload)?;
    Ok(())
}

/// Read one length-prefixed postcard record.
pub fn read_record<R: Read, T: DeserializeOwned>(
    reader: &mut R,
    what: &str,
) -> PersistenceResult<T> {
    let mut len_buf = [0u8; 8];
    read_exact_or_truncated(reader, &mut len_buf, what)?;
    let len = u64::from_le_bytes(len_buf);
    if len > MAX_RECORD_LEN {
        return Err(PersistenceError::Format(format!(
            "{what} record length {len} exceeds limit"
        )));
    }

    // Grow with the bytes actually present; the length field is untrusted.
    let mut payload = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut payload)?;
    if (payload.len() as u64) < len {
        return Err(PersistenceError::Format(format!(
            "truncated {what}: {} of {len} payload bytes",
            payload.len()
        )));
    }
    postcard::from_bytes(&payload)
        .map_err(|e| PersistenceError::Deserialization(format!("{what}: {e}")))
}

/// Fail unless `reader` is exhausted.
pub fn expect_eof<R: Read>(reader: &mut R) -> PersistenceResult<()> {
    let mut probe = [0u8; 1];
    loop {
        match reader.read(&mut probe) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                return Err(PersistenceError::Format(
                    "trailing bytes after key registry record".to_string(),
                ))
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn read_exact_or_truncated<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    what: &str,
) -> PersistenceResult<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            PersistenceError::Format(format!("truncated {what}"))
        } else {
            PersistenceError::Io(e)
        }
    })
}
