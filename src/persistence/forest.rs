//! Dump and load of a buildable [`LshForest`].
//!
//! Only the pre-index state can be captured: `build_index` consumes the
//! buildable maps this module writes. A dump is meant to be loaded into a
//! fresh forest with the same parameters, then indexed.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::error::PersistenceError;
use super::format::{
    expect_eof, read_record, write_record, BandRecord, BandRecordRef, ForestHeader,
};
use crate::error::{ForestError, Result};
use crate::forest::LshForest;

impl<R> LshForest<R> {
    fn header(&self) -> ForestHeader {
        let (rows_per_band, num_bands) = self.settings();
        ForestHeader::new(self.hash_value_size(), rows_per_band, num_bands)
    }
}

impl<R: Serialize> LshForest<R> {
    /// Write the buildable bands and key registry to `path`.
    ///
    /// Fails without touching `path` if the forest has been indexed. On I/O
    /// or encoding failure a partially written file may remain.
    pub fn dump(&self, path: impl AsRef<Path>) -> Result<()> {
        self.ensure_buildable("dump")?;
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.dump_to(&mut writer)?;
        writer.flush()?;
        debug!(path = %path.display(), "dumped lsh forest");
        Ok(())
    }

    /// Write the dump to any writer.
    pub fn dump_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.ensure_buildable("dump")?;
        self.header().write(writer)?;

        for (i, band) in self.bands().iter().enumerate() {
            let map = band.buildable().ok_or_else(|| {
                ForestError::InvalidState(format!("band {i} is indexed; cannot dump"))
            })?;
            let mut entries: Vec<_> = map.iter().map(|(k, v)| (k, v.as_slice())).collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            let record = BandRecordRef {
                band: i as u32,
                entries,
            };
            write_record(writer, &record)?;
        }

        write_record(writer, self.registry().as_map())?;
        Ok(())
    }
}

impl<R: DeserializeOwned> LshForest<R> {
    /// Read a dump written by [`dump`](Self::dump) into this forest.
    ///
    /// The forest must not be indexed and must have the writer's geometry.
    /// Loaded buckets are appended to existing ones. On failure the forest
    /// may be left partially populated.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.ensure_buildable("load")?;
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        self.load_from(&mut reader)?;
        debug!(path = %path.display(), "loaded lsh forest");
        Ok(())
    }

    /// Read a dump from any reader. The reader must end with the dump.
    pub fn load_from<Rd: Read>(&mut self, reader: &mut Rd) -> Result<()> {
        self.ensure_buildable("load")?;
        let expected = self.header();
        ForestHeader::read(reader)?.check_matches(&expected)?;

        let key_len = self.hash_value_size() * self.settings().0;
        for (i, band) in self.bands_mut().iter_mut().enumerate() {
            let record: BandRecord = read_record(reader, "band")?;
            if record.band as usize != i {
                return Err(PersistenceError::Format(format!(
                    "expected band record {i}, found {}",
                    record.band
                ))
                .into());
            }
            for (key, items) in record.entries {
                if key.len() != key_len {
                    return Err(PersistenceError::Format(format!(
                        "band {i}: segment key of {} bytes, expected {key_len}",
                        key.len()
                    ))
                    .into());
                }
                band.extend_bucket(key, items);
            }
        }

        let records: HashMap<String, R> = read_record(reader, "key registry")?;
        self.registry_merge(records);
        expect_eof(reader)?;
        Ok(())
    }
}
