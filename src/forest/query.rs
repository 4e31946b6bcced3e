//! Concurrent multi-band lookup.
//!
//! ```text
//!   signature ──► band keys ─┬─► probe(band 0) ─┐
//!                            ├─► probe(band 1) ─┼─► bounded channel ─► dedup ─► caller
//!                            └─► probe(band n) ─┘
//! ```
//!
//! Every band is probed on every query. Each probe owns a clone of the result
//! sender, so the channel disconnects exactly when the last probe finishes.
//! A second, never-written channel acts as the abandon signal: dropping its
//! sender wakes any probe blocked on a full result channel.

use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use crossbeam::select;

use super::band::IndexedBand;
use super::segment::{BandKeys, SegmentKey};
use crate::error::{ForestError, Result};

type ProbeTask = Box<dyn FnOnce() + Send + 'static>;

/// Streaming, deduplicated query results.
///
/// Yields each matching item key once, in arrival order across bands (not
/// stable between calls). Dropping the stream before it is exhausted cancels
/// outstanding probes and joins their threads.
pub struct QueryStream {
    results: Receiver<String>,
    done: Option<Sender<()>>,
    probes: Vec<JoinHandle<()>>,
    seen: HashSet<String>,
}

impl QueryStream {
    /// Spawn one probe thread per band. `bands` and `keys` are aligned by band index.
    pub(crate) fn spawn(bands: &[Arc<IndexedBand>], keys: BandKeys, capacity: usize) -> Result<Self> {
        Self::spawn_with(bands, keys, capacity, |band, task| {
            thread::Builder::new()
                .name(format!("lsh-probe-{band}"))
                .spawn(task)
        })
    }

    /// Like [`spawn`](Self::spawn) with a caller-supplied thread spawner.
    ///
    /// If any spawn fails, the probes already started are cancelled and
    /// joined before the error is returned.
    fn spawn_with<F>(
        bands: &[Arc<IndexedBand>],
        keys: BandKeys,
        capacity: usize,
        mut spawner: F,
    ) -> Result<Self>
    where
        F: FnMut(usize, ProbeTask) -> io::Result<JoinHandle<()>>,
    {
        debug_assert_eq!(bands.len(), keys.len());
        let (result_tx, result_rx) = channel::bounded(capacity);
        let (done_tx, done_rx) = channel::bounded::<()>(0);

        let mut stream = Self {
            results: result_rx,
            done: Some(done_tx),
            probes: Vec::with_capacity(bands.len()),
            seen: HashSet::new(),
        };
        for (i, (band, key)) in bands.iter().zip(keys).enumerate() {
            let band = Arc::clone(band);
            let results = result_tx.clone();
            let done = done_rx.clone();
            let task: ProbeTask = Box::new(move || probe(&band, &key, &results, &done));
            let handle = spawner(i, task).map_err(ForestError::ThreadSpawn)?;
            stream.probes.push(handle);
        }
        Ok(stream)
    }

    /// Stop the probes. Keys already buffered are discarded.
    pub fn cancel(&mut self) {
        self.done.take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.done.is_none()
    }

    /// Like [`Iterator::next`], but gives up at `deadline`.
    ///
    /// `Ok(None)` means the stream is over: every band has been fully probed,
    /// or the stream was cancelled. The deadline is checked before every
    /// receive, so a channel that never runs dry still times out.
    pub fn next_deadline(
        &mut self,
        deadline: Instant,
    ) -> std::result::Result<Option<String>, DeadlineExceeded> {
        if self.is_cancelled() {
            return Ok(None);
        }
        loop {
            if Instant::now() >= deadline {
                return Err(DeadlineExceeded);
            }
            match self.results.recv_deadline(deadline) {
                Ok(key) => {
                    if let Some(key) = self.first_sighting(key) {
                        return Ok(Some(key));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(None),
                Err(RecvTimeoutError::Timeout) => return Err(DeadlineExceeded),
            }
        }
    }

    /// Number of distinct keys yielded so far.
    pub fn yielded(&self) -> usize {
        self.seen.len()
    }

    fn first_sighting(&mut self, key: String) -> Option<String> {
        if self.seen.contains(&key) {
            return None;
        }
        self.seen.insert(key.clone());
        Some(key)
    }
}

/// Returned by [`QueryStream::next_deadline`] when the deadline passes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded;

impl Iterator for QueryStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.is_cancelled() {
            return None;
        }
        loop {
            let key = self.results.recv().ok()?;
            if let Some(key) = self.first_sighting(key) {
                return Some(key);
            }
        }
    }
}

impl Drop for QueryStream {
    fn drop(&mut self) {
        self.cancel();
        for handle in self.probes.drain(..) {
            // A panicking probe has already dropped its sender; nothing to recover.
            let _ = handle.join();
        }
    }
}

/// Binary-search one band and forward its bucket until done or abandoned.
fn probe(band: &IndexedBand, key: &SegmentKey, results: &Sender<String>, done: &Receiver<()>) {
    let Some(items) = band.lookup(key) else {
        return;
    };
    for item in items {
        select! {
            send(results, item.clone()) -> sent => {
                if sent.is_err() {
                    return;
                }
            }
            recv(done) -> _ => return,
        }
    }
}
