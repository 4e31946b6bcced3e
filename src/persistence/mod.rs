//! Disk persistence for buildable forests.
//!
//! A dump captures each band's segment key → item keys map, in band order,
//! followed by the key registry. Indexed forests cannot be dumped: indexing
//! drops the maps this format stores. See [`format`] for the byte layout.
//!
//! ```rust,ignore
//! let mut forest: LshForest<Location> = LshForest::new(128, 0.8)?;
//! // ... inserts, registry entries ...
//! forest.dump("graph.lshf")?;
//!
//! let mut restored: LshForest<Location> = LshForest::new(128, 0.8)?;
//! restored.load("graph.lshf")?;
//! restored.build_index()?;
//! ```

pub mod error;

#[cfg(feature = "persistence")]
pub mod format;

#[cfg(feature = "persistence")]
mod forest;

pub use error::{PersistenceError, PersistenceResult};
#[cfg(feature = "persistence")]
pub use format::{ForestHeader, FORMAT_VERSION, FOREST_MAGIC};
