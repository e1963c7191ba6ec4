/// Fjall-based persistence for imported passes
///
/// Two partitions back the store:
///
/// - `passes`: pass documents as JSON, without image bytes
/// - `images`: one entry per (pass, image slot)
///
/// Pass and image entries for one id are always written in a single batch,
/// so a reader never sees a pass with half of its artwork.
///
/// ## Usage
///
/// ```rust,ignore
/// use passvault::store::PassStore;
///
/// let store = PassStore::open("data/passes")?;
/// store.insert(&pass)?;
/// let loaded = store.get(&pass.id)?;
/// ```

pub mod error;
pub mod keys;
pub mod store;

pub use error::{Result, StoreError};
pub use store::{PassStore, PassSummary, StoreStats};
