//! StarBazaar Record Store
//!
//! Typed facade over the star table: point reads, filtered range reads,
//! exact counts, the single-row conditional claim, and a change feed.
//!
//! # Architecture
//!
//! - **Models**: [`Star`], [`ClaimPatch`], [`ChangeEvent`], query types
//! - **Store**: the [`RecordStore`] trait every component is handed
//! - **MemoryStore**: in-process table with fault injection
//! - **RocksStore**: RocksDB-backed persistent table
//!
//! # The claim predicate
//!
//! [`RecordStore::conditional_claim`] is the only write. It modifies a row
//! only while `is_claimed = false`, so `is_claimed` never reverts and two
//! racing claims on one id produce exactly one `UpdateCount::ONE`.
//!
//! # Example
//!
//! ```no_run
//! use starbazaar_store::{MemoryStore, RecordStore, Star, StarId};
//!
//! # async fn demo() -> starbazaar_store::Result<()> {
//! let store = MemoryStore::new();
//! store.seed((1..=5).map(|i| Star::unclaimed(StarId(i), 0.0, 0.0, i as f64)))?;
//! let star = store.get_by_id(StarId(3)).await?;
//! assert!(star.is_some());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod rocks;
pub mod store;

pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use models::{
    ChangeEvent, ClaimPatch, Star, StarColor, StarFilter, StarId, StarOrder, StarQuery,
    UpdateCount, ANONYMOUS_OWNER, MAX_MESSAGE_CHARS,
};
pub use rocks::RocksStore;
pub use store::{ChangeFeed, ChangeSubscription, Delivery, RecordStore, DEFAULT_FEED_CAPACITY};
