//! Data model for the star table.
//!
//! # Core Types
//!
//! - [`Star`] - one row: fixed coordinates plus the claim group
//! - [`ClaimPatch`] - the write applied when a star is claimed
//! - [`ChangeEvent`] - `{previous, current}` pair pushed after each commit
//!
//! # Reads
//!
//! - [`StarFilter`] - conjunctive row predicate
//! - [`StarOrder`] / [`StarQuery`] - ordering and result cap

mod change;
mod query;
mod star;

pub use change::ChangeEvent;
pub use query::{StarFilter, StarOrder, StarQuery};
pub use star::{
    ClaimPatch, Star, StarColor, StarId, UpdateCount, ANONYMOUS_OWNER, MAX_MESSAGE_CHARS,
};
