//! StarBazaar Sync
//!
//! Client-side consistency for the star claiming universe.
//!
//! # Architecture
//!
//! - **Coordinator**: [`ClaimCoordinator`] turns a claim request into exactly
//!   one conditional update and a definite [`ClaimResult`]
//! - **Live view**: [`LiveView`] keeps a bounded, id-ordered projection and
//!   the aggregate counts in step with the store's change feed
//! - **Session**: [`Explorer`] ties selection, camera, claim form and live
//!   view together for one client, one frame at a time
//!
//! Store handles are injected as `Arc<dyn RecordStore>`; nothing here owns a
//! connection.
//!
//! # Usage
//!
//! ```ignore
//! let mut explorer = Explorer::mount(store, ExplorerConfig::default()).await?;
//! explorer.sign_in(Claimant::new(user_id, Some(email))?);
//!
//! loop {
//!     let pose = explorer.tick(dt);
//!     renderer.set_camera(pose.position, pose.target);
//!     explorer.reconcile().await?;
//! }
//! ```

mod coordinator;
mod error;
mod identity;
mod live_view;
mod search;
mod session;
mod stats;

pub use coordinator::{ClaimCoordinator, ClaimForm, ClaimResult};
pub use error::{Error, Result};
pub use identity::{Claimant, Clock, SystemClock};
pub use live_view::{ApplyOutcome, LiveView, LiveViewConfig, DEFAULT_PROJECTION_CAP};
pub use search::{find_by_id, find_by_text, stars_owned_by, top_messages_today, TOP_MESSAGES_LIMIT};
pub use session::{Explorer, ExplorerConfig};
pub use stats::{start_of_local_day, ClaimProgress, DailyTally, ProgressPhase, DAILY_GOAL};
