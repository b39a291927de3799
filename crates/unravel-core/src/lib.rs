//! unravel-core: snapshot store and diff/correlation engine.
//!
//! The polling loop in `unravel-cli` captures two kinds of snapshots from a
//! class forum, the user roster (per-user statistics) and the full nested
//! post tree, and this crate answers one question about them: between two
//! consecutive polls, which enrolled user touched an anonymous post, and
//! what did they change?
//!
//! # Conventions
//!
//! - **Errors**: per-module `thiserror` enums at the seams, `anyhow::Result`
//!   for plumbing that only ever bubbles up.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Purity**: the diff functions never touch the network or the store;
//!   retrieval and persistence are the caller's responsibility.

pub mod correlate;
pub mod locate;
pub mod model;
pub mod posts;
pub mod roster;
pub mod sanitize;
pub mod store;

pub use correlate::{Attribution, correlate};
pub use locate::locate_content;
pub use model::{
    ChangeKind, ChangeLogEntry, PostChange, PostNode, PostTreeSnapshot, ReplyNode, Revision,
    RosterSnapshot, UserRecord, UserRef,
};
pub use posts::diff_posts;
pub use roster::diff_roster;
pub use sanitize::{MissingField, sanitize};
pub use store::{SnapshotStore, Window};
