//! Positional diff of two roster snapshots.
//!
//! Records are paired by index, not by identity: the forum reports users in
//! a stable order between consecutive polls, and the pairing leans on that.
//! If the ordering ever shifts independently of membership (a sort change
//! upstream) this produces false positives. Kept as-is for compatibility,
//! see DESIGN.md.

use tracing::{debug, warn};

use crate::model::{RosterSnapshot, UserRef};
use crate::sanitize::{MissingField, sanitize};

/// Compare two roster snapshots and return the candidate user whose
/// sanitized record changed.
///
/// Every paired index is scanned and the LAST differing index wins; when
/// several users change in one cycle only the final one scanned is reported.
/// A size mismatch between the rosters is logged and treated as "no
/// candidate", since pairing by index is meaningless across an enrollment
/// change.
///
/// # Errors
///
/// Returns [`MissingField`] if any record on either side lacks a volatile
/// field (schema drift upstream; the diff result would be garbage).
pub fn diff_roster(
    prev: &RosterSnapshot,
    curr: &RosterSnapshot,
) -> Result<Option<UserRef>, MissingField> {
    if prev.users.len() != curr.users.len() {
        warn!(
            prev = prev.users.len(),
            curr = curr.users.len(),
            "roster size changed between polls; skipping diff"
        );
        return Ok(None);
    }

    let mut candidate = None;
    for (index, (prev_user, curr_user)) in prev.users.iter().zip(&curr.users).enumerate() {
        let mut prev_user = prev_user.clone();
        let mut curr_user = curr_user.clone();
        sanitize(&mut prev_user)?;
        sanitize(&mut curr_user)?;

        if prev_user != curr_user {
            debug!(index, name = %curr_user.name, "roster record differs");
            // Later hits overwrite earlier ones.
            candidate = Some(UserRef {
                name: curr_user.name,
                email: curr_user.email,
            });
        }
    }

    Ok(candidate)
}
