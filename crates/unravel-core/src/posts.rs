//! Diff of two post-tree snapshots.
//!
//! Three cases, checked in order: a post disappeared, a post appeared, or an
//! existing post's change log grew. The first detected change wins; nothing
//! aggregates multiple simultaneous changes.
//!
//! # Index-0 caveat
//!
//! Under a post-count mismatch the affected post is taken from index 0 of
//! the larger snapshot. The forum enumerates most-recently-active posts
//! first, which is what made this hold in practice; it is a positional
//! assumption, not a guarantee. Kept for compatibility; see DESIGN.md.

use tracing::warn;

use crate::locate::locate_content;
use crate::model::{ChangeKind, ChangeLogEntry, PostChange, PostTreeSnapshot};

/// Outcome of structurally diffing two change-log lists.
#[derive(Debug, PartialEq, Eq)]
enum LogDiff {
    Unchanged,
    /// `curr` is `prev` plus these entries, in order. Never empty.
    Inserted(Vec<ChangeLogEntry>),
    /// The lists differ but not by pure insertion (an entry was rewritten or
    /// removed), not a shape a well-behaved change log produces.
    Reshaped,
}

/// Reduce the difference between two change logs to the inserted entries.
///
/// A change log is append-mostly, so the expected delta is "`curr` contains
/// every entry of `prev` in order, plus some new ones". Anything else is
/// [`LogDiff::Reshaped`].
fn diff_change_log(prev: &[ChangeLogEntry], curr: &[ChangeLogEntry]) -> LogDiff {
    if prev == curr {
        return LogDiff::Unchanged;
    }

    let mut remaining = prev.iter().peekable();
    let mut inserted = Vec::new();
    for entry in curr {
        if remaining.peek() == Some(&entry) {
            remaining.next();
        } else {
            inserted.push(entry.clone());
        }
    }

    if remaining.peek().is_some() || inserted.is_empty() {
        LogDiff::Reshaped
    } else {
        LogDiff::Inserted(inserted)
    }
}

/// Build the change record for a post-count mismatch from the larger
/// snapshot's index-0 post (see the module docs for the caveat).
fn boundary_change(larger: &PostTreeSnapshot, diff_type: ChangeKind) -> Option<PostChange> {
    let Some(post) = larger.posts.first() else {
        warn!("post count changed but the larger snapshot is empty");
        return None;
    };
    let Some(recent) = post.history.last() else {
        warn!(cid = post.nr, "affected post has no history revisions");
        return None;
    };
    Some(PostChange {
        cid: post.nr,
        content: recent.subject.clone(),
        diff_type,
        time: recent.created,
    })
}

/// Compare two post-tree snapshots and return the single content change
/// between them, if any.
///
/// Equal-sized snapshots are scanned per index; the first post whose change
/// log gained an entry yields the result, with the changed text resolved
/// from `curr`'s reply tree by [`locate_content`]. A change log that
/// differs in an unexpected way is logged and skipped rather than aborting
/// the scan. Only the first inserted entry of a diff is consulted; the
/// forum has never been observed to insert more than one per poll.
#[must_use]
pub fn diff_posts(prev: &PostTreeSnapshot, curr: &PostTreeSnapshot) -> Option<PostChange> {
    if prev.len() > curr.len() {
        return boundary_change(prev, ChangeKind::PostDelete);
    }
    if prev.len() < curr.len() {
        return boundary_change(curr, ChangeKind::PostAdd);
    }

    for (index, (prev_post, curr_post)) in prev.posts.iter().zip(&curr.posts).enumerate() {
        match diff_change_log(&prev_post.change_log, &curr_post.change_log) {
            LogDiff::Unchanged => {}
            LogDiff::Inserted(entries) => {
                let entry = &entries[0];
                let content = locate_content(&curr_post.children, entry.when).map(str::to_owned);
                return Some(PostChange {
                    cid: curr_post.nr,
                    content,
                    diff_type: ChangeKind::Logged(entry.kind.clone()),
                    time: entry.when,
                });
            }
            LogDiff::Reshaped => {
                warn!(
                    index,
                    cid = prev_post.nr,
                    "change_log diff has unexpected shape; skipping post"
                );
            }
        }
    }
    None
}
