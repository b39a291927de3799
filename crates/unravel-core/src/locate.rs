//! Recursive content lookup in a post's reply tree.
//!
//! Given the `when` timestamp pulled from a change-log entry, find the text
//! that was written at that instant. Depth-first, in list order, first match
//! wins. The branch order below is load-bearing: a node can carry `updated`,
//! `history`, and `children` at once depending on its kind, and the checks
//! must run `updated` → `history` → `children`, recursing only when the node
//! has no `history` at all.

use chrono::{DateTime, Utc};

use crate::model::{ReplyNode, Revision};

/// Traversal shape of a reply, classified by field presence.
enum NodeKind<'a> {
    /// Carries a revision history (an answer-type node).
    Answer(&'a [Revision]),
    /// Carries nested replies and no history (a discussion thread).
    Thread(&'a [ReplyNode]),
    /// Nothing to descend into.
    Leaf,
}

impl ReplyNode {
    fn kind(&self) -> NodeKind<'_> {
        if let Some(history) = &self.history {
            NodeKind::Answer(history)
        } else if self.children.is_empty() {
            NodeKind::Leaf
        } else {
            NodeKind::Thread(&self.children)
        }
    }
}

/// Search `children` for the content written at `when`.
///
/// - A child whose own `updated` equals `when` returns its `subject`
///   immediately, even if a later sibling's history would also match.
/// - An answer-type child returns the `content` of the history revision
///   whose `created` equals `when`.
/// - A thread child is recursed into; a hit short-circuits, a miss moves on
///   to the next sibling.
///
/// Returns `None` once every child is exhausted.
#[must_use]
pub fn locate_content(children: &[ReplyNode], when: DateTime<Utc>) -> Option<&str> {
    for child in children {
        if child.updated == Some(when) {
            return child.subject.as_deref();
        }
        match child.kind() {
            NodeKind::Answer(history) => {
                for revision in history {
                    if revision.created == when {
                        return revision.content.as_deref();
                    }
                }
            }
            NodeKind::Thread(nested) => {
                if let Some(found) = locate_content(nested, when) {
                    return Some(found);
                }
            }
            NodeKind::Leaf => {}
        }
    }
    None
}
