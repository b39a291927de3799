//! Attribution: pairing a roster change with a post change.
//!
//! The roster diff is cheap (two stored snapshots); the post diff needs a
//! fresh crawl of every post in the class. So the roster runs
//! first and the post source is injected lazily: when no user-level signal
//! exists, no post retrieval happens at all.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::model::{PostChange, PostTreeSnapshot, RosterSnapshot, UserRef};
use crate::posts::diff_posts;
use crate::roster::diff_roster;

/// A detected (user, change) pairing.
///
/// `change` is `None` when the roster moved but no post-level difference
/// could be pinned down: the user did something the post diff cannot see
/// (or the snapshots raced the change).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Attribution {
    pub user: UserRef,
    pub change: Option<PostChange>,
}

/// Correlate a roster diff with a post diff.
///
/// Runs [`diff_roster`] on the two roster snapshots; if no candidate user
/// falls out, returns `Ok(None)` without ever invoking `fetch_posts`.
/// Otherwise obtains a fresh post-tree snapshot from `fetch_posts`, diffs it
/// against `posts_prev`, and returns the attribution together with the fresh
/// snapshot, which the caller reseeds as the stored "current" tree for the
/// next cycle.
///
/// # Errors
///
/// Fails if sanitization hits a record with a missing volatile field, or if
/// `fetch_posts` itself fails.
pub fn correlate<F>(
    roster_prev: &RosterSnapshot,
    roster_curr: &RosterSnapshot,
    posts_prev: &PostTreeSnapshot,
    fetch_posts: F,
) -> Result<Option<(Attribution, PostTreeSnapshot)>>
where
    F: FnOnce() -> Result<PostTreeSnapshot>,
{
    let Some(user) = diff_roster(roster_prev, roster_curr)? else {
        debug!("no roster change; skipping post retrieval");
        return Ok(None);
    };

    info!(name = %user.name, "roster change detected; diffing posts");
    let posts_curr = fetch_posts().context("fetch current post snapshot")?;
    let change = diff_posts(posts_prev, &posts_curr);
    if change.is_none() {
        debug!("roster moved but no post change was found");
    }

    Ok(Some((Attribution { user, change }, posts_curr)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeKind, ChangeLogEntry, PostNode, UserRecord};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::cell::Cell;

    fn user(name: &str, asks: u64) -> UserRecord {
        serde_json::from_value(json!({
            "name": name,
            "email": format!("{}@example.edu", name.to_lowercase()),
            "lti_ids": [],
            "user_id": format!("id-{name}"),
            "days": 1,
            "views": 2,
            "asks": asks,
        }))
        .expect("deserialize user fixture")
    }

    fn roster(users: Vec<UserRecord>) -> RosterSnapshot {
        RosterSnapshot {
            total: users.len() as u64,
            users,
            top: vec![],
        }
    }

    #[test]
    fn no_roster_signal_never_fetches_posts() {
        let prev = roster(vec![user("Ada", 1)]);
        let curr = prev.clone();
        let fetches = Cell::new(0_u32);

        let result = correlate(&prev, &curr, &PostTreeSnapshot::default(), || {
            fetches.set(fetches.get() + 1);
            Ok(PostTreeSnapshot::default())
        })
        .expect("correlate");

        assert!(result.is_none());
        assert_eq!(fetches.get(), 0);
    }

    #[test]
    fn roster_signal_pairs_user_with_post_change() {
        let prev = roster(vec![user("Ada", 1)]);
        let mut curr = prev.clone();
        curr.users[0].extra.insert("asks".into(), json!(2));

        let when = Utc
            .with_ymd_and_hms(2026, 3, 14, 11, 0, 0)
            .single()
            .expect("valid timestamp");
        let posts_prev = PostTreeSnapshot {
            posts: vec![PostNode {
                nr: 5,
                change_log: vec![],
                history: vec![],
                children: vec![],
            }],
        };
        let posts_curr = PostTreeSnapshot {
            posts: vec![PostNode {
                nr: 5,
                change_log: vec![ChangeLogEntry {
                    kind: "edit".into(),
                    when,
                }],
                history: vec![],
                children: vec![],
            }],
        };

        let (attribution, reseed) = correlate(&prev, &curr, &posts_prev, || Ok(posts_curr.clone()))
            .expect("correlate")
            .expect("attribution");

        assert_eq!(attribution.user.name, "Ada");
        let change = attribution.change.expect("post change");
        assert_eq!(change.cid, 5);
        assert_eq!(change.diff_type, ChangeKind::Logged("edit".into()));
        assert_eq!(reseed, posts_curr);
    }

    #[test]
    fn roster_signal_with_quiet_posts_still_names_the_user() {
        let prev = roster(vec![user("Ada", 1)]);
        let mut curr = prev.clone();
        curr.users[0].extra.insert("asks".into(), json!(2));

        let (attribution, _) = correlate(&prev, &curr, &PostTreeSnapshot::default(), || {
            Ok(PostTreeSnapshot::default())
        })
        .expect("correlate")
        .expect("attribution");

        assert_eq!(attribution.user.name, "Ada");
        assert!(attribution.change.is_none());
    }
}
