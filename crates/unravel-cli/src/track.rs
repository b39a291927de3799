//! The poll-store-diff cycle.
//!
//! One cycle: seed the post table on first run, poll statistics, settle the
//! roster window, correlate when two rosters are available, then collapse
//! both windows for the next cycle. Strictly sequential; the only blocking
//! calls are the forum fetches.

use anyhow::{Context, Result};
use tracing::info;
use unravel_core::{Attribution, PostTreeSnapshot, RosterSnapshot, SnapshotStore, Window, correlate};

/// Data-producing side of the forum, behind a seam so the cycle can be
/// driven by a stub in tests.
pub trait ForumSource {
    /// Current roster snapshot.
    ///
    /// # Errors
    ///
    /// Network or decode failure.
    fn fetch_statistics(&self) -> Result<RosterSnapshot>;

    /// Fresh crawl of the full post tree.
    ///
    /// # Errors
    ///
    /// Network or decode failure.
    fn fetch_all_posts(&self) -> Result<PostTreeSnapshot>;
}

impl ForumSource for crate::client::ForumClient {
    fn fetch_statistics(&self) -> Result<RosterSnapshot> {
        Self::fetch_statistics(self)
    }

    fn fetch_all_posts(&self) -> Result<PostTreeSnapshot> {
        Self::fetch_all_posts(self)
    }
}

/// Run one poll cycle and return the attribution, if this cycle found one.
///
/// # Errors
///
/// Fails on forum or store errors; the caller decides whether that kills
/// the loop.
pub fn run_cycle<S: ForumSource>(
    source: &S,
    store: &SnapshotStore,
) -> Result<Option<Attribution>> {
    // First run for this class: remember the post tree as the baseline.
    if store.post_trees().context("read stored post trees")?.is_empty() {
        let baseline = source.fetch_all_posts().context("baseline post crawl")?;
        store.insert_posts(&baseline).context("store baseline posts")?;
    }

    let stats = source.fetch_statistics().context("poll statistics")?;
    store.insert_roster(&stats).context("store roster")?;

    let Window::Ready { prev, curr } = store.settle_rosters().context("settle roster window")?
    else {
        info!("no previous roster; will compare against the next poll");
        return Ok(None);
    };

    let posts_prev = store
        .post_trees()
        .context("read stored post trees")?
        .pop()
        .context("roster window is ready but no post tree is stored")?;

    let outcome = correlate(&prev, &curr, &posts_prev, || source.fetch_all_posts())?;

    store.reseed_rosters(&curr).context("collapse roster window")?;
    let Some((attribution, posts_curr)) = outcome else {
        return Ok(None);
    };
    store
        .reseed_posts(&posts_curr)
        .context("collapse post window")?;
    Ok(Some(attribution))
}
