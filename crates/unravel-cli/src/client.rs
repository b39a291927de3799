//! Forum API client.
//!
//! The forum exposes a single JSON endpoint: every call is a POST of
//! `{"method": ..., "params": {...}}`, with the session carried in cookies
//! established by `user.login`. Responses wrap either a `result` payload or
//! an `error` string.
//!
//! Post retrieval is deliberately slow: one `content.get` per post with a
//! fixed pause in between, because the forum rate-limits aggressively and a
//! full crawl of a large class already takes minutes.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};
use unravel_core::{PostNode, PostTreeSnapshot, RosterSnapshot, UserRecord};

const API_URL: &str = "https://piazza.com/logic/api";

/// Pause between consecutive post fetches.
const POST_FETCH_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStatistics {
    users: Vec<UserRecord>,
    total: u64,
    #[serde(default)]
    top_users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    nr: u64,
}

#[derive(Debug, Deserialize)]
struct Feed {
    feed: Vec<FeedEntry>,
}

/// Logged-in session against one class.
pub struct ForumClient {
    agent: ureq::Agent,
    class_id: String,
}

impl ForumClient {
    /// Log in and bind the session to `class_id`.
    ///
    /// # Errors
    ///
    /// Fails on network errors or when the forum rejects the credentials.
    pub fn login(email: &str, password: &str, class_id: &str) -> Result<Self> {
        let agent = ureq::AgentBuilder::new().build();
        let client = Self {
            agent,
            class_id: class_id.to_owned(),
        };
        let _ack: Value = client
            .call("user.login", json!({ "email": email, "pass": password }))
            .context("forum login")?;
        info!(class_id, "logged in");
        Ok(client)
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let response = self
            .agent
            .post(API_URL)
            .query("method", method)
            .send_json(json!({ "method": method, "params": params }))
            .map_err(|err| anyhow::anyhow!("forum API request {method} failed: {err}"))?;

        let body: ApiResponse<T> = response
            .into_json()
            .with_context(|| format!("decode forum API response for {method}"))?;

        if let Some(error) = body.error {
            bail!("forum API {method} returned an error: {error}");
        }
        body.result
            .with_context(|| format!("forum API {method} returned no result"))
    }

    /// Fetch the class statistics as a roster snapshot.
    ///
    /// # Errors
    ///
    /// Fails on network or decode errors.
    pub fn fetch_statistics(&self) -> Result<RosterSnapshot> {
        let stats: RawStatistics =
            self.call("network.get_stats", json!({ "nid": self.class_id }))?;
        debug!(users = stats.users.len(), "fetched statistics");
        Ok(RosterSnapshot {
            users: stats.users,
            total: stats.total,
            top: stats.top_users,
        })
    }

    /// Crawl every post in the class, in feed order, into one snapshot.
    ///
    /// # Errors
    ///
    /// Fails on network or decode errors for the feed or any single post.
    pub fn fetch_all_posts(&self) -> Result<PostTreeSnapshot> {
        let feed: Feed = self.call(
            "network.get_my_feed",
            json!({ "nid": self.class_id, "offset": 0, "limit": 99999 }),
        )?;

        info!(posts = feed.feed.len(), "crawling posts");
        let mut posts = Vec::with_capacity(feed.feed.len());
        for (index, entry) in feed.feed.iter().enumerate() {
            debug!(index = index + 1, cid = entry.nr, "retrieving post");
            let post: PostNode = self.call(
                "content.get",
                json!({ "cid": entry.nr, "nid": self.class_id }),
            )?;
            posts.push(post);
            thread::sleep(POST_FETCH_PAUSE);
        }
        Ok(PostTreeSnapshot { posts })
    }
}
