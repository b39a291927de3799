//! Snapshot data model.
//!
//! Both snapshot kinds are captured verbatim from the forum API and persisted
//! as JSON documents, so the types here are deliberately permissive: unknown
//! user fields ride along in a flattened map (they still participate in
//! equality), and reply nodes keep optional fields optional because the
//! upstream shape varies by node kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// One enrolled user's statistics record as reported by the forum.
///
/// `name` and `email` are the identity we report on a hit. Everything else
/// (the volatile fields the sanitizer strips and the stable counters that
/// drive the diff) lives in `extra` so schema drift upstream cannot lose
/// fields silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The `{name, email}` pair identifying a roster-diff candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub name: String,
    pub email: String,
}

/// Point-in-time capture of all enrolled users' statistics.
///
/// At most two are ever retained (oldest, newest); user order is positional
/// and assumed stable across consecutive polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub users: Vec<UserRecord>,
    pub total: u64,
    #[serde(default)]
    pub top: Vec<UserRecord>,
}

/// One entry of a post's change log: what happened and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub when: DateTime<Utc>,
}

/// One content revision of a post or answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A reply anywhere below a top-level post.
///
/// Shapes vary by node kind: answers carry `history` (and the field is
/// present-but-relevant even when empty, hence `Option<Vec<_>>`), discussion
/// threads carry nested `children`, and followups may carry `updated` +
/// `subject` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<Revision>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ReplyNode>,
}

/// A top-level post with its change log, revision history, and reply tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostNode {
    /// Post id as shown in the forum UI.
    pub nr: u64,
    #[serde(default)]
    pub change_log: Vec<ChangeLogEntry>,
    #[serde(default)]
    pub history: Vec<Revision>,
    #[serde(default)]
    pub children: Vec<ReplyNode>,
}

/// Point-in-time capture of every post in the class, in enumeration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostTreeSnapshot {
    pub posts: Vec<PostNode>,
}

impl PostTreeSnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

impl FromIterator<PostNode> for PostTreeSnapshot {
    fn from_iter<I: IntoIterator<Item = PostNode>>(iter: I) -> Self {
        Self {
            posts: iter.into_iter().collect(),
        }
    }
}

/// Classification of a detected post change.
///
/// `PostAdd` and `PostDelete` are synthesized from a post-count mismatch;
/// everything else is the `type` string lifted straight out of the inserted
/// change-log entry (`"edit"`, `"i_answer_update"`, ...), kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    PostAdd,
    PostDelete,
    Logged(String),
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PostAdd => "post_add",
            Self::PostDelete => "post_delete",
            Self::Logged(kind) => kind,
        }
    }
}

impl From<&str> for ChangeKind {
    fn from(kind: &str) -> Self {
        match kind {
            "post_add" => Self::PostAdd,
            "post_delete" => Self::PostDelete,
            other => Self::Logged(other.to_owned()),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChangeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChangeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kind = String::deserialize(deserializer)?;
        Ok(Self::from(kind.as_str()))
    }
}

/// The single most recent change detected between two post-tree snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostChange {
    /// `nr` of the affected post (see the index-0 caveat in [`crate::posts`]).
    pub cid: u64,
    /// Changed content, when the locator could resolve it.
    pub content: Option<String>,
    pub diff_type: ChangeKind,
    pub time: DateTime<Utc>,
}
