//! End-to-end poll-cycle tests: store window management plus correlation,
//! driven the way the CLI tracker drives them.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::cell::Cell;
use unravel_core::{
    Attribution, ChangeKind, ChangeLogEntry, PostNode, PostTreeSnapshot, ReplyNode, Revision,
    RosterSnapshot, SnapshotStore, UserRecord, Window, correlate,
};

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, minute, 0)
        .single()
        .expect("valid timestamp")
}

fn user(name: &str, answers: u64) -> UserRecord {
    serde_json::from_value(json!({
        "name": name,
        "email": format!("{}@example.edu", name.to_lowercase()),
        "lti_ids": ["lti:1"],
        "user_id": format!("id-{name}"),
        "days": 30,
        "views": 101,
        "answers": answers,
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

fn plain_post(nr: u64) -> PostNode {
    PostNode {
        nr,
        change_log: vec![ChangeLogEntry {
            kind: "create".into(),
            when: at(0),
        }],
        history: vec![],
        children: vec![],
    }
}

/// One tracker cycle against the store: insert the polled roster, settle the
/// window, correlate when ready, collapse both windows afterwards. Mirrors
/// the CLI's `run_cycle` with a canned post source.
fn run_cycle(
    store: &SnapshotStore,
    polled: &RosterSnapshot,
    fresh_posts: &PostTreeSnapshot,
    fetches: &Cell<u32>,
) -> Option<Attribution> {
    store.insert_roster(polled).expect("insert roster");
    let Window::Ready { prev, curr } = store.settle_rosters().expect("settle") else {
        return None;
    };

    let posts_prev = store
        .post_trees()
        .expect("post trees")
        .pop()
        .expect("stored post tree");
    let outcome = correlate(&prev, &curr, &posts_prev, || {
        fetches.set(fetches.get() + 1);
        Ok(fresh_posts.clone())
    })
    .expect("correlate");

    store.reseed_rosters(&curr).expect("reseed rosters");
    match outcome {
        Some((attribution, posts_curr)) => {
            store.reseed_posts(&posts_curr).expect("reseed posts");
            Some(attribution)
        }
        None => None,
    }
}

#[test]
fn quiet_cycles_never_touch_the_post_source() {
    let store = SnapshotStore::open_in_memory().expect("open store");
    store
        .insert_posts(&PostTreeSnapshot {
            posts: vec![plain_post(1)],
        })
        .expect("seed posts");

    let snapshot = roster(vec![user("Ada", 3), user("Bob", 1)]);
    let fetches = Cell::new(0);

    for _ in 0..3 {
        let hit = run_cycle(&store, &snapshot, &PostTreeSnapshot::default(), &fetches);
        assert!(hit.is_none());
    }
    assert_eq!(fetches.get(), 0);
    assert_eq!(store.rosters().expect("rosters").len(), 1);
}

#[test]
fn an_answer_edit_is_attributed_to_the_user_whose_stats_moved() {
    let store = SnapshotStore::open_in_memory().expect("open store");
    let stored_posts = PostTreeSnapshot {
        posts: vec![plain_post(1), plain_post(2)],
    };
    store.insert_posts(&stored_posts).expect("seed posts");

    // Cycle 1 seeds the roster window.
    let before = roster(vec![user("Ada", 3), user("Bob", 1)]);
    let fetches = Cell::new(0);
    assert!(run_cycle(&store, &before, &PostTreeSnapshot::default(), &fetches).is_none());

    // Bob answers anonymously: his answer count moves and post 2 gains a
    // change-log entry whose content hides two levels down.
    let after = roster(vec![user("Ada", 3), user("Bob", 2)]);
    let mut edited = plain_post(2);
    edited.change_log.push(ChangeLogEntry {
        kind: "i_answer_update".into(),
        when: at(7),
    });
    edited.children = vec![ReplyNode {
        updated: None,
        subject: None,
        history: None,
        children: vec![ReplyNode {
            updated: None,
            subject: None,
            history: Some(vec![Revision {
                created: at(7),
                subject: None,
                content: Some("<p>the anonymous answer</p>".into()),
            }]),
            children: vec![],
        }],
    }];
    let fresh = PostTreeSnapshot {
        posts: vec![plain_post(1), edited],
    };

    let attribution = run_cycle(&store, &after, &fresh, &fetches).expect("attribution");
    assert_eq!(fetches.get(), 1);
    assert_eq!(attribution.user.name, "Bob");
    assert_eq!(attribution.user.email, "bob@example.edu");

    let change = attribution.change.expect("post change");
    assert_eq!(change.cid, 2);
    assert_eq!(change.diff_type, ChangeKind::Logged("i_answer_update".into()));
    assert_eq!(change.time, at(7));
    assert_eq!(
        change.content.as_deref(),
        Some("<p>the anonymous answer</p>")
    );

    // The fresh tree replaced the stored one for the next cycle.
    assert_eq!(store.post_trees().expect("posts"), vec![fresh]);
    assert_eq!(store.rosters().expect("rosters").len(), 1);
}

#[test]
fn a_new_post_is_reported_from_the_head_of_the_fresh_tree() {
    let store = SnapshotStore::open_in_memory().expect("open store");
    let stored_posts: PostTreeSnapshot = (1..=5).map(plain_post).collect();
    store.insert_posts(&stored_posts).expect("seed posts");

    let before = roster(vec![user("Ada", 3)]);
    let fetches = Cell::new(0);
    assert!(run_cycle(&store, &before, &PostTreeSnapshot::default(), &fetches).is_none());

    let after = roster(vec![user("Ada", 4)]);
    let mut new_post = plain_post(6);
    new_post.history = vec![Revision {
        created: at(9),
        subject: Some("S".into()),
        content: None,
    }];
    let mut posts = vec![new_post];
    posts.extend((1..=5).map(plain_post));
    let fresh = PostTreeSnapshot { posts };

    let attribution = run_cycle(&store, &after, &fresh, &fetches).expect("attribution");
    let change = attribution.change.expect("post change");
    assert_eq!(change.cid, 6);
    assert_eq!(change.content.as_deref(), Some("S"));
    assert_eq!(change.diff_type, ChangeKind::PostAdd);
    assert_eq!(change.time, at(9));
}

#[test]
fn crashed_cycle_recovery_reseeds_before_any_diff() {
    let store = SnapshotStore::open_in_memory().expect("open store");
    store
        .insert_posts(&PostTreeSnapshot {
            posts: vec![plain_post(1)],
        })
        .expect("seed posts");

    // A cycle that died between insert and collapse leaves extra rosters.
    for answers in 1..=2 {
        store
            .insert_roster(&roster(vec![user("Ada", answers)]))
            .expect("insert");
    }

    let polled = roster(vec![user("Ada", 9)]);
    let fetches = Cell::new(0);
    let hit = run_cycle(&store, &polled, &PostTreeSnapshot::default(), &fetches);

    // Recovery must swallow the cycle: no diff, both tables reset.
    assert!(hit.is_none());
    assert_eq!(fetches.get(), 0);
    assert_eq!(store.rosters().expect("rosters"), vec![polled]);
    assert!(store.post_trees().expect("posts").is_empty());
}
