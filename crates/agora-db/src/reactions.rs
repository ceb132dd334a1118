use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::warn;

use agora_types::reaction::{ReactionCounts, ReactionKind, ReactionTarget, Transition};

use crate::{Database, is_unique_violation};

/// Attempts for a toggle that loses a race against another writer to the
/// unique indexes (another process on the same file).
const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionOutcome {
    pub transition: Transition,
    pub counts: ReactionCounts,
}

impl Database {
    /// A post target exists if the post does; a comment target also needs the
    /// comment to belong to that post.
    pub fn target_exists(&self, target: &ReactionTarget) -> Result<bool> {
        self.with_conn(|conn| {
            let found = match &target.comment_id {
                None => conn
                    .query_row("SELECT 1 FROM posts WHERE id = ?1", [&target.post_id], |_| {
                        Ok(())
                    })
                    .optional()?,
                Some(comment_id) => conn
                    .query_row(
                        "SELECT 1 FROM comments WHERE id = ?1 AND post_id = ?2",
                        (comment_id, &target.post_id),
                        |_| Ok(()),
                    )
                    .optional()?,
            };
            Ok(found.is_some())
        })
    }

    /// Toggle the user's reaction on `target` towards `desired`.
    ///
    /// Reads the current state and applies the resulting insert, update or
    /// delete inside one IMMEDIATE transaction, then reads the aggregate back.
    /// `reaction_id` is only used when a new row is inserted.
    pub fn apply_reaction(
        &self,
        reaction_id: &str,
        user_id: &str,
        target: &ReactionTarget,
        desired: ReactionKind,
    ) -> Result<ReactionOutcome> {
        let mut attempt = 1;
        loop {
            let result = self.with_conn_mut(|conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let current = find_reaction(&tx, user_id, target)?;
                let transition = Transition::next(current, desired);
                match transition {
                    Transition::Insert(kind) => {
                        insert_reaction(&tx, reaction_id, user_id, target, kind)?
                    }
                    Transition::Update(kind) => update_reaction(&tx, user_id, target, kind)?,
                    Transition::Delete => delete_reaction(&tx, user_id, target)?,
                }
                tx.commit()?;

                let counts = reaction_counts(conn, user_id, target)?;
                Ok(ReactionOutcome { transition, counts })
            });

            match result {
                Err(e)
                    if attempt < MAX_ATTEMPTS
                        && e.downcast_ref::<rusqlite::Error>()
                            .is_some_and(is_unique_violation) =>
                {
                    warn!("Reaction write conflicted (attempt {}), retrying", attempt);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

// Connection-level primitives. `comment_id IS ?` matches NULL for post targets.

pub fn find_reaction(
    conn: &Connection,
    user_id: &str,
    target: &ReactionTarget,
) -> Result<Option<ReactionKind>> {
    let kind: Option<String> = conn
        .query_row(
            "SELECT type FROM reactions
             WHERE user_id = ?1 AND post_id = ?2 AND comment_id IS ?3",
            (user_id, &target.post_id, &target.comment_id),
            |row| row.get(0),
        )
        .optional()?;

    kind.map(|k| k.parse::<ReactionKind>().map_err(anyhow::Error::from))
        .transpose()
}

pub fn insert_reaction(
    conn: &Connection,
    id: &str,
    user_id: &str,
    target: &ReactionTarget,
    kind: ReactionKind,
) -> Result<()> {
    conn.execute(
        "INSERT INTO reactions (id, user_id, post_id, comment_id, type) VALUES (?1, ?2, ?3, ?4, ?5)",
        (id, user_id, &target.post_id, &target.comment_id, kind.as_str()),
    )?;
    Ok(())
}

pub fn update_reaction(
    conn: &Connection,
    user_id: &str,
    target: &ReactionTarget,
    kind: ReactionKind,
) -> Result<()> {
    conn.execute(
        "UPDATE reactions SET type = ?1
         WHERE user_id = ?2 AND post_id = ?3 AND comment_id IS ?4",
        (kind.as_str(), user_id, &target.post_id, &target.comment_id),
    )?;
    Ok(())
}

pub fn delete_reaction(conn: &Connection, user_id: &str, target: &ReactionTarget) -> Result<()> {
    conn.execute(
        "DELETE FROM reactions WHERE user_id = ?1 AND post_id = ?2 AND comment_id IS ?3",
        (user_id, &target.post_id, &target.comment_id),
    )?;
    Ok(())
}

pub fn count_reactions(conn: &Connection, target: &ReactionTarget, kind: ReactionKind) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM reactions WHERE post_id = ?1 AND comment_id IS ?2 AND type = ?3",
        (&target.post_id, &target.comment_id, kind.as_str()),
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn reaction_counts(
    conn: &Connection,
    user_id: &str,
    target: &ReactionTarget,
) -> Result<ReactionCounts> {
    Ok(ReactionCounts {
        likes: count_reactions(conn, target, ReactionKind::Like)?,
        dislikes: count_reactions(conn, target, ReactionKind::Dislike)?,
        user_vote: find_reaction(conn, user_id, target)?.map_or(0, ReactionKind::vote),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::test_support::{add_post, add_user, db_with_user};

    fn counts(likes: i64, dislikes: i64, user_vote: i8) -> ReactionCounts {
        ReactionCounts {
            likes,
            dislikes,
            user_vote,
        }
    }

    fn react(db: &Database, user: &str, target: &ReactionTarget, kind: ReactionKind) -> ReactionOutcome {
        let id = uuid::Uuid::new_v4().to_string();
        db.apply_reaction(&id, user, target, kind).unwrap()
    }

    fn counts_for(db: &Database, user: &str, target: &ReactionTarget) -> ReactionCounts {
        db.with_conn(|conn| reaction_counts(conn, user, target)).unwrap()
    }

    fn row_count(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM reactions", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn test_like_toggle_sequence() {
        let (db, alice) = db_with_user("alice");
        let post = ReactionTarget::post(add_post(&db, &alice));

        let out = react(&db, &alice, &post, ReactionKind::Like);
        assert_eq!(out.transition, Transition::Insert(ReactionKind::Like));
        assert_eq!(out.counts, counts(1, 0, 1));

        let out = react(&db, &alice, &post, ReactionKind::Like);
        assert_eq!(out.transition, Transition::Delete);
        assert_eq!(out.counts, counts(0, 0, 0));

        let out = react(&db, &alice, &post, ReactionKind::Dislike);
        assert_eq!(out.counts, counts(0, 1, -1));
        assert_eq!(row_count(&db), 1);
    }

    #[test]
    fn test_flip_moves_one_vote() {
        let (db, alice) = db_with_user("alice");
        let bob = add_user(&db, "bob");
        let post = ReactionTarget::post(add_post(&db, &alice));
        react(&db, &bob, &post, ReactionKind::Like);

        let before = counts_for(&db, &alice, &post);
        react(&db, &alice, &post, ReactionKind::Like);
        let out = react(&db, &alice, &post, ReactionKind::Dislike);

        assert_eq!(out.transition, Transition::Update(ReactionKind::Dislike));
        assert_eq!(out.counts.likes, before.likes);
        assert_eq!(out.counts.dislikes, before.dislikes + 1);
        assert_eq!(out.counts.user_vote, -1);

        // bob's view of the same post
        let bobs = counts_for(&db, &bob, &post);
        assert_eq!(bobs, counts(1, 1, 1));
    }

    #[test]
    fn test_unique_index_blocks_second_row() {
        let (db, alice) = db_with_user("alice");
        let post = ReactionTarget::post(add_post(&db, &alice));

        let err = db
            .with_conn_mut(|conn| {
                insert_reaction(conn, "r1", &alice, &post, ReactionKind::Like)?;
                insert_reaction(conn, "r2", &alice, &post, ReactionKind::Dislike)
            })
            .unwrap_err();
        assert!(err.downcast_ref::<rusqlite::Error>().is_some_and(is_unique_violation));
        assert_eq!(row_count(&db), 1);
    }

    #[test]
    fn test_comment_reactions_are_separate() {
        let (db, alice) = db_with_user("alice");
        let post_id = add_post(&db, &alice);
        db.create_comment("c1", &post_id, &alice, "nice").unwrap();

        let post = ReactionTarget::post(post_id.clone());
        let comment = ReactionTarget::comment(post_id.clone(), "c1");

        react(&db, &alice, &post, ReactionKind::Like);
        let out = react(&db, &alice, &comment, ReactionKind::Dislike);
        assert_eq!(out.counts, counts(0, 1, -1));

        let post_counts = counts_for(&db, &alice, &post);
        assert_eq!(post_counts, counts(1, 0, 1));
        assert_eq!(row_count(&db), 2);
    }

    #[test]
    fn test_target_exists() {
        let (db, alice) = db_with_user("alice");
        let p1 = add_post(&db, &alice);
        let p2 = add_post(&db, &alice);
        db.create_comment("c1", &p1, &alice, "hi").unwrap();

        assert!(db.target_exists(&ReactionTarget::post(p1.clone())).unwrap());
        assert!(!db.target_exists(&ReactionTarget::post("missing")).unwrap());
        assert!(db.target_exists(&ReactionTarget::comment(p1, "c1")).unwrap());
        assert!(!db.target_exists(&ReactionTarget::comment(p2, "c1")).unwrap());
    }

    #[test]
    fn test_concurrent_toggles_keep_one_row() {
        let (db, alice) = db_with_user("alice");
        let post = ReactionTarget::post(add_post(&db, &alice));
        let db = Arc::new(db);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                let alice = alice.clone();
                let post = post.clone();
                thread::spawn(move || react(&db, &alice, &post, ReactionKind::Like))
            })
            .collect();

        for handle in handles {
            let out = handle.join().unwrap();
            assert!(out.counts.likes <= 1);
        }

        // Eight toggles from the same user cancel out.
        assert_eq!(row_count(&db), 0);
    }

    #[test]
    fn test_two_handles_on_one_file_keep_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agora.db");
        let first = Arc::new(Database::open(&path).unwrap());
        let second = Arc::new(Database::open(&path).unwrap());

        let alice = add_user(&first, "alice");
        let post = ReactionTarget::post(add_post(&first, &alice));

        // Each handle has its own writer, so only SQLite locking serializes them.
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let db = if i % 2 == 0 { first.clone() } else { second.clone() };
                let alice = alice.clone();
                let post = post.clone();
                thread::spawn(move || {
                    let id = uuid::Uuid::new_v4().to_string();
                    db.apply_reaction(&id, &alice, &post, ReactionKind::Like)
                })
            })
            .collect();

        for handle in handles {
            let out = handle.join().unwrap().unwrap();
            assert!(out.counts.likes <= 1);
            assert!(row_count(&first) <= 1);
        }

        assert_eq!(row_count(&first), 0);
        assert_eq!(row_count(&second), 0);
        assert_eq!(
            counts_for(&second, &alice, &post),
            counts(0, 0, 0)
        );

        react(&second, &alice, &post, ReactionKind::Dislike);
        assert_eq!(
            counts_for(&first, &alice, &post),
            counts(0, 1, -1)
        );
    }
}
