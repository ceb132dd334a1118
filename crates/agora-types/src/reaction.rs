use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A user's mark on a post or comment. Stored as `'like'` / `'dislike'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
        }
    }

    /// +1 for a like, -1 for a dislike.
    pub fn vote(self) -> i8 {
        match self {
            Self::Like => 1,
            Self::Dislike => -1,
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid reaction type '{0}', expected 'like' or 'dislike'")]
pub struct UnknownReactionKind(pub String);

impl FromStr for ReactionKind {
    type Err = UnknownReactionKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            other => Err(UnknownReactionKind(other.to_string())),
        }
    }
}

/// The single row mutation a toggle performs.
///
/// A user holds zero or one reaction per target, so the current state is
/// `None`, `Some(Like)` or `Some(Dislike)`. Submitting the same kind again
/// clears it, submitting the other kind flips it, and submitting anything
/// when there is no reaction creates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Insert(ReactionKind),
    Update(ReactionKind),
    Delete,
}

impl Transition {
    pub fn next(current: Option<ReactionKind>, desired: ReactionKind) -> Self {
        match current {
            None => Self::Insert(desired),
            Some(kind) if kind == desired => Self::Delete,
            Some(_) => Self::Update(desired),
        }
    }

    /// State of the (user, target) pair once this transition is applied.
    pub fn resulting_state(self) -> Option<ReactionKind> {
        match self {
            Self::Insert(kind) | Self::Update(kind) => Some(kind),
            Self::Delete => None,
        }
    }
}

/// What a reaction points at. `comment_id == None` means the post itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionTarget {
    pub post_id: String,
    pub comment_id: Option<String>,
}

impl ReactionTarget {
    pub fn post(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            comment_id: None,
        }
    }

    pub fn comment(post_id: impl Into<String>, comment_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            comment_id: Some(comment_id.into()),
        }
    }
}

/// Aggregate returned after every toggle, read back from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
    /// 1 for like, -1 for dislike, 0 for none
    pub user_vote: i8,
}

#[cfg(test)]
mod tests {
    use super::*;

    use ReactionKind::{Dislike, Like};

    #[test]
    fn test_transition_table() {
        let cases = [
            (None, Like, Transition::Insert(Like), Some(Like)),
            (None, Dislike, Transition::Insert(Dislike), Some(Dislike)),
            (Some(Like), Like, Transition::Delete, None),
            (Some(Like), Dislike, Transition::Update(Dislike), Some(Dislike)),
            (Some(Dislike), Dislike, Transition::Delete, None),
            (Some(Dislike), Like, Transition::Update(Like), Some(Like)),
        ];

        for (current, desired, expected, state) in cases {
            let t = Transition::next(current, desired);
            assert_eq!(t, expected, "{:?} + {:?}", current, desired);
            assert_eq!(t.resulting_state(), state);
        }
    }

    #[test]
    fn test_same_kind_twice_clears() {
        let first = Transition::next(None, Like);
        let second = Transition::next(first.resulting_state(), Like);
        assert_eq!(second.resulting_state(), None);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("like".parse::<ReactionKind>(), Ok(Like));
        assert_eq!("dislike".parse::<ReactionKind>(), Ok(Dislike));
        assert!("Like".parse::<ReactionKind>().is_err());
        assert!("love".parse::<ReactionKind>().is_err());
        assert!("".parse::<ReactionKind>().is_err());
    }

    #[test]
    fn test_counts_serialize_camel_case() {
        let counts = ReactionCounts {
            likes: 3,
            dislikes: 1,
            user_vote: -1,
        };
        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(json, serde_json::json!({ "likes": 3, "dislikes": 1, "userVote": -1 }));
    }
}
