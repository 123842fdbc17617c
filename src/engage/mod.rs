//! Engagement state machine.
//!
//! A user's state for one item is `none`, `liked` or `disliked`. Each toggle
//! request resolves to a ledger action plus the counter deltas to apply to
//! the parent item's cached like/dislike counts. The resolution itself is
//! pure; the repository applies it inside a single transaction.

use crate::models::EngagementKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
    /// No record exists: create one with the requested kind.
    Create,
    /// Same kind requested twice: delete the record (un-toggle).
    Delete,
    /// Opposite kind requested: flip the record's kind in place.
    Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub action: LedgerAction,
    pub like_delta: i64,
    pub dislike_delta: i64,
    /// Resulting state; `None` means the user has no live engagement.
    pub state: Option<EngagementKind>,
}

impl Transition {
    pub fn resolve(current: Option<EngagementKind>, requested: EngagementKind) -> Self {
        match current {
            None => {
                let (like_delta, dislike_delta) = deltas(requested, 1);
                Transition {
                    action: LedgerAction::Create,
                    like_delta,
                    dislike_delta,
                    state: Some(requested),
                }
            }
            Some(existing) if existing == requested => {
                let (like_delta, dislike_delta) = deltas(requested, -1);
                Transition {
                    action: LedgerAction::Delete,
                    like_delta,
                    dislike_delta,
                    state: None,
                }
            }
            Some(existing) => {
                let (up_like, up_dislike) = deltas(requested, 1);
                let (down_like, down_dislike) = deltas(existing, -1);
                Transition {
                    action: LedgerAction::Switch,
                    like_delta: up_like + down_like,
                    dislike_delta: up_dislike + down_dislike,
                    state: Some(requested),
                }
            }
        }
    }
}

fn deltas(kind: EngagementKind, amount: i64) -> (i64, i64) {
    match kind {
        EngagementKind::Like => (amount, 0),
        EngagementKind::Dislike => (0, amount),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EngagementKind::{Dislike, Like};

    #[test]
    fn first_like_creates_record() {
        let t = Transition::resolve(None, Like);
        assert_eq!(t.action, LedgerAction::Create);
        assert_eq!((t.like_delta, t.dislike_delta), (1, 0));
        assert_eq!(t.state, Some(Like));
    }

    #[test]
    fn first_dislike_creates_record() {
        let t = Transition::resolve(None, Dislike);
        assert_eq!(t.action, LedgerAction::Create);
        assert_eq!((t.like_delta, t.dislike_delta), (0, 1));
        assert_eq!(t.state, Some(Dislike));
    }

    #[test]
    fn repeated_like_untoggles() {
        let t = Transition::resolve(Some(Like), Like);
        assert_eq!(t.action, LedgerAction::Delete);
        assert_eq!((t.like_delta, t.dislike_delta), (-1, 0));
        assert_eq!(t.state, None);
    }

    #[test]
    fn repeated_dislike_untoggles() {
        let t = Transition::resolve(Some(Dislike), Dislike);
        assert_eq!(t.action, LedgerAction::Delete);
        assert_eq!((t.like_delta, t.dislike_delta), (0, -1));
        assert_eq!(t.state, None);
    }

    #[test]
    fn like_to_dislike_switches() {
        let t = Transition::resolve(Some(Like), Dislike);
        assert_eq!(t.action, LedgerAction::Switch);
        assert_eq!((t.like_delta, t.dislike_delta), (-1, 1));
        assert_eq!(t.state, Some(Dislike));
    }

    #[test]
    fn dislike_to_like_switches() {
        let t = Transition::resolve(Some(Dislike), Like);
        assert_eq!(t.action, LedgerAction::Switch);
        assert_eq!((t.like_delta, t.dislike_delta), (1, -1));
        assert_eq!(t.state, Some(Like));
    }

    #[test]
    fn round_trip_nets_to_zero() {
        let first = Transition::resolve(None, Like);
        let second = Transition::resolve(first.state, Like);
        assert_eq!(first.like_delta + second.like_delta, 0);
        assert_eq!(first.dislike_delta + second.dislike_delta, 0);
        assert_eq!(second.state, None);
    }
}
