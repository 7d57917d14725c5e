//! Session-to-slot assignment

use std::collections::{HashMap, HashSet};

use tautulli_api::Session;
use tautulli_config::SlotAssignment;

/// Sessions mapped onto slots for one reconcile cycle
#[derive(Debug, PartialEq)]
pub struct Assignment<'a> {
    /// One entry per slot, `None` for idle
    pub slots: Vec<Option<&'a Session>>,
    /// Sessions that did not fit
    pub dropped: usize,
}

impl Assignment<'_> {
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Assigns sessions to a fixed number of slots
///
/// Positional mode is stateless. Sticky mode remembers which session id
/// each slot showed last time.
#[derive(Debug, Clone)]
pub struct Reconciler {
    policy: SlotAssignment,
    previous: Vec<Option<String>>,
}

impl Reconciler {
    pub fn new(num_slots: usize, policy: SlotAssignment) -> Self {
        Self {
            policy,
            previous: vec![None; num_slots],
        }
    }

    pub fn num_slots(&self) -> usize {
        self.previous.len()
    }

    pub fn reconcile<'a>(&mut self, sessions: &'a [Session]) -> Assignment<'a> {
        let assignment = match self.policy {
            SlotAssignment::Positional => self.positional(sessions),
            SlotAssignment::Sticky => self.sticky(sessions),
        };

        self.previous = assignment
            .slots
            .iter()
            .map(|slot| {
                slot.map(|s| s.session_id.clone())
                    .filter(|id| !id.is_empty())
            })
            .collect();

        assignment
    }

    fn positional<'a>(&self, sessions: &'a [Session]) -> Assignment<'a> {
        let n = self.num_slots();
        let mut slots: Vec<Option<&Session>> = sessions.iter().take(n).map(Some).collect();
        slots.resize(n, None);
        Assignment {
            slots,
            dropped: sessions.len().saturating_sub(n),
        }
    }

    fn sticky<'a>(&self, sessions: &'a [Session]) -> Assignment<'a> {
        let n = self.num_slots();

        // Last occurrence of a duplicated id wins
        let mut last_index: HashMap<&str, usize> = HashMap::new();
        for (i, session) in sessions.iter().enumerate() {
            if !session.session_id.is_empty() {
                last_index.insert(session.session_id.as_str(), i);
            }
        }
        let unique: Vec<&Session> = sessions
            .iter()
            .enumerate()
            .filter(|(i, s)| {
                s.session_id.is_empty() || last_index.get(s.session_id.as_str()) == Some(i)
            })
            .map(|(_, s)| s)
            .collect();

        let mut slots: Vec<Option<&Session>> = vec![None; n];
        let mut placed: HashSet<&str> = HashSet::new();

        for (slot, previous) in slots.iter_mut().zip(&self.previous) {
            let Some(previous) = previous else { continue };
            if let Some(session) = unique.iter().find(|s| &s.session_id == previous) {
                *slot = Some(*session);
                placed.insert(session.session_id.as_str());
            }
        }

        let mut dropped = 0;
        let mut free = (0..n).filter(|&i| slots[i].is_none()).collect::<Vec<_>>().into_iter();
        for session in unique {
            if !session.session_id.is_empty() && placed.contains(session.session_id.as_str()) {
                continue;
            }
            match free.next() {
                Some(i) => slots[i] = Some(session),
                None => dropped += 1,
            }
        }

        Assignment { slots, dropped }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sessions(ids: &[&str]) -> Vec<Session> {
        ids.iter()
            .map(|id| Session {
                session_id: id.to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn ids(assignment: &Assignment<'_>) -> Vec<Option<String>> {
        assignment
            .slots
            .iter()
            .map(|s| s.map(|s| s.session_id.clone()))
            .collect()
    }

    fn some(id: &str) -> Option<String> {
        Some(id.to_string())
    }

    #[test]
    fn test_positional_fills_in_order() {
        let mut reconciler = Reconciler::new(5, SlotAssignment::Positional);
        let input = sessions(&["a", "b", "c"]);
        let assignment = reconciler.reconcile(&input);

        assert_eq!(ids(&assignment), vec![some("a"), some("b"), some("c"), None, None]);
        assert_eq!(assignment.occupied(), 3);
        assert_eq!(assignment.dropped, 0);
    }

    #[test]
    fn test_positional_clips_excess() {
        let mut reconciler = Reconciler::new(5, SlotAssignment::Positional);
        let input = sessions(&["1", "2", "3", "4", "5", "6", "7"]);
        let assignment = reconciler.reconcile(&input);

        assert_eq!(assignment.occupied(), 5);
        assert_eq!(assignment.dropped, 2);
        assert_eq!(ids(&assignment)[4], some("5"));
    }

    #[test]
    fn test_positional_reassigns_when_order_changes() {
        let mut reconciler = Reconciler::new(2, SlotAssignment::Positional);
        let first = sessions(&["a", "b"]);
        reconciler.reconcile(&first);

        let second = sessions(&["b"]);
        let assignment = reconciler.reconcile(&second);
        assert_eq!(ids(&assignment), vec![some("b"), None]);
    }

    #[test]
    fn test_sticky_keeps_previous_slot() {
        let mut reconciler = Reconciler::new(3, SlotAssignment::Sticky);
        let first = sessions(&["a", "b", "c"]);
        reconciler.reconcile(&first);

        // "a" ended, "d" started
        let second = sessions(&["b", "c", "d"]);
        let assignment = reconciler.reconcile(&second);
        assert_eq!(ids(&assignment), vec![some("d"), some("b"), some("c")]);
    }

    #[test]
    fn test_sticky_duplicate_last_wins() {
        let mut reconciler = Reconciler::new(3, SlotAssignment::Sticky);
        let mut input = sessions(&["a", "b", "a"]);
        input[0].user = "first".into();
        input[2].user = "last".into();

        let assignment = reconciler.reconcile(&input);
        assert_eq!(ids(&assignment), vec![some("b"), some("a"), None]);
        assert_eq!(assignment.slots[1].map(|s| s.user.as_str()), Some("last"));
    }

    #[test]
    fn test_sticky_clips_excess() {
        let mut reconciler = Reconciler::new(2, SlotAssignment::Sticky);
        let input = sessions(&["a", "b", "c"]);
        let assignment = reconciler.reconcile(&input);
        assert_eq!(assignment.occupied(), 2);
        assert_eq!(assignment.dropped, 1);
    }

    #[test]
    fn test_identical_input_is_idempotent() {
        for policy in [SlotAssignment::Positional, SlotAssignment::Sticky] {
            let mut reconciler = Reconciler::new(4, policy);
            let input = sessions(&["x", "y", "z"]);
            let first = ids(&reconciler.reconcile(&input));
            let second = ids(&reconciler.reconcile(&input));
            assert_eq!(first, second, "{:?}", policy);
        }
    }

    #[test]
    fn test_empty_input_idles_every_slot() {
        let mut reconciler = Reconciler::new(3, SlotAssignment::Sticky);
        let input = sessions(&["a"]);
        reconciler.reconcile(&input);
        let assignment = reconciler.reconcile(&[]);
        assert_eq!(assignment.occupied(), 0);
    }
}
