//! The action state machine.
//!
//! There are no states separate from the session's own fields. The
//! machine is the mapping from `(action, session)` to a mutated session:
//!
//! | Action   | Needs               | Effect                                  |
//! |----------|---------------------|-----------------------------------------|
//! | `JOIN`   | -                   | add participant, generating an id if none |
//! | `VOTE`   | known participant   | set selection                           |
//! | `REVEAL` | -                   | `revealed = true`                       |
//! | `RESET`  | -                   | clear selections, raise `resetting`     |
//! | `LEAVE`  | known participant   | remove participant                      |
//!
//! Unknown participants are a silent no-op. Producing the update and
//! lowering `resetting` afterwards is the router's job.

use std::sync::Arc;

use cardroom_protocol::{Action, ActionKind, ParticipantId};
use cardroom_session::{IdGenerator, Session};

use crate::EngineError;

/// How many fresh ids a join tries before giving up.
const MAX_ID_ATTEMPTS: usize = 16;

/// What applying one action did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// The session changed (and counts as activity).
    pub applied: bool,
    /// The participant that joined, with its final id.
    pub joined: Option<ParticipantId>,
    /// The participant that left.
    pub left: Option<ParticipantId>,
    /// The last participant left; the session should be removed.
    pub now_empty: bool,
}

impl Transition {
    fn applied() -> Self {
        Self {
            applied: true,
            ..Self::default()
        }
    }
}

/// Applies actions to sessions.
///
/// Holds the participant id generator; otherwise stateless, so one
/// machine serves every session.
#[derive(Clone)]
pub struct StateMachine {
    ids: Arc<dyn IdGenerator>,
}

impl StateMachine {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self { ids }
    }

    /// Applies `action` to `session`.
    ///
    /// The action's `session_id` is not checked; the caller already used it
    /// to find `session`.
    ///
    /// # Errors
    /// Returns [`EngineError::IdSpaceExhausted`] if a join needs a generated
    /// id and the generator keeps producing ids already in use.
    pub fn apply(&self, session: &mut Session, action: &Action) -> Result<Transition, EngineError> {
        match action.kind {
            ActionKind::Join => self.join(session, action),
            ActionKind::Vote => Ok(vote(session, action)),
            ActionKind::Reveal => {
                session.reveal();
                Ok(Transition::applied())
            }
            ActionKind::Reset => {
                session.reset();
                Ok(Transition::applied())
            }
            ActionKind::Leave => Ok(leave(session, action)),
        }
    }

    fn join(&self, session: &mut Session, action: &Action) -> Result<Transition, EngineError> {
        let id = match action.participant_id.as_ref().filter(|id| !id.is_empty()) {
            Some(id) => id.clone(),
            None => self.unused_participant_id(session)?,
        };
        let name = action.participant_name.clone().unwrap_or_default();
        session.add_participant(id.clone(), name);
        Ok(Transition {
            applied: true,
            joined: Some(id),
            ..Transition::default()
        })
    }

    fn unused_participant_id(&self, session: &Session) -> Result<ParticipantId, EngineError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate = ParticipantId::new(self.ids.new_id());
            if !candidate.is_empty() && !session.contains_participant(&candidate) {
                return Ok(candidate);
            }
        }
        Err(EngineError::IdSpaceExhausted(session.id().clone()))
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine").finish_non_exhaustive()
    }
}

fn vote(session: &mut Session, action: &Action) -> Transition {
    let (Some(id), Some(selection)) = (&action.participant_id, &action.selection) else {
        return Transition::default();
    };
    if !session.set_selection(id, selection.as_str()) {
        return Transition::default();
    }
    Transition::applied()
}

fn leave(session: &mut Session, action: &Action) -> Transition {
    let Some(id) = &action.participant_id else {
        return Transition::default();
    };
    if !session.remove_participant(id) {
        return Transition::default();
    }
    Transition {
        applied: true,
        left: Some(id.clone()),
        now_empty: session.is_empty(),
        ..Transition::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardroom_protocol::SessionId;
    use cardroom_session::{SequentialIds, Timestamp};

    fn machine() -> StateMachine {
        StateMachine::new(Arc::new(SequentialIds::new("p")))
    }

    fn session() -> Session {
        Session::new(SessionId::from("s"), "Sprint 1", Timestamp::ZERO)
    }

    fn sid() -> SessionId {
        SessionId::from("s")
    }

    fn pid(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    #[test]
    fn test_apply_join_with_supplied_id() {
        let mut s = session();
        let t = machine()
            .apply(&mut s, &Action::join(sid(), Some(pid("alice")), "Alice"))
            .unwrap();

        assert!(t.applied);
        assert_eq!(t.joined, Some(pid("alice")));
        assert_eq!(s.participant(&pid("alice")).unwrap().name, "Alice");
    }

    #[test]
    fn test_apply_join_generates_id_when_missing_or_empty() {
        let m = machine();
        let mut s = session();

        let a = m.apply(&mut s, &Action::join(sid(), None, "A")).unwrap();
        let b = m.apply(&mut s, &Action::join(sid(), Some(pid("")), "B")).unwrap();

        let a = a.joined.unwrap();
        let b = b.joined.unwrap();
        assert!(!a.is_empty());
        assert!(!b.is_empty());
        assert_ne!(a, b);
        assert_eq!(s.participant_count(), 2);
    }

    #[test]
    fn test_apply_join_skips_ids_already_taken() {
        let m = machine();
        let mut s = session();
        // The generator will yield "p1" next; take it first.
        s.add_participant(pid("p1"), "Squatter");

        let t = m.apply(&mut s, &Action::join(sid(), None, "New")).unwrap();

        assert_eq!(t.joined, Some(pid("p2")));
        assert_eq!(s.participant(&pid("p1")).unwrap().name, "Squatter");
    }

    #[test]
    fn test_apply_join_gives_up_on_constant_generator() {
        struct Constant;
        impl IdGenerator for Constant {
            fn new_id(&self) -> String {
                "same".into()
            }
        }
        let m = StateMachine::new(Arc::new(Constant));
        let mut s = session();

        m.apply(&mut s, &Action::join(sid(), None, "First")).unwrap();
        let err = m.apply(&mut s, &Action::join(sid(), None, "Second")).unwrap_err();

        assert!(matches!(err, EngineError::IdSpaceExhausted(_)));
        assert_eq!(s.participant_count(), 1);
    }

    #[test]
    fn test_apply_vote_unknown_participant_is_noop() {
        let mut s = session();
        let t = machine()
            .apply(&mut s, &Action::vote(sid(), pid("ghost"), "8"))
            .unwrap();

        assert!(!t.applied);
        assert!(s.is_empty());
    }

    #[test]
    fn test_apply_vote_without_selection_is_noop() {
        let m = machine();
        let mut s = session();
        m.apply(&mut s, &Action::join(sid(), Some(pid("a")), "A")).unwrap();
        m.apply(&mut s, &Action::vote(sid(), pid("a"), "3")).unwrap();

        let mut bare = Action::vote(sid(), pid("a"), "");
        bare.selection = None;
        let t = m.apply(&mut s, &bare).unwrap();

        assert!(!t.applied);
        assert_eq!(s.participant(&pid("a")).unwrap().selection, "3");
    }

    #[test]
    fn test_apply_reveal_and_reset_are_idempotent() {
        let m = machine();
        let mut s = session();
        m.apply(&mut s, &Action::join(sid(), Some(pid("a")), "A")).unwrap();
        m.apply(&mut s, &Action::vote(sid(), pid("a"), "5")).unwrap();

        m.apply(&mut s, &Action::reveal(sid())).unwrap();
        let once = s.to_update();
        m.apply(&mut s, &Action::reveal(sid())).unwrap();
        assert_eq!(s.to_update(), once);

        m.apply(&mut s, &Action::reset(sid())).unwrap();
        let once = s.to_update();
        m.apply(&mut s, &Action::reset(sid())).unwrap();
        assert_eq!(s.to_update(), once);
        assert!(!once.revealed);
        assert!(once.resetting);
        assert_eq!(once.participants[0].selection, "");
    }

    #[test]
    fn test_apply_leave_last_participant_signals_empty() {
        let m = machine();
        let mut s = session();
        m.apply(&mut s, &Action::join(sid(), Some(pid("a")), "A")).unwrap();
        m.apply(&mut s, &Action::join(sid(), Some(pid("b")), "B")).unwrap();

        let first = m.apply(&mut s, &Action::leave(sid(), pid("a"))).unwrap();
        assert!(first.applied);
        assert!(!first.now_empty);

        let last = m.apply(&mut s, &Action::leave(sid(), pid("b"))).unwrap();
        assert_eq!(last.left, Some(pid("b")));
        assert!(last.now_empty);
    }

    #[test]
    fn test_apply_leave_unknown_on_empty_session_does_not_signal() {
        let mut s = session();
        let t = machine()
            .apply(&mut s, &Action::leave(sid(), pid("ghost")))
            .unwrap();

        assert!(!t.applied);
        assert!(!t.now_empty);
    }
}
