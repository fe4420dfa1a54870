//! The session entity: one estimation room and its participants.
//!
//! A [`Session`] is plain data plus the mutation operations a round of
//! estimation needs. It does no locking of its own; exclusive access is
//! provided by [`SessionHandle`](crate::SessionHandle), which is the only
//! way the registry hands sessions out.
//!
//! ```text
//!   join / select ──→ reveal ──→ reset ──→ (next action) start_round
//!        ↑                                          │
//!        └──────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use cardroom_protocol::{ParticipantId, ParticipantView, SessionId, Update};

use crate::Timestamp;

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// One member of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    /// `""` means "not yet voted".
    pub selection: String,
    /// Join order. Fixed on first join, kept across re-joins.
    seat: u64,
}

impl Participant {
    /// `true` once a card has been played this round.
    pub fn has_selected(&self) -> bool {
        !self.selection.is_empty()
    }

    fn view(&self) -> ParticipantView {
        ParticipantView {
            id: self.id.clone(),
            name: self.name.clone(),
            selection: self.selection.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One estimation room.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    name: String,
    participants: HashMap<ParticipantId, Participant>,
    revealed: bool,
    resetting: bool,
    last_activity_at: Timestamp,
    next_seat: u64,
}

impl Session {
    /// A fresh session with nobody in it and cards hidden.
    pub fn new(id: SessionId, name: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id,
            name: name.into(),
            participants: HashMap::new(),
            revealed: false,
            resetting: false,
            last_activity_at: now,
            next_seat: 0,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn revealed(&self) -> bool {
        self.revealed
    }

    pub fn resetting(&self) -> bool {
        self.resetting
    }

    pub fn last_activity_at(&self) -> Timestamp {
        self.last_activity_at
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn contains_participant(&self, id: &ParticipantId) -> bool {
        self.participants.contains_key(id)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Participants in join order.
    pub fn participants(&self) -> Vec<ParticipantView> {
        let mut seated: Vec<&Participant> = self.participants.values().collect();
        seated.sort_by_key(|p| p.seat);
        seated.into_iter().map(Participant::view).collect()
    }

    // -- Mutations --------------------------------------------------------
    //
    // None of these allocate a participant view; callers that broadcast
    // build one afterwards with `participants()` or `to_update()`.

    /// Inserts a participant, or overwrites an existing entry with the same
    /// id. Either way the selection starts out empty.
    pub fn add_participant(&mut self, id: ParticipantId, name: impl Into<String>) {
        let name = name.into();
        match self.participants.get_mut(&id) {
            Some(existing) => {
                existing.name = name;
                existing.selection.clear();
            }
            None => {
                let seat = self.next_seat;
                self.next_seat += 1;
                self.participants.insert(
                    id.clone(),
                    Participant {
                        id,
                        name,
                        selection: String::new(),
                        seat,
                    },
                );
            }
        }
    }

    /// Sets a participant's selection. Unknown participants are ignored.
    ///
    /// Returns `true` if the participant was present.
    pub fn set_selection(&mut self, id: &ParticipantId, value: impl Into<String>) -> bool {
        match self.participants.get_mut(id) {
            Some(participant) => {
                participant.selection = value.into();
                true
            }
            None => false,
        }
    }

    /// Makes every selection visible.
    pub fn reveal(&mut self) {
        self.revealed = true;
    }

    /// Hides and clears every selection and raises the one-shot
    /// `resetting` flag.
    pub fn reset(&mut self) {
        self.revealed = false;
        self.resetting = true;
        for participant in self.participants.values_mut() {
            participant.selection.clear();
        }
    }

    /// Lowers the `resetting` flag once the reset has been published.
    pub fn start_round(&mut self) {
        self.resetting = false;
    }

    /// Removes a participant if present. Returns `true` if it was.
    ///
    /// Check [`is_empty`](Self::is_empty) afterwards to know whether the
    /// session should be deleted.
    pub fn remove_participant(&mut self, id: &ParticipantId) -> bool {
        self.participants.remove(id).is_some()
    }

    /// Records activity at `now`. Never moves the timestamp backwards.
    pub fn touch(&mut self, now: Timestamp) {
        self.last_activity_at = self.last_activity_at.max(now);
    }

    // -- Views ------------------------------------------------------------

    /// The outbound payload describing this session right now.
    pub fn to_update(&self) -> Update {
        Update {
            session_id: self.id.clone(),
            participants: self.participants(),
            revealed: self.revealed,
            resetting: self.resetting,
        }
    }

    /// A detached copy of the session's observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            participants: self.participants(),
            revealed: self.revealed,
            resetting: self.resetting,
            last_activity_at: self.last_activity_at,
        }
    }
}

/// A read-only copy of a session, safe to hold after the lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub name: String,
    pub participants: Vec<ParticipantView>,
    pub revealed: bool,
    pub resetting: bool,
    pub last_activity_at: Timestamp,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: &str) -> ParticipantId {
        ParticipantId::from(id)
    }

    fn session() -> Session {
        Session::new(SessionId::from("s1"), "Sprint 1", Timestamp::from_millis(100))
    }

    #[test]
    fn test_new_session_is_empty_and_hidden() {
        let s = session();
        assert_eq!(s.id().as_str(), "s1");
        assert_eq!(s.name(), "Sprint 1");
        assert!(s.is_empty());
        assert!(!s.revealed());
        assert!(!s.resetting());
        assert_eq!(s.last_activity_at(), Timestamp::from_millis(100));
    }

    #[test]
    fn test_add_participant_starts_unvoted() {
        let mut s = session();
        s.add_participant(pid("p1"), "Alice");

        let view = s.participants();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].name, "Alice");
        assert_eq!(view[0].selection, "");
        assert!(!s.participant(&pid("p1")).unwrap().has_selected());
    }

    #[test]
    fn test_add_participant_overwrites_and_keeps_seat() {
        let mut s = session();
        s.add_participant(pid("p1"), "Alice");
        s.add_participant(pid("p2"), "Bob");
        s.set_selection(&pid("p1"), "5");

        s.add_participant(pid("p1"), "Alicia");

        let view = s.participants();
        assert_eq!(s.participant_count(), 2);
        assert_eq!(view[0].id, pid("p1"));
        assert_eq!(view[0].name, "Alicia");
        assert_eq!(view[0].selection, "");
        assert_eq!(view[1].id, pid("p2"));
    }

    #[test]
    fn test_participants_are_in_join_order() {
        let mut s = session();
        for (id, name) in [("z", "Zed"), ("a", "Ann"), ("m", "Mo")] {
            s.add_participant(pid(id), name);
        }
        let order: Vec<_> = s.participants().into_iter().map(|p| p.name).collect();
        assert_eq!(order, ["Zed", "Ann", "Mo"]);
    }

    #[test]
    fn test_set_selection_unknown_participant_is_noop() {
        let mut s = session();
        s.add_participant(pid("p1"), "Alice");

        assert!(!s.set_selection(&pid("ghost"), "8"));

        let view = s.participants();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].selection, "");
        assert!(!s.contains_participant(&pid("ghost")));
    }

    #[test]
    fn test_reset_clears_selections_and_raises_flag() {
        let mut s = session();
        s.add_participant(pid("p1"), "Alice");
        s.add_participant(pid("p2"), "Bob");
        assert!(s.set_selection(&pid("p1"), "3"));
        assert!(s.set_selection(&pid("p2"), "8"));
        s.reveal();

        s.reset();

        assert!(s.participants().iter().all(|p| p.selection.is_empty()));
        assert!(!s.revealed());
        assert!(s.resetting());

        s.start_round();
        assert!(!s.resetting());
    }

    #[test]
    fn test_reveal_and_reset_are_idempotent() {
        let mut s = session();
        s.add_participant(pid("p1"), "Alice");
        s.set_selection(&pid("p1"), "5");

        s.reveal();
        let once = s.snapshot();
        s.reveal();
        assert_eq!(s.snapshot(), once);

        s.reset();
        let once = s.snapshot();
        s.reset();
        assert_eq!(s.snapshot(), once);
    }

    #[test]
    fn test_remove_participant_empties_session() {
        let mut s = session();
        s.add_participant(pid("p1"), "Alice");
        s.add_participant(pid("p2"), "Bob");

        assert!(s.remove_participant(&pid("p1")));
        assert!(!s.is_empty());
        assert_eq!(s.participants().len(), 1);

        assert!(!s.remove_participant(&pid("p1")));
        assert!(!s.is_empty());

        assert!(s.remove_participant(&pid("p2")));
        assert!(s.is_empty());
    }

    #[test]
    fn test_touch_never_goes_backwards() {
        let mut s = session();
        s.touch(Timestamp::from_millis(500));
        s.touch(Timestamp::from_millis(200));
        assert_eq!(s.last_activity_at(), Timestamp::from_millis(500));
    }

    #[test]
    fn test_to_update_reflects_flags() {
        let mut s = session();
        s.add_participant(pid("p1"), "Alice");
        s.reset();

        let update = s.to_update();
        assert_eq!(update.session_id, SessionId::from("s1"));
        assert!(update.resetting);
        assert!(!update.revealed);
        assert_eq!(update.participants.len(), 1);
    }
}
