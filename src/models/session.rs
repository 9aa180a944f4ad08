use log::info;
use serde::{Deserialize, Serialize};

use crate::game::{GameState, Stone, Status};
use crate::models::Snapshot;

/// Identifier of a game, allocated by the durable store.
pub type SessionId = u64;

/// Durable form of a session: one row of the `games` table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub status: Status,
    /// JSON-serialized `GameState`.
    pub data: String,
}

impl SessionRecord {
    /// Row for a freshly created game waiting for its second player.
    pub fn new_game(id: SessionId, creator: String, first: Stone) -> Result<Self, serde_json::Error> {
        Ok(SessionRecord {
            id,
            player1: Some(creator),
            player2: None,
            status: Status::New,
            data: serde_json::to_string(&GameState::new(first))?,
        })
    }
}

/// Authoritative in-memory state of one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub status: Status,
    pub state: GameState,
}

impl Session {
    pub fn from_record(record: &SessionRecord) -> Result<Self, serde_json::Error> {
        Ok(Session {
            id: record.id,
            player1: record.player1.clone(),
            player2: record.player2.clone(),
            status: record.status,
            state: serde_json::from_str(&record.data)?,
        })
    }

    pub fn to_record(&self) -> Result<SessionRecord, serde_json::Error> {
        Ok(SessionRecord {
            id: self.id,
            player1: self.player1.clone(),
            player2: self.player2.clone(),
            status: self.status,
            data: serde_json::to_string(&self.state)?,
        })
    }

    /// Stone played by `identity`; `None` for spectators.
    pub fn color_of(&self, identity: &str) -> Option<Stone> {
        let first = self.state.starting_color();
        if self.player1.as_deref() == Some(identity) {
            Some(first)
        } else if self.player2.as_deref() == Some(identity) {
            Some(first.opponent())
        } else {
            None
        }
    }

    /// Give `identity` a seat if one is free. Returns the role and whether
    /// the session changed.
    ///
    /// The second distinct identity to sit down starts the game.
    pub fn seat(&mut self, identity: &str) -> (Option<Stone>, bool) {
        if let Some(color) = self.color_of(identity) {
            return (Some(color), false);
        }

        if self.player1.is_none() {
            info!("Assigning {} as first player of game {}", identity, self.id);
            self.player1 = Some(identity.to_string());
        } else if self.player2.is_none() {
            info!("Assigning {} as second player of game {}", identity, self.id);
            self.player2 = Some(identity.to_string());
            if self.status == Status::New {
                self.status = Status::InProgress;
            }
        } else {
            return (None, false);
        }

        (self.color_of(identity), true)
    }

    /// Merge a freshly loaded durable copy into this cached one.
    ///
    /// Only applies when the store has started a game this copy still sees
    /// as new: players and status come from the store, the board from
    /// whichever copy is further along.
    pub fn reconcile(&mut self, durable: Session) -> bool {
        if !(durable.status == Status::InProgress && self.status == Status::New) {
            return false;
        }

        info!(
            "Game {} was started elsewhere, adopting stored players {:?} / {:?}",
            self.id, durable.player1, durable.player2
        );
        self.player1 = durable.player1;
        self.player2 = durable.player2;
        self.status = durable.status;
        if durable.state.next_sequence_number() > self.state.next_sequence_number() {
            self.state = durable.state;
        }
        true
    }

    pub fn snapshot(&self) -> Snapshot {
        let board = self.state.board();
        Snapshot {
            player1: self.player1.clone(),
            player2: self.player2.clone(),
            status: self.status,
            moves: board.moves().to_vec(),
            next_sequence_number: self.state.next_sequence_number(),
            next_color: self.state.next_color(),
            extent: board.extent().map(Into::into),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{apply_move, MoveRequest};

    fn new_session(first: Stone) -> Session {
        let record = SessionRecord::new_game(1, "alice".to_string(), first).unwrap();
        Session::from_record(&record).unwrap()
    }

    #[test]
    fn test_seating_order() {
        let mut session = new_session(Stone::Black);

        assert_eq!(session.seat("alice"), (Some(Stone::Black), false));
        assert_eq!(session.status, Status::New);

        assert_eq!(session.seat("bob"), (Some(Stone::White), true));
        assert_eq!(session.status, Status::InProgress);
        assert_eq!(session.player2.as_deref(), Some("bob"));

        assert_eq!(session.seat("carol"), (None, false));
        assert_eq!(session.seat("bob"), (Some(Stone::White), false));
    }

    #[test]
    fn test_empty_seat_one_is_filled_first() {
        let mut session = new_session(Stone::White);
        session.player1 = None;

        assert_eq!(session.seat("dave"), (Some(Stone::White), true));
        assert_eq!(session.status, Status::New);
    }

    #[test]
    fn test_reconcile_adopts_started_game() {
        let mut cached = new_session(Stone::White);
        let mut durable = cached.clone();
        durable.player2 = Some("bob".to_string());
        durable.status = Status::InProgress;

        assert!(cached.reconcile(durable));
        assert_eq!(cached.status, Status::InProgress);
        assert_eq!(cached.player2.as_deref(), Some("bob"));
    }

    #[test]
    fn test_reconcile_keeps_longer_history() {
        let mut cached = new_session(Stone::White);
        let mut status = Status::InProgress;
        let request = MoveRequest::new(0.0, 0.0, 1).by(Some(Stone::White));
        apply_move(&mut status, &mut cached.state, &request).unwrap();

        let mut durable = new_session(Stone::White);
        durable.player2 = Some("bob".to_string());
        durable.status = Status::InProgress;

        assert!(cached.reconcile(durable));
        assert_eq!(cached.state.board().len(), 1);
        assert_eq!(cached.state.next_sequence_number(), 2);
    }

    #[test]
    fn test_reconcile_takes_longer_durable_history() {
        let mut cached = new_session(Stone::Black);
        let mut durable = cached.clone();
        durable.player2 = Some("bob".to_string());
        durable.status = Status::InProgress;
        let request = MoveRequest::new(3.0, 3.0, 1).by(Some(Stone::Black));
        apply_move(&mut durable.status, &mut durable.state, &request).unwrap();

        assert!(cached.reconcile(durable));
        assert_eq!(cached.state.board().color_at(3, 3), Some(Stone::Black));
    }

    #[test]
    fn test_reconcile_ignores_other_combinations() {
        let mut cached = new_session(Stone::White);
        cached.seat("bob");
        let durable = new_session(Stone::White);
        let before = cached.clone();

        assert!(!cached.reconcile(durable));
        assert_eq!(cached, before);
    }

    #[test]
    fn test_record_round_trip() {
        let mut session = new_session(Stone::Black);
        session.seat("bob");
        let request = MoveRequest::new(2.0, -1.0, 1).by(Some(Stone::Black));
        apply_move(&mut session.status, &mut session.state, &request).unwrap();

        let record = session.to_record().unwrap();
        assert_eq!(record.status, Status::InProgress);
        assert_eq!(Session::from_record(&record).unwrap(), session);
    }

    #[test]
    fn test_snapshot_contents() {
        let mut session = new_session(Stone::Black);
        session.seat("bob");
        let request = MoveRequest::new(2.0, -1.0, 1).by(Some(Stone::Black));
        apply_move(&mut session.status, &mut session.state, &request).unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.moves.len(), 1);
        assert_eq!(snapshot.next_sequence_number, 2);
        assert_eq!(snapshot.next_color, Stone::White);
        assert_eq!(snapshot.player2.as_deref(), Some("bob"));
        assert!(snapshot.extent.is_some());
    }
}
