use actix::Recipient;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::models::{Outbound, ServerMessage, SessionId};

/// Multicast groups: the connections watching each game.
#[derive(Default)]
pub struct Groups {
    members: Mutex<HashMap<SessionId, HashMap<String, Recipient<Outbound>>>>,
}

impl Groups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, session_id: SessionId, connection_id: &str, recipient: Recipient<Outbound>) {
        let mut members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        let group = members.entry(session_id).or_default();
        group.insert(connection_id.to_string(), recipient);
        info!(
            "Connection {} joined game {} ({} watching)",
            connection_id,
            session_id,
            group.len()
        );
    }

    pub fn leave(&self, session_id: SessionId, connection_id: &str) {
        let mut members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(group) = members.get_mut(&session_id) {
            group.remove(connection_id);
            info!("Removed connection {} from game {}", connection_id, session_id);
            if group.is_empty() {
                members.remove(&session_id);
            }
        }
    }

    /// Number of connections watching `session_id`.
    pub fn len(&self, session_id: SessionId) -> usize {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .map_or(0, HashMap::len)
    }

    /// Send `message` to every connection in the game. Returns how many
    /// connections it was queued for.
    pub fn broadcast(&self, session_id: SessionId, message: &ServerMessage) -> usize {
        // Serialize the message once
        let text = match serde_json::to_string(message) {
            Ok(s) => s,
            Err(e) => {
                warn!("Error serializing message: {}", e);
                return 0;
            }
        };

        // Copy recipients out so nothing is sent under the lock.
        let recipients: Vec<Recipient<Outbound>> = {
            let members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
            match members.get(&session_id) {
                Some(group) => group.values().cloned().collect(),
                None => {
                    warn!("No connections found for game {}", session_id);
                    return 0;
                }
            }
        };

        for recipient in &recipients {
            recipient.do_send(Outbound(text.clone()));
        }
        recipients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix::prelude::*;
    use std::sync::Arc;

    /// Actor that records everything it is sent.
    struct Collector {
        received: Arc<Mutex<Vec<String>>>,
    }

    impl Actor for Collector {
        type Context = Context<Self>;
    }

    impl Handler<Outbound> for Collector {
        type Result = ();

        fn handle(&mut self, msg: Outbound, _: &mut Self::Context) {
            self.received.lock().unwrap().push(msg.0);
        }
    }

    #[derive(Message)]
    #[rtype(result = "()")]
    struct Barrier;

    impl Handler<Barrier> for Collector {
        type Result = ();

        fn handle(&mut self, _: Barrier, _: &mut Self::Context) {}
    }

    fn collector() -> (Addr<Collector>, Arc<Mutex<Vec<String>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let addr = Collector {
            received: received.clone(),
        }
        .start();
        (addr, received)
    }

    #[actix_rt::test]
    async fn test_broadcast_reaches_only_the_group() {
        let groups = Groups::new();
        let (a, a_seen) = collector();
        let (b, b_seen) = collector();
        let (other, other_seen) = collector();
        groups.join(1, "a", a.clone().recipient());
        groups.join(1, "b", b.clone().recipient());
        groups.join(2, "c", other.clone().recipient());

        let sent = groups.broadcast(1, &ServerMessage::error("hello"));
        assert_eq!(sent, 2);

        // Mailboxes are FIFO: once Barrier is handled the broadcast was too.
        a.send(Barrier).await.unwrap();
        b.send(Barrier).await.unwrap();
        other.send(Barrier).await.unwrap();

        assert_eq!(a_seen.lock().unwrap().len(), 1);
        assert_eq!(b_seen.lock().unwrap().len(), 1);
        assert!(other_seen.lock().unwrap().is_empty());
        assert!(a_seen.lock().unwrap()[0].contains("\"reason\":\"hello\""));
    }

    #[actix_rt::test]
    async fn test_leave_drops_empty_groups() {
        let groups = Groups::new();
        let (a, _) = collector();
        groups.join(7, "a", a.recipient());
        assert_eq!(groups.len(7), 1);

        groups.leave(7, "a");
        assert_eq!(groups.len(7), 0);
        assert_eq!(groups.broadcast(7, &ServerMessage::error("x")), 0);
    }
}
