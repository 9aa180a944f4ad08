//! Process-wide table of the games that currently have viewers.
//!
//! Each game id maps to a slot guarded by its own async mutex; every
//! mutation of that game (attach, move, detach, flush) happens while holding
//! it. The table itself sits behind a plain mutex that is only taken to look
//! up, insert or remove a slot, never while waiting on a slot or the store.
//!
//! A slot removed from the table is marked evicted before its lock is
//! released, so a caller that fetched the slot just before removal notices
//! and retries on a fresh one.

use futures::future::join_all;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::{CacheError, MoveRejection, StoreError};
use crate::game::{apply_move, MoveRequest, Outcome, Status, Stone};
use crate::models::{Session, SessionId, Snapshot};
use crate::store::SessionStore;

#[derive(Default)]
struct Slot {
    session: Option<Session>,
    attached: usize,
    /// In-memory state differs from what was last written to the store.
    dirty: bool,
    evicted: bool,
}

type SlotRef = Arc<tokio::sync::Mutex<Slot>>;

/// What a connection learns when it attaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// `None` for spectators.
    pub role: Option<Stone>,
    pub status: Status,
    pub snapshot: Snapshot,
    /// The attach itself changed the game (a player was seated or the
    /// stored copy was merged in) and watchers should be told.
    pub changed: bool,
}

/// Drops a slot that never received a session, which happens when the
/// caller gave up while the store was still loading it.
struct EmptySlotReaper<'a> {
    cache: &'a SessionCache,
    id: SessionId,
    slot_ref: SlotRef,
}

impl<'a> EmptySlotReaper<'a> {
    fn new(cache: &'a SessionCache, id: SessionId, slot_ref: &SlotRef) -> Self {
        EmptySlotReaper {
            cache,
            id,
            slot_ref: slot_ref.clone(),
        }
    }
}

impl Drop for EmptySlotReaper<'_> {
    fn drop(&mut self) {
        // Busy means someone else is loading it and will clean up.
        if let Ok(mut slot) = self.slot_ref.try_lock() {
            if !slot.evicted && slot.session.is_none() && slot.attached == 0 {
                self.cache.evict(self.id, &self.slot_ref, &mut slot);
                debug!("Dropped empty cache slot for game {}", self.id);
            }
        }
    }
}

pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    slots: Mutex<HashMap<SessionId, SlotRef>>,
    store_timeout: Duration,
}

impl SessionCache {
    pub fn new(store: Arc<dyn SessionStore>, store_timeout: Duration) -> Self {
        SessionCache {
            store,
            slots: Mutex::new(HashMap::new()),
            store_timeout,
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SlotRef>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, id: SessionId) -> SlotRef {
        self.table().entry(id).or_default().clone()
    }

    fn existing(&self, id: SessionId) -> Option<SlotRef> {
        self.table().get(&id).cloned()
    }

    /// Drop `slot` from the table. The caller holds its lock.
    fn evict(&self, id: SessionId, slot_ref: &SlotRef, slot: &mut Slot) {
        slot.evicted = true;
        let mut table = self.table();
        if table.get(&id).is_some_and(|s| Arc::ptr_eq(s, slot_ref)) {
            table.remove(&id);
        }
    }

    async fn load(&self, id: SessionId) -> Result<Session, CacheError> {
        let rows = tokio::time::timeout(self.store_timeout, self.store.load_session(id))
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))??;

        match rows.as_slice() {
            [] => Err(CacheError::SessionNotFound(id)),
            [record] => {
                Session::from_record(record).map_err(|source| CacheError::CorruptRecord { id, source })
            }
            _ => {
                error!("multiple games with the same id {}", id);
                Err(CacheError::AmbiguousSession {
                    id,
                    count: rows.len(),
                })
            }
        }
    }

    async fn persist(&self, id: SessionId, slot: &mut Slot) -> Result<(), StoreError> {
        if !slot.dirty {
            return Ok(());
        }
        let Some(session) = slot.session.as_ref() else {
            return Ok(());
        };

        let record = session.to_record()?;
        tokio::time::timeout(self.store_timeout, self.store.save_session(id, &record))
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))??;
        slot.dirty = false;
        debug!("Saved game {}", id);
        Ok(())
    }

    /// Persist an idle slot and evict it. On failure the slot stays cached.
    async fn flush_and_evict(&self, id: SessionId, slot_ref: &SlotRef, slot: &mut Slot) -> bool {
        match self.persist(id, slot).await {
            Ok(()) => {
                self.evict(id, slot_ref, slot);
                info!("Evicted game {} from cache", id);
                true
            }
            Err(e) => {
                error!("Failed to save game {}, keeping it cached: {}", id, e);
                false
            }
        }
    }

    /// Load game `id` into `slot`, or merge the stored copy into the one
    /// already cached. Returns whether the cached copy changed.
    async fn refresh(&self, id: SessionId, slot_ref: &SlotRef, slot: &mut Slot) -> Result<bool, CacheError> {
        let durable = match self.load(id).await {
            Ok(session) => session,
            Err(CacheError::StoreUnavailable(e)) if slot.session.is_some() => {
                warn!("Serving cached game {} without store check: {}", id, e);
                return Ok(false);
            }
            Err(e) => {
                if slot.session.is_none() {
                    self.evict(id, slot_ref, slot);
                }
                return Err(e);
            }
        };

        match slot.session.as_mut() {
            Some(cached) => Ok(cached.reconcile(durable)),
            None => {
                debug!("Loaded game {} into cache", id);
                slot.session = Some(durable);
                Ok(false)
            }
        }
    }

    /// Attach a connection for `identity` to game `id`, loading it if needed.
    pub async fn attach(&self, id: SessionId, identity: &str) -> Result<Attachment, CacheError> {
        loop {
            let slot_ref = self.slot(id);
            let _reaper = EmptySlotReaper::new(self, id, &slot_ref);
            let mut guard = slot_ref.lock().await;
            if guard.evicted {
                continue;
            }
            let slot = &mut *guard;

            let mut changed = self.refresh(id, &slot_ref, slot).await?;
            let Some(session) = slot.session.as_mut() else {
                return Err(CacheError::SessionNotFound(id));
            };

            let (role, seated) = session.seat(identity);
            changed |= seated;
            if changed {
                slot.dirty = true;
            }
            slot.attached += 1;

            info!(
                "{} attached to game {} as {} ({} attached)",
                identity,
                id,
                role.map_or("spectator".to_string(), |c| c.to_string()),
                slot.attached
            );

            return Ok(Attachment {
                role,
                status: session.status,
                snapshot: session.snapshot(),
                changed,
            });
        }
    }

    /// Seat `identity` in game `id` without attaching a connection.
    ///
    /// Runs under the game's lock, so two visitors racing for the free seat
    /// are served one after the other. The change is saved before returning;
    /// when nobody watches the game it is evicted again.
    pub async fn join(&self, id: SessionId, identity: &str) -> Result<Attachment, CacheError> {
        loop {
            let slot_ref = self.slot(id);
            let _reaper = EmptySlotReaper::new(self, id, &slot_ref);
            let mut guard = slot_ref.lock().await;
            if guard.evicted {
                continue;
            }
            let slot = &mut *guard;

            let mut changed = self.refresh(id, &slot_ref, slot).await?;
            let Some(session) = slot.session.as_mut() else {
                return Err(CacheError::SessionNotFound(id));
            };

            let (role, seated) = session.seat(identity);
            changed |= seated;
            let joined = Attachment {
                role,
                status: session.status,
                snapshot: session.snapshot(),
                changed,
            };
            if changed {
                slot.dirty = true;
            }

            if slot.attached == 0 {
                self.flush_and_evict(id, &slot_ref, slot).await;
            } else if let Err(e) = self.persist(id, slot).await {
                error!("Failed to save game {} after join: {}", id, e);
            }
            return Ok(joined);
        }
    }

    /// Release one attachment. The last one out saves and evicts the game.
    pub async fn detach(&self, id: SessionId) {
        let Some(slot_ref) = self.existing(id) else {
            warn!("Detach from game {} which is not cached", id);
            return;
        };
        let mut guard = slot_ref.lock().await;
        if guard.evicted || guard.attached == 0 {
            warn!("Detach from game {} without a matching attach", id);
            return;
        }

        guard.attached -= 1;
        debug!("Detached from game {} ({} attached)", id, guard.attached);
        if guard.attached == 0 {
            self.flush_and_evict(id, &slot_ref, &mut guard).await;
        }
    }

    /// Validate and apply a move by `identity`.
    ///
    /// `Ok(None)` means the game is not accepting moves and the request was
    /// dropped. On success the returned snapshot reflects the new state.
    pub async fn apply_move(
        &self,
        id: SessionId,
        identity: &str,
        request: MoveRequest,
    ) -> Result<Option<Snapshot>, MoveRejection> {
        let slot_ref = self.existing(id).ok_or(MoveRejection::NotAttached)?;
        let mut guard = slot_ref.lock().await;
        if guard.evicted || guard.attached == 0 {
            return Err(MoveRejection::NotAttached);
        }
        let slot = &mut *guard;
        let session = slot.session.as_mut().ok_or(MoveRejection::NotAttached)?;

        let request = request.by(session.color_of(identity));
        match apply_move(&mut session.status, &mut session.state, &request)? {
            Outcome::Ignored => {
                debug!("Ignored move in game {} with status {:?}", id, session.status);
                Ok(None)
            }
            Outcome::Placed(placed) => {
                slot.dirty = true;
                info!(
                    "Game {}: {} played ({}, {}) as move {}{}",
                    id,
                    placed.color,
                    placed.x,
                    placed.y,
                    placed.sequence_number,
                    if placed.is_winning_move { " and won" } else { "" }
                );
                Ok(Some(session.snapshot()))
            }
        }
    }

    /// Current state of a cached game.
    pub async fn snapshot(&self, id: SessionId) -> Option<Snapshot> {
        let slot_ref = self.existing(id)?;
        let guard = slot_ref.lock().await;
        if guard.evicted {
            return None;
        }
        guard.session.as_ref().map(Session::snapshot)
    }

    /// Write a cached game to the store if it has unsaved changes.
    pub async fn flush(&self, id: SessionId) -> Result<(), StoreError> {
        let Some(slot_ref) = self.existing(id) else {
            return Ok(());
        };
        let mut guard = slot_ref.lock().await;
        if guard.evicted {
            return Ok(());
        }
        self.persist(id, &mut guard).await.map_err(|e| {
            error!("Failed to save game {}: {}", id, e);
            e
        })
    }

    /// Retry saving games nobody is attached to and evict the ones that
    /// make it to the store. Returns how many were evicted.
    pub async fn flush_idle(&self) -> usize {
        let slots: Vec<(SessionId, SlotRef)> = self
            .table()
            .iter()
            .map(|(id, slot)| (*id, slot.clone()))
            .collect();

        let results = join_all(slots.into_iter().map(|(id, slot_ref)| async move {
            let mut guard = slot_ref.lock().await;
            if guard.evicted || guard.attached > 0 {
                return false;
            }
            self.flush_and_evict(id, &slot_ref, &mut guard).await
        }))
        .await;

        results.into_iter().filter(|evicted| *evicted).count()
    }

    pub fn is_cached(&self, id: SessionId) -> bool {
        self.table().contains_key(&id)
    }

    /// Number of attachments currently held on game `id`.
    pub async fn attached_count(&self, id: SessionId) -> usize {
        match self.existing(id) {
            Some(slot_ref) => slot_ref.lock().await.attached,
            None => 0,
        }
    }
}
