//! The room registry: code → room, shared across every task.

use crate::room::Room;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use derive_more::{Display, Error};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, instrument};

/// A room behind its mutex. Critical sections are short and never span an
/// await; broadcasts happen after release from captured snapshots.
pub type SharedRoom = Arc<Mutex<Room>>;

/// Locks a room, recovering the guard when a prior holder panicked.
pub fn lock_room(room: &SharedRoom) -> MutexGuard<'_, Room> {
    room.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Insert failed because the code is already taken.
#[derive(Debug, Clone, Display, Error)]
#[display("room code {code} already exists")]
pub struct CodeCollision {
    /// The colliding code.
    pub code: String,
}

/// Concurrent map of live rooms.
///
/// The registry only guards map membership (atomic insert-if-absent and
/// delete-if-present); serializing mutation of a room's fields is the room
/// mutex's job.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<String, SharedRoom>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Inserts `room` under its code, failing on collision.
    #[instrument(skip(self, room), fields(code = %room.code))]
    pub fn insert(&self, room: Room) -> Result<SharedRoom, CodeCollision> {
        let code = room.code.clone();
        match self.rooms.entry(code.clone()) {
            Entry::Occupied(_) => Err(CodeCollision { code }),
            Entry::Vacant(vacant) => {
                let shared = Arc::new(Mutex::new(room));
                vacant.insert(Arc::clone(&shared));
                debug!("room registered");
                Ok(shared)
            }
        }
    }

    /// Looks up a room by code.
    pub fn get(&self, code: &str) -> Option<SharedRoom> {
        self.rooms.get(code).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes a room, returning it so the caller can cancel its timers.
    #[instrument(skip(self))]
    pub fn remove(&self, code: &str) -> Option<SharedRoom> {
        let (_, room) = self.rooms.remove(code)?;
        debug!("room removed");
        Some(room)
    }

    /// Whether a room with `code` exists.
    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// True when no rooms exist.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Codes of every live room, for the sweeper.
    pub fn all_codes(&self) -> Vec<String> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drops every room. Test hook.
    pub fn clear(&self) {
        self.rooms.clear();
    }
}
