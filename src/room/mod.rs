//! Room state and lifecycle.

mod machine;
mod state;

pub use machine::{next, Event, InvalidTransition, Phase};
pub use state::{Player, PlayerId, Room, StateSnapshot, TimerHandle};
