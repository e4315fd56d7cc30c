//! Cooperative countdown tasks: reconnection grace and the turn clock.
//!
//! Both families follow the same shape: set up under the room lock, store a
//! [`crate::room::TimerHandle`], sleep in one-second cancellable steps, and
//! re-verify handle id (and, for turn timers, the room's timer version)
//! before acting on expiry. Cancellation bookkeeping happens on the
//! canceller's side, under the same lock that takes the handle.

pub mod reconnect;
pub mod turn;
