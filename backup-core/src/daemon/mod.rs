//! Long-lived pieces: the creation guard and the backup scheduler.

pub mod guard;
pub mod scheduler;
