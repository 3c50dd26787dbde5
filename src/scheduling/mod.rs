//! Conflict & validation gates checked before any appointment mutation.

mod conflict;

pub use conflict::*;
