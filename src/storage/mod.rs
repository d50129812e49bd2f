//! Durable storage for usage data
//!
//! The store is written as one JSON document, replaced atomically on every
//! save. `Autosave` drives periodic saves and the final flush on shutdown.

mod autosave;
mod persistence;
mod records;

pub use autosave::{Autosave, AutosaveHandle, AutosaveOutcome};
pub use persistence::{LoadOutcome, UsagePersistence};
pub use records::{PersistedChannel, PersistedEmote};
