//! `medibill-events` — domain event contract + envelope.
//!
//! Events describe edits applied to a billing document during a session.
//! The envelope adds stream metadata so a session can keep an append-only
//! audit log of everything the operator did.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
