//! Billing session (application-level orchestration).
//!
//! A session owns one in-memory invoice document and the doctor directory
//! handed to it at start, executes operator edits against the document, and
//! keeps an append-only audit log of every applied event.

pub mod session;


pub use session::BillingSession;
