//! Doctor directory collaborator.
//!
//! The billing session resolves consultant ids against this directory when
//! a consultation row is assigned to a doctor. The concrete backing store
//! (a hosted table in production) is out of scope; the session is handed
//! plain data at start.

pub mod doctor;

pub use doctor::{Doctor, DoctorDirectory, DoctorId, InMemoryDoctorDirectory};
