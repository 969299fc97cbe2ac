use serde::{Deserialize, Serialize};

use medibill_core::{AggregateId, DomainError, DomainResult, Entity};

/// Doctor identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoctorId(pub AggregateId);

impl DoctorId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DoctorId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A consultant as the billing screens show them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: DoctorId,
    /// Label printed on the bill, e.g. "Dr. S. Kulkarni (M.S. Ortho)".
    pub display_label: String,
}

impl Entity for Doctor {
    type Id = DoctorId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Read-only consultant lookup.
///
/// `resolve` failing with [`DomainError::NotFound`] is the one error the
/// billing core surfaces to callers.
pub trait DoctorDirectory {
    /// All doctors in display order.
    fn list(&self) -> &[Doctor];

    /// Resolve a consultant id to its directory entry.
    fn resolve(&self, id: DoctorId) -> DomainResult<&Doctor> {
        self.list()
            .iter()
            .find(|doctor| doctor.id == id)
            .ok_or(DomainError::NotFound)
    }
}

/// Directory backed by a plain in-memory list.
///
/// The production app loads the list from its hosted store at session
/// start; tests and dev use this directly.
#[derive(Debug, Default)]
pub struct InMemoryDoctorDirectory {
    doctors: Vec<Doctor>,
}

impl InMemoryDoctorDirectory {
    pub fn new(doctors: Vec<Doctor>) -> Self {
        Self { doctors }
    }
}

impl DoctorDirectory for InMemoryDoctorDirectory {
    fn list(&self) -> &[Doctor] {
        &self.doctors
    }
}
