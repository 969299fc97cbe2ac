//! Billing domain module (event-sourced).
//!
//! This crate contains the business rules for a hospital bill: an ordered
//! tree of sections, numbered rows and sub-line-items, the CGHS
//! percentage-adjustment pricing model, and the document total. Implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod adjustment;
pub mod document;

pub use adjustment::{
    AdjustmentCode, AdjustmentKind, PAISE_PER_RUPEE, PricingBreakdown, rupees,
};
pub use document::{
    AddLineItem, AdjustmentApplied, AdjustmentSlot, ApplyAdjustment, AssignConsultant,
    ConsultantAssigned, DocumentNode, DocumentSeeded, DocumentSnapshot, InvoiceDocument,
    InvoiceDocumentCommand, InvoiceDocumentEvent, InvoiceDocumentId, InvoiceKind, LineItem,
    LineItemAdded, LineItemId, LineItemKind, LineItemMoved, LineItemRemoved, LineItemRenamed,
    LinePricing, LineTarget, MainItem, MainItemBody, MainItemId, MainItemRemoved, MoveDirection,
    MoveLineItem, QuantityChanged, RateChanged, RemoveLineItem, RemoveMainItem, RenameLineItem,
    Section, SeedDocument, SetQuantity, SetRate,
};
