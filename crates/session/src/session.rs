//! Edit execution pipeline for one billing session.
//!
//! The pipeline for every operator action is the same:
//!
//! ```text
//! Operation
//!   ↓
//! 1. Resolve collaborator data if needed (doctor directory)
//!   ↓
//! 2. Build command, handle (pure decision logic, produces events)
//!   ↓
//! 3. Apply each event to the in-memory document
//!   ↓
//! 4. Append an envelope to the session audit log
//! ```
//!
//! Single-threaded and synchronous: each operation runs to completion on the
//! calling thread before the next one is processed. Eventual persistence of
//! the edited document is the caller's concern, via
//! [`BillingSession::snapshot`].

use chrono::Utc;
use uuid::Uuid;

use medibill_billing::{
    AddLineItem, AdjustmentCode, AdjustmentSlot, ApplyAdjustment, AssignConsultant,
    DocumentSnapshot, InvoiceDocument, InvoiceDocumentCommand, InvoiceDocumentEvent, LineItemId,
    LineItemKind, LineTarget, MainItemId, MoveDirection, MoveLineItem, RemoveLineItem,
    RemoveMainItem, RenameLineItem, SetQuantity, SetRate,
};
use medibill_core::{Aggregate, AggregateRoot, DomainResult, NodeId};
use medibill_directory::{DoctorDirectory, DoctorId};
use medibill_events::{Event, EventEnvelope};

const AGGREGATE_TYPE: &str = "billing.invoice";

/// One operator editing one bill.
///
/// Holds the only mutable document instance of the session; there is no
/// conflict resolution across sessions (last write wins at the persistence
/// layer, which lives outside this crate).
pub struct BillingSession<D> {
    document: InvoiceDocument,
    directory: D,
    log: Vec<EventEnvelope<InvoiceDocumentEvent>>,
}

impl<D: DoctorDirectory> BillingSession<D> {
    /// Open a session over a seeded document (typically from a template).
    pub fn open(document: InvoiceDocument, directory: D) -> Self {
        Self {
            document,
            directory,
            log: Vec::new(),
        }
    }

    pub fn document(&self) -> &InvoiceDocument {
        &self.document
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Current bill total in paise.
    pub fn total(&self) -> u64 {
        self.document.compute_total()
    }

    /// Everything applied this session, in order.
    pub fn event_log(&self) -> &[EventEnvelope<InvoiceDocumentEvent>] {
        &self.log
    }

    /// Plain-data copy of the document for the persistence layer.
    pub fn snapshot(&self) -> DocumentSnapshot {
        self.document.snapshot()
    }

    /// Append a new sub-item with the kind's default description and rate.
    ///
    /// Returns the new line's id, or `None` when the document ignored the
    /// edit (absent or inline row).
    pub fn add_line_item(
        &mut self,
        main_item: MainItemId,
        kind: LineItemKind,
    ) -> DomainResult<Option<LineItemId>> {
        let line_item = LineItemId::new(NodeId::new());
        let applied = self.execute(InvoiceDocumentCommand::AddLineItem(AddLineItem {
            document_id: self.document.id_typed(),
            main_item,
            line_item,
            kind,
            occurred_at: Utc::now(),
        }))?;
        Ok((applied > 0).then_some(line_item))
    }

    pub fn remove_main_item(&mut self, main_item: MainItemId) -> DomainResult<()> {
        self.execute(InvoiceDocumentCommand::RemoveMainItem(RemoveMainItem {
            document_id: self.document.id_typed(),
            main_item,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    pub fn remove_line_item(
        &mut self,
        main_item: MainItemId,
        line_item: LineItemId,
    ) -> DomainResult<()> {
        self.execute(InvoiceDocumentCommand::RemoveLineItem(RemoveLineItem {
            document_id: self.document.id_typed(),
            main_item,
            line_item,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    pub fn move_line_item(
        &mut self,
        main_item: MainItemId,
        line_item: LineItemId,
        direction: MoveDirection,
    ) -> DomainResult<()> {
        self.execute(InvoiceDocumentCommand::MoveLineItem(MoveLineItem {
            document_id: self.document.id_typed(),
            main_item,
            line_item,
            direction,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    pub fn rename_line_item(
        &mut self,
        target: LineTarget,
        description: impl Into<String>,
    ) -> DomainResult<()> {
        self.execute(InvoiceDocumentCommand::RenameLineItem(RenameLineItem {
            document_id: self.document.id_typed(),
            target,
            description: description.into(),
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    /// Resolve `doctor` against the directory and store its display label
    /// as the line's description.
    ///
    /// The only surfaced failure of the session: an unknown id propagates
    /// as `NotFound`, unchanged, for the UI to message.
    pub fn set_consultant(&mut self, target: LineTarget, doctor: DoctorId) -> DomainResult<()> {
        let display_label = self.directory.resolve(doctor)?.display_label.clone();
        self.execute(InvoiceDocumentCommand::AssignConsultant(AssignConsultant {
            document_id: self.document.id_typed(),
            target,
            display_label,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    pub fn set_quantity(&mut self, target: LineTarget, quantity: i64) -> DomainResult<()> {
        self.execute(InvoiceDocumentCommand::SetQuantity(SetQuantity {
            document_id: self.document.id_typed(),
            target,
            quantity,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    pub fn set_rate(&mut self, target: LineTarget, rate: i64) -> DomainResult<()> {
        self.execute(InvoiceDocumentCommand::SetRate(SetRate {
            document_id: self.document.id_typed(),
            target,
            rate,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    pub fn apply_adjustment(
        &mut self,
        target: LineTarget,
        slot: AdjustmentSlot,
        code: AdjustmentCode,
    ) -> DomainResult<()> {
        self.execute(InvoiceDocumentCommand::ApplyAdjustment(ApplyAdjustment {
            document_id: self.document.id_typed(),
            target,
            slot,
            code,
            occurred_at: Utc::now(),
        }))?;
        Ok(())
    }

    /// Handle the command, apply and log every resulting event.
    ///
    /// Returns how many events were applied (0 for a documented no-op).
    fn execute(&mut self, command: InvoiceDocumentCommand) -> DomainResult<usize> {
        let events = self.document.handle(&command)?;
        let applied = events.len();

        for event in events {
            self.document.apply(&event);
            let envelope = EventEnvelope::new(
                Uuid::now_v7(),
                self.document.id_typed().0,
                AGGREGATE_TYPE,
                self.document.version(),
                event,
            );
            tracing::debug!(
                event_type = envelope.payload().event_type(),
                sequence_number = envelope.sequence_number(),
                total = self.document.compute_total(),
                "applied billing event"
            );
            self.log.push(envelope);
        }

        Ok(applied)
    }
}
