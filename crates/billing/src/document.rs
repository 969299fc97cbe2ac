use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medibill_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Entity, NodeId};
use medibill_events::Event;

use crate::adjustment::{AdjustmentCode, PricingBreakdown, rupees};

/// Invoice document identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceDocumentId(pub AggregateId);

impl InvoiceDocumentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceDocumentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of a numbered top-level row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MainItemId(pub NodeId);

impl MainItemId {
    pub fn new(id: NodeId) -> Self {
        Self(id)
    }
}

/// Identifier of a sub-line-item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(pub NodeId);

impl LineItemId {
    pub fn new(id: NodeId) -> Self {
        Self(id)
    }
}

/// Billing scenario a document was seeded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    ConservativeTreatment,
    SurgicalPackage,
}

/// Kind hint for a newly added sub-item: picks the default description and
/// unit rate the row starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineItemKind {
    Consultation,
    Accommodation,
    Other,
    Surgical,
}

impl LineItemKind {
    pub fn default_description(self) -> &'static str {
        match self {
            LineItemKind::Consultation => "Consultation",
            LineItemKind::Accommodation => "Accommodation Charges",
            LineItemKind::Other => "Other Charges",
            LineItemKind::Surgical => "Operation Charges",
        }
    }

    /// Default unit rate in paise.
    pub fn default_rate(self) -> u64 {
        match self {
            LineItemKind::Consultation => rupees(350),
            LineItemKind::Accommodation => rupees(250),
            LineItemKind::Other | LineItemKind::Surgical => 0,
        }
    }
}

/// How a billable line prices itself: rate × quantity, or a tariff
/// breakdown for package rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricing {
    quantity: u32,
    /// Unit rate in paise.
    unit_rate: u64,
    breakdown: Option<PricingBreakdown>,
}

impl LinePricing {
    pub fn rated(quantity: u32, unit_rate: u64) -> Self {
        Self {
            quantity: quantity.max(1),
            unit_rate,
            breakdown: None,
        }
    }

    /// Package pricing: governed by the breakdown, not rate × quantity.
    pub fn packaged(base_amount: u64) -> Self {
        Self {
            quantity: 1,
            unit_rate: 0,
            breakdown: Some(PricingBreakdown::new(base_amount)),
        }
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn unit_rate(&self) -> u64 {
        self.unit_rate
    }

    pub fn breakdown(&self) -> Option<&PricingBreakdown> {
        self.breakdown.as_ref()
    }

    /// Billed amount for this line.
    pub fn amount(&self) -> u64 {
        match &self.breakdown {
            Some(breakdown) => breakdown.final_amount(),
            None => u64::from(self.quantity).saturating_mul(self.unit_rate),
        }
    }
}

/// Leaf billable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    id: LineItemId,
    /// Display label like "i)", "ii)" — an ordering hint, not an identity key.
    serial: String,
    description: String,
    /// Optional external tariff code (display only, not validated).
    code: Option<String>,
    pricing: LinePricing,
}

impl LineItem {
    pub fn new(
        id: LineItemId,
        serial: impl Into<String>,
        description: impl Into<String>,
        code: Option<String>,
        pricing: LinePricing,
    ) -> Self {
        Self {
            id,
            serial: serial.into(),
            description: description.into(),
            code,
            pricing,
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn pricing(&self) -> &LinePricing {
        &self.pricing
    }

    pub fn amount(&self) -> u64 {
        self.pricing.amount()
    }
}

impl Entity for LineItem {
    type Id = LineItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Non-billable grouping marker interleaved between numbered rows.
///
/// Sections carry no amount and contain nothing; they only label the rows
/// that follow them (e.g. "CONSERVATIVE TREATMENT" with a stay date range).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub date_range_label: String,
}

/// Body of a numbered row: an ordered list of sub-items (the common case),
/// or a single line merged into the row itself (e.g. "Pathology Charges").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainItemBody {
    SubItems(Vec<LineItem>),
    Inline(LinePricing),
}

/// Numbered top-level billable row, e.g. "1) Consultation for Inpatients".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainItem {
    id: MainItemId,
    serial: String,
    title: String,
    code: Option<String>,
    body: MainItemBody,
}

impl MainItem {
    pub fn with_sub_items(
        id: MainItemId,
        serial: impl Into<String>,
        title: impl Into<String>,
        code: Option<String>,
        sub_items: Vec<LineItem>,
    ) -> Self {
        Self {
            id,
            serial: serial.into(),
            title: title.into(),
            code,
            body: MainItemBody::SubItems(sub_items),
        }
    }

    pub fn inline(
        id: MainItemId,
        serial: impl Into<String>,
        title: impl Into<String>,
        code: Option<String>,
        pricing: LinePricing,
    ) -> Self {
        Self {
            id,
            serial: serial.into(),
            title: title.into(),
            code,
            body: MainItemBody::Inline(pricing),
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn body(&self) -> &MainItemBody {
        &self.body
    }

    /// Sub-items of this row; empty for inline rows.
    pub fn sub_items(&self) -> &[LineItem] {
        match &self.body {
            MainItemBody::SubItems(items) => items,
            MainItemBody::Inline(_) => &[],
        }
    }

    /// Billed amount of the row including all of its sub-items.
    pub fn amount(&self) -> u64 {
        match &self.body {
            MainItemBody::SubItems(items) => items
                .iter()
                .fold(0u64, |sum, item| sum.saturating_add(item.amount())),
            MainItemBody::Inline(pricing) => pricing.amount(),
        }
    }

    fn sub_item_index(&self, line_item: LineItemId) -> Option<usize> {
        match &self.body {
            MainItemBody::SubItems(items) => items.iter().position(|i| i.id == line_item),
            MainItemBody::Inline(_) => None,
        }
    }
}

impl Entity for MainItem {
    type Id = MainItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Document node: a section marker or a numbered row.
///
/// Sections are interleaved markers, not containers — every `MainItem`
/// belongs to the document directly, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentNode {
    Section(Section),
    Main(MainItem),
}

/// Addresses a billable line: a sub-item of a numbered row, or the row's
/// own inline line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineTarget {
    Sub {
        main_item: MainItemId,
        line_item: LineItemId,
    },
    Inline {
        main_item: MainItemId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentSlot {
    Primary,
    Secondary,
}

/// Lowercase roman serial for the 1-based position `n`: "i)", "ii)", "iv)", …
fn roman_serial(n: usize) -> String {
    const TABLE: &[(usize, &str)] = &[
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];

    let mut remaining = n.max(1);
    let mut out = String::new();
    for &(value, numeral) in TABLE {
        while remaining >= value {
            out.push_str(numeral);
            remaining -= value;
        }
    }
    out.push(')');
    out
}

/// Aggregate root: InvoiceDocument.
///
/// An ordered tree of sections and numbered rows, mutated interactively
/// during a billing session. Every mutation is a pure tree edit; the total
/// is recomputed on query, so the document is never left inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDocument {
    id: InvoiceDocumentId,
    kind: InvoiceKind,
    items: Vec<DocumentNode>,
    version: u64,
    created: bool,
}

/// Plain-data snapshot of a document for hand-off to the persistence layer.
///
/// The snapshot defines no wire format of its own; it is whatever the
/// serializer makes of the node tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub document_id: InvoiceDocumentId,
    pub kind: InvoiceKind,
    pub items: Vec<DocumentNode>,
}

impl InvoiceDocument {
    /// Create an empty, not-yet-seeded aggregate instance for rehydration.
    pub fn empty(id: InvoiceDocumentId) -> Self {
        Self {
            id,
            kind: InvoiceKind::ConservativeTreatment,
            items: Vec::new(),
            version: 0,
            created: false,
        }
    }

    /// Construct a document directly from a seed tree (template path).
    pub fn seeded(id: InvoiceDocumentId, kind: InvoiceKind, items: Vec<DocumentNode>) -> Self {
        Self {
            id,
            kind,
            items,
            version: 1,
            created: true,
        }
    }

    pub fn id_typed(&self) -> InvoiceDocumentId {
        self.id
    }

    pub fn kind(&self) -> InvoiceKind {
        self.kind
    }

    pub fn items(&self) -> &[DocumentNode] {
        &self.items
    }

    pub fn main_item(&self, id: MainItemId) -> Option<&MainItem> {
        self.items.iter().find_map(|node| match node {
            DocumentNode::Main(item) if item.id == id => Some(item),
            _ => None,
        })
    }

    pub fn line_pricing(&self, target: LineTarget) -> Option<&LinePricing> {
        match target {
            LineTarget::Sub {
                main_item,
                line_item,
            } => {
                let main = self.main_item(main_item)?;
                main.sub_items()
                    .iter()
                    .find(|i| i.id == line_item)
                    .map(LineItem::pricing)
            }
            LineTarget::Inline { main_item } => match &self.main_item(main_item)?.body {
                MainItemBody::Inline(pricing) => Some(pricing),
                MainItemBody::SubItems(_) => None,
            },
        }
    }

    /// Free-text name of the billed service at `target` (the row title for
    /// inline lines).
    pub fn line_description(&self, target: LineTarget) -> Option<&str> {
        match target {
            LineTarget::Sub {
                main_item,
                line_item,
            } => {
                let main = self.main_item(main_item)?;
                main.sub_items()
                    .iter()
                    .find(|i| i.id == line_item)
                    .map(LineItem::description)
            }
            LineTarget::Inline { main_item } => {
                let main = self.main_item(main_item)?;
                match &main.body {
                    MainItemBody::Inline(_) => Some(main.title()),
                    MainItemBody::SubItems(_) => None,
                }
            }
        }
    }

    /// Sum of every reachable line in document order: the breakdown's final
    /// amount for package lines, rate × quantity otherwise.
    ///
    /// Pure query; callable at any time, never mutates state.
    pub fn compute_total(&self) -> u64 {
        self.items.iter().fold(0u64, |sum, node| match node {
            DocumentNode::Section(_) => sum,
            DocumentNode::Main(item) => sum.saturating_add(item.amount()),
        })
    }

    /// Plain-data copy of the tree for serialization.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            document_id: self.id,
            kind: self.kind,
            items: self.items.clone(),
        }
    }

    /// Rebuild a document from a snapshot.
    ///
    /// Breakdown caches are re-derived from base amounts + codes rather than
    /// trusted from the snapshot.
    pub fn restore(snapshot: DocumentSnapshot) -> Self {
        let mut doc = Self {
            id: snapshot.document_id,
            kind: snapshot.kind,
            items: snapshot.items,
            version: 1,
            created: true,
        };
        for node in &mut doc.items {
            if let DocumentNode::Main(item) = node {
                match &mut item.body {
                    MainItemBody::SubItems(sub_items) => {
                        for line in sub_items {
                            if let Some(breakdown) = line.pricing.breakdown.as_mut() {
                                breakdown.recompute();
                            }
                        }
                    }
                    MainItemBody::Inline(pricing) => {
                        if let Some(breakdown) = pricing.breakdown.as_mut() {
                            breakdown.recompute();
                        }
                    }
                }
            }
        }
        doc
    }

    fn main_item_mut(&mut self, id: MainItemId) -> Option<&mut MainItem> {
        self.items.iter_mut().find_map(|node| match node {
            DocumentNode::Main(item) if item.id == id => Some(item),
            _ => None,
        })
    }

    fn pricing_mut(&mut self, target: LineTarget) -> Option<&mut LinePricing> {
        match target {
            LineTarget::Sub {
                main_item,
                line_item,
            } => match &mut self.main_item_mut(main_item)?.body {
                MainItemBody::SubItems(items) => items
                    .iter_mut()
                    .find(|i| i.id == line_item)
                    .map(|i| &mut i.pricing),
                MainItemBody::Inline(_) => None,
            },
            LineTarget::Inline { main_item } => {
                match &mut self.main_item_mut(main_item)?.body {
                    MainItemBody::Inline(pricing) => Some(pricing),
                    MainItemBody::SubItems(_) => None,
                }
            }
        }
    }

    fn set_line_description(&mut self, target: LineTarget, description: &str) {
        match target {
            LineTarget::Sub {
                main_item,
                line_item,
            } => {
                if let Some(main) = self.main_item_mut(main_item) {
                    if let MainItemBody::SubItems(items) = &mut main.body {
                        if let Some(line) = items.iter_mut().find(|i| i.id == line_item) {
                            line.description = description.to_string();
                        }
                    }
                }
            }
            LineTarget::Inline { main_item } => {
                if let Some(main) = self.main_item_mut(main_item) {
                    if let MainItemBody::Inline(_) = main.body {
                        main.title = description.to_string();
                    }
                }
            }
        }
    }
}

impl AggregateRoot for InvoiceDocument {
    type Id = InvoiceDocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SeedDocument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedDocument {
    pub document_id: InvoiceDocumentId,
    pub kind: InvoiceKind,
    pub items: Vec<DocumentNode>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLineItem.
///
/// The caller allocates `line_item` so replays stay deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLineItem {
    pub document_id: InvoiceDocumentId,
    pub main_item: MainItemId,
    pub line_item: LineItemId,
    pub kind: LineItemKind,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveMainItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMainItem {
    pub document_id: InvoiceDocumentId,
    pub main_item: MainItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLineItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLineItem {
    pub document_id: InvoiceDocumentId,
    pub main_item: MainItemId,
    pub line_item: LineItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MoveLineItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveLineItem {
    pub document_id: InvoiceDocumentId,
    pub main_item: MainItemId,
    pub line_item: LineItemId,
    pub direction: MoveDirection,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameLineItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameLineItem {
    pub document_id: InvoiceDocumentId,
    pub target: LineTarget,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignConsultant.
///
/// `display_label` is the doctor's label, already resolved against the
/// directory by the session layer (the aggregate performs no lookups).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignConsultant {
    pub document_id: InvoiceDocumentId,
    pub target: LineTarget,
    pub display_label: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetQuantity.
///
/// `quantity` is the raw operator input; non-positive values are coerced
/// to 1 rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetQuantity {
    pub document_id: InvoiceDocumentId,
    pub target: LineTarget,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetRate.
///
/// `rate` is the raw operator input in paise; negative values are coerced
/// to 0 rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetRate {
    pub document_id: InvoiceDocumentId,
    pub target: LineTarget,
    pub rate: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyAdjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyAdjustment {
    pub document_id: InvoiceDocumentId,
    pub target: LineTarget,
    pub slot: AdjustmentSlot,
    pub code: AdjustmentCode,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceDocumentCommand {
    SeedDocument(SeedDocument),
    AddLineItem(AddLineItem),
    RemoveMainItem(RemoveMainItem),
    RemoveLineItem(RemoveLineItem),
    MoveLineItem(MoveLineItem),
    RenameLineItem(RenameLineItem),
    AssignConsultant(AssignConsultant),
    SetQuantity(SetQuantity),
    SetRate(SetRate),
    ApplyAdjustment(ApplyAdjustment),
}

/// Event: DocumentSeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSeeded {
    pub document_id: InvoiceDocumentId,
    pub kind: InvoiceKind,
    pub items: Vec<DocumentNode>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineItemAdded.
///
/// Carries the fully built line (serial included) so replay does not depend
/// on the child count at decision time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemAdded {
    pub document_id: InvoiceDocumentId,
    pub main_item: MainItemId,
    pub line_item: LineItem,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MainItemRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainItemRemoved {
    pub document_id: InvoiceDocumentId,
    pub main_item: MainItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineItemRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRemoved {
    pub document_id: InvoiceDocumentId,
    pub main_item: MainItemId,
    pub line_item: LineItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineItemMoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemMoved {
    pub document_id: InvoiceDocumentId,
    pub main_item: MainItemId,
    pub line_item: LineItemId,
    pub direction: MoveDirection,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineItemRenamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRenamed {
    pub document_id: InvoiceDocumentId,
    pub target: LineTarget,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ConsultantAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultantAssigned {
    pub document_id: InvoiceDocumentId,
    pub target: LineTarget,
    pub display_label: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuantityChanged (post-normalization value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityChanged {
    pub document_id: InvoiceDocumentId,
    pub target: LineTarget,
    pub quantity: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RateChanged (post-normalization value, paise).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateChanged {
    pub document_id: InvoiceDocumentId,
    pub target: LineTarget,
    pub unit_rate: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdjustmentApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentApplied {
    pub document_id: InvoiceDocumentId,
    pub target: LineTarget,
    pub slot: AdjustmentSlot,
    pub code: AdjustmentCode,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceDocumentEvent {
    DocumentSeeded(DocumentSeeded),
    LineItemAdded(LineItemAdded),
    MainItemRemoved(MainItemRemoved),
    LineItemRemoved(LineItemRemoved),
    LineItemMoved(LineItemMoved),
    LineItemRenamed(LineItemRenamed),
    ConsultantAssigned(ConsultantAssigned),
    QuantityChanged(QuantityChanged),
    RateChanged(RateChanged),
    AdjustmentApplied(AdjustmentApplied),
}

impl Event for InvoiceDocumentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceDocumentEvent::DocumentSeeded(_) => "billing.invoice.seeded",
            InvoiceDocumentEvent::LineItemAdded(_) => "billing.invoice.line_item_added",
            InvoiceDocumentEvent::MainItemRemoved(_) => "billing.invoice.main_item_removed",
            InvoiceDocumentEvent::LineItemRemoved(_) => "billing.invoice.line_item_removed",
            InvoiceDocumentEvent::LineItemMoved(_) => "billing.invoice.line_item_moved",
            InvoiceDocumentEvent::LineItemRenamed(_) => "billing.invoice.line_item_renamed",
            InvoiceDocumentEvent::ConsultantAssigned(_) => "billing.invoice.consultant_assigned",
            InvoiceDocumentEvent::QuantityChanged(_) => "billing.invoice.quantity_changed",
            InvoiceDocumentEvent::RateChanged(_) => "billing.invoice.rate_changed",
            InvoiceDocumentEvent::AdjustmentApplied(_) => "billing.invoice.adjustment_applied",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceDocumentEvent::DocumentSeeded(e) => e.occurred_at,
            InvoiceDocumentEvent::LineItemAdded(e) => e.occurred_at,
            InvoiceDocumentEvent::MainItemRemoved(e) => e.occurred_at,
            InvoiceDocumentEvent::LineItemRemoved(e) => e.occurred_at,
            InvoiceDocumentEvent::LineItemMoved(e) => e.occurred_at,
            InvoiceDocumentEvent::LineItemRenamed(e) => e.occurred_at,
            InvoiceDocumentEvent::ConsultantAssigned(e) => e.occurred_at,
            InvoiceDocumentEvent::QuantityChanged(e) => e.occurred_at,
            InvoiceDocumentEvent::RateChanged(e) => e.occurred_at,
            InvoiceDocumentEvent::AdjustmentApplied(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InvoiceDocument {
    type Command = InvoiceDocumentCommand;
    type Event = InvoiceDocumentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceDocumentEvent::DocumentSeeded(e) => {
                self.id = e.document_id;
                self.kind = e.kind;
                self.items = e.items.clone();
                self.created = true;
            }
            InvoiceDocumentEvent::LineItemAdded(e) => {
                if let Some(main) = self.main_item_mut(e.main_item) {
                    if let MainItemBody::SubItems(items) = &mut main.body {
                        items.push(e.line_item.clone());
                    }
                }
            }
            InvoiceDocumentEvent::MainItemRemoved(e) => {
                self.items.retain(|node| match node {
                    DocumentNode::Main(item) => item.id != e.main_item,
                    DocumentNode::Section(_) => true,
                });
            }
            InvoiceDocumentEvent::LineItemRemoved(e) => {
                if let Some(main) = self.main_item_mut(e.main_item) {
                    if let MainItemBody::SubItems(items) = &mut main.body {
                        items.retain(|i| i.id != e.line_item);
                    }
                }
            }
            InvoiceDocumentEvent::LineItemMoved(e) => {
                if let Some(main) = self.main_item_mut(e.main_item) {
                    if let Some(index) = main.sub_item_index(e.line_item) {
                        if let MainItemBody::SubItems(items) = &mut main.body {
                            match e.direction {
                                MoveDirection::Up if index > 0 => items.swap(index - 1, index),
                                MoveDirection::Down if index + 1 < items.len() => {
                                    items.swap(index, index + 1)
                                }
                                _ => {}
                            }
                        }
                    }
                }
            }
            InvoiceDocumentEvent::LineItemRenamed(e) => {
                self.set_line_description(e.target, &e.description);
            }
            InvoiceDocumentEvent::ConsultantAssigned(e) => {
                self.set_line_description(e.target, &e.display_label);
            }
            InvoiceDocumentEvent::QuantityChanged(e) => {
                if let Some(pricing) = self.pricing_mut(e.target) {
                    if pricing.breakdown.is_none() {
                        pricing.quantity = e.quantity;
                    }
                }
            }
            InvoiceDocumentEvent::RateChanged(e) => {
                if let Some(pricing) = self.pricing_mut(e.target) {
                    if pricing.breakdown.is_none() {
                        pricing.unit_rate = e.unit_rate;
                    }
                }
            }
            InvoiceDocumentEvent::AdjustmentApplied(e) => {
                if let Some(pricing) = self.pricing_mut(e.target) {
                    if let Some(breakdown) = pricing.breakdown.as_mut() {
                        match e.slot {
                            AdjustmentSlot::Primary => breakdown.set_primary(e.code),
                            AdjustmentSlot::Secondary => breakdown.set_secondary(e.code),
                        }
                    }
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceDocumentCommand::SeedDocument(cmd) => self.handle_seed(cmd),
            InvoiceDocumentCommand::AddLineItem(cmd) => self.handle_add_line_item(cmd),
            InvoiceDocumentCommand::RemoveMainItem(cmd) => self.handle_remove_main_item(cmd),
            InvoiceDocumentCommand::RemoveLineItem(cmd) => self.handle_remove_line_item(cmd),
            InvoiceDocumentCommand::MoveLineItem(cmd) => self.handle_move_line_item(cmd),
            InvoiceDocumentCommand::RenameLineItem(cmd) => self.handle_rename(cmd),
            InvoiceDocumentCommand::AssignConsultant(cmd) => self.handle_assign_consultant(cmd),
            InvoiceDocumentCommand::SetQuantity(cmd) => self.handle_set_quantity(cmd),
            InvoiceDocumentCommand::SetRate(cmd) => self.handle_set_rate(cmd),
            InvoiceDocumentCommand::ApplyAdjustment(cmd) => self.handle_apply_adjustment(cmd),
        }
    }
}

impl InvoiceDocument {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_document_id(&self, document_id: InvoiceDocumentId) -> Result<(), DomainError> {
        if self.id != document_id {
            return Err(DomainError::invariant("document_id mismatch"));
        }
        Ok(())
    }

    fn handle_seed(&self, cmd: &SeedDocument) -> Result<Vec<InvoiceDocumentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("document already seeded"));
        }

        Ok(vec![InvoiceDocumentEvent::DocumentSeeded(DocumentSeeded {
            document_id: cmd.document_id,
            kind: cmd.kind,
            items: cmd.items.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line_item(
        &self,
        cmd: &AddLineItem,
    ) -> Result<Vec<InvoiceDocumentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_document_id(cmd.document_id)?;

        // Absent rows and inline rows take no children; silently ignored,
        // matching the surrounding UI which never offers the action there.
        let Some(main) = self.main_item(cmd.main_item) else {
            return Ok(vec![]);
        };
        let MainItemBody::SubItems(items) = &main.body else {
            return Ok(vec![]);
        };

        let line_item = LineItem::new(
            cmd.line_item,
            roman_serial(items.len() + 1),
            cmd.kind.default_description(),
            None,
            LinePricing::rated(1, cmd.kind.default_rate()),
        );

        Ok(vec![InvoiceDocumentEvent::LineItemAdded(LineItemAdded {
            document_id: cmd.document_id,
            main_item: cmd.main_item,
            line_item,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_main_item(
        &self,
        cmd: &RemoveMainItem,
    ) -> Result<Vec<InvoiceDocumentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_document_id(cmd.document_id)?;

        // Idempotent: removing an already-absent row is a no-op.
        if self.main_item(cmd.main_item).is_none() {
            return Ok(vec![]);
        }

        Ok(vec![InvoiceDocumentEvent::MainItemRemoved(MainItemRemoved {
            document_id: cmd.document_id,
            main_item: cmd.main_item,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line_item(
        &self,
        cmd: &RemoveLineItem,
    ) -> Result<Vec<InvoiceDocumentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_document_id(cmd.document_id)?;

        let present = self
            .main_item(cmd.main_item)
            .and_then(|main| main.sub_item_index(cmd.line_item))
            .is_some();
        if !present {
            return Ok(vec![]);
        }

        Ok(vec![InvoiceDocumentEvent::LineItemRemoved(LineItemRemoved {
            document_id: cmd.document_id,
            main_item: cmd.main_item,
            line_item: cmd.line_item,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_move_line_item(
        &self,
        cmd: &MoveLineItem,
    ) -> Result<Vec<InvoiceDocumentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_document_id(cmd.document_id)?;

        let Some(main) = self.main_item(cmd.main_item) else {
            return Ok(vec![]);
        };
        let Some(index) = main.sub_item_index(cmd.line_item) else {
            return Ok(vec![]);
        };

        // Boundary calls are tolerated and ignored, not errors.
        let movable = match cmd.direction {
            MoveDirection::Up => index > 0,
            MoveDirection::Down => index + 1 < main.sub_items().len(),
        };
        if !movable {
            return Ok(vec![]);
        }

        Ok(vec![InvoiceDocumentEvent::LineItemMoved(LineItemMoved {
            document_id: cmd.document_id,
            main_item: cmd.main_item,
            line_item: cmd.line_item,
            direction: cmd.direction,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rename(
        &self,
        cmd: &RenameLineItem,
    ) -> Result<Vec<InvoiceDocumentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_document_id(cmd.document_id)?;

        if self.line_description(cmd.target).is_none() {
            return Ok(vec![]);
        }

        Ok(vec![InvoiceDocumentEvent::LineItemRenamed(LineItemRenamed {
            document_id: cmd.document_id,
            target: cmd.target,
            description: cmd.description.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_consultant(
        &self,
        cmd: &AssignConsultant,
    ) -> Result<Vec<InvoiceDocumentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_document_id(cmd.document_id)?;

        if self.line_description(cmd.target).is_none() {
            return Ok(vec![]);
        }

        Ok(vec![InvoiceDocumentEvent::ConsultantAssigned(
            ConsultantAssigned {
                document_id: cmd.document_id,
                target: cmd.target,
                display_label: cmd.display_label.clone(),
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_set_quantity(
        &self,
        cmd: &SetQuantity,
    ) -> Result<Vec<InvoiceDocumentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_document_id(cmd.document_id)?;

        let Some(pricing) = self.line_pricing(cmd.target) else {
            return Ok(vec![]);
        };
        // Package lines are governed by the breakdown, not quantity.
        if pricing.breakdown.is_some() {
            return Ok(vec![]);
        }

        // Bad input is normalized, not rejected: non-positive -> 1.
        let quantity = if cmd.quantity < 1 {
            1
        } else {
            cmd.quantity.min(i64::from(u32::MAX)) as u32
        };

        Ok(vec![InvoiceDocumentEvent::QuantityChanged(QuantityChanged {
            document_id: cmd.document_id,
            target: cmd.target,
            quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_rate(&self, cmd: &SetRate) -> Result<Vec<InvoiceDocumentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_document_id(cmd.document_id)?;

        let Some(pricing) = self.line_pricing(cmd.target) else {
            return Ok(vec![]);
        };
        if pricing.breakdown.is_some() {
            return Ok(vec![]);
        }

        // Bad input is normalized, not rejected: negative -> 0.
        let unit_rate = cmd.rate.max(0) as u64;

        Ok(vec![InvoiceDocumentEvent::RateChanged(RateChanged {
            document_id: cmd.document_id,
            target: cmd.target,
            unit_rate,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_adjustment(
        &self,
        cmd: &ApplyAdjustment,
    ) -> Result<Vec<InvoiceDocumentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_document_id(cmd.document_id)?;

        // Only package lines carry a breakdown; plain lines ignore the call.
        let Some(pricing) = self.line_pricing(cmd.target) else {
            return Ok(vec![]);
        };
        if pricing.breakdown.is_none() {
            return Ok(vec![]);
        }

        // The secondary slot never accepts addition-kind rules.
        if cmd.slot == AdjustmentSlot::Secondary && !cmd.code.secondary_eligible() {
            return Ok(vec![]);
        }

        Ok(vec![InvoiceDocumentEvent::AdjustmentApplied(
            AdjustmentApplied {
                document_id: cmd.document_id,
                target: cmd.target,
                slot: cmd.slot,
                code: cmd.code,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjustment::{AdjustmentKind, PAISE_PER_RUPEE};
    use proptest::prelude::*;

    fn test_document_id() -> InvoiceDocumentId {
        InvoiceDocumentId::new(AggregateId::new())
    }

    fn test_main_item_id() -> MainItemId {
        MainItemId::new(NodeId::new())
    }

    fn test_line_item_id() -> LineItemId {
        LineItemId::new(NodeId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn rated_line(id: LineItemId, serial: &str, quantity: u32, rate_rupees: u64) -> LineItem {
        LineItem::new(
            id,
            serial,
            "Consultation",
            None,
            LinePricing::rated(quantity, rupees(rate_rupees)),
        )
    }

    fn packaged_line(id: LineItemId, serial: &str, base_rupees: u64) -> LineItem {
        LineItem::new(
            id,
            serial,
            "Operation Charges",
            Some("CGHS-748".to_string()),
            LinePricing::packaged(rupees(base_rupees)),
        )
    }

    /// A two-row document: one sub-item row with a rated and a packaged
    /// line, plus an inline pathology row.
    struct Fixture {
        doc: InvoiceDocument,
        consult_main: MainItemId,
        consult_line: LineItemId,
        package_line: LineItemId,
        pathology_main: MainItemId,
    }

    fn fixture() -> Fixture {
        let document_id = test_document_id();
        let consult_main = test_main_item_id();
        let consult_line = test_line_item_id();
        let package_line = test_line_item_id();
        let pathology_main = test_main_item_id();

        let items = vec![
            DocumentNode::Section(Section {
                title: "CONSERVATIVE TREATMENT".to_string(),
                date_range_label: "01/02/2026 To 10/02/2026".to_string(),
            }),
            DocumentNode::Main(MainItem::with_sub_items(
                consult_main,
                "1)",
                "Consultation for Inpatients",
                None,
                vec![
                    rated_line(consult_line, "i)", 2, 350),
                    packaged_line(package_line, "ii)", 11308),
                ],
            )),
            DocumentNode::Main(MainItem::inline(
                pathology_main,
                "2)",
                "Pathology Charges",
                None,
                LinePricing::rated(1, rupees(1200)),
            )),
        ];

        Fixture {
            doc: InvoiceDocument::seeded(
                document_id,
                InvoiceKind::SurgicalPackage,
                items,
            ),
            consult_main,
            consult_line,
            package_line,
            pathology_main,
        }
    }

    fn dispatch(doc: &mut InvoiceDocument, cmd: InvoiceDocumentCommand) -> Vec<InvoiceDocumentEvent> {
        let events = doc.handle(&cmd).unwrap();
        for event in &events {
            doc.apply(event);
        }
        events
    }

    /// Independent recomputation of the document total, re-deriving package
    /// amounts from base + codes instead of reading cached fields.
    fn expected_total(doc: &InvoiceDocument) -> u64 {
        fn line_amount(pricing: &LinePricing) -> u64 {
            match pricing.breakdown() {
                None => u64::from(pricing.quantity()) * pricing.unit_rate(),
                Some(b) => {
                    let truncate = |amount: u64, percent: u64| -> u64 {
                        amount * percent / 100 / PAISE_PER_RUPEE * PAISE_PER_RUPEE
                    };
                    let primary = match b.primary().kind() {
                        AdjustmentKind::Discount => {
                            b.base_amount() - truncate(b.base_amount(), b.primary().percent())
                        }
                        AdjustmentKind::Addition => {
                            b.base_amount() + truncate(b.base_amount(), b.primary().percent())
                        }
                        AdjustmentKind::None => b.base_amount(),
                    };
                    match b.secondary().kind() {
                        AdjustmentKind::Discount => {
                            primary - truncate(primary, b.secondary().percent())
                        }
                        _ => primary,
                    }
                }
            }
        }

        doc.items()
            .iter()
            .map(|node| match node {
                DocumentNode::Section(_) => 0,
                DocumentNode::Main(main) => match main.body() {
                    MainItemBody::SubItems(items) => {
                        items.iter().map(|i| line_amount(i.pricing())).sum()
                    }
                    MainItemBody::Inline(pricing) => line_amount(pricing),
                },
            })
            .sum()
    }

    #[test]
    fn seeded_document_totals_all_reachable_lines() {
        let f = fixture();
        // 2 x 350 + 11308 package + 1200 inline pathology.
        assert_eq!(f.doc.compute_total(), rupees(700 + 11308 + 1200));
        assert_eq!(f.doc.compute_total(), expected_total(&f.doc));
    }

    #[test]
    fn seed_twice_conflicts() {
        let f = fixture();
        let cmd = InvoiceDocumentCommand::SeedDocument(SeedDocument {
            document_id: f.doc.id_typed(),
            kind: InvoiceKind::ConservativeTreatment,
            items: vec![],
            occurred_at: test_time(),
        });
        let err = f.doc.handle(&cmd).unwrap_err();
        match err {
            DomainError::Conflict(msg) => assert!(msg.contains("already seeded")),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn add_line_item_appends_with_next_roman_serial_and_defaults() {
        let mut f = fixture();
        let new_line = test_line_item_id();

        let document_id = f.doc.id_typed();
        let events = dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::AddLineItem(AddLineItem {
                document_id,
                main_item: f.consult_main,
                line_item: new_line,
                kind: LineItemKind::Consultation,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(events.len(), 1);
        match &events[0] {
            InvoiceDocumentEvent::LineItemAdded(e) => {
                assert_eq!(e.line_item.serial(), "iii)");
                assert_eq!(e.line_item.description(), "Consultation");
                assert_eq!(e.line_item.pricing().quantity(), 1);
                assert_eq!(e.line_item.pricing().unit_rate(), rupees(350));
            }
            other => panic!("expected LineItemAdded, got {other:?}"),
        }

        let main = f.doc.main_item(f.consult_main).unwrap();
        assert_eq!(main.sub_items().len(), 3);
        assert_eq!(f.doc.compute_total(), rupees(700 + 11308 + 1200 + 350));
    }

    #[test]
    fn add_to_inline_row_is_a_no_op() {
        let f = fixture();
        let events = f
            .doc
            .handle(&InvoiceDocumentCommand::AddLineItem(AddLineItem {
                document_id: f.doc.id_typed(),
                main_item: f.pathology_main,
                line_item: test_line_item_id(),
                kind: LineItemKind::Other,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn add_then_remove_restores_order_and_total() {
        let mut f = fixture();
        let before = f.doc.clone();
        let new_line = test_line_item_id();

        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::AddLineItem(AddLineItem {
                document_id,
                main_item: f.consult_main,
                line_item: new_line,
                kind: LineItemKind::Accommodation,
                occurred_at: test_time(),
            }),
        );
        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::RemoveLineItem(RemoveLineItem {
                document_id,
                main_item: f.consult_main,
                line_item: new_line,
                occurred_at: test_time(),
            }),
        );

        assert_eq!(f.doc.items(), before.items());
        assert_eq!(f.doc.compute_total(), before.compute_total());
    }

    #[test]
    fn removing_main_item_drops_all_children_from_total() {
        let mut f = fixture();
        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::RemoveMainItem(RemoveMainItem {
                document_id,
                main_item: f.consult_main,
                occurred_at: test_time(),
            }),
        );

        assert!(f.doc.main_item(f.consult_main).is_none());
        assert_eq!(f.doc.compute_total(), rupees(1200));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut f = fixture();
        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::RemoveLineItem(RemoveLineItem {
                document_id,
                main_item: f.consult_main,
                line_item: f.consult_line,
                occurred_at: test_time(),
            }),
        );

        // Second removal of the same reference emits nothing.
        let events = f
            .doc
            .handle(&InvoiceDocumentCommand::RemoveLineItem(RemoveLineItem {
                document_id: f.doc.id_typed(),
                main_item: f.consult_main,
                line_item: f.consult_line,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn move_swaps_with_immediate_neighbor() {
        let mut f = fixture();
        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::MoveLineItem(MoveLineItem {
                document_id,
                main_item: f.consult_main,
                line_item: f.consult_line,
                direction: MoveDirection::Down,
                occurred_at: test_time(),
            }),
        );

        let main = f.doc.main_item(f.consult_main).unwrap();
        assert_eq!(*main.sub_items()[1].id(), f.consult_line);
        assert_eq!(*main.sub_items()[0].id(), f.package_line);
    }

    #[test]
    fn move_at_boundary_is_a_no_op() {
        let f = fixture();

        let up_first = f
            .doc
            .handle(&InvoiceDocumentCommand::MoveLineItem(MoveLineItem {
                document_id: f.doc.id_typed(),
                main_item: f.consult_main,
                line_item: f.consult_line,
                direction: MoveDirection::Up,
                occurred_at: test_time(),
            }))
            .unwrap();
        let down_last = f
            .doc
            .handle(&InvoiceDocumentCommand::MoveLineItem(MoveLineItem {
                document_id: f.doc.id_typed(),
                main_item: f.consult_main,
                line_item: f.package_line,
                direction: MoveDirection::Down,
                occurred_at: test_time(),
            }))
            .unwrap();

        assert!(up_first.is_empty());
        assert!(down_last.is_empty());
    }

    #[test]
    fn rename_replaces_description_in_place() {
        let mut f = fixture();
        let target = LineTarget::Sub {
            main_item: f.consult_main,
            line_item: f.consult_line,
        };
        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::RenameLineItem(RenameLineItem {
                document_id,
                target,
                description: "Physiotherapy Session".to_string(),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(f.doc.line_description(target), Some("Physiotherapy Session"));
    }

    #[test]
    fn rename_inline_row_edits_the_row_title() {
        let mut f = fixture();
        let target = LineTarget::Inline {
            main_item: f.pathology_main,
        };
        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::RenameLineItem(RenameLineItem {
                document_id,
                target,
                description: "Pathology & Radiology Charges".to_string(),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(
            f.doc.main_item(f.pathology_main).unwrap().title(),
            "Pathology & Radiology Charges"
        );
    }

    #[test]
    fn consultant_assignment_stores_resolved_label() {
        let mut f = fixture();
        let target = LineTarget::Sub {
            main_item: f.consult_main,
            line_item: f.consult_line,
        };
        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::AssignConsultant(AssignConsultant {
                document_id,
                target,
                display_label: "Dr. S. Kulkarni (M.S. Ortho)".to_string(),
                occurred_at: test_time(),
            }),
        );
        assert_eq!(
            f.doc.line_description(target),
            Some("Dr. S. Kulkarni (M.S. Ortho)")
        );
    }

    #[test]
    fn bad_quantity_is_coerced_to_one() {
        let mut f = fixture();
        let target = LineTarget::Sub {
            main_item: f.consult_main,
            line_item: f.consult_line,
        };
        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::SetQuantity(SetQuantity {
                document_id,
                target,
                quantity: -4,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(f.doc.line_pricing(target).unwrap().quantity(), 1);
        assert_eq!(f.doc.compute_total(), rupees(350 + 11308 + 1200));
    }

    #[test]
    fn bad_rate_is_coerced_to_zero() {
        let mut f = fixture();
        let target = LineTarget::Inline {
            main_item: f.pathology_main,
        };
        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::SetRate(SetRate {
                document_id,
                target,
                rate: -500,
                occurred_at: test_time(),
            }),
        );
        assert_eq!(f.doc.line_pricing(target).unwrap().unit_rate(), 0);
        assert_eq!(f.doc.compute_total(), rupees(700 + 11308));
    }

    #[test]
    fn quantity_and_rate_ignore_package_lines() {
        let f = fixture();
        let target = LineTarget::Sub {
            main_item: f.consult_main,
            line_item: f.package_line,
        };

        let qty_events = f
            .doc
            .handle(&InvoiceDocumentCommand::SetQuantity(SetQuantity {
                document_id: f.doc.id_typed(),
                target,
                quantity: 3,
                occurred_at: test_time(),
            }))
            .unwrap();
        let rate_events = f
            .doc
            .handle(&InvoiceDocumentCommand::SetRate(SetRate {
                document_id: f.doc.id_typed(),
                target,
                rate: rupees(100) as i64,
                occurred_at: test_time(),
            }))
            .unwrap();

        assert!(qty_events.is_empty());
        assert!(rate_events.is_empty());
    }

    #[test]
    fn adjustment_chain_reprices_the_package_line() {
        let mut f = fixture();
        let target = LineTarget::Sub {
            main_item: f.consult_main,
            line_item: f.package_line,
        };

        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::ApplyAdjustment(ApplyAdjustment {
                document_id,
                target,
                slot: AdjustmentSlot::Primary,
                code: AdjustmentCode::Ward10,
                occurred_at: test_time(),
            }),
        );

        let breakdown = f.doc.line_pricing(target).unwrap().breakdown().unwrap();
        assert_eq!(breakdown.discount_amount(), rupees(1130));
        assert_eq!(breakdown.final_amount(), rupees(10178));
        assert_eq!(f.doc.compute_total(), rupees(700 + 10178 + 1200));
        assert_eq!(f.doc.compute_total(), expected_total(&f.doc));
    }

    #[test]
    fn adjustment_on_plain_line_is_a_no_op() {
        let f = fixture();
        let events = f
            .doc
            .handle(&InvoiceDocumentCommand::ApplyAdjustment(ApplyAdjustment {
                document_id: f.doc.id_typed(),
                target: LineTarget::Sub {
                    main_item: f.consult_main,
                    line_item: f.consult_line,
                },
                slot: AdjustmentSlot::Primary,
                code: AdjustmentCode::Ward10,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn special15_is_rejected_in_secondary_slot() {
        let f = fixture();
        let events = f
            .doc
            .handle(&InvoiceDocumentCommand::ApplyAdjustment(ApplyAdjustment {
                document_id: f.doc.id_typed(),
                target: LineTarget::Sub {
                    main_item: f.consult_main,
                    line_item: f.package_line,
                },
                slot: AdjustmentSlot::Secondary,
                code: AdjustmentCode::Special15,
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn snapshot_round_trip_preserves_total() {
        let mut f = fixture();
        let document_id = f.doc.id_typed();
        dispatch(
            &mut f.doc,
            InvoiceDocumentCommand::ApplyAdjustment(ApplyAdjustment {
                document_id,
                target: LineTarget::Sub {
                    main_item: f.consult_main,
                    line_item: f.package_line,
                },
                slot: AdjustmentSlot::Primary,
                code: AdjustmentCode::Ward10,
                occurred_at: test_time(),
            }),
        );

        let json = serde_json::to_string(&f.doc.snapshot()).unwrap();
        let snapshot: DocumentSnapshot = serde_json::from_str(&json).unwrap();
        let restored = InvoiceDocument::restore(snapshot);

        assert_eq!(restored.compute_total(), f.doc.compute_total());
        assert_eq!(restored.items(), f.doc.items());
    }

    #[test]
    fn roman_serials_follow_the_sequence() {
        assert_eq!(roman_serial(1), "i)");
        assert_eq!(roman_serial(2), "ii)");
        assert_eq!(roman_serial(3), "iii)");
        assert_eq!(roman_serial(4), "iv)");
        assert_eq!(roman_serial(9), "ix)");
        assert_eq!(roman_serial(14), "xiv)");
        assert_eq!(roman_serial(40), "xl)");
    }

    /// Random edit scripts against the fixture document.
    #[derive(Debug, Clone)]
    enum EditOp {
        Add(LineItemKind),
        RemoveLast,
        SetQuantity(i64),
        SetRate(i64),
        MoveFirstDown,
        AdjustPackage(AdjustmentCode, AdjustmentCode),
    }

    fn edit_op() -> impl Strategy<Value = EditOp> {
        prop_oneof![
            prop_oneof![
                Just(LineItemKind::Consultation),
                Just(LineItemKind::Accommodation),
                Just(LineItemKind::Other),
                Just(LineItemKind::Surgical),
            ]
            .prop_map(EditOp::Add),
            Just(EditOp::RemoveLast),
            (-5i64..50).prop_map(EditOp::SetQuantity),
            (-100_000i64..5_000_000).prop_map(EditOp::SetRate),
            Just(EditOp::MoveFirstDown),
            (
                prop_oneof![
                    Just(AdjustmentCode::None),
                    Just(AdjustmentCode::Ward10),
                    Just(AdjustmentCode::Guideline50),
                    Just(AdjustmentCode::Guideline25),
                    Just(AdjustmentCode::Special15),
                ],
                prop_oneof![
                    Just(AdjustmentCode::None),
                    Just(AdjustmentCode::Ward10),
                    Just(AdjustmentCode::Guideline50),
                    Just(AdjustmentCode::Guideline25),
                    Just(AdjustmentCode::Special15),
                ],
            )
                .prop_map(|(p, s)| EditOp::AdjustPackage(p, s)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: after any edit script, the document total equals an
        /// independent recomputation over the reachable lines.
        #[test]
        fn total_matches_independent_recomputation(ops in prop::collection::vec(edit_op(), 0..24)) {
            let mut f = fixture();
            let document_id = f.doc.id_typed();

            for op in ops {
                let cmd = match op {
                    EditOp::Add(kind) => InvoiceDocumentCommand::AddLineItem(AddLineItem {
                        document_id,
                        main_item: f.consult_main,
                        line_item: test_line_item_id(),
                        kind,
                        occurred_at: test_time(),
                    }),
                    EditOp::RemoveLast => {
                        let last = f
                            .doc
                            .main_item(f.consult_main)
                            .and_then(|m| m.sub_items().last().map(|l| *l.id()));
                        match last {
                            Some(line_item) => {
                                InvoiceDocumentCommand::RemoveLineItem(RemoveLineItem {
                                    document_id,
                                    main_item: f.consult_main,
                                    line_item,
                                    occurred_at: test_time(),
                                })
                            }
                            None => continue,
                        }
                    }
                    EditOp::SetQuantity(quantity) => {
                        InvoiceDocumentCommand::SetQuantity(SetQuantity {
                            document_id,
                            target: LineTarget::Sub {
                                main_item: f.consult_main,
                                line_item: f.consult_line,
                            },
                            quantity,
                            occurred_at: test_time(),
                        })
                    }
                    EditOp::SetRate(rate) => InvoiceDocumentCommand::SetRate(SetRate {
                        document_id,
                        target: LineTarget::Inline {
                            main_item: f.pathology_main,
                        },
                        rate,
                        occurred_at: test_time(),
                    }),
                    EditOp::MoveFirstDown => {
                        let first = f
                            .doc
                            .main_item(f.consult_main)
                            .and_then(|m| m.sub_items().first().map(|l| *l.id()));
                        match first {
                            Some(line_item) => {
                                InvoiceDocumentCommand::MoveLineItem(MoveLineItem {
                                    document_id,
                                    main_item: f.consult_main,
                                    line_item,
                                    direction: MoveDirection::Down,
                                    occurred_at: test_time(),
                                })
                            }
                            None => continue,
                        }
                    }
                    EditOp::AdjustPackage(primary, secondary) => {
                        let target = LineTarget::Sub {
                            main_item: f.consult_main,
                            line_item: f.package_line,
                        };
                        dispatch(
                            &mut f.doc,
                            InvoiceDocumentCommand::ApplyAdjustment(ApplyAdjustment {
                                document_id,
                                target,
                                slot: AdjustmentSlot::Primary,
                                code: primary,
                                occurred_at: test_time(),
                            }),
                        );
                        InvoiceDocumentCommand::ApplyAdjustment(ApplyAdjustment {
                            document_id,
                            target,
                            slot: AdjustmentSlot::Secondary,
                            code: secondary,
                            occurred_at: test_time(),
                        })
                    }
                };
                dispatch(&mut f.doc, cmd);
            }

            prop_assert_eq!(f.doc.compute_total(), expected_total(&f.doc));
        }

        /// Property: boundary moves leave the children order unchanged.
        #[test]
        fn boundary_moves_never_reorder(extra in 0usize..6) {
            let mut f = fixture();
            let document_id = f.doc.id_typed();
            for _ in 0..extra {
                dispatch(
                    &mut f.doc,
                    InvoiceDocumentCommand::AddLineItem(AddLineItem {
                        document_id,
                        main_item: f.consult_main,
                        line_item: test_line_item_id(),
                        kind: LineItemKind::Other,
                        occurred_at: test_time(),
                    }),
                );
            }

            let before: Vec<LineItemId> = f
                .doc
                .main_item(f.consult_main)
                .unwrap()
                .sub_items()
                .iter()
                .map(|l| *l.id())
                .collect();
            let first = before[0];
            let last = *before.last().unwrap();

            dispatch(
                &mut f.doc,
                InvoiceDocumentCommand::MoveLineItem(MoveLineItem {
                    document_id,
                    main_item: f.consult_main,
                    line_item: first,
                    direction: MoveDirection::Up,
                    occurred_at: test_time(),
                }),
            );
            dispatch(
                &mut f.doc,
                InvoiceDocumentCommand::MoveLineItem(MoveLineItem {
                    document_id,
                    main_item: f.consult_main,
                    line_item: last,
                    direction: MoveDirection::Down,
                    occurred_at: test_time(),
                }),
            );

            let after: Vec<LineItemId> = f
                .doc
                .main_item(f.consult_main)
                .unwrap()
                .sub_items()
                .iter()
                .map(|l| *l.id())
                .collect();
            prop_assert_eq!(before, after);
        }
    }
}
