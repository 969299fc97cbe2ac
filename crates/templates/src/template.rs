use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use medibill_billing::{
    DocumentNode, InvoiceDocument, InvoiceDocumentId, InvoiceKind, LineItem, LineItemId,
    LinePricing, MainItem, MainItemId, Section, rupees,
};
use medibill_core::{AggregateId, NodeId};

/// Inclusive stay date range shown in a section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    /// Day-first label, e.g. "01/02/2026 To 10/02/2026".
    pub fn label(&self) -> String {
        format!(
            "{} To {}",
            self.from.format("%d/%m/%Y"),
            self.to.format("%d/%m/%Y")
        )
    }
}

/// Stay periods a bill covers: the conservative-treatment stay, and the
/// surgical stay when the admission included a package procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriods {
    pub conservative: DateRange,
    pub surgical: Option<DateRange>,
}

/// Produces the initial document tree for a billing scenario.
pub trait SeedTemplateProvider {
    fn load(&self, kind: InvoiceKind, periods: &BillingPeriods) -> InvoiceDocument;
}

/// Static CGHS-tariff seed trees.
///
/// Row titles and default rates follow the hospital's standing bill layout;
/// the package base amount is the CGHS tariff price the adjustment rules
/// are applied against.
#[derive(Debug, Default)]
pub struct CghsSeedTemplates;

impl CghsSeedTemplates {
    pub fn new() -> Self {
        Self
    }

    fn conservative_nodes(periods: &BillingPeriods) -> Vec<DocumentNode> {
        vec![
            DocumentNode::Section(Section {
                title: "CONSERVATIVE TREATMENT".to_string(),
                date_range_label: periods.conservative.label(),
            }),
            DocumentNode::Main(MainItem::with_sub_items(
                MainItemId::new(NodeId::new()),
                "1)",
                "Consultation for Inpatients",
                None,
                vec![LineItem::new(
                    LineItemId::new(NodeId::new()),
                    "i)",
                    "Consultation",
                    None,
                    LinePricing::rated(1, rupees(350)),
                )],
            )),
            DocumentNode::Main(MainItem::with_sub_items(
                MainItemId::new(NodeId::new()),
                "2)",
                "Accommodation Charges",
                None,
                vec![LineItem::new(
                    LineItemId::new(NodeId::new()),
                    "i)",
                    "Accommodation Charges",
                    None,
                    LinePricing::rated(1, rupees(250)),
                )],
            )),
            DocumentNode::Main(MainItem::inline(
                MainItemId::new(NodeId::new()),
                "3)",
                "Pathology Charges",
                None,
                LinePricing::rated(1, 0),
            )),
            DocumentNode::Main(MainItem::inline(
                MainItemId::new(NodeId::new()),
                "4)",
                "Medicines & Consumables",
                None,
                LinePricing::rated(1, 0),
            )),
        ]
    }

    fn surgical_nodes(periods: &BillingPeriods) -> Vec<DocumentNode> {
        // A surgical bill keeps the conservative skeleton and appends the
        // package section for the operation stay.
        let surgical_label = periods
            .surgical
            .unwrap_or(periods.conservative)
            .label();

        let mut nodes = Self::conservative_nodes(periods);
        nodes.push(DocumentNode::Section(Section {
            title: "SURGICAL PACKAGE".to_string(),
            date_range_label: surgical_label,
        }));
        nodes.push(DocumentNode::Main(MainItem::with_sub_items(
            MainItemId::new(NodeId::new()),
            "5)",
            "Operation Charges",
            None,
            vec![LineItem::new(
                LineItemId::new(NodeId::new()),
                "i)",
                "Operation Charges as per CGHS rates",
                Some("748".to_string()),
                LinePricing::packaged(rupees(11308)),
            )],
        )));
        nodes
    }
}

impl SeedTemplateProvider for CghsSeedTemplates {
    fn load(&self, kind: InvoiceKind, periods: &BillingPeriods) -> InvoiceDocument {
        let items = match kind {
            InvoiceKind::ConservativeTreatment => Self::conservative_nodes(periods),
            InvoiceKind::SurgicalPackage => Self::surgical_nodes(periods),
        };
        InvoiceDocument::seeded(InvoiceDocumentId::new(AggregateId::new()), kind, items)
    }
}
