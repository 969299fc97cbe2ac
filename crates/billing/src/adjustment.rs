//! CGHS adjustment codes and the package pricing breakdown.

use serde::{Deserialize, Serialize};

use medibill_core::ValueObject;

/// Amounts are stored in the smallest currency unit.
pub const PAISE_PER_RUPEE: u64 = 100;

/// Convenience: whole rupees to paise.
pub const fn rupees(n: u64) -> u64 {
    n * PAISE_PER_RUPEE
}

/// Direction of an adjustment code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    None,
    Discount,
    Addition,
}

/// Closed set of CGHS tariff adjustment rules.
///
/// The secondary slot of a breakdown accepts discount-kind codes only;
/// `Special15` is the lone addition-kind rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentCode {
    #[default]
    None,
    /// Gen. Ward Charges as per CGHS (−10%).
    Ward10,
    /// As per CGHS Guideline (−50%).
    Guideline50,
    /// As per CGHS Guideline (−25%).
    Guideline25,
    /// Specialward Charges as per CGHS (+15%).
    Special15,
}

impl AdjustmentCode {
    pub fn kind(self) -> AdjustmentKind {
        match self {
            AdjustmentCode::None => AdjustmentKind::None,
            AdjustmentCode::Ward10 | AdjustmentCode::Guideline50 | AdjustmentCode::Guideline25 => {
                AdjustmentKind::Discount
            }
            AdjustmentCode::Special15 => AdjustmentKind::Addition,
        }
    }

    pub fn percent(self) -> u64 {
        match self {
            AdjustmentCode::None => 0,
            AdjustmentCode::Ward10 => 10,
            AdjustmentCode::Guideline50 => 50,
            AdjustmentCode::Guideline25 => 25,
            AdjustmentCode::Special15 => 15,
        }
    }

    /// Display label shown next to the adjusted amount.
    pub fn label(self) -> &'static str {
        match self {
            AdjustmentCode::None => "",
            AdjustmentCode::Ward10 => "Gen. Ward Charges as per CGHS",
            AdjustmentCode::Guideline50 | AdjustmentCode::Guideline25 => "as per CGHS Guideline",
            AdjustmentCode::Special15 => "Specialward Charges as per CGHS",
        }
    }

    /// Whether this code may be selected in the secondary slot.
    pub fn secondary_eligible(self) -> bool {
        !matches!(self.kind(), AdjustmentKind::Addition)
    }
}

impl ValueObject for AdjustmentCode {}

/// Percentage of `amount`, truncated down to a whole rupee.
///
/// The front-desk tool this reproduces truncated each percentage step to
/// whole rupees (10% of 11308.00 contributes 1130, not 1131), and the
/// secondary step consumes the already-truncated primary result. Totals
/// only match the ledgers it produced if both behaviors are kept.
fn percent_step(amount: u64, percent: u64) -> u64 {
    let paise = (amount as u128) * (percent as u128) / 100;
    let whole = paise / (PAISE_PER_RUPEE as u128) * (PAISE_PER_RUPEE as u128);
    whole as u64
}

/// Tariff pricing for a surgical-package line: a fixed base amount with up
/// to two sequential percentage adjustments, instead of rate × quantity.
///
/// The `*_amount` fields are caches for display; they are always re-derived
/// from `base_amount` + the selected codes by [`PricingBreakdown::recompute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    base_amount: u64,
    primary: AdjustmentCode,
    secondary: AdjustmentCode,
    discount_amount: u64,
    addition_amount: u64,
    sub_discount_amount: u64,
    final_amount: u64,
}

impl PricingBreakdown {
    pub fn new(base_amount: u64) -> Self {
        let mut breakdown = Self {
            base_amount,
            primary: AdjustmentCode::None,
            secondary: AdjustmentCode::None,
            discount_amount: 0,
            addition_amount: 0,
            sub_discount_amount: 0,
            final_amount: base_amount,
        };
        breakdown.recompute();
        breakdown
    }

    pub fn base_amount(&self) -> u64 {
        self.base_amount
    }

    pub fn primary(&self) -> AdjustmentCode {
        self.primary
    }

    pub fn secondary(&self) -> AdjustmentCode {
        self.secondary
    }

    /// Discount taken by the primary adjustment (0 unless primary is a discount).
    pub fn discount_amount(&self) -> u64 {
        self.discount_amount
    }

    /// Addition applied by the primary adjustment (0 unless primary is an addition).
    pub fn addition_amount(&self) -> u64 {
        self.addition_amount
    }

    /// Discount taken by the secondary adjustment on top of the primary result.
    pub fn sub_discount_amount(&self) -> u64 {
        self.sub_discount_amount
    }

    pub fn final_amount(&self) -> u64 {
        self.final_amount
    }

    /// Base amount after the primary adjustment only.
    pub fn primary_amount(&self) -> u64 {
        match self.primary.kind() {
            AdjustmentKind::Discount => self.base_amount - self.discount_amount,
            AdjustmentKind::Addition => self.base_amount + self.addition_amount,
            AdjustmentKind::None => self.base_amount,
        }
    }

    pub(crate) fn set_primary(&mut self, code: AdjustmentCode) {
        self.primary = code;
        self.recompute();
    }

    /// Caller enforces `code.secondary_eligible()`.
    pub(crate) fn set_secondary(&mut self, code: AdjustmentCode) {
        self.secondary = code;
        self.recompute();
    }

    /// Re-derive every cached amount from `base_amount` + selected codes.
    ///
    /// Selecting `None` in a slot zeroes that slot's cache and recomputes
    /// downstream amounts as if the slot were absent.
    pub(crate) fn recompute(&mut self) {
        let step = percent_step(self.base_amount, self.primary.percent());
        let (discount, addition, primary_amount) = match self.primary.kind() {
            AdjustmentKind::Discount => (step, 0, self.base_amount - step),
            AdjustmentKind::Addition => (0, step, self.base_amount + step),
            AdjustmentKind::None => (0, 0, self.base_amount),
        };
        self.discount_amount = discount;
        self.addition_amount = addition;

        self.sub_discount_amount = match self.secondary.kind() {
            AdjustmentKind::Discount => percent_step(primary_amount, self.secondary.percent()),
            _ => 0,
        };
        self.final_amount = primary_amount - self.sub_discount_amount;
    }
}

impl ValueObject for PricingBreakdown {}
