//! Line item types
//!
//! A single line shape flows through the whole lifecycle: draft lines,
//! bill lines, and the itemized snapshot inside a `Sale`. The variant
//! tag replaces the duck-typed pseudo-products the till UI deals in:
//! wines take the direct-stock deduction path, adjustments are
//! negative-priced credit lines produced by pay-by-amount settlement.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Line variant
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineKind {
    /// Composed product, stock-deducted through its recipe
    #[default]
    Product,
    /// Wine, stock-deducted directly against its own entry
    Wine,
    /// Synthetic credit line (e.g. partial payment by amount)
    Adjustment,
}

/// One line of a draft or bill
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    /// Per-line unique id; distinguishes otherwise-identical product
    /// lines carrying different modifiers/notes
    pub line_id: String,
    pub product_id: String,
    pub name: String,
    /// Unit price snapshotted at add time; negative for adjustments
    pub price: f64,
    /// Never negative; zero-quantity lines are pruned by the owner
    pub quantity: i32,
    #[serde(default)]
    pub kind: LineKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Selected modifiers (name → choice); never compared for
    /// equality, so modified lines never merge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<BTreeMap<String, String>>,
}

impl OrderLine {
    /// Create a line from a product selection with quantity 1.
    pub fn from_input(input: &LineInput) -> Self {
        Self {
            line_id: uuid::Uuid::new_v4().to_string(),
            product_id: input.product_id.clone(),
            name: input.name.clone(),
            price: input.price,
            quantity: 1,
            kind: if input.is_wine {
                LineKind::Wine
            } else {
                LineKind::Product
            },
            note: None,
            modifiers: input.modifiers.clone(),
        }
    }

    /// Create a negative-priced credit line for `amount`.
    pub fn adjustment(name: impl Into<String>, amount: f64) -> Self {
        Self {
            line_id: uuid::Uuid::new_v4().to_string(),
            product_id: String::new(),
            name: name.into(),
            price: -amount,
            quantity: 1,
            kind: LineKind::Adjustment,
            note: None,
            modifiers: None,
        }
    }

    pub fn is_adjustment(&self) -> bool {
        self.kind == LineKind::Adjustment
    }

    /// Whether a fresh selection may merge into this line: same
    /// product, and neither side carries modifiers.
    pub fn merges_with(&self, input: &LineInput) -> bool {
        self.kind != LineKind::Adjustment
            && self.product_id == input.product_id
            && self.modifiers.is_none()
            && input.modifiers.is_none()
    }

    /// Whether a sent line may fold into this bill line: same product,
    /// neither side an adjustment or carrying modifiers.
    pub fn merges_with_line(&self, other: &OrderLine) -> bool {
        self.kind != LineKind::Adjustment
            && other.kind != LineKind::Adjustment
            && self.product_id == other.product_id
            && self.modifiers.is_none()
            && other.modifiers.is_none()
    }
}

/// Product selection coming from the UI, before it becomes a line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineInput {
    pub product_id: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub is_wine: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifiers: Option<BTreeMap<String, String>>,
}

/// Bill line reference in a partial-by-item settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaidItem {
    pub line_id: String,
    pub quantity: i32,
}
