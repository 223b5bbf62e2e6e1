//! Stock Models
//!
//! Ingredient/wine stock entries and the recipe linkage used by the
//! stock ledger to translate order lines into deductions.

use serde::{Deserialize, Serialize};

/// Stock entry: an ingredient, or a wine tracked as direct stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockEntry {
    pub id: String,
    pub name: String,
    /// Quantity on hand, in `unit`
    pub quantity: f64,
    /// Unit of measure ("kg", "l", "ud", ...)
    pub unit: String,
}

/// One component of a recipe
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeComponent {
    pub ingredient_id: String,
    /// Ingredient quantity consumed per ordered unit of the product
    pub per_unit: f64,
}

/// Recipe for a composed product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub product_id: String,
    /// Ordered component list
    pub components: Vec<RecipeComponent>,
}
