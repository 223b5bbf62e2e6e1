//! Stock ledger
//!
//! Shared quantity tracking for ingredients and wines. Wine lines
//! consume their own entry directly; product lines consume recipe
//! components. Every movement is best-effort per item: a missing entry
//! or recipe never blocks the rest of an order.
//!
//! Per-entry updates go through dashmap entries and are atomic; two
//! simultaneous sends can still interleave at the order level, which
//! is accepted in the single-till model.

use dashmap::DashMap;
use shared::models::{Recipe, StockEntry};
use shared::order::{LineKind, OrderLine};
use tracing::{debug, warn};

/// Shared stock quantities plus the recipe book
#[derive(Default)]
pub struct StockLedger {
    entries: DashMap<String, StockEntry>,
    recipes: DashMap<String, Recipe>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the set of stock entries
    pub fn seed_entries(&self, entries: Vec<StockEntry>) {
        self.entries.clear();
        for entry in entries {
            self.entries.insert(entry.id.clone(), entry);
        }
    }

    /// Replace the recipe book
    pub fn seed_recipes(&self, recipes: Vec<Recipe>) {
        self.recipes.clear();
        for recipe in recipes {
            self.recipes.insert(recipe.product_id.clone(), recipe);
        }
    }

    pub fn quantity(&self, entry_id: &str) -> Option<f64> {
        self.entries.get(entry_id).map(|e| e.quantity)
    }

    /// Consume stock for an order's lines
    ///
    /// Quantities floor at zero. Adjustment lines and recipe-less
    /// products are skipped.
    pub fn deduct_for_order(&self, lines: &[OrderLine]) {
        for line in lines {
            self.apply_line(line, line.quantity, Movement::Deduct);
        }
    }

    /// Return stock for lines removed from a bill
    ///
    /// Exact mirror of [`deduct_for_order`](Self::deduct_for_order)
    /// except quantities only increase.
    pub fn return_for_items(&self, lines: &[OrderLine]) {
        for line in lines {
            self.apply_line(line, line.quantity, Movement::Return);
        }
    }

    /// Return stock for a partial removal of a single line
    pub fn return_quantity(&self, line: &OrderLine, quantity: i32) {
        self.apply_line(line, quantity, Movement::Return);
    }

    fn apply_line(&self, line: &OrderLine, quantity: i32, movement: Movement) {
        if quantity <= 0 {
            return;
        }
        match line.kind {
            LineKind::Adjustment => {}
            LineKind::Wine => {
                self.move_entry(&line.product_id, quantity as f64, movement);
            }
            LineKind::Product => {
                let Some(recipe) = self.recipes.get(&line.product_id).map(|r| r.value().clone())
                else {
                    debug!(product_id = %line.product_id, "no recipe, stock untouched");
                    return;
                };
                for component in &recipe.components {
                    self.move_entry(
                        &component.ingredient_id,
                        component.per_unit * quantity as f64,
                        movement,
                    );
                }
            }
        }
    }

    fn move_entry(&self, entry_id: &str, amount: f64, movement: Movement) {
        match self.entries.get_mut(entry_id) {
            Some(mut entry) => {
                entry.quantity = match movement {
                    Movement::Deduct => (entry.quantity - amount).max(0.0),
                    Movement::Return => entry.quantity + amount,
                };
            }
            None => {
                warn!(entry_id, "stock movement on unknown entry skipped");
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Movement {
    Deduct,
    Return,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::RecipeComponent;
    use shared::order::LineInput;

    fn entry(id: &str, quantity: f64) -> StockEntry {
        StockEntry {
            id: id.to_string(),
            name: id.to_string(),
            quantity,
            unit: "kg".to_string(),
        }
    }

    fn product_line(product_id: &str, quantity: i32) -> OrderLine {
        let mut line = OrderLine::from_input(&LineInput {
            product_id: product_id.to_string(),
            name: product_id.to_string(),
            price: 10.0,
            is_wine: false,
            modifiers: None,
        });
        line.quantity = quantity;
        line
    }

    fn wine_line(product_id: &str, quantity: i32) -> OrderLine {
        let mut line = OrderLine::from_input(&LineInput {
            product_id: product_id.to_string(),
            name: product_id.to_string(),
            price: 15.0,
            is_wine: true,
            modifiers: None,
        });
        line.quantity = quantity;
        line
    }

    fn ledger_with_burger() -> StockLedger {
        let ledger = StockLedger::new();
        ledger.seed_entries(vec![entry("beef", 10.0), entry("bun", 20.0)]);
        ledger.seed_recipes(vec![Recipe {
            product_id: "burger".to_string(),
            components: vec![
                RecipeComponent {
                    ingredient_id: "beef".to_string(),
                    per_unit: 0.2,
                },
                RecipeComponent {
                    ingredient_id: "bun".to_string(),
                    per_unit: 1.0,
                },
            ],
        }]);
        ledger
    }

    #[test]
    fn test_recipe_deduction_scales_by_quantity() {
        let ledger = ledger_with_burger();
        ledger.deduct_for_order(&[product_line("burger", 3)]);

        assert_eq!(ledger.quantity("beef"), Some(10.0 - 0.6));
        assert_eq!(ledger.quantity("bun"), Some(17.0));
    }

    #[test]
    fn test_deduction_floors_at_zero() {
        let ledger = ledger_with_burger();
        ledger.deduct_for_order(&[product_line("burger", 100)]);

        assert_eq!(ledger.quantity("beef"), Some(0.0));
        assert_eq!(ledger.quantity("bun"), Some(0.0));
    }

    #[test]
    fn test_wine_consumes_own_entry() {
        let ledger = StockLedger::new();
        ledger.seed_entries(vec![entry("rioja", 12.0)]);
        ledger.deduct_for_order(&[wine_line("rioja", 2)]);

        assert_eq!(ledger.quantity("rioja"), Some(10.0));
    }

    #[test]
    fn test_missing_recipe_and_entry_skipped() {
        let ledger = ledger_with_burger();
        ledger.deduct_for_order(&[product_line("mystery", 2), wine_line("ghost", 1)]);

        assert_eq!(ledger.quantity("beef"), Some(10.0));
    }

    #[test]
    fn test_adjustment_lines_ignored() {
        let ledger = ledger_with_burger();
        let adjustment = OrderLine::adjustment("PAGO PARCIAL", 5.0);
        ledger.deduct_for_order(&[adjustment.clone()]);
        ledger.return_for_items(&[adjustment]);

        assert_eq!(ledger.quantity("beef"), Some(10.0));
    }

    #[test]
    fn test_return_mirrors_deduct() {
        let ledger = ledger_with_burger();
        let line = product_line("burger", 2);
        ledger.deduct_for_order(&[line.clone()]);
        ledger.return_for_items(&[line]);

        assert_eq!(ledger.quantity("beef"), Some(10.0));
        assert_eq!(ledger.quantity("bun"), Some(20.0));
    }

    #[test]
    fn test_partial_return_quantity() {
        let ledger = ledger_with_burger();
        let line = product_line("burger", 3);
        ledger.deduct_for_order(&[line.clone()]);
        ledger.return_quantity(&line, 1);

        assert_eq!(ledger.quantity("bun"), Some(18.0));
    }
}
