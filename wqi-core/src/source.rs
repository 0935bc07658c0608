//! Seams between the engine and whatever stores formulas and results.

use crate::formula::{Formula, FormulaKind, FormulaSet};
use crate::result::CalculationResult;

/// Read-only access to formulas.
pub trait FormulaSource {
    /// The formula to use for `kind`, if any is active.
    fn active_formula(&self, kind: FormulaKind) -> anyhow::Result<Option<Formula>>;

    fn formula_by_id(&self, id: i64) -> anyhow::Result<Option<Formula>>;

    /// The active formula of every type, read once so a run never mixes
    /// formula versions.
    fn snapshot(&self) -> anyhow::Result<FormulaSet> {
        let mut set = FormulaSet::default();
        for kind in FormulaKind::ALL {
            if let Some(formula) = self.active_formula(kind)? {
                set.insert(formula);
            }
        }
        Ok(set)
    }
}

/// Insert-once, read-many result storage keyed by upload.
pub trait ResultStore {
    /// Persist one run of results, returning the ids of the stored rows.
    fn save_results(
        &self,
        upload_id: i64,
        formulas: &FormulaSet,
        results: &[CalculationResult],
    ) -> anyhow::Result<Vec<i64>>;

    /// Results of the most recent run for `upload_id`, in insertion order.
    fn load_results(&self, upload_id: i64) -> anyhow::Result<Vec<CalculationResult>>;
}

impl FormulaSource for FormulaSet {
    fn active_formula(&self, kind: FormulaKind) -> anyhow::Result<Option<Formula>> {
        Ok(self.get(kind).filter(|f| f.is_active).cloned())
    }

    fn formula_by_id(&self, id: i64) -> anyhow::Result<Option<Formula>> {
        Ok(self.iter().find(|f| f.id == Some(id)).cloned())
    }
}
