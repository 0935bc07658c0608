//! Bulk loading of formulas into the repository.
//!
//! # Formats
//!
//! - **Seed formulas**: built from a [`ParameterCatalog`], one per type
//! - **Formula documents** (JSON): a single document or an array of them,
//!   e.g. `[{"name": "...", "type": "hpi", "parameters": {...}, "classification": {...}}]`

use wqi_core::formula::{Formula, FormulaDocument, FormulaKind};
use wqi_core::parameter::ParameterCatalog;

use crate::formulas::insert_formula;
use crate::models::SavedFormula;
use crate::Database;

impl Database {
    /// Insert the standard formula of every type that has no formula yet,
    /// each as the default of its type. Returns the number inserted.
    pub fn seed_defaults(&self, catalog: &ParameterCatalog) -> anyhow::Result<usize> {
        let mut count = 0usize;
        for kind in FormulaKind::ALL {
            if self.has_formula(kind)? {
                continue;
            }
            let formula = Formula::seed(kind, catalog)?;
            self.create_formula(formula.to_document())?;
            count += 1;
        }
        log::info!("[WQI] loader: seeded {} default formulas", count);
        Ok(count)
    }

    /// Create formulas from JSON holding one document or an array of them.
    ///
    /// All documents are inserted in one transaction: any rejected document
    /// leaves the repository unchanged. Each saved entry carries its
    /// validation warnings.
    pub fn import_formulas_json(&self, json: &str) -> anyhow::Result<Vec<SavedFormula>> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let docs: Vec<FormulaDocument> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            vec![serde_json::from_value(value)?]
        };
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        let mut saved = Vec::with_capacity(docs.len());
        for doc in docs {
            saved.push(insert_formula(&tx, doc)?);
        }
        tx.commit()?;
        log::info!("[WQI] loader: imported {} formulas", saved.len());
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;
    use wqi_core::error::{EngineError, ErrorKind};
    use wqi_core::formula::FormulaKind;
    use wqi_core::parameter::ParameterCatalog;
    use wqi_core::source::FormulaSource;

    const HPI_DOC: &str = r#"{
        "name": "Lead and cadmium HPI",
        "type": "hpi",
        "version": "2.1",
        "parameters": {"Pb": {"Si": 10, "Ii": 0}, "Cd": {"Si": 3, "Ii": 0}, "Fe": {"Si": 1000, "Ii": 300}},
        "classification": {"ranges": [{"max": 100, "label": "Low", "severity": 1}, {"min": 100, "label": "High", "severity": 2}]}
    }"#;

    #[test]
    fn seed_defaults_fills_every_kind_once() {
        let db = Database::new().unwrap();
        assert_eq!(db.seed_defaults(ParameterCatalog::builtin()).unwrap(), 3);
        assert_eq!(db.seed_defaults(ParameterCatalog::builtin()).unwrap(), 0);
        let set = db.snapshot().unwrap();
        assert_eq!(set.iter().count(), 3);
        assert!(set.iter().all(|f| f.is_default));
    }

    #[test]
    fn seed_defaults_skips_kinds_with_formulas() {
        let db = Database::new().unwrap();
        db.import_formulas_json(HPI_DOC).unwrap();
        assert_eq!(db.seed_defaults(ParameterCatalog::builtin()).unwrap(), 2);
        let hpi = db.active_formula(FormulaKind::Hpi).unwrap().unwrap();
        assert_eq!(hpi.name, "Lead and cadmium HPI");
        assert_eq!(hpi.version, "2.1");
    }

    #[test]
    fn import_array_is_all_or_nothing() {
        let db = Database::new().unwrap();
        let bad = format!(
            r#"[{}, {{"name": "Broken", "type": "wqi", "parameters": {{"pH": {{"Si": 8.5, "Ii": 7}}}}, "classification": {{"ranges": [{{"max": 50, "label": "Good", "severity": 1}}]}}}}]"#,
            HPI_DOC
        );
        assert!(db.import_formulas_json(&bad).is_err());
        assert!(db.list_formulas(None).unwrap().is_empty());

        let good = format!("[{}]", HPI_DOC);
        assert_eq!(db.import_formulas_json(&good).unwrap().len(), 1);
    }

    #[test]
    fn import_rolls_back_when_a_later_insert_fails() {
        let db = Database::new().unwrap();
        let inactive_default = HPI_DOC.replacen(
            r#""version": "2.1","#,
            r#""version": "2.1", "is_default": true, "is_active": false,"#,
            1,
        );
        let batch = format!("[{}, {}]", HPI_DOC, inactive_default);
        let err = db.import_formulas_json(&batch).unwrap_err();
        assert_eq!(EngineError::from_storage(err).kind(), ErrorKind::Validation);
        assert!(db.list_formulas(None).unwrap().is_empty());
    }

    #[test]
    fn import_reports_classification_warnings() {
        let db = Database::new().unwrap();
        let unordered = HPI_DOC.replace(
            r#"[{"max": 100, "label": "Low", "severity": 1}, {"min": 100, "label": "High", "severity": 2}]"#,
            r#"[{"min": 100, "label": "High", "severity": 2}, {"max": 100, "label": "Low", "severity": 1}]"#,
        );
        let saved = db.import_formulas_json(&unordered).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!saved[0].warnings.is_empty());
        assert!(db.formula_by_id(saved[0].id).unwrap().is_some());

        let clean = db.import_formulas_json(HPI_DOC).unwrap();
        assert!(clean[0].warnings.is_empty(), "{:?}", clean[0].warnings);
    }
}
