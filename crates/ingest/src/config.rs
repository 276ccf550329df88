use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::columns::{AliasTable, Field};
use crate::error::IngestError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Optional settings file:
///
/// ```toml
/// database = "/var/lib/shopflow/shop.db"
/// sheet = "SAPDATA"
///
/// [columns]
/// job = ["auftrag", "order"]
/// work_center = ["arbeitsplatz"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShopConfig {
    #[serde(default)]
    pub database: Option<PathBuf>,
    /// Worksheet to read from multi-sheet workbooks. First sheet when unset.
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub columns: ColumnOverrides,
}

// ---------------------------------------------------------------------------
// Column overrides
// ---------------------------------------------------------------------------

/// Per-field alias lists. A present list replaces that field's defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnOverrides {
    #[serde(default)]
    pub job: Option<Vec<String>>,
    #[serde(default)]
    pub work_order: Option<Vec<String>>,
    #[serde(default)]
    pub operation: Option<Vec<String>>,
    #[serde(default)]
    pub work_center: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<Vec<String>>,
    #[serde(default)]
    pub planned_hours: Option<Vec<String>>,
    #[serde(default)]
    pub actual_hours: Option<Vec<String>>,
}

impl ColumnOverrides {
    pub fn get(&self, field: Field) -> Option<&[String]> {
        let list = match field {
            Field::Job => &self.job,
            Field::WorkOrder => &self.work_order,
            Field::Operation => &self.operation,
            Field::WorkCenter => &self.work_center,
            Field::Description => &self.description,
            Field::PlannedHours => &self.planned_hours,
            Field::ActualHours => &self.actual_hours,
        };
        list.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ShopConfig {
    pub fn from_toml(input: &str) -> Result<Self, IngestError> {
        let config: ShopConfig =
            toml::from_str(input).map_err(|e| IngestError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| IngestError::Io(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if let Some(ref sheet) = self.sheet {
            if sheet.trim().is_empty() {
                return Err(IngestError::ConfigValidation("sheet must not be empty".into()));
            }
        }
        self.alias_table().validate()
    }

    /// Default aliases with this config's overrides applied.
    pub fn alias_table(&self) -> AliasTable {
        let mut table = AliasTable::default();
        for field in Field::ALL {
            if let Some(list) = self.columns.get(field) {
                table.set_aliases(field, list);
            }
        }
        table
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ShopConfig::from_toml("").unwrap();
        assert!(config.database.is_none());
        assert!(config.sheet.is_none());
        assert_eq!(config.alias_table(), AliasTable::default());
    }

    #[test]
    fn parse_full_config() {
        let input = r#"
database = "/tmp/shop.db"
sheet = "SAPDATA"

[columns]
job = ["Auftrag", "Order"]
planned_hours = ["Soll"]
"#;
        let config = ShopConfig::from_toml(input).unwrap();
        assert_eq!(config.database.as_deref(), Some(Path::new("/tmp/shop.db")));
        assert_eq!(config.sheet.as_deref(), Some("SAPDATA"));

        let table = config.alias_table();
        assert_eq!(table.aliases(Field::Job), &["auftrag".to_string(), "order".to_string()]);
        assert_eq!(table.aliases(Field::PlannedHours), &["soll".to_string()]);
        // untouched fields keep their defaults
        assert!(table.aliases(Field::WorkCenter).contains(&"oper.workcenter".to_string()));
    }

    #[test]
    fn reject_unknown_column_field() {
        let input = r#"
[columns]
jobb = ["x"]
"#;
        let err = ShopConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, IngestError::ConfigParse(_)));
    }

    #[test]
    fn reject_alias_shared_between_fields() {
        let input = r#"
[columns]
work_order = ["order"]
"#;
        let err = ShopConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("claimed by both"));
    }

    #[test]
    fn reject_empty_alias_list() {
        let input = r#"
[columns]
operation = []
"#;
        let err = ShopConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("operation"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ShopConfig::load(Path::new("/nonexistent/shopflow.toml")).unwrap_err();
        assert!(matches!(err, IngestError::Io(_)));
    }
}
