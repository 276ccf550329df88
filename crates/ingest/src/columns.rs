use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, MissingField};

// ---------------------------------------------------------------------------
// Canonical fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Job,
    WorkOrder,
    Operation,
    WorkCenter,
    Description,
    PlannedHours,
    ActualHours,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Job,
        Field::WorkOrder,
        Field::Operation,
        Field::WorkCenter,
        Field::Description,
        Field::PlannedHours,
        Field::ActualHours,
    ];

    /// Identity fields must be resolvable from the headers; everything else
    /// has a per-row default.
    pub fn is_required(self) -> bool {
        matches!(self, Field::Job | Field::Operation | Field::WorkCenter)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Job => "job",
            Field::WorkOrder => "work_order",
            Field::Operation => "operation",
            Field::WorkCenter => "work_center",
            Field::Description => "description",
            Field::PlannedHours => "planned_hours",
            Field::ActualHours => "actual_hours",
        }
    }

    fn default_aliases(self) -> &'static [&'static str] {
        match self {
            Field::Job => &["order", "job", "order_id", "job_number"],
            Field::WorkOrder => &["work order", "work_order", "work_order_number"],
            Field::Operation => &["oper./act.", "operation", "operation_number"],
            Field::WorkCenter => &["oper.workcenter", "work center", "work_center", "workcenter"],
            Field::Description => &["description", "task_description", "task", "opr. short text"],
            Field::PlannedHours => &["work", "planned hours", "planned_hours", "planned"],
            Field::ActualHours => &["actual work", "actual hours", "actual_hours", "actual"],
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trim, lowercase and collapse inner whitespace so `" Oper.  WorkCenter "`
/// and `"oper. workcenter"` compare equal.
pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ---------------------------------------------------------------------------
// Alias table
// ---------------------------------------------------------------------------

/// Ordered header aliases per canonical field. Earlier aliases win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    aliases: BTreeMap<Field, Vec<String>>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let aliases = Field::ALL
            .iter()
            .map(|&field| {
                let list = field.default_aliases().iter().map(|a| a.to_string()).collect();
                (field, list)
            })
            .collect();
        Self { aliases }
    }
}

impl AliasTable {
    pub fn aliases(&self, field: Field) -> &[String] {
        self.aliases.get(&field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Replace the aliases of one field. Aliases are normalized the same way headers are.
    pub fn set_aliases<I, S>(&mut self, field: Field, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = aliases
            .into_iter()
            .map(|a| normalize_header(a.as_ref()))
            .collect();
        self.aliases.insert(field, list);
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        let mut owners: BTreeMap<&str, Field> = BTreeMap::new();
        for (&field, list) in &self.aliases {
            if list.is_empty() || list.iter().any(|a| a.is_empty()) {
                return Err(IngestError::ConfigValidation(format!(
                    "field '{field}' needs at least one non-empty alias"
                )));
            }
            for alias in list {
                if let Some(other) = owners.insert(alias.as_str(), field) {
                    if other != field {
                        return Err(IngestError::ConfigValidation(format!(
                            "alias '{alias}' is claimed by both '{other}' and '{field}'"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Present header names per canonical field, in alias priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    columns: BTreeMap<Field, Vec<String>>,
}

impl ResolvedColumns {
    /// Every present header for `field`, best alias first.
    pub fn columns(&self, field: Field) -> &[String] {
        self.columns.get(&field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn primary(&self, field: Field) -> Option<&str> {
        self.columns(field).first().map(|s| s.as_str())
    }

    pub fn has(&self, field: Field) -> bool {
        !self.columns(field).is_empty()
    }
}

/// Map each canonical field to the headers that match its aliases.
///
/// Headers keep their original spelling in the result so rows can be indexed
/// with them directly. Every missing required field is reported at once.
pub fn resolve<S: AsRef<str>>(
    headers: &[S],
    table: &AliasTable,
) -> Result<ResolvedColumns, IngestError> {
    let normalized: Vec<(String, &str)> = headers
        .iter()
        .map(|h| (normalize_header(h.as_ref()), h.as_ref()))
        .filter(|(n, _)| !n.is_empty())
        .collect();

    let mut resolved = ResolvedColumns::default();
    let mut missing = Vec::new();

    for field in Field::ALL {
        let mut found: Vec<String> = Vec::new();
        for alias in table.aliases(field) {
            for (norm, original) in &normalized {
                if norm == alias && !found.iter().any(|f| f == original) {
                    found.push(original.to_string());
                }
            }
        }

        if found.is_empty() {
            if field.is_required() {
                missing.push(MissingField {
                    field,
                    aliases: table.aliases(field).to_vec(),
                });
            }
            continue;
        }
        log::debug!("column {field} -> {found:?}");
        resolved.columns.insert(field, found);
    }

    if !missing.is_empty() {
        return Err(IngestError::Schema { missing });
    }
    Ok(resolved)
}
