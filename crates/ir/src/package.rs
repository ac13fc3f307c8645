use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::IrError;
use crate::node::{ActionDef, ControlDef, TableDef, TypeDecl};

/// The unit of work the equivalence driver loads one copy of per program
/// under comparison: every type, action, table, and control the IR
/// producer emitted, plus the named entry points ("pipelines") the driver
/// actually compares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDef>,
    #[serde(default)]
    pub tables: BTreeMap<String, TableDef>,
    #[serde(default)]
    pub controls: BTreeMap<String, ControlDef>,
    /// pipeline name -> control name serving as its entry point.
    pub pipelines: BTreeMap<String, String>,
}

impl Package {
    /// Validates that every pipeline, table action, and const-entry action
    /// names something this package actually defines. The interpreter
    /// assumes this has already been checked and panics-by-bug rather than
    /// re-validating on every lookup.
    pub fn check_references(&self) -> Result<(), IrError> {
        for (pipeline, control) in &self.pipelines {
            if !self.controls.contains_key(control) {
                return Err(IrError::DanglingReference {
                    kind: "pipeline control",
                    name: format!("{pipeline} -> {control}"),
                });
            }
        }
        for table in self.tables.values() {
            for action in table.actions.iter().chain(table.default.iter()) {
                if !self.actions.contains_key(&action.name) {
                    return Err(IrError::DanglingReference {
                        kind: "table action",
                        name: action.name.clone(),
                    });
                }
            }
            for entry in &table.const_entries {
                if !self.actions.contains_key(&entry.action.name) {
                    return Err(IrError::DanglingReference {
                        kind: "const-entry action",
                        name: entry.action.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The names of the pipelines this package exposes, in declaration order.
    pub fn pipeline_names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }
}
