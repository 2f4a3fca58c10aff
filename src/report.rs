//! Presentation-independent execution plan reports.
//!
//! A [`PlanReport`] captures what the pipeline produced for one logic
//! statement: its input groups and, optionally, execution results. The CLI
//! renders it as text or JSON.

use serde::Serialize;
use std::fmt::Write;

use crate::executor::group::{Attributes, ExecutableInput, InputGroup, StatementExecuteUnit};
use crate::executor::{ExecuteResult, Value};

/// One input group as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub data_source: String,
    pub connection: String,
    pub connection_mode: String,
    pub units: Vec<UnitReport>,
}

/// One SQL unit of a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitReport {
    pub sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Value>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

/// Plan (and optional results) for one logic statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanReport {
    pub sql: String,
    pub statement_kind: String,
    pub groups: Vec<GroupReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ExecuteResult>>,
}

impl PlanReport {
    /// Builds a report from decorated input groups.
    pub fn new(
        sql: impl Into<String>,
        statement_kind: impl ToString,
        groups: &[InputGroup<StatementExecuteUnit>],
    ) -> Self {
        let groups = groups
            .iter()
            .filter_map(|group| {
                let first = group.inputs().first()?;
                Some(GroupReport {
                    data_source: first.data_source_name().to_string(),
                    connection: first.connection().to_string(),
                    connection_mode: first.connection_mode().to_string(),
                    units: group
                        .inputs()
                        .iter()
                        .map(|input| {
                            let sql_unit = input.execution_unit().sql_unit();
                            UnitReport {
                                sql: sql_unit.sql().to_string(),
                                parameters: sql_unit.parameters().to_vec(),
                                attributes: input.attributes().clone(),
                            }
                        })
                        .collect(),
                })
            })
            .collect();

        Self {
            sql: sql.into(),
            statement_kind: statement_kind.to_string(),
            groups,
            results: None,
        }
    }

    /// Attaches execution results.
    pub fn with_results(mut self, results: Vec<ExecuteResult>) -> Self {
        self.results = Some(results);
        self
    }

    /// Total SQL units across all groups.
    pub fn unit_count(&self) -> usize {
        self.groups.iter().map(|g| g.units.len()).sum()
    }

    /// Renders the report as plain text.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} [{}]", self.sql, self.statement_kind);
        let _ = writeln!(
            out,
            "  {} group(s), {} unit(s)",
            self.groups.len(),
            self.unit_count()
        );
        for (index, group) in self.groups.iter().enumerate() {
            let _ = writeln!(
                out,
                "  #{index} {} via {} ({})",
                group.data_source, group.connection, group.connection_mode
            );
            for unit in &group.units {
                let _ = write!(out, "      {}", unit.sql);
                if !unit.parameters.is_empty() {
                    let params: Vec<String> =
                        unit.parameters.iter().map(Value::to_display_string).collect();
                    let _ = write!(out, " ::: [{}]", params.join(", "));
                }
                if !unit.attributes.is_empty() {
                    let attrs: Vec<String> = unit
                        .attributes
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect();
                    let _ = write!(out, " {{{}}}", attrs.join(", "));
                }
                out.push('\n');
            }
        }
        if let Some(results) = &self.results {
            let _ = writeln!(out, "  results:");
            for result in results {
                if result.rows.is_empty() {
                    let _ = write!(
                        out,
                        "      {}: {} row(s) affected",
                        result.data_source_name, result.affected_rows
                    );
                    if !result.generated_keys.is_empty() {
                        let keys: Vec<String> = result
                            .generated_keys
                            .iter()
                            .map(Value::to_display_string)
                            .collect();
                        let _ = write!(out, ", generated keys [{}]", keys.join(", "));
                    }
                    out.push('\n');
                } else {
                    for row in &result.rows {
                        let cells: Vec<String> = row.iter().map(Value::to_display_string).collect();
                        let _ = writeln!(
                            out,
                            "      {}: {}",
                            result.data_source_name,
                            cells.join(" | ")
                        );
                    }
                }
            }
        }
        out
    }

}

/// Renders reports as one pretty JSON array.
pub fn render_json(reports: &[PlanReport]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}
