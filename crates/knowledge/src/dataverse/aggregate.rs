//! Push-down aggregate queries (`$apply`).

use crate::dataverse::{Metric, ODataService};
use serde::{Deserialize, Serialize};
use tally_core::AppResult;

/// Result of one aggregate query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub value: f64,
    pub metric: Metric,
    pub table: String,
    pub field: Option<String>,
    pub year: Option<i32>,

    /// Date field the year filter was applied to
    pub date_field: Option<String>,

    pub matched_rows: u64,
}

impl AggregateResult {
    /// One-line summary, e.g. `[account] Count in 2024: 12`.
    pub fn summary(&self) -> String {
        let scope = self.year.map(|y| format!(" in {}", y)).unwrap_or_default();
        match (self.metric, &self.field) {
            (Metric::Count, _) | (_, None) => {
                format!("[{}] Count{}: {}", self.table, scope, self.matched_rows)
            }
            (metric, Some(field)) => format!(
                "[{}] {} of {}{}: {:.2}",
                self.table,
                metric.as_str().to_uppercase(),
                field,
                scope,
                self.value
            ),
        }
    }
}

/// Build the `$apply` expression.
///
/// The row count is always computed so zero-match results can be told apart
/// from a true zero sum. A sum or average without a field degrades to a count.
///
/// ```
/// use tally_knowledge::dataverse::{build_apply, Metric};
///
/// assert_eq!(
///     build_apply(Metric::Sum, Some("amount"), Some("createdon"), Some(2024)),
///     "filter(createdon ge 2024-01-01 and createdon lt 2025-01-01)/\
///      aggregate($count as Count,amount with sum as Result)"
/// );
/// ```
pub fn build_apply(
    metric: Metric,
    field: Option<&str>,
    date_field: Option<&str>,
    year: Option<i32>,
) -> String {
    let filter = match (date_field, year) {
        (Some(df), Some(y)) => format!(
            "filter({df} ge {y}-01-01 and {df} lt {next}-01-01)/",
            df = df,
            y = y,
            next = y + 1
        ),
        _ => String::new(),
    };

    let aggregate = match (metric, field) {
        (Metric::Sum, Some(f)) => format!("aggregate($count as Count,{} with sum as Result)", f),
        (Metric::Avg, Some(f)) => {
            format!("aggregate($count as Count,{} with average as Result)", f)
        }
        _ => "aggregate($count as Count)".to_string(),
    };

    format!("{}{}", filter, aggregate)
}

/// A single aggregate request against one collection.
#[derive(Debug, Clone)]
pub struct AggregateQuery {
    pub table: String,
    pub collection: String,
    pub metric: Metric,
    pub field: Option<String>,
    pub date_field: Option<String>,
    pub year: Option<i32>,
}

impl AggregateQuery {
    pub fn apply(&self) -> String {
        build_apply(
            self.metric,
            self.field.as_deref(),
            self.date_field.as_deref(),
            self.year,
        )
    }

    /// Issue the query. Exactly one request; the service returns one row.
    pub async fn run(&self, service: &dyn ODataService) -> AppResult<AggregateResult> {
        let query = [("$apply".to_string(), self.apply())];
        let body = service.get(&self.collection, &query).await?;

        let row = body
            .get("value")
            .and_then(|v| v.as_array())
            .and_then(|rows| rows.first());

        let matched_rows = row
            .and_then(|r| r.get("Count"))
            .and_then(number)
            .map(|n| n.max(0.0) as u64)
            .unwrap_or(0);

        let value = match self.metric {
            Metric::Count => matched_rows as f64,
            _ if matched_rows == 0 => 0.0,
            _ => row.and_then(|r| r.get("Result")).and_then(number).unwrap_or(0.0),
        };

        tracing::debug!(
            table = %self.table,
            metric = %self.metric,
            date_field = ?self.date_field,
            matched_rows,
            value,
            "Aggregate query completed"
        );

        Ok(AggregateResult {
            value,
            metric: self.metric,
            table: self.table.clone(),
            field: self.field.clone(),
            year: self.year,
            date_field: self.date_field.clone(),
            matched_rows,
        })
    }
}

/// Numbers may arrive as JSON numbers or, for decimals, as strings.
fn number(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_without_year() {
        assert_eq!(
            build_apply(Metric::Count, None, Some("createdon"), None),
            "aggregate($count as Count)"
        );
    }

    #[test]
    fn test_avg_uses_average_keyword() {
        assert_eq!(
            build_apply(Metric::Avg, Some("price"), None, None),
            "aggregate($count as Count,price with average as Result)"
        );
    }

    #[test]
    fn test_year_range_is_half_open() {
        let apply = build_apply(Metric::Count, None, Some("orderdate"), Some(2023));
        assert_eq!(
            apply,
            "filter(orderdate ge 2023-01-01 and orderdate lt 2024-01-01)/aggregate($count as Count)"
        );
    }

    #[test]
    fn test_sum_without_field_degrades_to_count() {
        assert_eq!(
            build_apply(Metric::Sum, None, None, None),
            "aggregate($count as Count)"
        );
    }

    #[test]
    fn test_number_parsing() {
        assert_eq!(number(&serde_json::json!(3)), Some(3.0));
        assert_eq!(number(&serde_json::json!("12.5")), Some(12.5));
        assert_eq!(number(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_summary() {
        let result = AggregateResult {
            value: 1234.5,
            metric: Metric::Sum,
            table: "sales".to_string(),
            field: Some("amount".to_string()),
            year: Some(2024),
            date_field: Some("createdon".to_string()),
            matched_rows: 3,
        };
        assert_eq!(result.summary(), "[sales] SUM of amount in 2024: 1234.50");
    }
}
