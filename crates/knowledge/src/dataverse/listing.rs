//! Plain record listings for non-aggregate table questions.

use crate::dataverse::{odata_literal, EntityMetadata, ODataService};
use serde::{Deserialize, Serialize};
use tally_core::AppResult;

/// Fields tried, in order, as a record's display value and search target.
pub const DISPLAY_FIELDS: &[&str] = &["name", "fullname", "subject", "title"];

/// One listed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedRecord {
    pub display: String,
    pub date: Option<String>,
}

/// Records listed from a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainListing {
    pub table: String,
    pub collection_name: String,
    pub search_term: Option<String>,
    pub year: Option<i32>,
    pub records: Vec<ListedRecord>,
}

/// Build the `$top`/`$filter` query for a listing.
///
/// A term becomes `contains` clauses over the display fields the table has;
/// a year becomes a range on the first date field. Both are combined with
/// `and` when present.
pub fn listing_query(
    metadata: &EntityMetadata,
    term: Option<&str>,
    year: Option<i32>,
    top: usize,
) -> Vec<(String, String)> {
    let mut clauses = Vec::new();

    if let Some(term) = term {
        let literal = odata_literal(term);
        let contains: Vec<String> = DISPLAY_FIELDS
            .iter()
            .filter(|f| metadata.text_fields.iter().any(|t| t == *f))
            .map(|f| format!("contains({},'{}')", f, literal))
            .collect();
        match contains.len() {
            0 => tracing::debug!(
                table = %metadata.logical_name,
                "No display field to search; listing without term filter"
            ),
            1 => clauses.push(contains[0].clone()),
            _ => clauses.push(format!("({})", contains.join(" or "))),
        }
    }

    if let (Some(year), Some(df)) = (year, metadata.date_fields.first()) {
        clauses.push(format!(
            "{df} ge {y}-01-01 and {df} lt {next}-01-01",
            df = df,
            y = year,
            next = year + 1
        ));
    }

    let mut query = vec![("$top".to_string(), top.to_string())];
    if !clauses.is_empty() {
        query.push(("$filter".to_string(), clauses.join(" and ")));
    }
    query
}

/// Fetch up to `top` records from a resolved table.
pub async fn fetch_listing(
    service: &dyn ODataService,
    metadata: &EntityMetadata,
    table: &str,
    term: Option<&str>,
    year: Option<i32>,
    top: usize,
) -> AppResult<PlainListing> {
    let query = listing_query(metadata, term, year, top);
    let body = service.get(&metadata.collection_name, &query).await?;

    let records = body
        .get("value")
        .and_then(|v| v.as_array())
        .map(|rows| {
            rows.iter()
                .map(|row| to_listed_record(row, &metadata.date_fields))
                .collect()
        })
        .unwrap_or_default();

    Ok(PlainListing {
        table: table.to_string(),
        collection_name: metadata.collection_name.clone(),
        search_term: term.map(str::to_string),
        year,
        records,
    })
}

fn to_listed_record(row: &serde_json::Value, date_fields: &[String]) -> ListedRecord {
    ListedRecord {
        display: display_value(row).unwrap_or_else(|| "(untitled)".to_string()),
        date: date_fields
            .iter()
            .find_map(|f| row.get(f).and_then(|v| v.as_str()))
            .map(str::to_string),
    }
}

/// Best human-readable value of a row.
pub(crate) fn display_value(row: &serde_json::Value) -> Option<String> {
    let fields = row.as_object()?;
    DISPLAY_FIELDS
        .iter()
        .find_map(|f| {
            fields
                .get(*f)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            // Skip annotations and lookup values
            fields
                .iter()
                .filter(|(k, _)| !k.starts_with('@') && !k.starts_with('_'))
                .find_map(|(_, v)| v.as_str().filter(|s| !s.is_empty()))
        })
        .map(str::to_string)
}
