//! Free-text table questions resolved to aggregates or listings.

use crate::dataverse::aggregate::{AggregateQuery, AggregateResult};
use crate::dataverse::intent::{parse_intent, AggregateIntent, Intent, Metric, PlainQuery};
use crate::dataverse::listing::{fetch_listing, PlainListing};
use crate::dataverse::metadata::{EntityMetadata, MetadataResolver};
use crate::dataverse::ODataService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally_core::AppResult;

/// Substrings that mark a numeric field as the likely measure.
const MEASURE_HINTS: &[&str] = &["amount", "total", "price", "quantity", "revenue"];

/// Outcome of a table question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Resolution {
    Aggregate(AggregateResult),
    Listing(PlainListing),

    /// The text named no table; it is returned unchanged.
    Echo(String),
}

/// Resolves table questions against one OData service.
pub struct TableQueryService {
    service: Arc<dyn ODataService>,
    resolver: Arc<MetadataResolver>,
    listing_top: usize,
}

impl TableQueryService {
    pub fn new(
        service: Arc<dyn ODataService>,
        resolver: Arc<MetadataResolver>,
        listing_top: usize,
    ) -> Self {
        Self {
            service,
            resolver,
            listing_top,
        }
    }

    /// Metadata for a table, as the resolver sees it.
    pub async fn describe(&self, table: &str) -> AppResult<EntityMetadata> {
        self.resolver.resolve(table).await
    }

    /// Resolve free text into an aggregate, a listing or an echo.
    ///
    /// # Errors
    /// `NotFound` for an unknown table; `Transient` once retries are spent.
    /// A query that matched nothing is a successful zero, not an error.
    pub async fn resolve_aggregate(&self, text: &str) -> AppResult<Resolution> {
        let intent = parse_intent(text);
        tracing::debug!(?intent, "Parsed table intent");

        match intent {
            Intent::Aggregate(intent) => self.aggregate(intent).await,
            Intent::PlainQuery(query) => self.listing(query).await,
            Intent::Unrecognized => Ok(Resolution::Echo(text.to_string())),
        }
    }

    async fn aggregate(&self, intent: AggregateIntent) -> AppResult<Resolution> {
        let metadata = self.resolver.resolve(&intent.table).await?;

        let field = match intent.metric {
            Metric::Count => None,
            _ => match choose_field(intent.field.as_deref(), &metadata.numeric_fields) {
                Some(field) => Some(field),
                None => {
                    tracing::info!(
                        table = %intent.table,
                        metric = %intent.metric,
                        "No numeric field to aggregate; listing records instead"
                    );
                    return self
                        .listing(PlainQuery {
                            table: intent.table,
                            term: None,
                            year: intent.year,
                        })
                        .await;
                }
            },
        };

        let query = |date_field: Option<&String>, year: Option<i32>| AggregateQuery {
            table: intent.table.clone(),
            collection: metadata.collection_name.clone(),
            metric: intent.metric,
            field: field.clone(),
            date_field: date_field.cloned(),
            year,
        };

        let Some(year) = intent.year else {
            return Ok(Resolution::Aggregate(
                query(None, None).run(self.service.as_ref()).await?,
            ));
        };

        let mut date_fields = metadata.date_fields.iter();
        let Some(primary) = date_fields.next() else {
            tracing::warn!(
                table = %intent.table,
                "Table has no date field; aggregating without year scope"
            );
            return Ok(Resolution::Aggregate(
                query(None, None).run(self.service.as_ref()).await?,
            ));
        };

        let first = query(Some(primary), Some(year))
            .run(self.service.as_ref())
            .await?;
        if first.matched_rows > 0 {
            return Ok(Resolution::Aggregate(first));
        }

        for date_field in date_fields {
            let result = query(Some(date_field), Some(year))
                .run(self.service.as_ref())
                .await?;
            if result.matched_rows > 0 {
                tracing::info!(
                    table = %intent.table,
                    primary = %primary,
                    fallback = %date_field,
                    "Year scope matched only on a fallback date field"
                );
                return Ok(Resolution::Aggregate(result));
            }
        }

        Ok(Resolution::Aggregate(first))
    }

    async fn listing(&self, query: PlainQuery) -> AppResult<Resolution> {
        let metadata = self.resolver.resolve(&query.table).await?;
        let listing = fetch_listing(
            self.service.as_ref(),
            &metadata,
            &query.table,
            query.term.as_deref(),
            query.year,
            self.listing_top,
        )
        .await?;
        Ok(Resolution::Listing(listing))
    }
}

/// Pick the numeric field to aggregate.
///
/// The user's hint wins (exact, then contained in a field name), then the
/// first field that looks like a measure, then the first numeric field.
pub fn choose_field(hint: Option<&str>, numeric_fields: &[String]) -> Option<String> {
    if let Some(hint) = hint.map(str::to_ascii_lowercase) {
        if let Some(field) = numeric_fields
            .iter()
            .find(|f| f.eq_ignore_ascii_case(&hint))
            .or_else(|| {
                numeric_fields
                    .iter()
                    .find(|f| f.to_ascii_lowercase().contains(&hint))
            })
        {
            return Some(field.clone());
        }
    }

    numeric_fields
        .iter()
        .find(|f| {
            let lower = f.to_ascii_lowercase();
            MEASURE_HINTS.iter().any(|h| lower.contains(h))
        })
        .or_else(|| numeric_fields.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_hint_exact_then_contains() {
        let numeric = fields(&["quantity", "cr5cd_unitprice", "price"]);
        assert_eq!(choose_field(Some("Price"), &numeric).as_deref(), Some("price"));
        assert_eq!(
            choose_field(Some("unitprice"), &numeric).as_deref(),
            Some("cr5cd_unitprice")
        );
    }

    #[test]
    fn test_measure_heuristic() {
        let numeric = fields(&["versionnumber", "cr5cd_totalamount", "quantity"]);
        assert_eq!(
            choose_field(Some("nonsense"), &numeric).as_deref(),
            Some("cr5cd_totalamount")
        );
        assert_eq!(
            choose_field(None, &fields(&["versionnumber", "timezoneruleversionnumber"]))
                .as_deref(),
            Some("versionnumber")
        );
    }

    #[test]
    fn test_no_numeric_fields() {
        assert_eq!(choose_field(Some("amount"), &[]), None);
    }

    #[test]
    fn test_echo_serialization() {
        let json = serde_json::to_value(Resolution::Echo("hi".to_string())).unwrap();
        assert_eq!(json["kind"], "echo");
        assert_eq!(json["data"], "hi");
    }
}
