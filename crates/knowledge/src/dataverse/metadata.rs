//! Logical table name to collection resolution through live metadata.

use crate::dataverse::{odata_literal, ODataService};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tally_core::{AppError, AppResult};

/// Creation timestamp present on every Dataverse table.
pub const CREATED_ON: &str = "createdon";

const ENTITY_SELECT: &str = "LogicalName,EntitySetName,SchemaName";

/// Schema facts needed to query a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub logical_name: String,

    /// Web API collection (entity set) name, e.g. `accounts`
    pub collection_name: String,

    /// Date fields usable for year scoping, in priority order
    pub date_fields: Vec<String>,

    pub numeric_fields: Vec<String>,
    pub text_fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EntityDefinition {
    #[serde(rename = "LogicalName")]
    logical_name: String,
    #[serde(rename = "EntitySetName")]
    entity_set_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttributeDefinition {
    #[serde(rename = "LogicalName")]
    logical_name: Option<String>,
    #[serde(rename = "AttributeType")]
    attribute_type: Option<String>,
}

/// Resolves and caches table metadata.
///
/// The cache lives as long as the resolver; failed lookups are not cached.
pub struct MetadataResolver {
    service: Arc<dyn ODataService>,
    preferred_date_fields: Vec<String>,
    cache: Mutex<HashMap<String, EntityMetadata>>,
}

impl MetadataResolver {
    pub fn new(service: Arc<dyn ODataService>, preferred_date_fields: Vec<String>) -> Self {
        Self {
            service,
            preferred_date_fields,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a logical table name (case-insensitive, plural tolerated).
    ///
    /// # Errors
    /// `NotFound` when no table matches; backend errors pass through.
    pub async fn resolve(&self, table: &str) -> AppResult<EntityMetadata> {
        let key = table.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(AppError::NotFound("Empty table name".to_string()));
        }

        if let Some(cached) = self.cached(&key) {
            return Ok(cached);
        }

        let entity = self.lookup_entity(&key).await?;
        let collection_name = entity.entity_set_name.clone().unwrap_or_default();
        let attributes = self.attributes(&entity.logical_name).await?;
        let metadata = classify(
            entity.logical_name,
            collection_name,
            &attributes,
            &self.preferred_date_fields,
        );

        tracing::info!(
            table = %key,
            logical_name = %metadata.logical_name,
            collection = %metadata.collection_name,
            date_fields = ?metadata.date_fields,
            numeric_fields = metadata.numeric_fields.len(),
            "Resolved table metadata"
        );

        let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        cache.insert(key, metadata.clone());
        Ok(metadata)
    }

    fn cached(&self, key: &str) -> Option<EntityMetadata> {
        let cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
        cache.get(key).cloned()
    }

    async fn lookup_entity(&self, key: &str) -> AppResult<EntityDefinition> {
        for candidate in name_candidates(key) {
            match self.exact(&candidate).await {
                Ok(Some(entity)) => return Ok(entity),
                Ok(None) | Err(AppError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        self.search(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Unknown table '{}'", key)))
    }

    async fn exact(&self, logical_name: &str) -> AppResult<Option<EntityDefinition>> {
        let path = format!("EntityDefinitions(LogicalName='{}')", odata_literal(logical_name));
        let query = [("$select".to_string(), ENTITY_SELECT.to_string())];
        let body = self.service.get(&path, &query).await?;

        let entity: EntityDefinition = serde_json::from_value(body)?;
        Ok(entity.entity_set_name.is_some().then_some(entity))
    }

    async fn search(&self, key: &str) -> AppResult<Option<EntityDefinition>> {
        let needle = odata_literal(key);
        let query = [
            ("$select".to_string(), ENTITY_SELECT.to_string()),
            (
                "$filter".to_string(),
                format!(
                    "contains(tolower(LogicalName),'{0}') or contains(tolower(SchemaName),'{0}')",
                    needle
                ),
            ),
        ];
        let body = self.service.get("EntityDefinitions", &query).await?;
        let entities: Vec<EntityDefinition> = serde_json::from_value(
            body.get("value").cloned().unwrap_or_else(|| serde_json::json!([])),
        )?;

        let mut candidates = entities
            .into_iter()
            .filter(|e| e.entity_set_name.is_some())
            .collect::<Vec<_>>();

        // An exact logical name beats a containing one
        if let Some(pos) = candidates
            .iter()
            .position(|e| e.logical_name.eq_ignore_ascii_case(key))
        {
            return Ok(Some(candidates.swap_remove(pos)));
        }
        Ok(candidates
            .into_iter()
            .find(|e| e.logical_name.to_ascii_lowercase().contains(key)))
    }

    async fn attributes(&self, logical_name: &str) -> AppResult<Vec<AttributeDefinition>> {
        let path = format!(
            "EntityDefinitions(LogicalName='{}')/Attributes",
            odata_literal(logical_name)
        );
        let query = [(
            "$select".to_string(),
            "LogicalName,AttributeType".to_string(),
        )];
        let body = self.service.get(&path, &query).await?;
        Ok(serde_json::from_value(
            body.get("value").cloned().unwrap_or_else(|| serde_json::json!([])),
        )?)
    }
}

/// Exact name first, then naive singular forms.
fn name_candidates(key: &str) -> Vec<String> {
    let mut candidates = vec![key.to_string()];
    for suffix in ["es", "s"] {
        if let Some(stem) = key.strip_suffix(suffix) {
            if !stem.is_empty() && !candidates.iter().any(|c| c == stem) {
                candidates.push(stem.to_string());
            }
        }
    }
    candidates
}

fn classify(
    logical_name: String,
    collection_name: String,
    attributes: &[AttributeDefinition],
    preferred_date_fields: &[String],
) -> EntityMetadata {
    let mut dates = Vec::new();
    let mut numeric_fields = Vec::new();
    let mut text_fields = Vec::new();

    for attribute in attributes {
        let (Some(name), Some(kind)) = (&attribute.logical_name, &attribute.attribute_type) else {
            continue;
        };
        match kind.as_str() {
            "DateTime" => dates.push(name.clone()),
            "Integer" | "BigInt" | "Double" | "Decimal" | "Money" => {
                numeric_fields.push(name.clone())
            }
            "String" | "Memo" => text_fields.push(name.clone()),
            _ => {}
        }
    }

    let mut date_fields: Vec<String> = preferred_date_fields
        .iter()
        .filter(|p| p.as_str() != CREATED_ON && dates.contains(p))
        .cloned()
        .collect();
    if dates.iter().any(|d| d == CREATED_ON) {
        date_fields.push(CREATED_ON.to_string());
    }

    EntityMetadata {
        logical_name,
        collection_name,
        date_fields,
        numeric_fields,
        text_fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str, kind: &str) -> AttributeDefinition {
        AttributeDefinition {
            logical_name: Some(name.to_string()),
            attribute_type: Some(kind.to_string()),
        }
    }

    #[test]
    fn test_name_candidates() {
        assert_eq!(name_candidates("accounts"), vec!["accounts", "account"]);
        assert_eq!(
            name_candidates("cr5cd_saleses"),
            vec!["cr5cd_saleses", "cr5cd_sales", "cr5cd_salese"]
        );
        assert_eq!(name_candidates("contact"), vec!["contact"]);
    }

    #[test]
    fn test_classify_orders_dates_with_createdon_last() {
        let attributes = vec![
            attr("createdon", "DateTime"),
            attr("modifiedon", "DateTime"),
            attr("estimatedclosedate", "DateTime"),
            attr("cr5cd_orderdate", "DateTime"),
            attr("totalamount", "Money"),
            attr("quantity", "Integer"),
            attr("name", "String"),
            attr("description", "Memo"),
            attr("statecode", "State"),
        ];
        let preferred: Vec<String> = ["cr5cd_orderdate", "orderdate", "estimatedclosedate"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let meta = classify("x".into(), "xs".into(), &attributes, &preferred);
        assert_eq!(
            meta.date_fields,
            vec!["cr5cd_orderdate", "estimatedclosedate", "createdon"]
        );
        assert_eq!(meta.numeric_fields, vec!["totalamount", "quantity"]);
        assert_eq!(meta.text_fields, vec!["name", "description"]);
    }

    #[test]
    fn test_classify_without_createdon() {
        let meta = classify("x".into(), "xs".into(), &[attr("when", "DateTime")], &[]);
        assert!(meta.date_fields.is_empty());
    }
}
