use super::fakes::{FakeOData, Reply};
use crate::dataverse::{MetadataResolver, Metric, ODataService, Resolution, TableQueryService};
use serde_json::json;
use std::sync::Arc;
use tally_core::AppError;

fn service_over(fake: Arc<FakeOData>, preferred: &[&str]) -> TableQueryService {
    let service: Arc<dyn ODataService> = fake;
    let resolver = Arc::new(MetadataResolver::new(
        service.clone(),
        preferred.iter().map(|s| s.to_string()).collect(),
    ));
    TableQueryService::new(service, resolver, 5)
}

fn account_table() -> FakeOData {
    FakeOData::new().table(
        "account",
        "accounts",
        &[
            ("name", "String"),
            ("revenue", "Money"),
            ("createdon", "DateTime"),
        ],
    )
}

#[tokio::test]
async fn test_count_in_empty_year_is_zero() {
    let fake = Arc::new(account_table().route(
        "accounts",
        Some("2099"),
        Reply::Json(json!({"value": [{"Count": 0}]})),
    ));
    let tables = service_over(fake.clone(), &[]);

    let resolution = tables
        .resolve_aggregate("count records from account in 2099")
        .await
        .unwrap();

    let result = match resolution {
        Resolution::Aggregate(result) => result,
        other => panic!("expected an aggregate, got {:?}", other),
    };
    assert_eq!(result.metric, Metric::Count);
    assert_eq!(result.value, 0.0);
    assert_eq!(result.matched_rows, 0);
    assert_eq!(result.date_field.as_deref(), Some("createdon"));

    // Only one date field, so only one aggregate request
    assert_eq!(fake.requests_to("accounts").len(), 1);
}

#[tokio::test]
async fn test_year_scope_falls_back_to_next_date_field() {
    let fake = Arc::new(
        FakeOData::new()
            .table(
                "cr5cd_order",
                "cr5cd_orders",
                &[
                    ("cr5cd_amount", "Money"),
                    ("cr5cd_orderdate", "DateTime"),
                    ("createdon", "DateTime"),
                ],
            )
            .route(
                "cr5cd_orders",
                Some("cr5cd_orderdate ge 2023"),
                Reply::Json(json!({"value": [{"Count": 0}]})),
            )
            .route(
                "cr5cd_orders",
                Some("createdon ge 2023"),
                Reply::Json(json!({"value": [{"Count": 4, "Result": 1200.5}]})),
            ),
    );
    let tables = service_over(fake.clone(), &["cr5cd_orderdate"]);

    let resolution = tables
        .resolve_aggregate("total amount from cr5cd_order in 2023")
        .await
        .unwrap();

    let result = match resolution {
        Resolution::Aggregate(result) => result,
        other => panic!("expected an aggregate, got {:?}", other),
    };
    assert_eq!(result.metric, Metric::Sum);
    assert_eq!(result.field.as_deref(), Some("cr5cd_amount"));
    assert_eq!(result.date_field.as_deref(), Some("createdon"));
    assert_eq!(result.matched_rows, 4);
    assert_eq!(result.value, 1200.5);

    let requests = fake.requests_to("cr5cd_orders");
    assert_eq!(requests.len(), 2);
    assert!(requests[0][0].1.contains("cr5cd_orderdate"));
}

#[tokio::test]
async fn test_no_match_on_any_date_field_reports_primary() {
    let fake = Arc::new(
        FakeOData::new()
            .table(
                "cr5cd_order",
                "cr5cd_orders",
                &[
                    ("cr5cd_amount", "Money"),
                    ("cr5cd_orderdate", "DateTime"),
                    ("createdon", "DateTime"),
                ],
            )
            .route(
                "cr5cd_orders",
                None,
                Reply::Json(json!({"value": [{"Count": 0}]})),
            ),
    );
    let tables = service_over(fake, &["cr5cd_orderdate"]);

    let Resolution::Aggregate(result) = tables
        .resolve_aggregate("average amount from cr5cd_order in 2030")
        .await
        .unwrap()
    else {
        panic!("expected an aggregate");
    };
    assert_eq!(result.metric, Metric::Avg);
    assert_eq!(result.value, 0.0);
    assert_eq!(result.date_field.as_deref(), Some("cr5cd_orderdate"));
}

#[tokio::test]
async fn test_list_all_accounts_is_a_listing() {
    let fake = Arc::new(account_table().route(
        "accounts",
        None,
        Reply::Json(json!({"value": [
            {"name": "Contoso", "createdon": "2023-02-01T00:00:00Z"},
            {"name": "Fabrikam", "createdon": "2024-05-09T00:00:00Z"}
        ]})),
    ));
    let tables = service_over(fake.clone(), &[]);

    let resolution = tables.resolve_aggregate("list all accounts").await.unwrap();

    let listing = match resolution {
        Resolution::Listing(listing) => listing,
        other => panic!("expected a listing, got {:?}", other),
    };
    assert_eq!(listing.collection_name, "accounts");
    assert_eq!(listing.search_term, None);
    let names: Vec<_> = listing.records.iter().map(|r| r.display.as_str()).collect();
    assert_eq!(names, vec!["Contoso", "Fabrikam"]);

    let requests = fake.requests_to("accounts");
    assert_eq!(requests[0], vec![("$top".to_string(), "5".to_string())]);
}

#[tokio::test]
async fn test_sum_without_numeric_field_lists_instead() {
    let fake = Arc::new(
        FakeOData::new()
            .table("note", "notes", &[("subject", "String"), ("createdon", "DateTime")])
            .route(
                "notes",
                None,
                Reply::Json(json!({"value": [{"subject": "Kickoff"}]})),
            ),
    );
    let tables = service_over(fake, &[]);

    let resolution = tables.resolve_aggregate("total of note").await.unwrap();
    assert!(matches!(resolution, Resolution::Listing(_)));
}

#[tokio::test]
async fn test_unknown_table_surfaces_not_found() {
    let fake = Arc::new(FakeOData::new().route(
        "EntityDefinitions",
        None,
        Reply::Json(json!({"value": []})),
    ));
    let tables = service_over(fake, &[]);

    let err = tables
        .resolve_aggregate("count records from nosuchtable in 2024")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_transient_failure_is_not_a_zero() {
    let fake = Arc::new(account_table().route("accounts", None, Reply::Transient));
    let tables = service_over(fake, &[]);

    let err = tables
        .resolve_aggregate("count records from account in 2024")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_unrecognized_text_is_echoed() {
    let tables = service_over(Arc::new(FakeOData::new()), &[]);
    let resolution = tables.resolve_aggregate("hello there").await.unwrap();
    assert_eq!(resolution, Resolution::Echo("hello there".to_string()));
}

#[tokio::test]
async fn test_metadata_is_cached_across_questions() {
    let fake = Arc::new(account_table().route(
        "accounts",
        None,
        Reply::Json(json!({"value": [{"Count": 3}]})),
    ));
    let tables = service_over(fake.clone(), &[]);

    tables.resolve_aggregate("count records from account").await.unwrap();
    tables.resolve_aggregate("count records from account").await.unwrap();

    assert_eq!(
        fake.requests_to("EntityDefinitions(LogicalName='account')/Attributes")
            .len(),
        1
    );
}
