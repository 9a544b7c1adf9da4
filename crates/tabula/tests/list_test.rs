//! List, count and find-one behaviour of the table service.

mod test_utils;

use std::cmp::Reverse;
use tabula::ListParams;
use tabula_error::{QueryErrorKind, TabulaErrorKind};
use test_utils::*;

#[tokio::test]
async fn test_list_third_page_of_four_hundred() {
    let (service, _) = service().await;

    let page = service
        .list(COUNTRY, &ListParams::default().with_window("200", "100"))
        .await
        .unwrap();

    let info = page.page_info();
    assert_eq!(info.total_rows, 400);
    assert_eq!(info.page, 3);
    assert_eq!(info.page_size, 100);
    assert!(!info.is_first_page);
    assert!(!info.is_last_page);
    assert_eq!(ids(page.list()), (201..=300).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_last_page_is_flagged() {
    let (service, _) = service().await;

    let page = service
        .list(COUNTRY, &ListParams::default().with_window("390", "25"))
        .await
        .unwrap();

    assert_eq!(page.list().len(), 10);
    assert!(page.page_info().is_last_page);
}

#[tokio::test]
async fn test_count_matches_filtered_list() {
    let (service, _) = service().await;

    let count = service
        .count(COUNTRY, None, Some("(Name,eq,Afghanistan)"))
        .await
        .unwrap();
    assert_eq!(count.count, 31);

    let page = service
        .list(
            COUNTRY,
            &ListParams::default()
                .with_filter("(Name,eq,Afghanistan)")
                .with_window("0", "100"),
        )
        .await
        .unwrap();
    assert_eq!(page.page_info().total_rows, 31);
    assert_eq!(page.list().len(), 31);
    assert!(page.list().iter().all(|row| row["Name"] == "Afghanistan"));
}

#[tokio::test]
async fn test_offset_past_end_is_rejected() {
    let (service, _) = service().await;

    let err = service
        .list(COUNTRY, &ListParams::default().with_window("10000", "25"))
        .await
        .unwrap_err();

    assert!(err.is_unprocessable());
    assert_eq!(err.status_code(), 422);
    assert!(matches!(
        err.kind(),
        TabulaErrorKind::Query(e) if matches!(e.kind, QueryErrorKind::OffsetOutOfRange { offset: 10000, total: 400 })
    ));
}

#[tokio::test]
async fn test_junk_pagination_falls_back_to_defaults() {
    let (service, _) = service().await;

    let page = service
        .list(COUNTRY, &ListParams::default().with_window("-5", "lots"))
        .await
        .unwrap();

    assert_eq!(page.page_info().page, 1);
    assert_eq!(page.page_info().page_size, 25);
    assert!(page.page_info().is_first_page);
    assert_eq!(page.list().len(), 25);
}

#[tokio::test]
async fn test_oversized_limit_is_clamped() {
    let (service, _) = service().await;

    let page = service
        .list(COUNTRY, &ListParams::default().with_window("0", "5000"))
        .await
        .unwrap();

    assert_eq!(page.page_info().page_size, 1000);
    assert_eq!(page.list().len(), 400);
    assert!(page.page_info().is_last_page);
}

#[tokio::test]
async fn test_sort_breaks_ties_with_later_entries() {
    let (service, _) = service().await;

    let page = service
        .list(
            COUNTRY,
            &ListParams::default()
                .with_sort(["-Continent", "-Population"])
                .with_window("0", "1000"),
        )
        .await
        .unwrap();

    let keys: Vec<_> = page
        .list()
        .iter()
        .map(|row| {
            (
                Reverse(row["Continent"].as_str().unwrap().to_string()),
                Reverse(row["Population"].as_i64().unwrap()),
                row["Id"].as_i64().unwrap(),
            )
        })
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(page.list()[0]["Continent"], "Europe");
    assert_eq!(page.list()[0]["Population"], 9000);
}

#[tokio::test]
async fn test_malformed_filter_clause_is_dropped() {
    let (service, _) = service().await;

    let count = service
        .count(COUNTRY, None, Some("(Name,eq,Afghanistan)~and(Population,gt"))
        .await
        .unwrap();

    assert_eq!(count.count, 31);
}

#[tokio::test]
async fn test_unknown_fields_and_sorts_are_dropped() {
    let (service, _) = service().await;

    let page = service
        .list(
            COUNTRY,
            &ListParams::default()
                .with_fields(["Name", "Capital"])
                .with_sort(["Capital", "-Id"])
                .with_filter("(Capital,eq,Kabul)")
                .with_window("0", "2"),
        )
        .await
        .unwrap();

    assert_eq!(page.page_info().total_rows, 400);
    let first = &page.list()[0];
    assert_eq!(first.len(), 1);
    assert_eq!(first["Name"], "Country 400");
    assert_eq!(page.list()[1]["Name"], "Country 399");
}

#[tokio::test]
async fn test_comma_separated_fields_keep_table_order() {
    let (service, _) = service().await;

    let mut params = ListParams::default().with_window("0", "1");
    params.fields = Some(tabula::OneOrMany::One("Population,Id".to_string()));
    let page = service.list(COUNTRY, &params).await.unwrap();

    let keys: Vec<_> = page.list()[0].keys().cloned().collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&"Id".to_string()));
    assert!(keys.contains(&"Population".to_string()));
}

#[tokio::test]
async fn test_find_one_returns_first_match() {
    let (service, _) = service().await;

    let row = service
        .find_one(
            COUNTRY,
            &ListParams::default()
                .with_filter("(Name,eq,Afghanistan)")
                .with_sort(["-Id"]),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["Id"], 31);

    let none = service
        .find_one(COUNTRY, &ListParams::default().with_filter("(Name,eq,Atlantis)"))
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn test_unknown_table_is_not_found() {
    let (service, _) = service().await;

    let err = service
        .list("tbl_planet", &ListParams::default())
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.status_code(), 404);
}
