//! HTTP page fetcher tests against a local FHIR search endpoint.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use common::{practitioner_json, role_json, searchset};
use helios_directory::error::{DirectoryError, FetchError, ProtocolError};
use helios_directory::fetch::{FHIR_JSON, HttpPageFetcher, PageFetcher};
use helios_directory::types::{EntityKey, IncludeDescriptor, RequestOptions, SearchRequest};
use helios_directory::{HarvestSettings, Harvester};
use serde_json::json;

#[derive(Clone, Default)]
struct Recorded {
    queries: Arc<Mutex<Vec<Vec<(String, String)>>>>,
    accept: Arc<Mutex<Vec<String>>>,
}

impl Recorded {
    fn queries(&self) -> Vec<Vec<(String, String)>> {
        self.queries.lock().unwrap().clone()
    }
}

async fn paged_roles(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Json<serde_json::Value> {
    let pairs: Vec<(String, String)> =
        url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .into_owned()
            .collect();
    let second_page = pairs.iter().any(|(k, _)| k == "_getpagesoffset");

    recorded.queries.lock().unwrap().push(pairs);
    if let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        recorded.accept.lock().unwrap().push(accept.to_string());
    }

    // The next link drops the include directive, as some servers do.
    let bundle = if second_page {
        searchset(vec![role_json("r2", "p2"), practitioner_json("p1", "Urban")], None)
    } else {
        searchset(
            vec![role_json("r1", "p1"), practitioner_json("p1", "Kidman")],
            Some("http://localhost/fhir?_getpages=abc&_getpagesoffset=1&_count=1"),
        )
    };
    Json(bundle)
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/fhir", addr)
}

fn fetcher(base_url: &str) -> HttpPageFetcher {
    HttpPageFetcher::new(base_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_harvest_over_http() {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/fhir/PractitionerRole", get(paged_roles))
        .with_state(recorded.clone());
    let base_url = serve(app).await;

    let harvester = Harvester::new(
        fetcher(&base_url),
        HarvestSettings::default().with_page_delay(Duration::ZERO),
    );
    let request = SearchRequest::new("PractitionerRole")
        .with_filter("family", "Kidman")
        .with_include(IncludeDescriptor::new("PractitionerRole", "practitioner"))
        .with_page_size(1);

    let harvest = harvester.run(&request).await.unwrap();

    assert_eq!(harvest.pages_fetched, 2);
    assert_eq!(harvest.result_set.match_count(), 2);
    assert_eq!(harvest.result_set.include_count(), 1);
    let kept = harvest
        .result_set
        .get(&EntityKey::new("Practitioner", "p1"))
        .unwrap();
    assert_eq!(kept.resource.display_name().as_deref(), Some("Kidman"));

    assert_eq!(harvest.diagnostics.len(), 1);
    assert_eq!(
        harvest.diagnostics[0].target(),
        EntityKey::new("Practitioner", "p2")
    );

    let queries = recorded.queries();
    let pair = |k: &str, v: &str| (k.to_string(), v.to_string());
    assert_eq!(
        queries[0],
        vec![
            pair("family", "Kidman"),
            pair("_include", "PractitionerRole:practitioner"),
            pair("_count", "1"),
        ]
    );
    assert_eq!(
        queries[1],
        vec![
            pair("_getpages", "abc"),
            pair("_getpagesoffset", "1"),
            pair("_include", "PractitionerRole:practitioner"),
            pair("_count", "1"),
        ]
    );

    let accept = recorded.accept.lock().unwrap().clone();
    assert_eq!(accept, vec![FHIR_JSON.to_string(), FHIR_JSON.to_string()]);
}

#[tokio::test]
async fn test_error_status() {
    let app = Router::new().route(
        "/fhir/PractitionerRole",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response() }),
    );
    let base_url = serve(app).await;

    let err = fetcher(&base_url)
        .execute("PractitionerRole", &RequestOptions::new())
        .await
        .unwrap_err();

    match err {
        DirectoryError::Fetch(FetchError::Status { status, body, url }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
            assert!(url.ends_with("/fhir/PractitionerRole"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_operation_outcome_body() {
    let app = Router::new().route(
        "/fhir/PractitionerRole",
        get(|| async { Json(json!({"resourceType": "OperationOutcome", "issue": []})) }),
    );
    let base_url = serve(app).await;

    let err = fetcher(&base_url)
        .execute("PractitionerRole", &RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DirectoryError::Protocol(ProtocolError::NotABundle { .. })
    ));
}

#[tokio::test]
async fn test_non_json_body() {
    let app = Router::new().route(
        "/fhir/PractitionerRole",
        get(|| async { "<html>maintenance</html>" }),
    );
    let base_url = serve(app).await;

    let err = fetcher(&base_url)
        .execute("PractitionerRole", &RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DirectoryError::Protocol(ProtocolError::InvalidBody { .. })
    ));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fetcher(&format!("http://{}/fhir", addr))
        .execute("PractitionerRole", &RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DirectoryError::Fetch(FetchError::Transport { .. })
    ));
}
