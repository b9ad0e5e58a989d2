use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use employee_directory_core::{
    sample_employee, DirectoryError, EmployeeId, PageAccumulator, RecordSource,
};
use employee_directory_source::{HttpRecordSource, SourceConfig};
use serde_json::json;

const STUB_TOTAL: u64 = 23;

async fn users(Query(params): Query<HashMap<String, usize>>) -> Json<serde_json::Value> {
    let limit = params.get("limit").copied().unwrap_or(30);
    let skip = params.get("skip").copied().unwrap_or(0);
    let users: Vec<_> = (1..=STUB_TOTAL)
        .map(|id| sample_employee(EmployeeId(id)))
        .skip(skip)
        .take(limit)
        .collect();
    Json(json!({ "users": users, "total": STUB_TOTAL, "skip": skip, "limit": limit }))
}

async fn user(Path(id): Path<u64>) -> Response {
    match id {
        1..=STUB_TOTAL => Json(sample_employee(EmployeeId(id))).into_response(),
        500 => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("User with id '{id}' not found") })),
        )
            .into_response(),
    }
}

async fn categories() -> Json<serde_json::Value> {
    Json(json!([
        { "slug": "beauty", "name": "Beauty", "url": "https://dummyjson.com/products/category/beauty" },
        { "slug": "fragrances", "name": "Fragrances", "url": "https://dummyjson.com/products/category/fragrances" },
        { "slug": "furniture", "name": "Furniture", "url": "https://dummyjson.com/products/category/furniture" }
    ]))
}

async fn spawn_stub() -> SocketAddr {
    let app = Router::new()
        .route("/users", get(users))
        .route("/users/:id", get(user))
        .route("/products/categories", get(categories));

    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => panic!("stub listener should bind: {err}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => panic!("stub listener should have an address: {err}"),
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn stub_source() -> HttpRecordSource {
    let addr = spawn_stub().await;
    let config = SourceConfig { base_url: format!("http://{addr}/"), timeout_secs: 5, ..SourceConfig::default() };
    match HttpRecordSource::with_config(config) {
        Ok(source) => source,
        Err(err) => panic!("source should build: {err}"),
    }
}

#[tokio::test]
async fn fetch_by_id_returns_the_record() {
    let source = stub_source().await;
    let record = source.fetch_by_id(EmployeeId(7)).await;
    assert_eq!(record, Ok(sample_employee(EmployeeId(7))));
}

#[tokio::test]
async fn missing_user_maps_to_not_found() {
    let source = stub_source().await;
    assert_eq!(
        source.fetch_by_id(EmployeeId(404)).await,
        Err(DirectoryError::NotFound(EmployeeId(404)))
    );
}

#[tokio::test]
async fn server_error_maps_to_transport_error() {
    let source = stub_source().await;
    assert!(matches!(source.fetch_by_id(EmployeeId(500)).await, Err(DirectoryError::Transport(_))));
}

#[tokio::test]
async fn unreachable_upstream_is_transport_error() {
    let config = SourceConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: 2,
        ..SourceConfig::default()
    };
    let source = match HttpRecordSource::with_config(config) {
        Ok(source) => source,
        Err(err) => panic!("source should build: {err}"),
    };
    assert!(matches!(source.fetch_category_list().await, Err(DirectoryError::Transport(_))));
}

#[tokio::test]
async fn pages_carry_limit_skip_and_total() {
    let source = stub_source().await;
    let page = match source.fetch_page(10, 20).await {
        Ok(page) => page,
        Err(err) => panic!("page should load: {err}"),
    };
    assert_eq!(page.total, 23);
    assert_eq!(page.skip, 20);
    assert_eq!(page.users.iter().map(|user| user.id.0).collect::<Vec<_>>(), vec![21, 22, 23]);
}

#[tokio::test]
async fn fetch_all_honors_limit() {
    let source = stub_source().await;
    let all = source.fetch_all(15).await.map(|records| records.len());
    assert_eq!(all, Ok(15));
}

#[tokio::test]
async fn categories_decode_in_upstream_order() {
    let source = stub_source().await;
    let names = source
        .fetch_category_list()
        .await
        .map(|categories| categories.into_iter().map(|category| category.name).collect::<Vec<_>>());
    assert_eq!(
        names,
        Ok(vec!["Beauty".to_string(), "Fragrances".to_string(), "Furniture".to_string()])
    );
}

#[tokio::test]
async fn accumulator_drains_the_http_listing() {
    let source = stub_source().await;
    let mut accumulator = PageAccumulator::new(10);
    while accumulator.has_more() {
        if let Err(err) = accumulator.load(&source).await {
            panic!("page should load: {err}");
        }
    }
    assert_eq!(accumulator.len(), 23);
    assert_eq!(accumulator.total(), Some(23));
}
