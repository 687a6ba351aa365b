//! Integration tests for pairing-server read endpoints
//!
//! Tests cover:
//! - Health endpoint (no auth required)
//! - Import followed by pairing reads, end to end
//! - Canonical-slug redirects (301) and legacy routed paths
//! - Search validation, ranking and pagination metadata
//! - Listing, categories and popular dishes
//! - X-Cache hit/miss signalling
//! - Error envelopes and sanitized internal errors

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use pairing_common::config::DEFAULT_LEGACY_PREFIX;
use pairing_common::db::init_memory_database;
use pairing_common::Cache;
use serde_json::{json, Value};
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method
use pairing_server::{build_router, AppState};

/// Test helper: app over a fresh in-memory database (auth disabled)
async fn setup_app() -> (Router, AppState) {
    let db = init_memory_database().await.expect("in-memory database");
    // shared_secret = 0 disables auth checking
    let state = AppState::new(db, Cache::memory(), DEFAULT_LEGACY_PREFIX, 0);
    (build_router(state.clone()), state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

fn cache_status(response: &Response) -> &str {
    response.headers()["x-cache"].to_str().unwrap()
}

/// Test helper: import `main` with `sides` through the HTTP endpoint
async fn import(app: &Router, main: Value, sides: Vec<Value>) -> Value {
    let response = send(
        app,
        post_json("/import-dishes", &json!({ "main_dish": main, "side_dishes": sides })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    extract_json(response).await
}

fn dish(name: &str, slug: &str, dish_type: &str) -> Value {
    json!({ "name": name, "slug": slug, "dish_type": dish_type })
}

async fn seed_bean_soup(app: &Router) -> Value {
    import(
        app,
        dish("15 Bean Soup", "15-bean-soup", "main"),
        vec![dish("Cornbread", "cornbread", "side")],
    )
    .await
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let (app, _) = setup_app().await;

    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "pairing-server");
    assert!(body["version"].is_string());
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test]
async fn test_import_then_read_pairings() {
    let (app, state) = setup_app().await;

    let imported = seed_bean_soup(&app).await;
    assert_eq!(imported["success"], true);
    assert!(imported["main_dish_id"].is_i64());
    assert_eq!(imported["side_dishes_imported"], 1);

    let response = send(&app, get("/dishes/15-bean-soup/pairings")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), "MISS");

    let body = extract_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["main_dish"]["name"], "15 Bean Soup");
    let sides = body["data"]["side_dishes"].as_array().unwrap();
    assert_eq!(sides.len(), 1);
    assert_eq!(sides[0]["name"], "Cornbread");
    assert!(sides[0]["match_score"].is_number());
    assert_eq!(sides[0]["order_position"], 1);

    let again = send(&app, get("/dishes/15-bean-soup/pairings")).await;
    assert_eq!(cache_status(&again), "HIT");

    // The view counter is written in the background
    let main_id = imported["main_dish_id"].as_i64().unwrap();
    let mut views = 0;
    for _ in 0..50 {
        if let Some(record) = state.popularity.record_for(main_id).await.unwrap() {
            views = record.view_count;
            if views == 2 {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(views, 2);
}

#[tokio::test]
async fn test_routes_served_under_api_prefix() {
    let (app, _) = setup_app().await;
    seed_bean_soup(&app).await;

    let response = send(&app, get("/api/dishes/cornbread")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    assert_eq!(body["data"]["slug"], "cornbread");
    assert_eq!(body["data"]["dish_type"], "side");
    assert!(body["data"]["recipe"].is_null());

    let response = send(&app, get("/api/categories")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_reimport_invalidates_pairings_cache() {
    let (app, _) = setup_app().await;
    seed_bean_soup(&app).await;

    send(&app, get("/dishes/15-bean-soup/pairings")).await;
    let cached = send(&app, get("/dishes/15-bean-soup/pairings")).await;
    assert_eq!(cache_status(&cached), "HIT");

    import(
        &app,
        dish("15 Bean Soup", "15-bean-soup", "main"),
        vec![
            dish("Cornbread", "cornbread", "side"),
            dish("Coleslaw", "coleslaw", "side"),
        ],
    )
    .await;

    let response = send(&app, get("/dishes/15-bean-soup/pairings")).await;
    assert_eq!(cache_status(&response), "MISS");
    let body = extract_json(response).await;
    let sides = body["data"]["side_dishes"].as_array().unwrap();
    assert_eq!(sides.len(), 2);
    assert_eq!(sides[1]["name"], "Coleslaw");
    assert_eq!(sides[1]["order_position"], 2);
}

// =============================================================================
// Slug resolution and redirects
// =============================================================================

#[tokio::test]
async fn test_unknown_dish_is_404() {
    let (app, _) = setup_app().await;

    let response = send(&app, get("/dishes/lasagna")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert!(body["error"]["message"].is_string());

    let response = send(&app, get("/dishes/lasagna/pairings")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_non_canonical_slug_redirects() {
    let (app, _) = setup_app().await;
    seed_bean_soup(&app).await;

    let response = send(&app, get("/dishes/Cornbread")).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "/dishes/cornbread");

    let response = send(&app, get("/api/dishes/the-cornbread/pairings")).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "/api/dishes/cornbread/pairings");

    let prefixed = format!("/dishes/{}15-bean-soup/pairings", DEFAULT_LEGACY_PREFIX);
    let response = send(&app, get(&prefixed)).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "/dishes/15-bean-soup/pairings");
}

#[tokio::test]
async fn test_similar_dish_suggestion_redirect() {
    let (app, _) = setup_app().await;
    seed_bean_soup(&app).await;

    let response = send(&app, get("/dishes/corn/pairings")).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "/dishes/cornbread/pairings");
    assert_eq!(response.headers()["x-slug-resolution"], "suggestion");
}

#[tokio::test]
async fn test_legacy_routed_path() {
    let (app, _) = setup_app().await;
    seed_bean_soup(&app).await;

    let legacy = format!("/{}15-bean-soup", DEFAULT_LEGACY_PREFIX);
    let response = send(&app, get(&legacy)).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "/dishes/15-bean-soup/pairings");
    assert!(response.headers().get("x-slug-resolution").is_none());

    // Even a canonical slug on the legacy route is moved
    let response = send(&app, get("/cornbread")).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&response), "/dishes/cornbread/pairings");

    let missing = format!("/{}lasagna", DEFAULT_LEGACY_PREFIX);
    let response = send(&app, get(&missing)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Search, listing, categories, popular
// =============================================================================

#[tokio::test]
async fn test_search_short_query_is_400() {
    let (app, _) = setup_app().await;

    for uri in ["/search?q=s", "/search", "/api/search?q=%20s%20"] {
        let response = send(&app, get(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body = extract_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_search_ranking_and_pagination() {
    let (app, _) = setup_app().await;
    import(
        &app,
        dish("Soup", "soup", "main"),
        vec![
            dish("Souper Salad", "souper-salad", "side"),
            dish("Bean Soup", "bean-soup", "side"),
        ],
    )
    .await;

    let response = send(&app, get("/search?q=Soup&page=1&limit=2")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), "MISS");

    let body = extract_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["pagination"], json!({ "page": 1, "limit": 2, "total": 3 }));
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Soup", "Bean Soup"]);

    let response = send(&app, get("/search?q=soup&page=1&limit=2")).await;
    assert_eq!(cache_status(&response), "HIT");
}

#[tokio::test]
async fn test_list_dishes_and_categories() {
    let (app, _) = setup_app().await;
    seed_bean_soup(&app).await;

    let response = send(&app, get("/dishes?type=side")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["dishes"][0]["slug"], "cornbread");

    let response = send(&app, get("/dishes?limit=500")).await;
    let body = extract_json(response).await;
    assert_eq!(body["total"], 2);

    let response = send(&app, get("/dishes?type=entree")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, get("/dishes?limit=abc")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, get("/categories")).await;
    let body = extract_json(response).await;
    assert_eq!(body["data"], json!(["main", "side"]));
}

#[tokio::test]
async fn test_popular_dishes() {
    let (app, state) = setup_app().await;
    let imported = seed_bean_soup(&app).await;
    let main_id = imported["main_dish_id"].as_i64().unwrap();

    state.popularity.record_view(main_id).await.unwrap();
    state.popularity.record_view(main_id).await.unwrap();

    let response = send(&app, get("/dishes/popular?limit=5")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response).await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["slug"], "15-bean-soup");
    assert_eq!(data[0]["view_count"], 2);
}

// =============================================================================
// Error handling
// =============================================================================

#[tokio::test]
async fn test_store_failure_is_sanitized_500() {
    let (app, state) = setup_app().await;
    seed_bean_soup(&app).await;

    sqlx::query("DROP TABLE pairings")
        .execute(state.repo.pool())
        .await
        .unwrap();

    let response = send(&app, get("/dishes/15-bean-soup/pairings")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = extract_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(!message.contains("pairings"), "internal detail leaked: {message}");
}
