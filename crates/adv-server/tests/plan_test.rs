//! End-to-end plan tests against a running server and live upstream services.
//!
//! Run with: cargo test --test plan_test -- --ignored
//! Requires a running adv-server (and reachable routing/Overpass endpoints).

use reqwest::Client;

fn base_url() -> String {
    std::env::var("ADV_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

#[tokio::test]
#[ignore]
async fn plan_returns_coordinates_between_endpoints() {
    let client = Client::new();
    let response = client
        .post(format!("{}/v1/plan", base_url()))
        .json(&serde_json::json!({
            "start": {"lat": 46.020, "lon": 7.745},
            "end": {"lat": 46.230, "lon": 7.360}
        }))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();

    let coordinates = body["coordinates"].as_array().unwrap();
    assert!(coordinates.len() >= 2);
    assert!(body["distance_m"].as_f64().unwrap() > 0.0);
    assert!(body["corridor"]["area_km2"].as_f64().unwrap() > 0.0);
    assert!(body["evidence"].as_array().is_some());
}

#[tokio::test]
#[ignore]
async fn oversized_bbox_override_is_ignored_not_rejected() {
    let client = Client::new();
    let response = client
        .post(format!("{}/v1/plan", base_url()))
        .json(&serde_json::json!({
            "start": {"lat": 46.020, "lon": 7.745},
            "end": {"lat": 46.230, "lon": 7.360},
            "bbox": [40.0, 0.0, 50.0, 20.0]
        }))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    // The huge override must be replaced by the computed corridor.
    assert!(body["corridor"]["area_km2"].as_f64().unwrap() < 100_000.0);
}
