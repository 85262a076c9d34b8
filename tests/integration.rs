use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use parcel_tracker::api::rest::router;
use parcel_tracker::clock::SystemClock;
use parcel_tracker::engine::registry::{ParcelRegistry, SequentialTrackingNumbers};
use parcel_tracker::identity::{IdentityContext, JwtClaims, JwtVerifier};
use parcel_tracker::state::AppState;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &[u8] = b"integration-secret";

fn setup() -> axum::Router {
    let clock = Arc::new(SystemClock);
    let registry = ParcelRegistry::new(
        Box::new(SequentialTrackingNumbers::new("TRK")),
        clock.clone(),
        8,
    );
    let identity = IdentityContext::new(Arc::new(JwtVerifier::new(SECRET)), clock);
    router(Arc::new(AppState::new(registry, identity, 1024)))
}

fn token_with(sub: &str, role: &str, exp_offset: Duration, extra: impl FnOnce(&mut JwtClaims)) -> String {
    let mut claims = JwtClaims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + exp_offset).timestamp(),
        name: None,
        email: None,
        phone: None,
        region: None,
    };
    extra(&mut claims);
    JwtVerifier::new(SECRET).issue(&claims).unwrap()
}

fn token(sub: &str, role: &str) -> String {
    token_with(sub, role, Duration::hours(1), |_| {})
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn booking_payload() -> Value {
    json!({
        "description": "Ceramic vase",
        "weight": "2.5",
        "declared_value": "100",
        "priority": "STANDARD",
        "receiver_name": "Bea Receiver",
        "receiver_phone": "+49 40 5550100",
        "receiver_email": "bea@example.com",
        "pickup": {
            "street": "12 Harbour Rd",
            "city": "Hamburg",
            "region": "Hamburg",
            "country": "DE",
            "postal_code": "20095"
        },
        "delivery": {
            "street": "3 Garden Way",
            "city": "Munich",
            "region": "Bavaria",
            "country": "DE",
            "postal_code": "80331"
        },
        "special_instructions": "Fragile"
    })
}

async fn book(app: &axum::Router, sender_token: &str) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/parcels/book",
            Some(sender_token),
            booking_payload(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn set_status(app: &axum::Router, token: &str, id: &str, status: &str) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/parcels/{id}/status"),
            Some(token),
            json!({ "status": status }),
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["parcels"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("parcels_registered"));
}

#[tokio::test]
async fn booking_returns_pending_parcel_with_derived_fields() {
    let app = setup();
    let before = Utc::now();
    let body = book(&app, &token("alice", "CUSTOMER")).await;

    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["priority"], "STANDARD");
    assert_eq!(body["sender"]["user_id"], "alice");
    assert!(body["tracking_number"].as_str().unwrap().starts_with("TRK-"));

    let cost: Decimal = body["shipping_cost"].as_str().unwrap().parse().unwrap();
    assert_eq!(cost, Decimal::new(1100, 2));

    let eta: chrono::DateTime<Utc> = body["estimated_delivery_date"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(eta >= before + Duration::days(5));
    assert!(eta <= Utc::now() + Duration::days(7));
    assert!(body["actual_delivery_date"].is_null());
}

#[tokio::test]
async fn booking_without_token_returns_401() {
    let app = setup();
    let response = app
        .oneshot(json_request("POST", "/api/parcels/book", None, booking_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Unauthenticated");
}

#[tokio::test]
async fn expired_token_returns_401() {
    let app = setup();
    let expired = token_with("alice", "CUSTOMER", Duration::minutes(-5), |_| {});
    let response = app
        .oneshot(get_request("/api/parcels/sent", Some(&expired)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_with_zero_weight_returns_400() {
    let app = setup();
    let mut payload = booking_payload();
    payload["weight"] = json!("0");

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/parcels/book",
            Some(&token("alice", "CUSTOMER")),
            payload,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "ValidationError");
}

#[tokio::test]
async fn booking_with_unknown_priority_returns_400() {
    let app = setup();
    let mut payload = booking_payload();
    payload["priority"] = json!("WARP");

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/parcels/book",
            Some(&token("alice", "CUSTOMER")),
            payload,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn customer_cannot_update_own_parcel() {
    let app = setup();
    let alice = token("alice", "CUSTOMER");
    let parcel = book(&app, &alice).await;
    let id = parcel["id"].as_str().unwrap();

    let response = set_status(&app, &alice, id, "CONFIRMED").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Forbidden");
}

#[tokio::test]
async fn staff_replay_of_transition_returns_422() {
    let app = setup();
    let parcel = book(&app, &token("alice", "CUSTOMER")).await;
    let id = parcel["id"].as_str().unwrap();
    let staff = token("staff-1", "STAFF");

    let response = set_status(&app, &staff, id, "CONFIRMED").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = set_status(&app, &staff, id, "PICKED_UP").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "PICKED_UP");

    let response = set_status(&app, &staff, id, "PICKED_UP").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "InvalidTransition");
    assert_eq!(body["current"], "PICKED_UP");
    assert_eq!(body["requested"], "PICKED_UP");
}

#[tokio::test]
async fn update_of_unknown_parcel_returns_404() {
    let app = setup();
    let response = set_status(
        &app,
        &token("staff-1", "STAFF"),
        "00000000-0000-0000-0000-000000000000",
        "CONFIRMED",
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_delivery_flow_records_history() {
    let app = setup();
    let alice = token("alice", "CUSTOMER");
    let parcel = book(&app, &alice).await;
    let id = parcel["id"].as_str().unwrap();
    let staff = token("staff-1", "STAFF");

    for status in ["CONFIRMED", "PICKED_UP", "IN_TRANSIT", "OUT_FOR_DELIVERY"] {
        let response = set_status(&app, &staff, id, status).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/tracking/parcel/{id}/update"),
            Some(&staff),
            json!({ "status": "DELIVERED", "location": "Front door", "description": "Left with neighbour" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let event = body_json(response).await;
    assert_eq!(event["sequence"], 6);
    assert_eq!(event["location"], "Front door");
    assert_eq!(event["updated_by"], "staff-1");

    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/tracking/parcel/{id}"), Some(&alice)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history = body_json(response).await;
    let statuses: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|event| event["status"].as_str().unwrap())
        .collect();
    assert_eq!(
        statuses,
        vec![
            "PENDING",
            "CONFIRMED",
            "PICKED_UP",
            "IN_TRANSIT",
            "OUT_FOR_DELIVERY",
            "DELIVERED"
        ]
    );

    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/parcels/{id}"), Some(&alice)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["status"], "DELIVERED");
    assert!(body["actual_delivery_date"].is_string());

    let response = set_status(&app, &staff, id, "RETURNED").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn stranger_cannot_read_parcel_or_history() {
    let app = setup();
    let parcel = book(&app, &token("alice", "CUSTOMER")).await;
    let id = parcel["id"].as_str().unwrap();
    let mallory = token("mallory", "CUSTOMER");

    let response = app
        .clone()
        .oneshot(get_request(&format!("/api/parcels/{id}"), Some(&mallory)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(get_request(&format!("/api/tracking/parcel/{id}"), Some(&mallory)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn public_tracking_is_minimized() {
    let app = setup();
    let parcel = book(
        &app,
        &token_with("alice", "CUSTOMER", Duration::hours(1), |claims| {
            claims.email = Some("alice@example.com".to_string());
        }),
    )
    .await;
    let tracking_number = parcel["tracking_number"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(get_request(
            &format!("/api/tracking/public/{tracking_number}"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let raw = body_string(response).await;
    for secret in [
        "declared_value",
        "alice@example.com",
        "bea@example.com",
        "+49 40",
        "12 Harbour Rd",
        "receiver",
        "sender",
        "updated_by",
    ] {
        assert!(!raw.contains(secret), "public view leaked {secret}: {raw}");
    }

    let body: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(body["parcel"]["status"], "PENDING");
    assert_eq!(body["parcel"]["origin"], "Hamburg, DE");
    assert_eq!(body["parcel"]["destination"], "Munich, DE");
    assert_eq!(body["history"].as_array().unwrap().len(), 1);
    assert_eq!(body["history"][0]["status"], "PENDING");
}

#[tokio::test]
async fn public_tracking_with_token_is_still_minimized() {
    let app = setup();
    let admin = token("root", "ADMIN");
    let parcel = book(&app, &token("alice", "CUSTOMER")).await;
    let tracking_number = parcel["tracking_number"].as_str().unwrap();

    let response = app
        .oneshot(get_request(
            &format!("/api/tracking/public/{tracking_number}"),
            Some(&admin),
        ))
        .await
        .unwrap();
    let raw = body_string(response).await;
    assert!(!raw.contains("declared_value"));
    assert!(!raw.contains("bea@example.com"));
}

#[tokio::test]
async fn public_tracking_unknown_returns_404() {
    let app = setup();
    let response = app
        .oneshot(get_request("/api/tracking/public/TRK-UNKNOWN", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn receiver_sees_parcel_by_email_claim() {
    let app = setup();
    book(&app, &token("alice", "CUSTOMER")).await;
    let bea = token_with("bea", "CUSTOMER", Duration::hours(1), |claims| {
        claims.email = Some("Bea@Example.com".to_string());
    });

    let response = app
        .clone()
        .oneshot(get_request("/api/parcels/received", Some(&bea)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(get_request("/api/parcels/sent", Some(&bea)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 0);

    let response = app
        .oneshot(get_request("/api/tracking/user/parcels", Some(&bea)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let overview = body_json(response).await;
    assert_eq!(overview.as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn my_parcels_lists_newest_first() {
    let app = setup();
    let alice = token("alice", "CUSTOMER");
    let first = book(&app, &alice).await;
    let second = book(&app, &alice).await;

    let response = app
        .oneshot(get_request("/api/parcels/my-parcels", Some(&alice)))
        .await
        .unwrap();
    let list = body_json(response).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"], second["id"]);
    assert_eq!(list[1]["id"], first["id"]);
}

#[tokio::test]
async fn listing_all_is_privileged_and_scoped() {
    let app = setup();
    book(&app, &token("alice", "CUSTOMER")).await;

    let response = app
        .clone()
        .oneshot(get_request("/api/parcels/all", Some(&token("alice", "CUSTOMER"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(get_request("/api/parcels/all", Some(&token("root", "ADMIN"))))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let bavarian_staff = token_with("staff-1", "STAFF", Duration::hours(1), |claims| {
        claims.region = Some("Bavaria".to_string());
    });
    let response = app
        .clone()
        .oneshot(get_request("/api/parcels/status/PENDING", Some(&bavarian_staff)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

    let berlin_staff = token_with("staff-2", "STAFF", Duration::hours(1), |claims| {
        claims.region = Some("Berlin".to_string());
    });
    let response = app
        .oneshot(get_request("/api/parcels/all", Some(&berlin_staff)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn malformed_booking_body_returns_validation_error() {
    let app = setup();
    let alice = token("alice", "CUSTOMER");

    let mut payload = booking_payload();
    payload["weight"] = json!("abc");
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/parcels/book", Some(&alice), payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "ValidationError");
    assert!(body["message"].as_str().unwrap().contains("weight"));
}

#[tokio::test]
async fn non_uuid_parcel_id_returns_validation_error() {
    let app = setup();
    let staff = token("staff-1", "STAFF");

    let response = app
        .clone()
        .oneshot(get_request("/api/parcels/not-a-uuid", Some(&staff)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "ValidationError");

    let response = app
        .oneshot(get_request("/api/tracking/parcel/not-a-uuid", Some(&staff)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "ValidationError");
}

#[tokio::test]
async fn status_update_without_json_content_type_returns_validation_error() {
    let app = setup();
    let alice = token("alice", "CUSTOMER");
    let staff = token("staff-1", "STAFF");
    let id = book(&app, &alice).await["id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/api/parcels/{id}/status"))
        .header("authorization", format!("Bearer {staff}"))
        .body(Body::from(r#"{"status":"CONFIRMED"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "ValidationError");
}

#[tokio::test]
async fn customer_tracking_update_is_forbidden_even_without_location() {
    let app = setup();
    let alice = token("alice", "CUSTOMER");
    let id = book(&app, &alice).await["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/tracking/parcel/{id}/update"),
            Some(&alice),
            json!({ "status": "CONFIRMED" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Forbidden");
}
