use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

#[tokio::test]
async fn livez_returns_ok() {
    let app = lbb_api::create_router(lbb_api::test_state("test-key"));

    let response = app
        .oneshot(Request::builder().uri("/livez").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn unsigned_search_is_rejected() {
    let app = lbb_api::create_router(lbb_api::test_state("test-key"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/company/?commune_id=83137&rome_codes=N4403")
                .header("x-request-id", "smoke-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["message"], "missing argument: user");
    assert_eq!(json["request_id"], "smoke-1");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = lbb_api::create_router(lbb_api::test_state("test-key"));

    let response = app
        .oneshot(Request::builder().uri("/api/v2/company/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
