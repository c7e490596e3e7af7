use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, app_with, pattern, Recorded, Recorder};
use tower::ServiceExt;

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

// --- fixed routes ---

#[tokio::test]
async fn ok_returns_hello() {
    let resp = app().oneshot(get("/ok")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(&body_bytes(resp).await[..], b"hello");
}

#[tokio::test]
async fn head_ok_has_no_body() {
    let resp = app()
        .oneshot(Request::builder().method("HEAD").uri("/ok").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn missing_returns_404_with_body() {
    let resp = app().oneshot(get("/missing")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(&body_bytes(resp).await[..], b"no such resource");
}

#[tokio::test]
async fn fail_returns_500() {
    let resp = app().oneshot(get("/fail")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn no_content_is_empty() {
    let resp = app().oneshot(get("/no-content")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn bytes_returns_the_pattern() {
    let resp = app().oneshot(get("/bytes/1000")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await.to_vec(), pattern(1000));
}

#[tokio::test]
async fn bytes_rejects_non_numeric_length() {
    let resp = app().oneshot(get("/bytes/lots")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- echo and recording ---

#[tokio::test]
async fn echo_reflects_method_query_headers_and_body() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/echo?a=1&b=x+y")
                .header("x-first", "1")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(r#"{"k":"v"}"#.to_string())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let echoed: Recorded = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(echoed.method, "PUT");
    assert_eq!(echoed.uri, "/echo?a=1&b=x+y");
    assert_eq!(echoed.header("X-First"), Some("1"));
    assert_eq!(echoed.body, r#"{"k":"v"}"#);
}

#[tokio::test]
async fn every_request_is_recorded_in_order() {
    let recorder = Recorder::default();
    let app = app_with(recorder.clone());
    app.clone().oneshot(get("/ok")).await.unwrap();
    app.clone().oneshot(get("/missing")).await.unwrap();
    app.oneshot(get("/echo?z=26")).await.unwrap();

    let seen = recorder.lock().unwrap();
    let uris: Vec<&str> = seen.iter().map(|r| r.uri.as_str()).collect();
    assert_eq!(uris, vec!["/ok", "/missing", "/echo?z=26"]);
}

#[tokio::test]
async fn unknown_route_is_404_and_not_recorded() {
    let recorder = Recorder::default();
    let resp = app_with(recorder.clone()).oneshot(get("/nowhere")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(recorder.lock().unwrap().is_empty());
}
