//! Tests for the Roboflow client against a local HTTP server.
//!
//! Tests cover:
//! - Retrying server errors up to the configured attempt count
//! - Surfacing the final status when attempts run out
//! - Rejecting success responses that are not prediction JSON

use actix_web::{App, HttpResponse, HttpServer, web};
use backend::config::DetectionConfig;
use backend::detection::roboflow_service::{
    DetectionService, DetectionServiceError, RoboflowService,
};
use std::sync::atomic::{AtomicUsize, Ordering};

const PREDICTIONS: &str = r#"{"predictions":[{"x":50,"y":50,"width":20,"height":10,"class":"cavity","confidence":0.75}]}"#;
const HTML_PAGE: &str = "<html><body>Service maintenance</body></html>";

/// Scripted detection endpoint: the first `failures` calls answer 503.
struct Endpoint {
    failures: usize,
    success_body: &'static str,
    calls: AtomicUsize,
}

impl Endpoint {
    fn new(failures: usize, success_body: &'static str) -> Self {
        Self {
            failures,
            success_body,
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn detect_handler(endpoint: web::Data<Endpoint>, _body: web::Bytes) -> HttpResponse {
    let call = endpoint.calls.fetch_add(1, Ordering::SeqCst);
    if call < endpoint.failures {
        HttpResponse::ServiceUnavailable().body("model is loading")
    } else {
        HttpResponse::Ok()
            .content_type("application/json")
            .body(endpoint.success_body)
    }
}

/// Starts the endpoint on an ephemeral port and returns its URL.
fn serve(endpoint: web::Data<Endpoint>) -> String {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(endpoint.clone())
            .route("/adr/6", web::post().to(detect_handler))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .expect("bind test server");
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}/adr/6", addr)
}

fn client(endpoint_url: String, max_attempts: u32) -> RoboflowService {
    let config = DetectionConfig {
        endpoint: endpoint_url,
        api_key: "test-key".to_string(),
        timeout_secs: 5,
        max_attempts,
        retry_backoff_ms: 10,
        ..DetectionConfig::default()
    };
    RoboflowService::new(&config).expect("build client")
}

#[actix_web::test]
async fn test_server_error_is_retried_until_success() {
    let endpoint = web::Data::new(Endpoint::new(1, PREDICTIONS));
    let service = client(serve(endpoint.clone()), 2);

    let detections = service.detect(b"\x89PNG fake").await.expect("second attempt succeeds");

    assert_eq!(endpoint.call_count(), 2);
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class, "cavity");
}

#[actix_web::test]
async fn test_single_attempt_surfaces_status() {
    let endpoint = web::Data::new(Endpoint::new(1, PREDICTIONS));
    let service = client(serve(endpoint.clone()), 1);

    let result = service.detect(b"\x89PNG fake").await;

    assert!(matches!(
        result,
        Err(DetectionServiceError::Status { status: 503, .. })
    ));
    assert_eq!(endpoint.call_count(), 1);
}

#[actix_web::test]
async fn test_attempts_are_bounded() {
    let endpoint = web::Data::new(Endpoint::new(10, PREDICTIONS));
    let service = client(serve(endpoint.clone()), 3);

    let result = service.detect(b"\x89PNG fake").await;

    assert!(matches!(
        result,
        Err(DetectionServiceError::Status { status: 503, .. })
    ));
    assert_eq!(endpoint.call_count(), 3);
}

#[actix_web::test]
async fn test_html_success_body_is_malformed() {
    let endpoint = web::Data::new(Endpoint::new(0, HTML_PAGE));
    let service = client(serve(endpoint.clone()), 3);

    let result = service.detect(b"\x89PNG fake").await;

    assert!(matches!(
        result,
        Err(DetectionServiceError::MalformedResponse(_))
    ));
    assert_eq!(endpoint.call_count(), 1);
}
