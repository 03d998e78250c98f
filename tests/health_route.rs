use apply_orchestrator::routes::health::{HealthStatus, live_health};
use apply_orchestrator::test_support::TestRocketBuilder;
use rocket::http::Status;
use rocket::routes;

#[test]
fn health_endpoint_returns_ok() {
    let client = TestRocketBuilder::new()
        .mount_routes("/api/v1", routes![live_health])
        .blocking_client();

    let response = client.get("/api/v1/health/live").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let payload: HealthStatus = response.into_json().expect("valid JSON payload");
    assert_eq!(payload.status, "ok");
}
