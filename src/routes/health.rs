use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Serialize, JsonSchema)]
pub struct HealthStatus {
    pub status: &'static str,
}

/// Liveness: the process is up and handling requests.
#[openapi(tag = "Health")]
#[get("/health/live")]
pub fn live_health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "ok" })
}

/// Readiness: the database is reachable.
#[openapi(tag = "Health")]
#[get("/health/ready")]
pub async fn ready_health(pool: &State<PgPool>) -> Json<HealthStatus> {
    match sqlx::query("SELECT 1").execute(pool.inner()).await {
        Ok(_) => Json(HealthStatus { status: "ok" }),
        Err(e) => {
            log::warn!("readiness check failed: {e}");
            Json(HealthStatus { status: "degraded" })
        }
    }
}
