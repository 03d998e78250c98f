use rocket_db_pools::{Database, sqlx};

#[derive(Database)]
#[database("orchestrator_db")]
pub struct OrchestratorDb(sqlx::PgPool);
