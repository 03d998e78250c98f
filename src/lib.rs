#[macro_use]
extern crate rocket;

pub mod auth;
pub mod browser;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod llm;
pub mod mail;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod persistence;
pub mod quota;
pub mod request_logger;
pub mod router;
pub mod routes;
pub mod runtime;
pub mod tailoring;

use std::sync::Arc;

use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};

use crate::browser::HttpBrowserClient;
use crate::config::AppConfig;
use crate::db::OrchestratorDb;
use crate::lifecycle::LifecycleController;
use crate::llm::HttpLlmGateway;
use crate::monitor::ResponseMonitor;
use crate::notify::NotificationDispatcher;
use crate::persistence::{
    ApplicationsRepo, EmailLogsRepo, JobsRepo, NotificationsRepo, UsageEventsRepo, UsersRepo,
    WorkItemsRepo,
};
use crate::quota::QuotaService;
use crate::request_logger::RequestLogger;
use crate::router::SubmissionRouter;
use crate::runtime::JobRuntime;

static LOGGER: std::sync::Once = std::sync::Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();
    log::info!("starting apply-orchestrator");

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![
                Method::Get,
                Method::Post,
                Method::Put,
                Method::Delete,
                Method::Patch,
            ]
            .into_iter()
            .map(From::from)
            .collect(),
        )
        .allow_credentials(true)
        .to_cors()
        .expect("error creating CORS fairing");

    rocket::build()
        .attach(RequestLogger)
        .attach(OrchestratorDb::init())
        .attach(cors)
        .attach(AdHoc::try_on_ignite("Run Migrations", |rocket| async move {
            match OrchestratorDb::fetch(&rocket) {
                Some(db) => {
                    let pool = (**db).clone();
                    match sqlx::migrate!("./migrations").run(&pool).await {
                        Ok(_) => {
                            log::info!("database migrations successful");
                            Ok(rocket)
                        }
                        Err(e) => {
                            log::error!("database migrations failed: {e}");
                            Err(rocket)
                        }
                    }
                }
                None => {
                    log::error!("database pool not available for migrations");
                    Err(rocket)
                }
            }
        }))
        .attach(AdHoc::try_on_ignite("Wire Orchestrator State", |rocket| {
            Box::pin(async move {
                let pool = match OrchestratorDb::fetch(&rocket) {
                    Some(db) => (**db).clone(),
                    None => {
                        log::error!("database pool not available for application state");
                        return Err(rocket);
                    }
                };

                let config = match AppConfig::from_env() {
                    Ok(config) => config,
                    Err(err) => {
                        log::error!("failed to load configuration: {err}");
                        return Err(rocket);
                    }
                };

                let http_client = reqwest::Client::new();

                let applications = ApplicationsRepo::new(pool.clone());
                let jobs = JobsRepo::new(pool.clone());
                let users = UsersRepo::new(pool.clone());
                let email_logs = EmailLogsRepo::new(pool.clone());
                let notifications_repo = NotificationsRepo::new(pool.clone());
                let usage_events = UsageEventsRepo::new(pool.clone());
                let work_items = WorkItemsRepo::new(pool.clone());

                let notifications = Arc::new(NotificationDispatcher::new(notifications_repo));
                let lifecycle = Arc::new(LifecycleController::new(applications, notifications.clone()));
                let quota = Arc::new(QuotaService::new(usage_events));

                let llm: Arc<dyn llm::LlmGateway> =
                    Arc::new(HttpLlmGateway::new(http_client.clone(), config.llm.clone()));
                let browser: Arc<dyn browser::BrowserAutomationClient> =
                    Arc::new(HttpBrowserClient::new(http_client.clone(), config.browser.clone()));

                let monitor = Arc::new(ResponseMonitor::new(lifecycle.clone()));

                let submission_router = Arc::new(SubmissionRouter::new(
                    jobs.clone(),
                    users.clone(),
                    email_logs,
                    work_items.clone(),
                    lifecycle.clone(),
                    quota.clone(),
                ));

                let runtime = Arc::new(JobRuntime::new(
                    work_items,
                    jobs.clone(),
                    users.clone(),
                    lifecycle.clone(),
                    monitor.clone(),
                    notifications.clone(),
                    quota.clone(),
                    browser.clone(),
                    llm.clone(),
                    config.mail.clone(),
                    http_client.clone(),
                    config.job_runtime.clone(),
                ));

                Ok(rocket
                    .manage(pool)
                    .manage(config.mail.clone())
                    .manage(config)
                    .manage(jobs)
                    .manage(users)
                    .manage(http_client)
                    .manage(lifecycle)
                    .manage(monitor)
                    .manage(quota)
                    .manage(notifications)
                    .manage(llm)
                    .manage(browser)
                    .manage(submission_router)
                    .manage(runtime))
            })
        }))
        .attach(AdHoc::on_liftoff("Spawn Background Job Runtime", |rocket| {
            Box::pin(async move {
                if let Some(runtime) = rocket.state::<Arc<JobRuntime>>() {
                    runtime.clone().spawn();
                } else {
                    log::error!("job runtime unavailable; background dispatch not started");
                }
            })
        }))
        .mount(
            "/api/v1",
            openapi_get_routes![
                routes::health::live_health,
                routes::health::ready_health,
                routes::jobs::create_job,
                routes::jobs::get_job,
                routes::applications::create_application,
                routes::applications::get_application,
                routes::applications::list_applications,
                routes::applications::transition_application,
                routes::applications::submit_application,
                routes::applications::probe_application,
                routes::applications::update_notes,
                routes::applications::update_priority,
                routes::applications::set_follow_up,
                routes::applications::add_task,
                routes::applications::complete_task,
                routes::applications::delete_application,
                routes::applications::follow_ups_needed,
                routes::applications::upcoming_interviews,
                routes::applications::application_stats,
            ],
        )
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Apply Orchestrator API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

/// Ephemeral-Postgres test harness for integration tests that need a live
/// database, built on a stock `postgres` testcontainers image.
#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use log::LevelFilter;
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
    use sqlx::{ConnectOptions, PgPool};
    use testcontainers_modules::postgres::Postgres;
    use testcontainers_modules::testcontainers::core::error::TestcontainersError;
    use testcontainers_modules::testcontainers::runners::AsyncRunner;
    use testcontainers_modules::testcontainers::ContainerAsync;
    use thiserror::Error;

    static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

    #[derive(Debug, Error)]
    pub enum TestDatabaseError {
        #[error("database error: {0}")]
        Sqlx(#[from] sqlx::Error),
        #[error("migration error: {0}")]
        Migration(#[from] sqlx::migrate::MigrateError),
        #[error("container error: {0}")]
        Container(#[from] TestcontainersError),
    }

    /// Ephemeral database factory for integration tests: launches a
    /// disposable Postgres container, connects, and runs migrations.
    pub struct TestDatabase {
        pool: PgPool,
        _container: ContainerAsync<Postgres>,
    }

    impl TestDatabase {
        pub async fn new() -> Result<Self, TestDatabaseError> {
            let container = Postgres::default().start().await?;
            let host = container.get_host().await?.to_string();
            let port = container.get_host_port_ipv4(5432).await?;
            let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

            let options: PgConnectOptions = url.parse().map_err(TestDatabaseError::Sqlx)?;
            let options = options.log_statements(LevelFilter::Off);

            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await
                .map_err(TestDatabaseError::Sqlx)?;

            MIGRATOR.run(&pool).await?;

            Ok(Self {
                pool,
                _container: container,
            })
        }

        pub fn pool(&self) -> &PgPool {
            &self.pool
        }

        pub fn pool_clone(&self) -> PgPool {
            self.pool.clone()
        }
    }

    /// Builder for constructing Rocket instances tailored for integration
    /// tests: random port, logging disabled, routes and a pool mounted
    /// explicitly rather than through the full `rocket()` fairing chain.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
    }

    impl TestRocketBuilder {
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                mounts: Vec::new(),
                pg_pool: None,
            }
        }

        /// Mount routes under an arbitrary base, e.g. `/api/v1`.
        pub fn mount_routes(mut self, base: &str, routes: Vec<Route>) -> Self {
            self.mounts.push((base.to_string(), routes));
            self
        }

        /// Manage a `PgPool` instance for tests that exercise database-backed
        /// routes.
        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }

            rocket
        }

        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
