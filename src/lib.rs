#[macro_use]
extern crate rocket;

pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod slack;
pub mod sync;

use crate::db::ArchiveDb;
use crate::slack::{SlackApi, SlackConfig};
use crate::sync::{ArchiveError, PgArchiveStore, Scheduler, SyncConfig};
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket, Shutdown};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_db_pools::sqlx::PgPool;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::convert::Infallible;
use std::future::Future;
use std::sync::{Arc, Once, OnceLock};

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Fatal scheduler error, shared between the background task and `main`.
///
/// The server shuts down gracefully when ingestion dies; this is how the
/// hosting process learns it must still exit with a failure status.
#[derive(Debug, Clone, Default)]
pub struct SchedulerOutcome(Arc<OnceLock<String>>);

impl SchedulerOutcome {
    pub fn record(&self, reason: impl ToString) {
        let _ = self.0.set(reason.to_string());
    }

    pub fn failure(&self) -> Option<&str> {
        self.0.get().map(String::as_str)
    }
}

/// Drive the scheduler until it fails, then record why and stop the server.
pub async fn supervise<F>(outcome: SchedulerOutcome, shutdown: Shutdown, run: F)
where
    F: Future<Output = Result<Infallible, ArchiveError>>,
{
    if let Err(err) = run.await {
        log::error!("archive scheduler stopped: {}", err);
        outcome.record(&err);
        shutdown.notify();
    }
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(vec![Method::Get].into_iter().map(From::from).collect())
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(ArchiveDb::init())
        .attach(cors)
        // Run database migrations on startup
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match ArchiveDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        match sync::run_migrations(&pool).await {
                            Ok(_) => {
                                log::info!("database migrations successful");
                                Ok(rocket)
                            }
                            Err(e) => {
                                log::error!("database migrations failed: {}", e);
                                Err(rocket)
                            }
                        }
                    }
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::try_on_ignite(
            "Manage DB Pool and Archive Config",
            |rocket| async move {
                let slack_config = match SlackConfig::from_env() {
                    Ok(config) => config,
                    Err(err) => {
                        log::error!("invalid slack configuration: {}", err);
                        return Err(rocket);
                    }
                };
                let sync_config = SyncConfig::from_env();

                match ArchiveDb::fetch(&rocket) {
                    Some(db) => {
                        let pool = (**db).clone();
                        Ok(rocket
                            .manage(pool)
                            .manage(slack_config)
                            .manage(sync_config)
                            .manage(SchedulerOutcome::default()))
                    }
                    None => Err(rocket),
                }
            },
        ))
        // Spawn the ingestion scheduler in background
        .attach(AdHoc::on_liftoff("Spawn Archive Scheduler", |rocket| {
            Box::pin(async move {
                let (Some(pool), Some(slack_config), Some(sync_config), Some(outcome)) = (
                    rocket.state::<PgPool>(),
                    rocket.state::<SlackConfig>(),
                    rocket.state::<SyncConfig>(),
                    rocket.state::<SchedulerOutcome>(),
                ) else {
                    log::error!("failed to spawn archive scheduler: managed state not found");
                    return;
                };

                let api = match SlackApi::from_config(slack_config) {
                    Ok(api) => api,
                    Err(err) => {
                        log::error!("failed to build slack client: {}", err);
                        outcome.record(&err);
                        rocket.shutdown().notify();
                        return;
                    }
                };
                let store = PgArchiveStore::new(pool.clone());
                let scheduler = Scheduler::new(store, api, sync_config.clone());
                log::info!("starting archive scheduler");
                tokio::spawn(supervise(
                    outcome.clone(),
                    rocket.shutdown(),
                    scheduler.run(),
                ));
            })
        }))
        .mount(
            "/api/v1",
            openapi_get_routes![
                routes::health::health_check,
                routes::backfill::backfill_status,
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
                    spec_urls: vec![UrlObject::new("Slack Archive API", "../../v1/openapi.json")],
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

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::PgPool;

    pub use database::{TestDatabase, TestDatabaseError};

    pub mod database {
        use crate::sync::MIGRATOR;
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::{GenericImage, ImageExt, core::WaitFor};
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use uuid::Uuid;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral migrated database for integration tests.
        ///
        /// Uses `TEST_DATABASE_URL` when set, otherwise launches a disposable
        /// Postgres container. Every instance gets its own database.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            _container: Option<ContainerAsync<GenericImage>>,
        }

        impl TestDatabase {
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                match std::env::var("TEST_DATABASE_URL") {
                    Ok(url) => Self::with_admin_url(&url, None).await,
                    Err(_) => Self::with_container().await,
                }
            }

            async fn with_container() -> Result<Self, TestDatabaseError> {
                let container = GenericImage::new("postgres", "16-alpine")
                    .with_wait_for(WaitFor::message_on_stderr(
                        "database system is ready to accept connections",
                    ))
                    .with_env_var("POSTGRES_DB", "postgres")
                    .with_env_var("POSTGRES_USER", "postgres")
                    .with_env_var("POSTGRES_PASSWORD", "postgres")
                    .start()
                    .await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                Self::with_admin_url(&admin_url, Some(container)).await
            }

            async fn with_admin_url(
                admin_url: &str,
                container: Option<ContainerAsync<GenericImage>>,
            ) -> Result<Self, TestDatabaseError> {
                let base_options: PgConnectOptions = admin_url.parse()?;
                let base_options = base_options.log_statements(LevelFilter::Off);
                let admin_options = base_options.clone().database("postgres");

                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let database_name = format!("slack_archive_{}", Uuid::new_v4().simple());
                let create_sql = format!("CREATE DATABASE \"{}\" TEMPLATE template0", database_name);
                sqlx::query(&create_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.database(&database_name))
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name,
                    _container: container,
                })
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(self.admin_options.clone())
                    .await?;
                let drop_sql = format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", self.database_name);
                sqlx::query(&drop_sql).execute(&admin_pool).await?;
                admin_pool.close().await;

                Ok(())
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
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

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

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
