//! Reusable server runtime.
//!
//! [`ServerHandle`] owns the full lifecycle: storage, migrations, lot
//! seeding, the payment gateway client, the REST API, the poll sweep task
//! and graceful shutdown.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::{
    start_poll_sweep_task, LotService, ParkingService, PaymentGateway, ReconciliationService,
    SignatureVerifier,
};
use crate::config::AppConfig;
use crate::domain::RepositoryProvider;
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::{
    init_database, HmacWebhookVerifier, HttpPaymentGateway, InMemoryRepositoryProvider,
    SeaOrmRepositoryProvider,
};
use crate::interfaces::http::modules::metrics::describe_metrics;
use crate::interfaces::http::{create_api_router, AppState};
use crate::notifications::{create_event_bus, start_event_audit_task, SharedEventBus};
use crate::shared::clock::SystemClock;
use crate::shared::shutdown::{listen_for_shutdown_signals, ShutdownSignal};

/// `database.url` value selecting the in-memory store.
pub const MEMORY_DATABASE_URL: &str = "memory";

pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
    /// Install the global Prometheus recorder and serve `/metrics`
    /// (default: true).
    pub metrics: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
            metrics: true,
        }
    }
}

/// Handle to a running parking service.
pub struct ServerHandle {
    pub repos: Arc<dyn RepositoryProvider>,
    pub parking: Arc<ParkingService>,
    pub reconciler: Arc<ReconciliationService>,
    pub event_bus: SharedEventBus,
    pub config: AppConfig,
    /// Address the REST API is bound to. Differs from the configured one
    /// when port 0 was requested.
    pub local_addr: SocketAddr,

    db: Option<DatabaseConnection>,
    shutdown: ShutdownSignal,
    api_task: JoinHandle<()>,
    sweep_task: Option<JoinHandle<()>>,
    audit_task: JoinHandle<()>,
}

/// The global recorder can only be installed once per process; restarts
/// within the same process reuse it.
fn prometheus_handle() -> Option<PrometheusHandle> {
    static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                describe_metrics();
                info!("📊 Prometheus metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                warn!("Prometheus recorder not installed, /metrics disabled: {}", e);
                None
            }
        })
        .clone()
}

impl ServerHandle {
    /// Start the service:
    ///
    /// 1. Install the Prometheus recorder
    /// 2. Open the store and run migrations
    /// 3. Seed lots from config when the store has none
    /// 4. Wire the gateway client, webhook verifier and services
    /// 5. Start the poll sweep and the REST API
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let config = opts.config;
        config.validate()?;

        info!("Starting parking service...");

        let prometheus = if opts.metrics {
            prometheus_handle()
        } else {
            None
        };

        // ── Storage ────────────────────────────────────────────
        let (repos, db): (Arc<dyn RepositoryProvider>, Option<DatabaseConnection>) =
            if config.database.url == MEMORY_DATABASE_URL {
                warn!("Using the in-memory store, nothing survives a restart");
                (Arc::new(InMemoryRepositoryProvider::new()), None)
            } else {
                let db = init_database(&config.database).await?;
                if opts.auto_migrate {
                    info!("Running database migrations...");
                    Migrator::up(&db, None).await?;
                    info!("Migrations completed");
                }
                (Arc::new(SeaOrmRepositoryProvider::new(db.clone())), Some(db))
            };

        seed_lots(&LotService::new(repos.clone()), &config).await?;

        // ── Gateway & services ─────────────────────────────────
        let gateway: Arc<dyn PaymentGateway> =
            Arc::new(HttpPaymentGateway::new(config.gateway.http())?);
        let verifier: Arc<dyn SignatureVerifier> =
            Arc::new(HmacWebhookVerifier::new(&config.webhook.secret)?);
        let clock = Arc::new(SystemClock);
        let event_bus = create_event_bus();

        let parking = Arc::new(
            ParkingService::new(repos.clone(), gateway.clone(), clock.clone(), event_bus.clone())
                .with_billing(config.billing.clone())
                .with_retry(config.gateway.retry()),
        );
        let reconciler = Arc::new(ReconciliationService::new(
            repos.clone(),
            gateway,
            verifier,
            clock,
            event_bus.clone(),
        ));
        info!(
            rate_policy = ?config.billing.rate_policy,
            minimum_minutes = config.billing.minimum_minutes,
            "Billing configured"
        );

        let shutdown = ShutdownSignal::new();

        // ── Background tasks ───────────────────────────────────
        let audit_task = start_event_audit_task(&event_bus, shutdown.clone());
        let sweep_task = match config.reconciliation.poll_interval_secs {
            0 => {
                info!("Payment poll sweep disabled");
                None
            }
            secs => Some(start_poll_sweep_task(
                reconciler.clone(),
                shutdown.clone(),
                Duration::from_secs(secs),
            )),
        };

        // ── REST API ───────────────────────────────────────────
        let state = AppState {
            parking: parking.clone(),
            reconciler: reconciler.clone(),
            phone: Arc::new(config.phone.clone()),
            signature_header: Arc::from(config.webhook.signature_header.to_ascii_lowercase()),
            db: db.clone(),
            started_at: Arc::new(Instant::now()),
        };
        let router = create_api_router(state, prometheus);

        let listener = tokio::net::TcpListener::bind(config.server.address()).await?;
        let local_addr = listener.local_addr()?;
        info!("REST API listening on http://{}", local_addr);
        info!("Swagger UI available at http://{}/docs/", local_addr);

        let api_shutdown = shutdown.clone();
        let api_server = axum::serve(listener, router).with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("🛑 REST API received shutdown signal");
        });
        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        info!("🚀 Parking service started");

        Ok(Self {
            repos,
            parking,
            reconciler,
            event_bus,
            config,
            local_addr,
            db,
            shutdown,
            api_task,
            sweep_task,
            audit_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Trigger shutdown on SIGTERM / SIGINT.
    pub fn install_signal_handler(&self) {
        tokio::spawn(listen_for_shutdown_signals(self.shutdown.clone()));
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Wait for every task to stop once shutdown has been triggered. In-flight
    /// requests get `server.shutdown_timeout` seconds to finish.
    pub async fn wait(self) {
        self.shutdown.wait().await;
        info!("⏳ Waiting for server tasks to complete...");

        let grace = Duration::from_secs(self.config.server.shutdown_timeout);
        let abort = self.api_task.abort_handle();
        match tokio::time::timeout(grace, self.api_task).await {
            Ok(Ok(())) => info!("REST API stopped"),
            Ok(Err(e)) => error!("REST API task panicked: {}", e),
            Err(_) => {
                warn!("REST API did not drain within {}s, aborting", grace.as_secs());
                abort.abort();
            }
        }

        if let Some(task) = self.sweep_task {
            if let Err(e) = task.await {
                error!("Poll sweep task panicked: {}", e);
            }
        }

        if let Err(e) = self.audit_task.await {
            error!("Event audit task panicked: {}", e);
        }

        if let Some(db) = self.db {
            if let Err(e) = db.close().await {
                warn!("Error closing database connection: {}", e);
            } else {
                info!("✅ Database connection closed");
            }
        }

        info!("👋 Parking service shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("🛑 Shutting down parking service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

/// Create the configured lots if the store has none yet.
async fn seed_lots(lots: &LotService, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.lots.is_empty() || !lots.list_lots().await?.is_empty() {
        return Ok(());
    }
    let now = Utc::now();
    for seed in &config.lots {
        lots.create_lot(&seed.name, seed.slots, seed.rate_per_minute, now)
            .await?;
    }
    info!("🌱 Seeded {} parking lot(s) from configuration", config.lots.len());
    Ok(())
}

/// Initialize tracing from the application config.
///
/// Call once at process startup, before [`ServerHandle::start`]. `RUST_LOG`
/// takes precedence over `logging.level`.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
