use plinth::api;
use plinth::config::Config;
use plinth::console::{AppContext, Kernel};
use plinth::db;
use plinth::jobs::{JobStore, JobsRepo, Queue, QueueConfig};
use plinth::telemetry;

use std::sync::Arc;
use tracing::{error, info};

mod handlers;
use handlers::build_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env()?;
    telemetry::init(cfg.log_format);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("console") {
        return run_console(cfg, &args[1..]).await;
    }

    serve(cfg).await
}

async fn run_console(cfg: Config, args: &[String]) -> anyhow::Result<()> {
    let ctx = Arc::new(AppContext::new(cfg, build_registry()));
    // Application commands go in the closure.
    let kernel = Kernel::with_defaults(ctx, |_kernel| {});
    kernel.run(args).await
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    info!(
        workers = cfg.queue_workers,
        poll_interval_ms = cfg.poll_interval.as_millis() as u64,
        admin_addr = cfg.admin_addr.as_deref().unwrap_or("disabled"),
        migrate_on_startup = cfg.migrate_on_startup,
        "app starting"
    );

    let pool = db::make_pool(&cfg).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let registry = build_registry();
    let store: Arc<dyn JobStore> = Arc::new(JobsRepo::new(pool.clone()));

    let queue = Queue::new(
        store.clone(),
        registry.clone(),
        QueueConfig {
            poll_interval: cfg.poll_interval,
        },
    );
    let workers = queue.start(cfg.queue_workers);

    // ---- API task ----
    let app = api::router(api::ApiState { store, registry });
    let api_addr = cfg.admin_addr.clone();
    let api_handle = tokio::spawn(async move {
        if let Some(addr) = api_addr {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(%addr, "admin api listening");
            axum::serve(listener, app).await?;
        } else {
            std::future::pending::<()>().await;
        }
        Ok::<(), anyhow::Error>(())
    });

    let result = tokio::select! {
        res = api_handle => match res {
            Ok(inner) => inner,
            Err(e) => Err(e.into()),
        },
        res = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            res.map_err(Into::into)
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "server stopped with error");
    }

    workers.shutdown().await;
    pool.close().await;
    result
}
