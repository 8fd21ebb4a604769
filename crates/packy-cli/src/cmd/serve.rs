use std::sync::Arc;

use anyhow::Context;
use packy_core::config::WarnLevel;
use packy_core::notify::NullSink;
use packy_core::{CycleScheduler, NotifySink, PackageStore};
use packy_notify::Notifier;
use packy_server::AppState;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::settings::{self, Overrides};
use std::path::Path;

pub fn run(path: &Path, overrides: Overrides) -> anyhow::Result<()> {
    let config = settings::load(path, overrides)?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => warn!("{}", w.message),
            WarnLevel::Error => error!("{}", w.message),
        }
    }
    config.ensure_valid()?;
    let schedule = config.schedule()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let db = config.db_path();
        let store = Arc::new(
            PackageStore::open(&db)
                .with_context(|| format!("failed to open package store {}", db.display()))?,
        );

        let notifier = Notifier::from_config(&config)?;
        let sink: Arc<dyn NotifySink> = if notifier.is_enabled() {
            Arc::new(notifier)
        } else {
            warn!("neither apprise nor irc-framework is configured; notifications are disabled");
            Arc::new(NullSink)
        };

        let scheduler = Arc::new(CycleScheduler::new(&config, store.clone(), sink));
        scheduler.startup().await?;

        let app_state = AppState::new(&config, store, scheduler.state());
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port()))
            .await
            .with_context(|| format!("failed to bind port {}", config.port()))?;

        let (stop_tx, stop_rx) = watch::channel(());
        let cron = tokio::spawn(
            scheduler
                .clone()
                .run_forever(schedule, stopped(stop_rx.clone())),
        );
        let mut server = tokio::spawn(packy_server::serve_on(
            app_state,
            listener,
            stopped(stop_rx),
        ));

        tokio::select! {
            joined = &mut server => {
                let _ = stop_tx.send(());
                cron.await?;
                return joined?;
            }
            _ = shutdown_signal() => info!("shutdown requested"),
        }

        let _ = stop_tx.send(());
        server.await??;
        cron.await?;
        if scheduler.is_running() {
            warn!("exiting with a cycle in flight; flags are normalized on next start");
        }
        Ok(())
    })
}

async fn stopped(mut rx: watch::Receiver<()>) {
    let _ = rx.changed().await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
