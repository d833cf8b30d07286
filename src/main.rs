//! Klusterlet Addon Operator
//!
//! ## Usage
//!
//! ```bash
//! # Run the operator (requires kubeconfig)
//! klusterlet-addon-operator
//!
//! # Run with debug logs in plain text
//! RUST_LOG=debug klusterlet-addon-operator --log-format text
//! ```

use clap::Parser;
use klusterlet_addon_operator::config::{LogFormat, OperatorConfig};
use klusterlet_addon_operator::leader_election::{self, LeaderElector};
use klusterlet_addon_operator::AddonController;
use kube::Client;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = OperatorConfig::parse();
    init_tracing(config.log_format);
    config.validate()?;

    info!("Starting Klusterlet Addon Operator");
    info!("Leader election: {}", config.leader_election);
    let watch_namespace = config.watch_namespace();
    info!(
        "Watching namespace: {}",
        watch_namespace.as_deref().unwrap_or("all")
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    // Leader election: acquire the lease before starting the controller
    let elector = if config.leader_election {
        let ns = leader_election::detect_namespace(&config.leader_election_namespace);
        info!("Leader election namespace: {}", ns);
        let elector = LeaderElector::new(client.clone(), &ns, &config.leader_election_lease_name);
        elector.acquire().await?;
        Some(Arc::new(elector))
    } else {
        None
    };

    let addon_controller = Arc::new(AddonController::new(
        client.clone(),
        watch_namespace,
        config.error_requeue(),
    ));

    let addon_handle = {
        let controller = Arc::clone(&addon_controller);
        tokio::spawn(async move {
            if let Err(e) = controller.run().await {
                error!("Addon controller error: {}", e);
            }
        })
    };

    // Periodic lease renewal (pending forever when leader election is disabled)
    let elector_for_renew = elector.clone();
    let renew_handle = tokio::spawn(async move {
        match elector_for_renew {
            Some(e) => loop {
                tokio::time::sleep(e.renew_interval()).await;
                match e.renew().await {
                    Ok(true) => {}
                    Ok(false) => {
                        error!("Lost leader lease");
                        break;
                    }
                    Err(err) => {
                        error!("Failed to renew leader lease: {}", err);
                        break;
                    }
                }
            },
            None => std::future::pending::<()>().await,
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = addon_handle => {
            if let Err(e) = result {
                error!("Addon controller task failed: {}", e);
            }
        }
        _ = renew_handle => {
            error!("Leader lease lost, initiating shutdown");
        }
    }

    // Release the lease so a standby replica can take over immediately
    if let Some(e) = &elector {
        e.release().await;
    }

    info!("Klusterlet Addon Operator shutting down");
    Ok(())
}
