//! Command-line and environment configuration for the operator binary.

use crate::error::{OperatorError, Result};
use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

/// Klusterlet addon operator
#[derive(Parser, Debug, Clone)]
#[command(name = "klusterlet-addon-operator")]
#[command(version, about = "Tracks install progress and liveness of managed-cluster addons")]
pub struct OperatorConfig {
    /// Enable leader election for HA deployments
    #[arg(long, env = "LEADER_ELECTION", default_value = "false")]
    pub leader_election: bool,

    /// Namespace for the leader election Lease (auto-detected if empty)
    #[arg(long, env = "LEADER_ELECTION_NAMESPACE", default_value = "")]
    pub leader_election_namespace: String,

    /// Name of the leader election Lease
    #[arg(
        long,
        env = "LEADER_ELECTION_LEASE_NAME",
        default_value = "klusterlet-addon-operator-leader"
    )]
    pub leader_election_lease_name: String,

    /// Namespace to watch (empty for all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "")]
    pub namespace: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Seconds to wait before retrying a failed reconcile
    #[arg(long, env = "ERROR_REQUEUE_SECONDS", default_value_t = 30)]
    pub error_requeue_seconds: u64,
}

impl OperatorConfig {
    /// Reject settings the operator cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.error_requeue_seconds == 0 {
            return Err(OperatorError::Configuration(
                "error requeue interval must be positive".to_string(),
            ));
        }
        if self.leader_election && self.leader_election_lease_name.is_empty() {
            return Err(OperatorError::Configuration(
                "leader election lease name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Watched namespace, or `None` for all namespaces.
    pub fn watch_namespace(&self) -> Option<String> {
        (!self.namespace.is_empty()).then(|| self.namespace.clone())
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_seconds)
    }
}
