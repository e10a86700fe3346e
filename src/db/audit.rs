use crate::types::{AuditEvent, Result};
use crate::utils::config::AuditConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::turso::TursoAuditLog;

/// Sink for answered requests.
///
/// Recording happens off the request path, so implementations may be slow
/// but must never affect the answer returned to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<()>;

    /// Attach user feedback to an earlier answer. Returns `false` when the
    /// request is unknown or feedback was already recorded.
    async fn record_feedback(&self, _request_id: &str, _helpful: bool) -> Result<bool> {
        Ok(false)
    }
}

/// Audit log that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditLog;

#[async_trait]
impl AuditLog for NoopAuditLog {
    async fn record(&self, _event: &AuditEvent) -> Result<()> {
        Ok(())
    }
}

/// Open the configured audit log. A database that cannot be opened is
/// logged and replaced by [`NoopAuditLog`] so the service still starts.
pub async fn open_audit_log(config: &AuditConfig, auth_token: Option<String>) -> Arc<dyn AuditLog> {
    if !config.enabled {
        info!("Audit log disabled");
        return Arc::new(NoopAuditLog);
    }

    let opened = if config.is_remote() {
        TursoAuditLog::new_remote(config.url.clone(), auth_token.unwrap_or_default()).await
    } else {
        TursoAuditLog::new_local(&config.url).await
    };

    match opened {
        Ok(log) => {
            info!(url = %config.url, "Audit log ready");
            Arc::new(log)
        }
        Err(e) => {
            warn!(url = %config.url, error = %e, "Audit log unavailable, answers will not be recorded");
            Arc::new(NoopAuditLog)
        }
    }
}
