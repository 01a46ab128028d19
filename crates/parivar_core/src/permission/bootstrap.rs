//! First-run permission bootstrap flow.
//!
//! # Responsibility
//! - Request camera, microphone, and location access sequentially; treat
//!   internet as always granted.
//! - Persist the resulting 4-valued summary and report what is still not
//!   granted for one consolidated alert.
//!
//! # Invariants
//! - Requests run at most once per app session.
//! - Once a persisted summary shows all four granted, bootstrap never prompts
//!   again.
//! - A failing individual request leaves that capability at its
//!   previous/undetermined value and never aborts the others.

use crate::permission::capability::{
    DeviceCapability, PermissionStatus, PermissionSummary, BOOTSTRAP_ORDER,
};
use crate::store::kv_store::KeyValueStore;
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;

/// Fixed local-storage key for the persisted permission summary.
pub const PERMISSION_STORAGE_KEY: &str = "permission_summary";

/// Platform prompt seam.
///
/// Implementations surface the OS permission dialog and report its result; a
/// returned error string means the platform call itself failed.
#[async_trait]
pub trait PermissionHost: Send + Sync {
    async fn request(&self, capability: DeviceCapability) -> Result<PermissionStatus, String>;
}

/// Consolidated bootstrap result for the hosting UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOutcome {
    pub summary: PermissionSummary,
    /// Whether this call actually surfaced platform prompts.
    pub prompted: bool,
    /// Denied or undetermined capabilities, for the single alert. Empty means
    /// no alert.
    pub pending: Vec<DeviceCapability>,
}

/// Coordinates the three permission prompts against persisted state.
pub struct PermissionBootstrap<H, K>
where
    H: PermissionHost,
    K: KeyValueStore,
{
    host: Arc<H>,
    local: Arc<K>,
    requested_this_session: bool,
}

impl<H, K> PermissionBootstrap<H, K>
where
    H: PermissionHost,
    K: KeyValueStore,
{
    pub fn new(host: Arc<H>, local: Arc<K>) -> Self {
        Self {
            host,
            local,
            requested_this_session: false,
        }
    }

    /// Runs the bootstrap once per session.
    ///
    /// Skips entirely when a persisted summary already shows all four
    /// capabilities granted, or when this session has prompted before.
    /// Never errors: persistence and platform failures degrade and are
    /// logged only.
    pub async fn run(&mut self) -> BootstrapOutcome {
        let mut summary = self.load_summary().await;

        if summary.all_granted() {
            info!("event=permission_bootstrap module=permission status=skipped reason=all_granted");
            return BootstrapOutcome {
                summary,
                prompted: false,
                pending: Vec::new(),
            };
        }

        if self.requested_this_session {
            info!(
                "event=permission_bootstrap module=permission status=skipped reason=already_requested"
            );
            let pending = summary.pending();
            return BootstrapOutcome {
                summary,
                prompted: false,
                pending,
            };
        }
        self.requested_this_session = true;

        for capability in BOOTSTRAP_ORDER {
            let capability = *capability;
            if capability == DeviceCapability::Internet {
                summary.set_status(capability, PermissionStatus::Granted);
                continue;
            }
            if summary.status_of(capability).is_granted() {
                continue;
            }

            match self.host.request(capability).await {
                Ok(status) => {
                    summary.set_status(capability, status);
                    info!(
                        "event=permission_request module=permission status=ok capability={capability} result={}",
                        status.as_str()
                    );
                }
                Err(err) => {
                    // Keep the previous/undetermined value; the remaining
                    // prompts still run.
                    warn!(
                        "event=permission_request module=permission status=error capability={capability} error={err}"
                    );
                }
            }
        }

        self.persist_summary(&summary).await;

        let pending = summary.pending();
        info!(
            "event=permission_bootstrap module=permission status=ok pending_count={}",
            pending.len()
        );
        BootstrapOutcome {
            summary,
            prompted: true,
            pending,
        }
    }

    async fn load_summary(&self) -> PermissionSummary {
        match self.local.get(PERMISSION_STORAGE_KEY).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(summary) => summary,
                Err(err) => {
                    warn!(
                        "event=permission_load module=permission status=fallback reason=unreadable error={err}"
                    );
                    PermissionSummary::default()
                }
            },
            Ok(None) => PermissionSummary::default(),
            Err(err) => {
                warn!(
                    "event=permission_load module=permission status=fallback reason=read_failed error={err}"
                );
                PermissionSummary::default()
            }
        }
    }

    async fn persist_summary(&self, summary: &PermissionSummary) {
        match serde_json::to_string(summary) {
            Ok(payload) => {
                if let Err(err) = self.local.set(PERMISSION_STORAGE_KEY, &payload).await {
                    warn!(
                        "event=permission_persist module=permission status=error error={err}"
                    );
                }
            }
            Err(err) => {
                warn!("event=permission_persist module=permission status=error error={err}");
            }
        }
    }
}
