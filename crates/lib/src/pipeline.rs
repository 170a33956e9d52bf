//! Wiring of the core: platform bus, local channel, delivery router and intercept gate.

use std::sync::Arc;

use crate::channels::{LocalChannel, LOCAL_SMS_RECEIVED_ACTION};
use crate::config::{self, Config};
use crate::gate::InterceptGate;
use crate::permissions::PermissionChecker;
use crate::platform::SystemBroadcasts;
use crate::routing::DeliveryRouter;
use crate::ui::UiHandle;

/// Shared handles to the core components. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    /// System-wide registrations (process lifetime).
    pub platform: Arc<SystemBroadcasts>,
    /// In-process channel (tracks UI visibility).
    pub channel: Arc<LocalChannel>,
    pub router: Arc<DeliveryRouter>,
    pub gate: Arc<InterceptGate>,
    pub permissions: Arc<dyn PermissionChecker>,
}

impl Pipeline {
    /// Build a pipeline publishing channel events under the default local action.
    pub fn new(permissions: Arc<dyn PermissionChecker>, ui: UiHandle) -> Self {
        Self::with_local_action(permissions, ui, LOCAL_SMS_RECEIVED_ACTION)
    }

    pub fn with_local_action(
        permissions: Arc<dyn PermissionChecker>,
        ui: UiHandle,
        local_action: impl Into<String>,
    ) -> Self {
        let channel = Arc::new(LocalChannel::new());
        let router =
            Arc::new(DeliveryRouter::new(Arc::clone(&channel), ui).with_local_action(local_action));
        let gate = Arc::new(InterceptGate::new(Arc::clone(&permissions), Arc::clone(&router)));
        Self {
            platform: Arc::new(SystemBroadcasts::new()),
            channel,
            router,
            gate,
            permissions,
        }
    }

    /// Build from config (local action resolved with env override).
    pub fn from_config(config: &Config, permissions: Arc<dyn PermissionChecker>, ui: UiHandle) -> Self {
        Self::with_local_action(permissions, ui, config::resolve_local_action(config))
    }

    pub fn local_action(&self) -> &str {
        self.router.local_action()
    }
}
