//! Lifecycle host: ties the platform registration and the channel subscription to a UI surface.
//!
//! create → platform registered; resume (with permissions) → channel registered; pause → channel
//! removed; destroy → everything removed. Every removal tolerates "not registered".

use std::sync::Arc;

use crate::channels::{LocalReceiver, SubscriptionId};
use crate::permissions::{self, Permission, REQUIRED_PERMISSIONS};
use crate::pipeline::Pipeline;
use crate::platform::{RegistrationId, SMS_RECEIVED_ACTION};
use crate::routing::MessageListener;

/// Which of the two registrations are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverLifecycleState {
    Inactive,
    PlatformRegistered,
    PlatformAndChannelRegistered,
}

/// Registrations owned on behalf of one UI surface.
pub struct ReceiverHost {
    pipeline: Pipeline,
    listener: Arc<dyn MessageListener>,
    local_receiver: Arc<dyn LocalReceiver>,
    required: Vec<Permission>,
    platform_registration: Option<RegistrationId>,
    channel_subscription: Option<SubscriptionId>,
}

impl ReceiverHost {
    /// `listener` becomes the direct listener on create; `local_receiver` subscribes to the channel on resume.
    pub fn new(
        pipeline: Pipeline,
        listener: Arc<dyn MessageListener>,
        local_receiver: Arc<dyn LocalReceiver>,
    ) -> Self {
        Self {
            pipeline,
            listener,
            local_receiver,
            required: REQUIRED_PERMISSIONS.to_vec(),
            platform_registration: None,
            channel_subscription: None,
        }
    }

    /// Permissions that must all be granted before the channel is set up.
    pub fn with_required(mut self, required: impl IntoIterator<Item = Permission>) -> Self {
        self.required = required.into_iter().collect();
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn state(&self) -> ReceiverLifecycleState {
        match (self.platform_registration, self.channel_subscription) {
            (None, _) => ReceiverLifecycleState::Inactive,
            (Some(_), None) => ReceiverLifecycleState::PlatformRegistered,
            (Some(_), Some(_)) => ReceiverLifecycleState::PlatformAndChannelRegistered,
        }
    }

    pub fn has_required_permissions(&self) -> bool {
        permissions::has_all(self.pipeline.permissions.as_ref(), &self.required)
    }

    pub fn missing_permissions(&self) -> Vec<Permission> {
        permissions::missing_permissions(self.pipeline.permissions.as_ref(), &self.required)
    }

    /// Attach the direct listener and register the gate for SMS broadcasts.
    pub fn on_create(&mut self) {
        self.pipeline.router.set_listener(Arc::clone(&self.listener));
        if self.platform_registration.is_none() {
            let id = self
                .pipeline
                .platform
                .register(SMS_RECEIVED_ACTION, self.pipeline.gate.clone());
            self.platform_registration = Some(id);
            log::info!("sms receiver registered for {}", SMS_RECEIVED_ACTION);
        }
    }

    /// Set up the channel subscription if permissions allow.
    pub fn on_resume(&mut self) -> bool {
        if !self.has_required_permissions() {
            log::debug!("resume: required permissions missing, channel not set up");
            return false;
        }
        self.setup_channel()
    }

    /// Called once the permission request round has granted everything.
    pub fn on_permissions_granted(&mut self) -> bool {
        self.setup_channel()
    }

    /// Wait for deliveries already queued on the UI context. Call before `on_pause` or
    /// `on_destroy` when the loop runs elsewhere and queued events should still reach the channel.
    pub async fn flush_deliveries(&self) -> bool {
        self.pipeline.router.flush().await
    }

    /// Remove the channel subscription, if any.
    pub fn on_pause(&mut self) {
        self.teardown_channel();
    }

    /// Remove both registrations and detach the listener.
    pub fn on_destroy(&mut self) {
        if let Some(id) = self.platform_registration.take() {
            if !self.pipeline.platform.unregister(id) {
                log::debug!("sms receiver was already unregistered");
            }
        }
        self.teardown_channel();
        self.pipeline.router.clear_listener();
        log::info!("receivers released");
    }

    fn setup_channel(&mut self) -> bool {
        if self.platform_registration.is_none() {
            log::warn!("cannot set up local receiver before the sms receiver is registered");
            return false;
        }
        if !self.has_required_permissions() {
            log::error!("cannot setup SMS receiver - missing permissions");
            return false;
        }
        if self.channel_subscription.is_none() {
            let action = self.pipeline.local_action().to_string();
            let id = self
                .pipeline
                .channel
                .register(action.as_str(), Arc::clone(&self.local_receiver));
            self.channel_subscription = Some(id);
            log::debug!("local broadcast receiver registered for {}", action);
        }
        true
    }

    fn teardown_channel(&mut self) {
        match self.channel_subscription.take() {
            Some(id) => {
                self.pipeline.channel.unregister(id);
                log::debug!("local broadcast receiver unregistered");
            }
            None => log::debug!("local broadcast receiver not registered, nothing to remove"),
        }
    }
}
