//! Device connection supervision
//!
//! The controller owns at most one supervised session task at a time. The task
//! dials, runs the session and dials again whenever the session ends for any
//! reason other than teardown.

use crate::accessor::CommandSender;
use eiscp_core::Command;
use eiscp_session::{
    dial, ConnectionSession, InboundHandler, SessionConfig, SessionLink, SessionState,
    SessionStatistics,
};
use eiscp_transport::{DeviceAddress, TcpSettings};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Connection status as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerStatus {
    Connected,
    Disconnected,
}

/// Running session task and the handle to stop it
struct Supervisor {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    link: SessionLink,
}

/// Owns the lifecycle of the single device connection
pub struct GatewayController {
    config: SessionConfig,
    handler: Arc<dyn InboundHandler>,
    lifecycle: Mutex<Option<Supervisor>>,
    current: RwLock<Option<SessionLink>>,
}

impl GatewayController {
    pub fn new(config: SessionConfig, handler: Arc<dyn InboundHandler>) -> Self {
        Self {
            config,
            handler,
            lifecycle: Mutex::new(None),
            current: RwLock::new(None),
        }
    }

    /// Connected once a session to the current device is up
    pub fn status(&self) -> ControllerStatus {
        match self.link() {
            Some(link) if link.is_connected() => ControllerStatus::Connected,
            _ => ControllerStatus::Disconnected,
        }
    }

    /// Link to the current device, if one is configured
    pub fn link(&self) -> Option<SessionLink> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Counters for the current device link
    pub fn statistics(&self) -> Option<SessionStatistics> {
        self.link().map(|link| link.statistics())
    }

    /// Switch to the device at `address`
    ///
    /// Any running session is torn down first, and this waits until its task
    /// has finished. Returns once the new session task is spawned, without
    /// waiting for the dial. Cached properties are kept until the new device
    /// overwrites them.
    pub async fn set_device(&self, address: DeviceAddress) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.teardown(&mut lifecycle).await;

        let link = SessionLink::new(address.clone(), self.config.model.clone());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(supervise(
            link.clone(),
            self.config.clone(),
            self.handler.clone(),
            cancel.clone(),
        ));
        self.publish(Some(link.clone()));
        *lifecycle = Some(Supervisor { cancel, task, link });
        log::info!("Switched device to {}", address);
    }

    /// Tear down the running session, with no replacement
    pub async fn disconnect(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        self.teardown(&mut lifecycle).await;
    }

    async fn teardown(&self, lifecycle: &mut Option<Supervisor>) {
        let Some(supervisor) = lifecycle.take() else {
            return;
        };
        self.publish(None);
        supervisor.cancel.cancel();
        if let Err(e) = supervisor.task.await {
            log::error!("Session task for {} failed: {}", supervisor.link.address(), e);
        }
        log::info!("Disconnected from {}", supervisor.link.address());
    }

    fn publish(&self, link: Option<SessionLink>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = link;
    }
}

impl CommandSender for GatewayController {
    fn send(&self, command: &Command) -> bool {
        match self.link() {
            Some(link) => link.send(command),
            None => {
                log::warn!("No device configured, dropping {}", command);
                false
            }
        }
    }
}

impl Drop for GatewayController {
    fn drop(&mut self) {
        if let Some(supervisor) = self.lifecycle.get_mut() {
            supervisor.cancel.cancel();
        }
    }
}

/// Dial, run and redial until cancelled
async fn supervise(
    link: SessionLink,
    config: SessionConfig,
    handler: Arc<dyn InboundHandler>,
    cancel: CancellationToken,
) {
    let settings = TcpSettings {
        address: link.address().clone(),
        connect_timeout: config.connect_timeout,
    };

    loop {
        if let Err(e) = link.transition(SessionState::Connecting) {
            log::error!("Cannot dial {}: {}", link.address(), e);
            return;
        }
        let Some((reader, writer)) = dial(&settings, config.dial_backoff, &cancel).await else {
            if let Err(e) = link.transition(SessionState::Disconnected) {
                log::error!("Link to {}: {}", link.address(), e);
            }
            return;
        };

        let session =
            ConnectionSession::new(reader, writer, link.clone(), config.clone(), handler.clone());
        let exit = session.run(&cancel).await;
        if !exit.should_redial() {
            return;
        }
        log::info!("Reconnecting to {}", link.address());
    }
}
