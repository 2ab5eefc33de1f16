//! Detection of server-side session expiry.
//!
//! Every outbound request resolves through [`SessionGuard::call`]. An authentication
//! failure is never retried: the guard emits one [`SessionEvent::Expired`] for the host
//! shell to act on (send the user back to the login screen) and hands
//! [`Error::AuthExpired`] back to the caller so it can abandon whatever it was doing.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
  Expired,
}

#[derive(Debug, Clone)]
pub struct SessionGuard {
  events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionGuard {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { events: tx }, rx)
  }

  /// Await `request`, signalling expiry if it failed with an authentication error.
  pub async fn call<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
    let result = request.await;
    if let Err(Error::AuthExpired) = &result {
      warn!("session: request rejected as unauthenticated");
      // The receiver only goes away when the app is shutting down.
      let _ = self.events.send(SessionEvent::Expired);
    }
    result
  }

  /// Start probing the session every `interval`.
  ///
  /// `probe` should perform one cheap authenticated request through this guard. Only an
  /// expired session stops the probe; network trouble is logged and the next tick tries
  /// again.
  pub fn spawn_liveness<F, Fut>(&self, interval: Duration, probe: F) -> LivenessProbe
  where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
  {
    let handle = tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      // The first tick completes immediately; the session was just checked by login.
      ticker.tick().await;
      loop {
        ticker.tick().await;
        match probe().await {
          Ok(()) => debug!("session: liveness ok"),
          Err(Error::AuthExpired) => break,
          Err(e) => debug!(err = %e, "session: liveness probe failed, will retry on next tick"),
        }
      }
      debug!("session: liveness probe stopped");
    });
    LivenessProbe { handle }
  }
}

/// Handle to a running liveness probe. Dropping it stops the probe.
#[derive(Debug)]
pub struct LivenessProbe {
  handle: JoinHandle<()>,
}

impl LivenessProbe {
  #[cfg(test)]
  pub fn is_running(&self) -> bool {
    !self.handle.is_finished()
  }
}

impl Drop for LivenessProbe {
  fn drop(&mut self) {
    self.handle.abort();
  }
}
