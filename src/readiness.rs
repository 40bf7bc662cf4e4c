//! TCP readiness gate for freshly created and existing proxy instances.
//!
//! An instance counts as ready once its proxy daemon accepts a TCP
//! connection. The gate blocks until every target is ready or the shared
//! deadline passes; it never reports partial readiness.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

/// Overall time budget for a readiness wait.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(600);
/// Time allowed for a single connection attempt.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);
/// Pause between failed connection attempts.
pub const DEFAULT_PAUSE: Duration = Duration::from_secs(1);

/// Errors raised while waiting for readiness.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ReadinessError {
    /// Raised when a target does not accept connections before the deadline.
    #[error("timed out after {}s waiting for {target} to accept connections", waited.as_secs())]
    Timeout {
        /// First target that was still unreachable.
        target: SocketAddr,
        /// Deadline that was exceeded.
        waited: Duration,
    },
}

/// Future returned by readiness probes.
pub type ReadinessFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ReadinessError>> + Send + 'a>>;

/// Blocks until a set of TCP endpoints accept connections.
pub trait ReadinessProbe {
    /// Resolves once every target accepted a connection.
    fn wait_until_ready<'a>(&'a self, targets: &'a [SocketAddr]) -> ReadinessFuture<'a>;
}

/// Polls targets with plain TCP connects.
#[derive(Clone, Debug)]
pub struct TcpReadinessGate {
    deadline: Duration,
    wait: Duration,
    pause: Duration,
}

impl Default for TcpReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpReadinessGate {
    /// Creates a gate with the default deadline, wait and pause.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            wait: DEFAULT_WAIT,
            pause: DEFAULT_PAUSE,
        }
    }

    /// Overrides the overall deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Overrides the per-attempt connect timeout.
    #[must_use]
    pub const fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Overrides the pause between failed attempts.
    #[must_use]
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    async fn wait_for_target(&self, target: SocketAddr, deadline: Instant) -> bool {
        while Instant::now() <= deadline {
            let connect = timeout(self.wait, TcpStream::connect(target)).await;
            if matches!(connect, Ok(Ok(_))) {
                debug!(%target, "target accepted connection");
                return true;
            }
            sleep(self.pause).await;
        }
        false
    }
}

impl ReadinessProbe for TcpReadinessGate {
    fn wait_until_ready<'a>(&'a self, targets: &'a [SocketAddr]) -> ReadinessFuture<'a> {
        Box::pin(async move {
            if targets.is_empty() {
                return Ok(());
            }
            info!(count = targets.len(), "waiting for proxies to accept connections");
            let deadline = Instant::now() + self.deadline;
            for target in targets {
                if !self.wait_for_target(*target, deadline).await {
                    return Err(ReadinessError::Timeout {
                        target: *target,
                        waited: self.deadline,
                    });
                }
            }
            Ok(())
        })
    }
}
