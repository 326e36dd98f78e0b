//! Background connect worker (`spec.md` section 4.4 "Connect worker" and section 9 "Background
//! connect worker").
//!
//! One task per server: resolve the host to an address list, try `connect()` against each
//! address in turn, optionally perform a TLS handshake, then publish the resulting socket (or the
//! last error) through a one-shot [`PendingConnect`] handle. The engine observes the handle on its
//! next `tick()`; it never touches the task directly except to cancel it.

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ConnectError;
use crate::stream::Stream;

/// Result of a successful connect: the live stream plus the peer address as displayed to the
/// user. Reverse DNS on the numeric peer address is out of scope (no resolver crate in this
/// workspace) -- `spec.md` only requires the lookup be "non-fatal on failure", so the formatted
/// `SocketAddr` stands in for it; see `DESIGN.md`.
pub struct ConnectOutcome {
    pub stream: Stream,
    pub peer_addr: String,
}

type ConnectSlot = Arc<Mutex<Option<Result<ConnectOutcome, ConnectError>>>>;

/// Handle to a background connect attempt. The worker writes its result into `slot` exactly
/// once and then exits; the engine reads `slot` only once the worker has exited (checked via
/// `JoinHandle::is_finished`) or while cancelling it.
pub struct PendingConnect {
    slot: ConnectSlot,
    cancel: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

impl PendingConnect {
    /// Spawns the worker. `tls` selects whether a TLS handshake follows the TCP connect.
    pub fn spawn(host: String, port: u16, tls: bool) -> PendingConnect {
        let slot: ConnectSlot = Arc::new(Mutex::new(None));
        let cancel = Arc::new(AtomicBool::new(false));

        let slot_clone = slot.clone();
        let cancel_clone = cancel.clone();
        let handle = tokio::task::spawn(async move {
            let result = run(host, port, tls, cancel_clone).await;
            *slot_clone.lock().unwrap() = Some(result);
        });

        PendingConnect {
            slot,
            cancel,
            handle,
        }
    }

    /// Non-blocking poll. Returns `Some(result)` exactly once, the first time this is called
    /// after the worker has finished.
    pub fn poll(&self) -> Option<Result<ConnectOutcome, ConnectError>> {
        self.slot.lock().unwrap().take()
    }

    /// Cancels the worker at its next cancellation point and detaches it. Safe to call at any
    /// time, including after the worker has already published a result (the result is simply
    /// discarded).
    pub fn cancel(self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.handle.abort();
    }
}

async fn run(
    host: String,
    port: u16,
    tls: bool,
    cancel: Arc<AtomicBool>,
) -> Result<ConnectOutcome, ConnectError> {
    let addrs = resolve(host.clone(), port).await?;

    let mut last_err: Option<ConnectError> = None;
    for addr in addrs {
        if cancel.load(Ordering::SeqCst) {
            return Err(ConnectError::Connect {
                host,
                port,
                message: "cancelled".to_owned(),
            });
        }

        let attempt = if tls {
            Stream::connect_tls(addr, &host).await
        } else {
            Stream::connect_tcp(addr).await
        };

        match attempt {
            Ok(stream) => {
                return Ok(ConnectOutcome {
                    stream,
                    peer_addr: addr.to_string(),
                });
            }
            Err(e) => {
                last_err = Some(if tls {
                    ConnectError::Tls {
                        host: host.clone(),
                        message: e.to_string(),
                    }
                } else {
                    ConnectError::Connect {
                        host: host.clone(),
                        port,
                        message: e.to_string(),
                    }
                });
            }
        }
    }

    Err(last_err.unwrap_or(ConnectError::Connect {
        host,
        port,
        message: "no addresses to try".to_owned(),
    }))
}

/// DNS resolution runs on a blocking-pool thread: `ToSocketAddrs::to_socket_addrs` is a
/// synchronous, potentially slow syscall (grounded on the teacher's `libtiny_client::resolve_addr`,
/// which does the same via `tokio::task::spawn_blocking`).
async fn resolve(host: String, port: u16) -> Result<Vec<SocketAddr>, ConnectError> {
    let host_for_err = host.clone();
    let addrs = tokio::task::spawn_blocking(move || (host.as_str(), port).to_socket_addrs())
        .await
        .map_err(|e| ConnectError::Resolve {
            host: host_for_err.clone(),
            message: format!("resolver task panicked: {e}"),
        })?
        .map_err(|e| ConnectError::Resolve {
            host: host_for_err.clone(),
            message: e.to_string(),
        })?;

    let addrs: Vec<SocketAddr> = addrs.collect();
    if addrs.is_empty() {
        return Err(ConnectError::Resolve {
            host: host_for_err,
            message: "no addresses found".to_owned(),
        });
    }
    Ok(addrs)
}
