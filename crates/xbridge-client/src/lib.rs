//! # xbridge-client
//!
//! Issuing-side API for the render bridge. From the caller's point of view
//! every bridged operation is an ordinary blocking function call: the
//! payload is encoded, the record queued, and only the calling thread
//! suspends until its correlated response arrives or the deadline elapses.
//! Multiple caller threads may issue calls and block independently; the
//! channel is the single serialization point.

pub mod api;
pub mod correlator;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use xbridge_channel::{Channel, ChannelError, Duplex};
use xbridge_config::{log_client_debug, log_client_error, log_client_info, log_client_warn};
use xbridge_proto::{CommandRecord, CommandTag, ProtoError};

use crate::correlator::{Correlator, UidSource, WaitOutcome};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The counterpart's channel region does not exist (renderer process
    /// not running, or pointed at the wrong directory).
    #[error("bridge counterpart not found: {0}")]
    ChannelUnavailable(String),

    /// The counterpart speaks a different protocol revision.
    #[error("incompatible bridge version: counterpart has {found}, this build expects {expected}")]
    IncompatibleVersion { found: u32, expected: u32 },

    /// A second live client in the same process would steal responses from
    /// the first (the response ring has exactly one consumer).
    #[error("bridge already initialized in this process")]
    AlreadyInitialized,

    #[error("bridge not initialized (or already torn down)")]
    NotInitialized,

    #[error("{op} timed out after {timeout_ms} ms with no response")]
    Timeout { op: &'static str, timeout_ms: u64 },

    /// The executing side answered with the failure sentinel (null handle).
    #[error("{op} failed on the executing side")]
    OperationFailed { op: &'static str },

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Explicit bridge lifecycle, replacing an ambient "initialized" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStatus {
    Uninitialized,
    Ready,
    TornDown,
}

const STATUS_READY: u8 = 1;
const STATUS_TORN_DOWN: u8 = 2;

// One live client per process: the response pump is the single consumer of
// the response ring.
static CLIENT_LIVE: AtomicBool = AtomicBool::new(false);

struct ClientShared {
    to_server: Channel,
    to_client: Channel,
    uids: UidSource,
    correlator: Correlator,
    status: AtomicU8,
}

/// A connected bridge endpoint. Immutable configuration returned from
/// [`BridgeClient::connect`]; shareable across caller threads.
pub struct BridgeClient {
    shared: Arc<ClientShared>,
    pump: Option<JoinHandle<()>>,
}

impl BridgeClient {
    /// Locate the counterpart's channel regions and bring the bridge to
    /// `Ready`. Fails with a distinct error kind when the counterpart is
    /// missing, speaks the wrong version, or a client already exists in
    /// this process; none of these leave a half-initialized bridge behind.
    pub fn connect() -> Result<Self, ClientError> {
        let dir = xbridge_config::config().bridge.channel_dir.clone();
        Self::connect_at(&dir)
    }

    /// [`connect`](Self::connect) against an explicit channel directory,
    /// bypassing configuration.
    pub fn connect_at(dir: &std::path::Path) -> Result<Self, ClientError> {
        if CLIENT_LIVE.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyInitialized);
        }
        match Duplex::open(dir) {
            Ok(duplex) => {
                let shared = Arc::new(ClientShared {
                    to_server: duplex.to_server,
                    to_client: duplex.to_client,
                    uids: UidSource::new(),
                    correlator: Correlator::new(),
                    status: AtomicU8::new(STATUS_READY),
                });
                let pump = spawn_response_pump(shared.clone());
                log_client_info!("bridge client connected", dir = dir.display().to_string());
                Ok(Self {
                    shared,
                    pump: Some(pump),
                })
            }
            Err(e) => {
                CLIENT_LIVE.store(false, Ordering::SeqCst);
                Err(match e {
                    ChannelError::NotFound(p) => {
                        ClientError::ChannelUnavailable(p.display().to_string())
                    }
                    ChannelError::VersionMismatch { found, expected } => {
                        ClientError::IncompatibleVersion { found, expected }
                    }
                    other => ClientError::Channel(other),
                })
            }
        }
    }

    pub fn status(&self) -> BridgeStatus {
        match self.shared.status.load(Ordering::Acquire) {
            STATUS_READY => BridgeStatus::Ready,
            STATUS_TORN_DOWN => BridgeStatus::TornDown,
            _ => BridgeStatus::Uninitialized,
        }
    }

    /// Close both channel directions and stop the response pump. Further
    /// calls on this client return [`ClientError::NotInitialized`].
    pub fn teardown(&mut self) {
        if self
            .shared
            .status
            .swap(STATUS_TORN_DOWN, Ordering::AcqRel)
            != STATUS_READY
        {
            return;
        }
        self.shared.to_server.close();
        self.shared.to_client.close();
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
        }
        CLIENT_LIVE.store(false, Ordering::SeqCst);
        log_client_info!("bridge client torn down");
    }

    fn ensure_ready(&self) -> Result<(), ClientError> {
        match self.status() {
            BridgeStatus::Ready => Ok(()),
            _ => Err(ClientError::NotInitialized),
        }
    }

    /// Synchronous-call emulation for correlated operations: assign a fresh
    /// uid, register the pending call, push, and block this thread until
    /// the correlated response arrives or the per-call deadline elapses.
    /// The timeout is re-read from configuration on every call.
    pub(crate) fn call(&self, tag: CommandTag, payload: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        self.ensure_ready()?;
        debug_assert!(tag.expects_response());

        let timeout = xbridge_config::call_timeout();
        let uid = self.shared.uids.next();
        let pending = self.shared.correlator.register(uid);

        let record = CommandRecord::correlated(tag, uid, payload);
        self.shared.to_server.push(&record.encode())?;
        log_client_debug!("issued correlated command", op = tag.name(), uid = uid);

        match pending.wait(timeout) {
            WaitOutcome::Completed(payload) => Ok(payload),
            WaitOutcome::TimedOut => {
                log_client_warn!(
                    "no response from executing side",
                    op = tag.name(),
                    uid = uid,
                    timeout_ms = timeout.as_millis() as u64,
                );
                Err(ClientError::Timeout {
                    op: tag.name(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Fire-and-forget: push with uid 0, return as soon as the record is
    /// queued (backpressure may still block briefly on a full ring).
    pub(crate) fn send(&self, tag: CommandTag, payload: Vec<u8>) -> Result<(), ClientError> {
        self.ensure_ready()?;
        let record = CommandRecord::fire_and_forget(tag, payload);
        self.shared.to_server.push(&record.encode())?;
        Ok(())
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Background consumer of the response ring: decodes each record and routes
/// its payload to the pending call registered under the record's uid.
fn spawn_response_pump(shared: Arc<ClientShared>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("xbridge-response-pump".into())
        .spawn(move || loop {
            match shared.to_client.pop(Some(Duration::from_millis(100))) {
                Ok(Some(bytes)) => match CommandRecord::decode(&bytes) {
                    Ok(rec) if rec.tag == CommandTag::Response => {
                        shared.correlator.resolve(rec.uid, rec.payload);
                    }
                    Ok(rec) => {
                        log_client_warn!(
                            "non-response record on response ring",
                            tag = rec.tag.name(),
                        );
                    }
                    Err(e) => {
                        log_client_warn!(
                            "dropping undecodable response record",
                            error = e.to_string(),
                        );
                    }
                },
                Ok(None) => continue,
                Err(ChannelError::Closed) => {
                    log_client_debug!("response channel closed, pump exiting");
                    break;
                }
                Err(e) => {
                    log_client_error!(
                        "response channel failed, pump exiting",
                        error = e.to_string(),
                    );
                    break;
                }
            }
        })
        .expect("spawn response pump")
}
