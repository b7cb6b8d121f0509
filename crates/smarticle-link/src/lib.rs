//! # Smarticle Link Layer
//!
//! 无线链路抽象层：发送接口、设备句柄与设备注册表。
//!
//! The radio stack itself (opening the base module, network discovery,
//! retries) lives outside this workspace. It is reached through two traits:
//!
//! - [`Transport`]: unacknowledged broadcast, acknowledged unicast and
//!   fire-and-forget unicast
//! - [`Discovery`]: a black box returning the remote modules it found

use smarticle_protocol::SMALL_FIELD_MAX;
use std::fmt;
use std::num::NonZeroU8;
use thiserror::Error;

pub mod registry;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use registry::DeviceRegistry;

#[cfg(any(test, feature = "mock"))]
pub use mock::{Destination, MockDiscovery, MockTransport, SentFrame};

/// 链路层统一错误类型
///
/// Returned by [`Transport`] and [`Discovery`] implementations. Radio
/// backends outside this workspace report serial port failures as `Io`,
/// module status errors as `Device` and a closed base module as `NotOpen`.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] LinkDeviceError),
    /// The remote module did not acknowledge an acknowledged send.
    #[error("No acknowledgement from {0}")]
    AckTimeout(String),
    #[error("Base module not open")]
    NotOpen,
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDeviceErrorKind {
    Unknown,
    /// The remote address is not on the network.
    NotFound,
    /// The base module's transmit buffer is full.
    Busy,
    /// A status frame from the base module could not be parsed.
    InvalidResponse,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct LinkDeviceError {
    pub kind: LinkDeviceErrorKind,
    pub message: String,
}

impl LinkDeviceError {
    pub fn new(kind: LinkDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&str> for LinkDeviceError {
    fn from(message: &str) -> Self {
        Self::new(LinkDeviceErrorKind::Unknown, message)
    }
}

/// Swarm-local device id.
///
/// Assigned when a device is registered, never derived from the module's
/// node identifier. Ids are sent to devices as a small field, so the range is
/// `1..=SMALL_FIELD_MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(NonZeroU8);

impl DeviceId {
    pub fn new(id: u8) -> Option<Self> {
        if id > SMALL_FIELD_MAX {
            return None;
        }
        NonZeroU8::new(id).map(Self)
    }

    pub fn get(self) -> u8 {
        self.0.get()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque handle to a remote radio module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteHandle {
    /// 64-bit hardware address.
    pub address: u64,
    /// Human-readable node identifier (display only).
    pub node_id: String,
}

impl RemoteHandle {
    pub fn new(address: u64, node_id: impl Into<String>) -> Self {
        Self {
            address,
            node_id: node_id.into(),
        }
    }
}

impl fmt::Display for RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:016X})", self.node_id, self.address)
    }
}

/// Shared radio transport.
///
/// Implementations must be safe to call from several background jobs at
/// once; frames from different callers may interleave on the air.
pub trait Transport: Send + Sync {
    /// Send once to every module, without acknowledgement.
    fn broadcast(&self, payload: &[u8]) -> Result<(), LinkError>;

    /// Send to one module and wait for its acknowledgement.
    fn send(&self, remote: &RemoteHandle, payload: &[u8]) -> Result<(), LinkError>;

    /// Send to one module without waiting for an acknowledgement.
    fn send_async(&self, remote: &RemoteHandle, payload: &[u8]) -> Result<(), LinkError> {
        self.send(remote, payload)
    }
}

/// Network discovery, implemented by the radio stack.
pub trait Discovery {
    /// Run one discovery cycle and return every module that answered.
    fn discover(&mut self) -> Result<Vec<RemoteHandle>, LinkError>;
}
