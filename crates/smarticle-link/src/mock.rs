//! Mock 链路（无硬件依赖）
//!
//! Records every frame handed to the transport so tests can assert on wire
//! order and addressing. Individual devices can be configured to withhold
//! their acknowledgement, and the whole link can be closed or made to fail
//! the next transmit call.

use crate::{Discovery, LinkDeviceError, LinkError, RemoteHandle, Transport};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Where a recorded frame was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Broadcast,
    Unicast { address: u64, acknowledged: bool },
}

#[derive(Debug, Clone)]
pub struct SentFrame {
    pub destination: Destination,
    pub bytes: Vec<u8>,
    pub at: Instant,
}

#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentFrame>>,
    silent: Mutex<HashSet<u64>>,
    send_delay: Mutex<Duration>,
    closed: Mutex<bool>,
    next_failure: Mutex<Option<LinkDeviceError>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make acknowledged sends to `address` fail with `AckTimeout`.
    pub fn set_silent(&self, address: u64) {
        self.silent.lock().insert(address);
    }

    /// While closed, every transmit call fails with `NotOpen` and records nothing.
    pub fn set_closed(&self, closed: bool) {
        *self.closed.lock() = closed;
    }

    /// Fail the next transmit call with `err`. The frame is not recorded.
    pub fn fail_next(&self, err: LinkDeviceError) {
        *self.next_failure.lock() = Some(err);
    }

    /// Simulated network latency of every transmit call.
    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock() = delay;
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        self.sent.lock().clone()
    }

    pub fn take_sent(&self) -> Vec<SentFrame> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Number of recorded frames equal to `bytes`.
    pub fn count_matching(&self, bytes: &[u8]) -> usize {
        self.sent.lock().iter().filter(|f| f.bytes == bytes).count()
    }

    fn check_link(&self) -> Result<(), LinkError> {
        if *self.closed.lock() {
            return Err(LinkError::NotOpen);
        }
        match self.next_failure.lock().take() {
            Some(err) => Err(LinkError::Device(err)),
            None => Ok(()),
        }
    }

    fn record(&self, destination: Destination, payload: &[u8]) {
        let delay = *self.send_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.sent.lock().push(SentFrame {
            destination,
            bytes: payload.to_vec(),
            at: Instant::now(),
        });
    }
}

impl Transport for MockTransport {
    fn broadcast(&self, payload: &[u8]) -> Result<(), LinkError> {
        self.check_link()?;
        self.record(Destination::Broadcast, payload);
        Ok(())
    }

    fn send(&self, remote: &RemoteHandle, payload: &[u8]) -> Result<(), LinkError> {
        self.check_link()?;
        self.record(
            Destination::Unicast {
                address: remote.address,
                acknowledged: true,
            },
            payload,
        );
        if self.silent.lock().contains(&remote.address) {
            return Err(LinkError::AckTimeout(remote.node_id.clone()));
        }
        Ok(())
    }

    fn send_async(&self, remote: &RemoteHandle, payload: &[u8]) -> Result<(), LinkError> {
        self.check_link()?;
        self.record(
            Destination::Unicast {
                address: remote.address,
                acknowledged: false,
            },
            payload,
        );
        Ok(())
    }
}

/// Discovery returning a fixed set of handles.
#[derive(Debug, Clone, Default)]
pub struct MockDiscovery {
    pub handles: Vec<RemoteHandle>,
    pub runs: usize,
}

impl MockDiscovery {
    pub fn new(handles: Vec<RemoteHandle>) -> Self {
        Self { handles, runs: 0 }
    }

    /// `n` handles with addresses `1..=n` and node ids `SMARTnn`.
    pub fn with_devices(n: u64) -> Self {
        Self::new(
            (1..=n)
                .map(|i| RemoteHandle::new(i, format!("SMART{:02}", i)))
                .collect(),
        )
    }
}

impl Discovery for MockDiscovery {
    fn discover(&mut self) -> Result<Vec<RemoteHandle>, LinkError> {
        self.runs += 1;
        Ok(self.handles.clone())
    }
}
