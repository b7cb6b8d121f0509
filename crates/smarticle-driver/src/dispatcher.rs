//! 帧分发
//!
//! Every frame leaves the host through [`Dispatcher::dispatch`] with one of
//! three addressing modes. The device registry is held as an `ArcSwap`
//! snapshot: background jobs read it lock-free while network discovery
//! publishes a whole new registry.

use crate::error::DriverError;
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use arc_swap::ArcSwap;
use smarticle_link::{DeviceId, DeviceRegistry, LinkError, Transport};
use smarticle_protocol::{Command, Frame};
use std::sync::Arc;
use tracing::{trace, warn};

/// 寻址方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Addressing {
    /// One unacknowledged broadcast.
    #[default]
    Broadcast,
    /// One acknowledged unicast per registered device, in id order.
    AckBroadcast,
    /// A single device; `acknowledged == false` sends without waiting.
    Unicast { id: DeviceId, acknowledged: bool },
}

impl Addressing {
    pub fn unicast(id: DeviceId) -> Self {
        Addressing::Unicast {
            id,
            acknowledged: true,
        }
    }

    pub fn unicast_async(id: DeviceId) -> Self {
        Addressing::Unicast {
            id,
            acknowledged: false,
        }
    }
}

/// 分发结果
///
/// Per-device acknowledgement failures of an [`Addressing::AckBroadcast`]
/// are collected here instead of aborting the remaining sends.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failures: Vec<(DeviceId, LinkError)>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<DeviceId> {
        self.failures.iter().map(|(id, _)| *id).collect()
    }

    pub(crate) fn merge(&mut self, other: DispatchReport) {
        self.delivered += other.delivered;
        self.failures.extend(other.failures);
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    registry: Arc<ArcSwap<DeviceRegistry>>,
    metrics: Arc<DispatchMetrics>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("devices", &self.registry.load().len())
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_registry(transport, DeviceRegistry::new())
    }

    pub fn with_registry(transport: Arc<dyn Transport>, registry: DeviceRegistry) -> Self {
        Self {
            transport,
            registry: Arc::new(ArcSwap::from_pointee(registry)),
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    /// Current registry snapshot.
    pub fn registry(&self) -> Arc<DeviceRegistry> {
        self.registry.load_full()
    }

    /// Replace the registry seen by every clone of this dispatcher.
    pub fn publish_registry(&self, registry: DeviceRegistry) {
        self.registry.store(Arc::new(registry));
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn counters(&self) -> &DispatchMetrics {
        &self.metrics
    }

    /// Encode `command` and dispatch it.
    pub fn send_command(
        &self,
        command: &Command,
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        let frame = command.encode()?;
        self.dispatch(&frame, addressing)
    }

    /// Hand one frame to the transport.
    ///
    /// # Errors
    /// - `Address`: unicast to an id missing from the registry
    /// - `Link`: broadcast or unicast transport failure
    ///
    /// `AckBroadcast` never fails on a single device; see [`DispatchReport`].
    pub fn dispatch(
        &self,
        frame: &Frame,
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        let bytes = frame.as_bytes();
        match addressing {
            Addressing::Broadcast => {
                trace!("broadcast {:02X?}", bytes);
                self.transport.broadcast(bytes).map_err(|e| self.transport_error(e))?;
                DispatchMetrics::bump(&self.metrics.broadcast_frames);
                Ok(DispatchReport {
                    delivered: 1,
                    failures: Vec::new(),
                })
            },
            Addressing::AckBroadcast => {
                let registry = self.registry.load();
                let mut report = DispatchReport::default();
                for (id, remote) in registry.iter() {
                    DispatchMetrics::bump(&self.metrics.unicast_frames);
                    match self.transport.send(remote, bytes) {
                        Ok(()) => report.delivered += 1,
                        Err(e) => {
                            warn!("{} ({}) failed: {}", id, remote, e);
                            self.count_failure(&e);
                            report.failures.push((id, e));
                        },
                    }
                }
                Ok(report)
            },
            Addressing::Unicast { id, acknowledged } => {
                let registry = self.registry.load();
                let remote = registry.get(id).ok_or(DriverError::Address(id))?;
                trace!("unicast {} {:02X?}", id, bytes);
                let result = if acknowledged {
                    DispatchMetrics::bump(&self.metrics.unicast_frames);
                    self.transport.send(remote, bytes)
                } else {
                    DispatchMetrics::bump(&self.metrics.async_frames);
                    self.transport.send_async(remote, bytes)
                };
                result.map_err(|e| self.transport_error(e))?;
                Ok(DispatchReport {
                    delivered: 1,
                    failures: Vec::new(),
                })
            },
        }
    }

    fn count_failure(&self, err: &LinkError) {
        match err {
            LinkError::AckTimeout(_) => DispatchMetrics::bump(&self.metrics.ack_failures),
            _ => DispatchMetrics::bump(&self.metrics.transport_errors),
        }
    }

    fn transport_error(&self, err: LinkError) -> DriverError {
        self.count_failure(&err);
        DriverError::Link(err)
    }
}
