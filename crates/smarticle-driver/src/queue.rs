//! 单播队列
//!
//! Producers enqueue per-device entries; one consumer thread encodes each
//! entry and sends it as an unacknowledged unicast, strictly in FIFO order.
//! Closing the queue lets the consumer drain what is already queued.

use crate::dispatcher::{Addressing, Dispatcher};
use crate::error::DriverError;
use crate::metrics::DispatchMetrics;
use crossbeam_channel::{Receiver, Sender};
use smarticle_link::DeviceId;
use smarticle_protocol::{Command, Frame, ProtocolError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

/// An item a [`QueueDispatcher`] can send.
pub trait QueueEntry: Send + 'static {
    fn device(&self) -> DeviceId;
    fn encode(&self) -> Result<Frame, ProtocolError>;
}

/// Plank state for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlankEntry {
    pub planked: bool,
    pub device: DeviceId,
}

impl PlankEntry {
    pub fn plank(device: DeviceId) -> Self {
        Self {
            planked: true,
            device,
        }
    }

    pub fn deplank(device: DeviceId) -> Self {
        Self {
            planked: false,
            device,
        }
    }
}

impl QueueEntry for PlankEntry {
    fn device(&self) -> DeviceId {
        self.device
    }

    fn encode(&self) -> Result<Frame, ProtocolError> {
        Command::SetPlank(vec![self.planked]).encode()
    }
}

/// Streamed pose for one device, sent as a raw stream sub-frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoseEntry {
    pub left: u8,
    pub right: u8,
    pub device: DeviceId,
}

impl PoseEntry {
    pub fn new(left: u8, right: u8, device: DeviceId) -> Self {
        Self {
            left,
            right,
            device,
        }
    }
}

impl QueueEntry for PoseEntry {
    fn device(&self) -> DeviceId {
        self.device
    }

    fn encode(&self) -> Result<Frame, ProtocolError> {
        Ok(Frame::stream(self.left, self.right))
    }
}

/// 队列分发器
pub struct QueueDispatcher<E: QueueEntry> {
    tx: Option<Sender<E>>,
    thread: Option<JoinHandle<()>>,
}

impl<E: QueueEntry> std::fmt::Debug for QueueDispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueDispatcher")
            .field("pending", &self.pending())
            .field("open", &self.tx.is_some())
            .finish()
    }
}

impl<E: QueueEntry> QueueDispatcher<E> {
    pub fn spawn(dispatcher: Dispatcher) -> Result<Self, DriverError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread = thread::Builder::new()
            .name("smarticle-queue".into())
            .spawn(move || queue_loop(dispatcher, rx))
            .map_err(|e| DriverError::Thread(e.to_string()))?;
        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    pub fn enqueue(&self, entry: E) -> Result<(), DriverError> {
        let tx = self.tx.as_ref().ok_or(DriverError::ChannelClosed)?;
        tx.send(entry).map_err(|_| DriverError::ChannelClosed)
    }

    /// Entries not yet taken by the consumer.
    pub fn pending(&self) -> usize {
        self.tx.as_ref().map_or(0, Sender::len)
    }

    /// Close the queue and wait until every queued entry is sent.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.tx.take();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("Queue thread panicked");
            }
        }
    }
}

impl<E: QueueEntry> Drop for QueueDispatcher<E> {
    fn drop(&mut self) {
        self.close();
    }
}

fn queue_loop<E: QueueEntry>(dispatcher: Dispatcher, rx: Receiver<E>) {
    for entry in rx.iter() {
        let device = entry.device();
        let result = entry
            .encode()
            .map_err(DriverError::from)
            .and_then(|frame| dispatcher.dispatch(&frame, Addressing::unicast_async(device)));
        match result {
            Ok(_) => trace!("queued frame sent to {}", device),
            Err(e) => warn!("Queued frame for {} failed: {}", device, e),
        }
        DispatchMetrics::bump(&dispatcher.counters().queue_items);
    }
    debug!("Queue thread exiting");
}

/// Which device, if any, should be planked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlankDecision {
    None,
    Device(DeviceId),
}

impl PlankDecision {
    /// Decode an action vector with one score per device plus a trailing
    /// "no plank" score. The highest score wins; ties go to the lowest index.
    ///
    /// # Errors
    /// `InvalidInput` when `scores.len() != ids.len() + 1` or a score is NaN.
    pub fn from_scores(scores: &[f64], ids: &[DeviceId]) -> Result<Self, DriverError> {
        if scores.len() != ids.len() + 1 {
            return Err(DriverError::InvalidInput(format!(
                "expected {} scores, got {}",
                ids.len() + 1,
                scores.len()
            )));
        }
        if scores.iter().any(|s| s.is_nan()) {
            return Err(DriverError::InvalidInput("NaN score".into()));
        }
        let best = scores
            .iter()
            .enumerate()
            .fold(0, |best, (i, s)| if *s > scores[best] { i } else { best });
        Ok(ids.get(best).map_or(PlankDecision::None, |id| PlankDecision::Device(*id)))
    }
}

/// 单胜者 plank 策略
///
/// At most one device is planked at a time. A change of winner always sends
/// the deplank of the old winner before the plank of the new one.
#[derive(Debug, Default)]
pub struct PlankPolicy {
    planked: Option<DeviceId>,
}

impl PlankPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn planked(&self) -> Option<DeviceId> {
        self.planked
    }

    /// Enqueue the plank changes needed to reach `decision`.
    pub fn apply(
        &mut self,
        queue: &QueueDispatcher<PlankEntry>,
        decision: PlankDecision,
    ) -> Result<(), DriverError> {
        let target = match decision {
            PlankDecision::None => None,
            PlankDecision::Device(id) => Some(id),
        };
        if target == self.planked {
            return Ok(());
        }
        if let Some(old) = self.planked {
            queue.enqueue(PlankEntry::deplank(old))?;
            self.planked = None;
        }
        if let Some(new) = target {
            queue.enqueue(PlankEntry::plank(new))?;
            self.planked = Some(new);
        }
        Ok(())
    }

    /// [`PlankDecision::from_scores`] followed by [`apply`](Self::apply).
    pub fn update(
        &mut self,
        queue: &QueueDispatcher<PlankEntry>,
        scores: &[f64],
        ids: &[DeviceId],
    ) -> Result<(), DriverError> {
        let decision = PlankDecision::from_scores(scores, ids)?;
        self.apply(queue, decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smarticle_link::{DeviceRegistry, MockTransport, RemoteHandle};
    use std::sync::Arc;

    fn id(n: u8) -> DeviceId {
        DeviceId::new(n).unwrap()
    }

    fn setup() -> (Arc<MockTransport>, Dispatcher) {
        let mock = Arc::new(MockTransport::new());
        let registry = DeviceRegistry::from_discovered(
            (1..=3).map(|i| RemoteHandle::new(i, format!("SMART{:02}", i))),
        );
        (mock.clone(), Dispatcher::with_registry(mock, registry))
    }

    fn plank_payload(state: bool) -> Vec<u8> {
        PlankEntry {
            planked: state,
            device: id(1),
        }
        .encode()
        .unwrap()
        .as_bytes()
        .to_vec()
    }

    #[test]
    fn test_fifo_order() {
        let (mock, dispatcher) = setup();
        let queue = QueueDispatcher::spawn(dispatcher).unwrap();
        for n in 0..20u8 {
            queue.enqueue(PoseEntry::new(n, n, id(n % 3 + 1))).unwrap();
        }
        queue.shutdown();

        let lefts: Vec<u8> = mock.sent().iter().map(|f| f.bytes[0] - 32).collect();
        assert_eq!(lefts, (0..20).collect::<Vec<u8>>());
    }

    #[test]
    fn test_unknown_device_does_not_stop_consumer() {
        let (mock, dispatcher) = setup();
        let queue = QueueDispatcher::spawn(dispatcher.clone()).unwrap();
        queue.enqueue(PoseEntry::new(1, 1, id(9))).unwrap();
        queue.enqueue(PoseEntry::new(2, 2, id(2))).unwrap();
        queue.shutdown();
        assert_eq!(mock.sent_count(), 1);
        assert_eq!(dispatcher.metrics().queue_items, 2);
    }

    #[test]
    fn test_decision_from_scores() {
        let ids = [id(1), id(2), id(3)];
        assert_eq!(
            PlankDecision::from_scores(&[0.1, 0.7, 0.2, 0.0], &ids).unwrap(),
            PlankDecision::Device(id(2))
        );
        assert_eq!(
            PlankDecision::from_scores(&[0.0, 0.0, 0.0, 1.0], &ids).unwrap(),
            PlankDecision::None
        );
        assert!(PlankDecision::from_scores(&[1.0, 0.0], &ids).is_err());
    }

    #[test]
    fn test_policy_deplanks_before_planking() {
        let (mock, dispatcher) = setup();
        let queue = QueueDispatcher::spawn(dispatcher).unwrap();
        let mut policy = PlankPolicy::new();

        policy.apply(&queue, PlankDecision::Device(id(1))).unwrap();
        // same winner: nothing queued
        policy.apply(&queue, PlankDecision::Device(id(1))).unwrap();
        policy.apply(&queue, PlankDecision::Device(id(2))).unwrap();
        policy.apply(&queue, PlankDecision::None).unwrap();
        assert_eq!(policy.planked(), None);
        queue.shutdown();

        let sent: Vec<(u64, Vec<u8>)> = mock
            .sent()
            .into_iter()
            .map(|f| match f.destination {
                smarticle_link::Destination::Unicast { address, .. } => (address, f.bytes),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            sent,
            vec![
                (1, plank_payload(true)),
                (1, plank_payload(false)),
                (2, plank_payload(true)),
                (2, plank_payload(false)),
            ]
        );
    }

    #[test]
    fn test_enqueue_after_close() {
        let (_mock, dispatcher) = setup();
        let mut queue = QueueDispatcher::<PoseEntry>::spawn(dispatcher).unwrap();
        queue.close();
        assert!(matches!(
            queue.enqueue(PoseEntry::new(0, 0, id(1))),
            Err(DriverError::ChannelClosed)
        ));
    }
}
