//! Swarm 控制门面
//!
//! One object owning the dispatcher, the gait timing and the sync thread.
//! Command helpers validate and clamp their arguments the way the device
//! firmware expects, then dispatch with the caller's addressing.

use crate::config::SwarmConfig;
use crate::dispatcher::{Addressing, DispatchReport, Dispatcher};
use crate::error::DriverError;
use crate::metrics::MetricsSnapshot;
use crate::queue::{PlankEntry, PoseEntry, QueueDispatcher};
use crate::stream::{Pose, StreamDestination, StreamJob, StreamScheduler};
use crate::sync::{SyncCoordinator, SyncTiming};
use smarticle_link::{DeviceRegistry, Discovery, Transport};
use smarticle_protocol::{
    Command, DebugLevel, Frame, GaitSequence, Mode, SAMPLE_TIME_MS, StreamTarget,
    TRANSMIT_COUNTS_MAX, TRANSMIT_COUNTS_MIN, TICK_RESOLUTION_US, WIDE_FIELD_MAX,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Result of [`Swarm::build_network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOutcome {
    pub discovered: usize,
    pub expected: Option<usize>,
}

impl DiscoveryOutcome {
    /// Fewer devices than expected answered. Retrying is the caller's call.
    pub fn is_short(&self) -> bool {
        self.expected.is_some_and(|n| self.discovered < n)
    }
}

pub struct Swarm {
    dispatcher: Dispatcher,
    config: SwarmConfig,
    gait: Option<SyncTiming>,
    sync: Option<SyncCoordinator>,
}

impl std::fmt::Debug for Swarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swarm")
            .field("dispatcher", &self.dispatcher)
            .field("gait", &self.gait)
            .field("sync", &self.sync)
            .finish()
    }
}

impl Swarm {
    pub fn new(transport: Arc<dyn Transport>, config: SwarmConfig) -> Self {
        Self::from_dispatcher(Dispatcher::new(transport), config)
    }

    pub fn from_dispatcher(dispatcher: Dispatcher, config: SwarmConfig) -> Self {
        Self {
            dispatcher,
            config,
            gait: None,
            sync: None,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<DeviceRegistry> {
        self.dispatcher.registry()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.dispatcher.metrics()
    }

    // ==================== Network ====================

    /// Discover the swarm and publish a fresh registry.
    ///
    /// After discovery every device's receive buffer is purged with a lone
    /// terminator, bracketed by the configured settle delay.
    pub fn build_network(
        &self,
        discovery: &mut dyn Discovery,
        expected: Option<usize>,
    ) -> Result<DiscoveryOutcome, DriverError> {
        self.dispatcher.publish_registry(DeviceRegistry::new());
        let handles = discovery.discover()?;
        let registry = DeviceRegistry::from_discovered(handles);
        let outcome = DiscoveryOutcome {
            discovered: registry.len(),
            expected,
        };
        for (id, remote) in registry.iter() {
            debug!("{} -> {}", id, remote);
        }
        self.dispatcher.publish_registry(registry);

        if outcome.is_short() {
            warn!(
                "Discovered {} of {} expected devices",
                outcome.discovered,
                expected.unwrap_or_default()
            );
        } else {
            info!("Discovered {} devices", outcome.discovered);
        }

        let settle = self.config.purge_delay();
        thread::sleep(settle);
        self.dispatcher.dispatch(&Frame::purge(), Addressing::Broadcast)?;
        thread::sleep(settle);
        Ok(outcome)
    }

    /// Tell every registered device its id, with acknowledgements.
    pub fn send_ids(&self) -> Result<DispatchReport, DriverError> {
        let registry = self.dispatcher.registry();
        let mut report = DispatchReport::default();
        for id in registry.ids() {
            let command = Command::SetDeviceId(id.get());
            match self.dispatcher.send_command(&command, Addressing::unicast(id)) {
                Ok(r) => report.merge(r),
                Err(DriverError::Link(e)) => report.failures.push((id, e)),
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    // ==================== Commands ====================

    pub fn command(
        &self,
        command: &Command,
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        self.dispatcher.send_command(command, addressing)
    }

    pub fn set_mode(&self, mode: Mode, addressing: Addressing) -> Result<DispatchReport, DriverError> {
        self.command(&Command::SetMode(mode), addressing)
    }

    /// Enable servo updates; enabling also restarts the gait at point 0.
    pub fn set_servos(&self, on: bool, addressing: Addressing) -> Result<DispatchReport, DriverError> {
        self.command(&Command::SetServoUpdate(on), addressing)
    }

    pub fn set_transmit(&self, on: bool, addressing: Addressing) -> Result<DispatchReport, DriverError> {
        self.command(&Command::SetTransmit(on), addressing)
    }

    pub fn set_read_sensors(
        &self,
        on: bool,
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        self.command(&Command::SetReadSensors(on), addressing)
    }

    /// Sensor transmit period, quantized to the 10 ms firmware sample time.
    pub fn set_transmit_period(
        &self,
        period_ms: u32,
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        self.command(&Command::SetTransmitCounts(transmit_counts(period_ms)), addressing)
    }

    /// Levels above 2 turn debugging off.
    pub fn set_debug(&self, level: u8, addressing: Addressing) -> Result<DispatchReport, DriverError> {
        self.command(&Command::SetDebugLevel(DebugLevel::from_level(level)), addressing)
    }

    pub fn set_pose(
        &self,
        left: u8,
        right: u8,
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        self.command(&Command::SetPose { left, right }, addressing)
    }

    /// Per-device batched poses; target id 0 addresses the whole swarm.
    pub fn stream_pose(
        &self,
        targets: &[StreamTarget],
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        self.command(&Command::StreamPose(targets.to_vec()), addressing)
    }

    pub fn set_plank(
        &self,
        states: &[bool],
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        self.command(&Command::SetPlank(states.to_vec()), addressing)
    }

    /// Random gait point offset, `max` below 100. Devices receive `2 * max`.
    pub fn set_pose_noise(&self, max: u8, addressing: Addressing) -> Result<DispatchReport, DriverError> {
        if max >= 100 {
            return Err(DriverError::InvalidInput(format!(
                "pose noise must be below 100, got {}",
                max
            )));
        }
        self.command(&Command::SetPoseNoise(max * 2), addressing)
    }

    /// Share of stream updates a device replaces with a random angle.
    ///
    /// `eps` is clamped to `0..=1` and sent as a whole percentage.
    pub fn set_pose_epsilon(
        &self,
        eps: f64,
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        if eps.is_nan() {
            return Err(DriverError::InvalidInput("pose epsilon is NaN".into()));
        }
        let percent = (eps.clamp(0.0, 1.0) * 100.0).round() as u8;
        self.command(&Command::SetPoseEpsilon(percent), addressing)
    }

    /// Maximum random delay devices add before acting on a sync pulse.
    pub fn set_sync_noise(
        &self,
        max: Duration,
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        let ticks = noise_ticks("sync noise", max)?;
        self.command(&Command::SetSyncNoise(ticks), addressing)
    }

    /// Random delay devices add before applying a streamed pose.
    pub fn set_stream_timing_noise(
        &self,
        enabled: bool,
        max: Duration,
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        let max_ticks = noise_ticks("stream timing noise", max)?;
        self.command(&Command::SetStreamTimingNoise { enabled, max_ticks }, addressing)
    }

    pub fn set_sensor_threshold(
        &self,
        thresholds: [u16; 4],
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        if let Some(t) = thresholds.iter().find(|t| **t > WIDE_FIELD_MAX) {
            return Err(DriverError::InvalidInput(format!("sensor threshold {} too large", t)));
        }
        self.command(&Command::SetSensorThreshold(thresholds), addressing)
    }

    pub fn select_gait(&self, slot: u8, addressing: Addressing) -> Result<DispatchReport, DriverError> {
        self.command(&Command::SelectGait(slot), addressing)
    }

    // ==================== Gait & sync ====================

    /// Upload a gait and pace the channel.
    ///
    /// A running sync thread is torn down; call [`init_sync`](Self::init_sync)
    /// again for the new period.
    pub fn init_gait(
        &mut self,
        gait: &GaitSequence,
        addressing: Addressing,
    ) -> Result<DispatchReport, DriverError> {
        let report = self.command(&Command::InitGait(gait.clone()), addressing)?;
        thread::sleep(self.config.gait_pacing());

        let timing = SyncTiming::from_gait(gait).with_drift_correction(self.config.drift_correction());
        if self.sync.take().is_some() {
            debug!("Gait changed, sync thread dropped");
        }
        self.gait = Some(timing);
        Ok(report)
    }

    pub fn gait_timing(&self) -> Option<SyncTiming> {
        self.gait
    }

    /// Spawn a paused sync thread for the current gait.
    pub fn init_sync(&mut self) -> Result<(), DriverError> {
        let timing = self.gait.ok_or(DriverError::GaitNotInitialized)?;
        self.sync.take();
        let sync =
            SyncCoordinator::spawn(self.dispatcher.clone(), timing, self.config.sync.keep_time)?;
        info!("Sync initialized, period {:?}", timing.period());
        self.sync = Some(sync);
        Ok(())
    }

    /// Enable servos everywhere, wait a third of a point delay, then arm
    /// the sync pulse.
    pub fn start_sync(&self) -> Result<(), DriverError> {
        let sync = self.sync.as_ref().ok_or(DriverError::SyncNotInitialized)?;
        self.set_servos(true, Addressing::Broadcast)?;
        thread::sleep(sync.timing().phase_offset());
        sync.resume();
        Ok(())
    }

    /// Disarm the sync pulse and disable servos everywhere.
    pub fn stop_sync(&self) -> Result<(), DriverError> {
        let sync = self.sync.as_ref().ok_or(DriverError::SyncNotInitialized)?;
        sync.pause();
        self.set_servos(false, Addressing::Broadcast)?;
        Ok(())
    }

    pub fn is_syncing(&self) -> bool {
        self.sync.as_ref().is_some_and(SyncCoordinator::is_running)
    }

    /// Wall-clock times of sync pulses (requires `sync.keep_time`).
    pub fn sync_timestamps(&self) -> Vec<SystemTime> {
        self.sync.as_ref().map(SyncCoordinator::timestamps).unwrap_or_default()
    }

    // ==================== Jobs ====================

    /// A stream job with the configured default period.
    pub fn stream_job(
        &self,
        destination: StreamDestination,
        generator: impl FnMut(f64) -> Pose + Send + 'static,
    ) -> StreamJob {
        StreamJob::new(destination, self.config.stream_period(), generator)
    }

    pub fn stream(&self, job: StreamJob) -> Result<StreamScheduler, DriverError> {
        StreamScheduler::spawn(self.dispatcher.clone(), job)
    }

    pub fn plank_queue(&self) -> Result<QueueDispatcher<PlankEntry>, DriverError> {
        QueueDispatcher::spawn(self.dispatcher.clone())
    }

    pub fn pose_queue(&self) -> Result<QueueDispatcher<PoseEntry>, DriverError> {
        QueueDispatcher::spawn(self.dispatcher.clone())
    }
}

fn noise_ticks(what: &str, max: Duration) -> Result<u16, DriverError> {
    let ticks = max.as_micros() / u128::from(TICK_RESOLUTION_US);
    u16::try_from(ticks)
        .ok()
        .filter(|t| *t <= WIDE_FIELD_MAX)
        .ok_or_else(|| DriverError::InvalidInput(format!("{} {:?} too large", what, max)))
}

/// Transmit period in milliseconds to firmware sample counts.
pub fn transmit_counts(period_ms: u32) -> u8 {
    (period_ms / SAMPLE_TIME_MS).clamp(TRANSMIT_COUNTS_MIN, TRANSMIT_COUNTS_MAX) as u8
}
