//! 步态同步
//!
//! A background thread broadcasts a sync pulse once per gait period so every
//! device restarts its gait at point 0 together. The pulse interval is the
//! gait period minus a fixed drift correction that absorbs radio latency.
//!
//! Stopping the coordinator cancels the wait in progress: no pulse is sent
//! after [`SyncCoordinator::pause`] returns.

use crate::dispatcher::{Addressing, Dispatcher};
use crate::error::DriverError;
use crate::job::{JobControl, JobState};
use crate::metrics::DispatchMetrics;
use parking_lot::RwLock;
use smarticle_protocol::{Frame, GaitSequence};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, trace, warn};

/// Default latency compensation subtracted from each gait period.
pub const DRIFT_CORRECTION: Duration = Duration::from_micros(35_700);

/// Shared pulse timestamps, appended by the sync thread.
pub type SyncLog = Arc<RwLock<Vec<SystemTime>>>;

/// 同步周期参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTiming {
    gait_len: usize,
    point_delay: Duration,
    drift_correction: Duration,
}

impl SyncTiming {
    pub fn new(gait_len: usize, point_delay: Duration) -> Self {
        Self {
            gait_len,
            point_delay,
            drift_correction: DRIFT_CORRECTION,
        }
    }

    pub fn from_gait(gait: &GaitSequence) -> Self {
        Self::new(gait.len(), gait.point_delay())
    }

    pub fn with_drift_correction(mut self, drift: Duration) -> Self {
        self.drift_correction = drift;
        self
    }

    pub fn gait_len(&self) -> usize {
        self.gait_len
    }

    pub fn point_delay(&self) -> Duration {
        self.point_delay
    }

    /// Gait length × point delay.
    pub fn period(&self) -> Duration {
        self.point_delay * self.gait_len as u32
    }

    /// Time between pulses. Zero when the drift correction exceeds the period.
    pub fn pulse_interval(&self) -> Duration {
        self.period().saturating_sub(self.drift_correction)
    }

    /// Offset between enabling servos and arming the pulse, one third of a
    /// point delay.
    pub fn phase_offset(&self) -> Duration {
        self.point_delay / 3
    }
}

/// 同步协调器
///
/// Owns the sync thread. Created paused; `resume()` arms it.
pub struct SyncCoordinator {
    control: Arc<JobControl>,
    timing: SyncTiming,
    log: Option<SyncLog>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("timing", &self.timing)
            .field("state", &self.control.state())
            .field("keep_time", &self.log.is_some())
            .finish()
    }
}

impl SyncCoordinator {
    /// Spawn the sync thread.
    ///
    /// # Errors
    /// - `InvalidInput`: the pulse interval is zero
    /// - `Thread`: the OS refused to spawn the thread
    pub fn spawn(
        dispatcher: Dispatcher,
        timing: SyncTiming,
        keep_time: bool,
    ) -> Result<Self, DriverError> {
        let interval = timing.pulse_interval();
        if interval.is_zero() {
            return Err(DriverError::InvalidInput(format!(
                "gait period {:?} does not exceed drift correction",
                timing.period()
            )));
        }

        let control = Arc::new(JobControl::new());
        let log = keep_time.then(SyncLog::default);

        let thread = {
            let control = control.clone();
            let log = log.clone();
            thread::Builder::new()
                .name("smarticle-sync".into())
                .spawn(move || sync_loop(dispatcher, control, interval, log))
                .map_err(|e| DriverError::Thread(e.to_string()))?
        };

        debug!(
            "Sync thread spawned: period {:?}, pulse every {:?}",
            timing.period(),
            interval
        );
        Ok(Self {
            control,
            timing,
            log,
            thread: Some(thread),
        })
    }

    pub fn timing(&self) -> SyncTiming {
        self.timing
    }

    pub fn state(&self) -> JobState {
        self.control.state()
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Arm the pulse. The first pulse follows one interval later.
    pub fn resume(&self) {
        if self.control.resume() {
            info!("Sync started");
        }
    }

    /// Disarm the pulse, cancelling the wait in progress.
    pub fn pause(&self) {
        if self.control.pause() {
            info!("Sync stopped");
        }
    }

    /// Copy of the recorded pulse times (empty unless `keep_time`).
    pub fn timestamps(&self) -> Vec<SystemTime> {
        self.log.as_ref().map(|log| log.read().clone()).unwrap_or_default()
    }

    pub fn log(&self) -> Option<SyncLog> {
        self.log.clone()
    }

    /// Terminate and join the sync thread.
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    fn stop_thread(&mut self) {
        self.control.terminate();
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("Sync thread panicked");
            }
        }
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn sync_loop(
    dispatcher: Dispatcher,
    control: Arc<JobControl>,
    interval: Duration,
    log: Option<SyncLog>,
) {
    let pulse = Frame::sync_pulse();
    while control.wait_runnable() {
        let sent = control.run_after(interval, || {
            let result = dispatcher.dispatch(&pulse, Addressing::Broadcast);
            if result.is_ok() {
                DispatchMetrics::bump(&dispatcher.counters().sync_pulses);
                if let Some(log) = &log {
                    log.write().push(SystemTime::now());
                }
            }
            result
        });
        match sent {
            Some(Err(e)) => warn!("Sync pulse failed: {}", e),
            Some(Ok(_)) => trace!("sync pulse"),
            None => {},
        }
    }
    debug!("Sync thread exiting");
}
