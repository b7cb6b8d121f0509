//! 流式姿态任务
//!
//! A stream job evaluates a pose generator on a virtual clock and sends one
//! raw stream sub-frame per tick. Each tick:
//!
//! 1. records its start time and samples the jitter
//! 2. evaluates the generator at the virtual time
//! 3. waits until `period + jitter` has elapsed since the tick started
//! 4. sends the frame and advances the virtual time by the nominal period
//!
//! Killing a job lets an in-flight tick finish; no new tick starts afterwards.

use crate::dispatcher::{Addressing, Dispatcher};
use crate::error::DriverError;
use crate::job::{JobControl, JobState};
use crate::metrics::DispatchMetrics;
use rand::Rng;
use smarticle_link::DeviceId;
use smarticle_protocol::Frame;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// Left and right servo angles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pose {
    pub left: u8,
    pub right: u8,
}

impl Pose {
    pub fn new(left: u8, right: u8) -> Self {
        Self { left, right }
    }
}

impl From<(u8, u8)> for Pose {
    fn from((left, right): (u8, u8)) -> Self {
        Self { left, right }
    }
}

/// Pose as a function of virtual time in seconds.
pub type PoseGenerator = Box<dyn FnMut(f64) -> Pose + Send>;

/// 时间抖动（秒）
///
/// Added to the nominal period of each tick. Passed explicitly to every job;
/// there is no global noise source.
#[derive(Default)]
pub enum Jitter {
    #[default]
    None,
    /// Uniform in `[-max, max]`.
    Uniform(Duration),
    /// Caller-provided sampler returning seconds.
    Custom(Box<dyn FnMut() -> f64 + Send>),
}

impl std::fmt::Debug for Jitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Jitter::None => write!(f, "None"),
            Jitter::Uniform(max) => write!(f, "Uniform({:?})", max),
            Jitter::Custom(_) => write!(f, "Custom"),
        }
    }
}

impl Jitter {
    fn sample(&mut self) -> f64 {
        match self {
            Jitter::None => 0.0,
            Jitter::Uniform(max) if max.is_zero() => 0.0,
            Jitter::Uniform(max) => {
                let max = max.as_secs_f64();
                rand::thread_rng().gen_range(-max..=max)
            },
            Jitter::Custom(sampler) => sampler(),
        }
    }
}

/// Where stream frames go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDestination {
    Broadcast,
    Device(DeviceId),
}

impl StreamDestination {
    fn addressing(self) -> Addressing {
        match self {
            StreamDestination::Broadcast => Addressing::Broadcast,
            StreamDestination::Device(id) => Addressing::unicast_async(id),
        }
    }
}

/// 流式任务描述
pub struct StreamJob {
    destination: StreamDestination,
    period: Duration,
    generator: PoseGenerator,
    jitter: Jitter,
}

impl std::fmt::Debug for StreamJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamJob")
            .field("destination", &self.destination)
            .field("period", &self.period)
            .field("jitter", &self.jitter)
            .finish()
    }
}

impl StreamJob {
    pub fn new(
        destination: StreamDestination,
        period: Duration,
        generator: impl FnMut(f64) -> Pose + Send + 'static,
    ) -> Self {
        Self {
            destination,
            period,
            generator: Box::new(generator),
            jitter: Jitter::None,
        }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn destination(&self) -> StreamDestination {
        self.destination
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

/// 流式调度器
///
/// Handle to a running stream job. Jobs start running; `pause`/`resume`
/// toggle transmission and `kill` ends the job. Dropping the handle kills
/// and joins.
pub struct StreamScheduler {
    control: Arc<JobControl>,
    ticks: Arc<AtomicU64>,
    destination: StreamDestination,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for StreamScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamScheduler")
            .field("destination", &self.destination)
            .field("state", &self.control.state())
            .field("ticks", &self.ticks())
            .finish()
    }
}

impl StreamScheduler {
    /// Spawn a stream job.
    ///
    /// # Errors
    /// - `InvalidInput`: zero period
    /// - `Address`: the destination device is not registered
    /// - `Thread`: the OS refused to spawn the thread
    pub fn spawn(dispatcher: Dispatcher, job: StreamJob) -> Result<Self, DriverError> {
        if job.period.is_zero() {
            return Err(DriverError::InvalidInput("stream period must be positive".into()));
        }
        if let StreamDestination::Device(id) = job.destination {
            if !dispatcher.registry().contains(id) {
                return Err(DriverError::Address(id));
            }
        }

        let control = Arc::new(JobControl::new());
        control.resume();
        let ticks = Arc::new(AtomicU64::new(0));
        let destination = job.destination;

        let thread = {
            let control = control.clone();
            let ticks = ticks.clone();
            thread::Builder::new()
                .name("smarticle-stream".into())
                .spawn(move || stream_loop(dispatcher, control, job, ticks))
                .map_err(|e| DriverError::Thread(e.to_string()))?
        };

        debug!("Stream job spawned for {:?}", destination);
        Ok(Self {
            control,
            ticks,
            destination,
            thread: Some(thread),
        })
    }

    pub fn state(&self) -> JobState {
        self.control.state()
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    /// Completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    /// End the job. A tick already in flight still transmits.
    pub fn kill(&self) {
        self.control.terminate();
    }

    /// Wait for the job thread to exit (after `kill`).
    pub fn join(mut self) {
        self.join_thread();
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("Stream thread panicked");
            }
        }
    }
}

impl Drop for StreamScheduler {
    fn drop(&mut self) {
        self.control.terminate();
        self.join_thread();
    }
}

fn stream_loop(
    dispatcher: Dispatcher,
    control: Arc<JobControl>,
    mut job: StreamJob,
    ticks: Arc<AtomicU64>,
) {
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::info;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("Stream thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set stream thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    let addressing = job.destination.addressing();
    let period = job.period.as_secs_f64();
    let mut virtual_time = 0.0_f64;

    while control.wait_runnable() {
        let tick_start = Instant::now();
        let jitter = job.jitter.sample();
        let pose = (job.generator)(virtual_time);
        let frame = Frame::stream(pose.left, pose.right);

        // negative or non-finite totals send immediately
        let wait = Duration::try_from_secs_f64(period + jitter).unwrap_or(Duration::ZERO);
        let remaining = (tick_start + wait).saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            spin_sleep::sleep(remaining);
        }

        match dispatcher.dispatch(&frame, addressing) {
            Ok(_) => trace!("stream t={:.3} {:?}", virtual_time, pose),
            Err(e) => warn!("Stream frame failed: {}", e),
        }
        ticks.fetch_add(1, Ordering::Relaxed);
        DispatchMetrics::bump(&dispatcher.counters().stream_ticks);
        virtual_time += period;
    }
    debug!("Stream thread exiting after {} ticks", ticks.load(Ordering::Relaxed));
}
