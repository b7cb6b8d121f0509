//! 驱动层模块
//!
//! 本模块提供 smarticle 集群的后台任务与命令分发，包括：
//! - 帧分发（广播 / 逐设备确认广播 / 单播）
//! - 步态同步线程（周期性同步脉冲）
//! - 流式姿态任务（抖动可配置）
//! - 有序单播队列与 plank 策略
//!
//! All background jobs share one [`Dispatcher`] and one device registry
//! snapshot. Each job owns its own thread and is driven by a
//! [`JobControl`] state machine.

pub mod config;
pub mod dispatcher;
mod error;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod stream;
pub mod swarm;
pub mod sync;

pub use config::SwarmConfig;
pub use dispatcher::{Addressing, DispatchReport, Dispatcher};
pub use error::{ConfigError, DriverError};
pub use job::{JobControl, JobState, WaitOutcome};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use queue::{PlankDecision, PlankEntry, PlankPolicy, PoseEntry, QueueDispatcher, QueueEntry};
pub use stream::{Jitter, Pose, PoseGenerator, StreamDestination, StreamJob, StreamScheduler};
pub use swarm::{DiscoveryOutcome, Swarm, transmit_counts};
pub use sync::{DRIFT_CORRECTION, SyncCoordinator, SyncLog, SyncTiming};
