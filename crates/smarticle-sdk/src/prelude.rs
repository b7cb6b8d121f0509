//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use smarticle_sdk::prelude::*;
//! ```

// 驱动层
pub use smarticle_driver::{
    Addressing, DispatchReport, Jitter, PlankDecision, PlankEntry, PlankPolicy, Pose, PoseEntry,
    QueueDispatcher, StreamDestination, StreamJob, StreamScheduler, Swarm, SwarmConfig,
};

// 链路层（常用 Trait）
pub use smarticle_link::{DeviceId, DeviceRegistry, Discovery, RemoteHandle, Transport};

// 协议层
pub use smarticle_protocol::{Command, DebugLevel, Frame, GaitSequence, Mode, StreamTarget};

// 错误类型
pub use smarticle_driver::{ConfigError, DriverError};
pub use smarticle_link::LinkError;
pub use smarticle_protocol::ProtocolError;
