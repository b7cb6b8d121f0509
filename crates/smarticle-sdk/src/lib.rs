//! Smarticle SDK - 机器人集群 Rust SDK
//!
//! 通过共享无线链路驱动 smarticle 集群：步态下发、周期同步、流式姿态与有序单播队列。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 帧编码、操作码、步态序列
//! - **链路层** (`link`): 发送接口、设备注册表、网络发现
//! - **驱动层** (`driver`): 分发器、同步线程、流式任务、队列
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use smarticle_sdk::prelude::*;
//! # fn run(transport: std::sync::Arc<dyn Transport>, discovery: &mut dyn Discovery) -> Result<(), DriverError> {
//! smarticle_sdk::init_logger!();
//!
//! let mut swarm = Swarm::new(transport, SwarmConfig::default());
//! swarm.build_network(discovery, Some(5))?;
//!
//! let gait = GaitSequence::new(vec![0, 180, 180, 0], vec![0, 0, 180, 180], 450, 0)?;
//! swarm.init_gait(&gait, Addressing::Broadcast)?;
//! swarm.init_sync()?;
//! swarm.start_sync()?;
//! # Ok(())
//! # }
//! ```

pub mod logging;
pub mod prelude;

pub use smarticle_driver as driver;
pub use smarticle_link as link;
pub use smarticle_protocol as protocol;

// 常用类型
pub use smarticle_driver::{
    Addressing, DispatchReport, Dispatcher, DriverError, Swarm, SwarmConfig,
};
pub use smarticle_link::{DeviceId, Discovery, LinkError, RemoteHandle, Transport};
pub use smarticle_protocol::{Command, Frame, GaitSequence, ProtocolError};
