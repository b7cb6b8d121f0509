//! 驱动层错误类型定义

use smarticle_link::{DeviceId, LinkError};
use smarticle_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 链路错误（发送失败、未确认）
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// 协议编码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 单播目标不在注册表中
    #[error("Unknown device {0}")]
    Address(DeviceId),

    /// 尚未下发步态（同步周期无法计算）
    #[error("No gait initialized; call init_gait() first")]
    GaitNotInitialized,

    /// 同步线程未初始化或已因步态更新失效
    #[error("Sync not initialized; call init_sync() after every gait update")]
    SyncNotInitialized,

    /// 队列已关闭（消费线程退出）
    #[error("Queue closed")]
    ChannelClosed,

    /// 后台线程错误
    #[error("Background thread error: {0}")]
    Thread(String),

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let id = DeviceId::new(4).unwrap();
        assert_eq!(format!("{}", DriverError::Address(id)), "Unknown device #4");

        let err = DriverError::Protocol(ProtocolError::GaitTooLong { len: 20, max: 15 });
        assert!(format!("{}", err).contains("Gait has 20 points"));

        assert_eq!(format!("{}", DriverError::ChannelClosed), "Queue closed");
    }

    #[test]
    fn test_from_link_error() {
        let err: DriverError = LinkError::NotOpen.into();
        assert!(matches!(err, DriverError::Link(LinkError::NotOpen)));
    }
}
