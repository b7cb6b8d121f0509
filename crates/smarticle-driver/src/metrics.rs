//! 发送指标
//!
//! 原子计数器，所有后台任务共享，任何线程都可无锁读取。

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// 广播帧数（不含逐设备确认广播）
    pub broadcast_frames: AtomicU64,
    /// 需确认的单播帧数（包括 AckBroadcast 展开的帧）
    pub unicast_frames: AtomicU64,
    /// 异步（不等待确认）单播帧数
    pub async_frames: AtomicU64,
    /// 未收到确认的次数
    pub ack_failures: AtomicU64,
    /// 其他发送失败次数
    pub transport_errors: AtomicU64,
    /// 已发出的同步脉冲
    pub sync_pulses: AtomicU64,
    /// 已完成的流式 tick
    pub stream_ticks: AtomicU64,
    /// 队列已消费的条目
    pub queue_items: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            broadcast_frames: self.broadcast_frames.load(Ordering::Relaxed),
            unicast_frames: self.unicast_frames.load(Ordering::Relaxed),
            async_frames: self.async_frames.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            sync_pulses: self.sync_pulses.load(Ordering::Relaxed),
            stream_ticks: self.stream_ticks.load(Ordering::Relaxed),
            queue_items: self.queue_items.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.broadcast_frames,
            &self.unicast_frames,
            &self.async_frames,
            &self.ack_failures,
            &self.transport_errors,
            &self.sync_pulses,
            &self.stream_ticks,
            &self.queue_items,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub broadcast_frames: u64,
    pub unicast_frames: u64,
    pub async_frames: u64,
    pub ack_failures: u64,
    pub transport_errors: u64,
    pub sync_pulses: u64,
    pub stream_ticks: u64,
    pub queue_items: u64,
}

impl MetricsSnapshot {
    /// Frames handed to the transport, acknowledged or not.
    pub fn total_frames(&self) -> u64 {
        self.broadcast_frames + self.unicast_frames + self.async_frames
    }
}
