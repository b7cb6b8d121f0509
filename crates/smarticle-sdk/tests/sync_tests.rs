//! 步态同步集成测试
//!
//! Timing-sensitive; serialised so concurrent tests do not skew the clock.

use serial_test::serial;
use smarticle_sdk::link::{DeviceRegistry, MockTransport};
use smarticle_sdk::prelude::*;
use smarticle_sdk::protocol::SYNC_PULSE;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn swarm(keep_time: bool) -> (Arc<MockTransport>, Swarm) {
    let mut config = SwarmConfig::default();
    config.dispatch.gait_pacing_ms = 1;
    config.sync.keep_time = keep_time;
    let mock = Arc::new(MockTransport::new());
    let swarm = Swarm::new(mock.clone(), config);
    swarm.dispatcher().publish_registry(DeviceRegistry::from_discovered([
        RemoteHandle::new(1, "SMART01"),
        RemoteHandle::new(2, "SMART02"),
    ]));
    (mock, swarm)
}

/// 4 points × 50 ms: 200 ms period, pulse every 164.3 ms.
fn short_gait() -> GaitSequence {
    GaitSequence::new(vec![0, 180, 180, 0], vec![0, 0, 180, 180], 50, 0).unwrap()
}

#[test]
fn test_period_from_gait() {
    let (_mock, mut swarm) = swarm(false);
    let gait = GaitSequence::new(vec![0, 180, 180, 0], vec![0, 0, 180, 180], 450, 0).unwrap();
    swarm.init_gait(&gait, Addressing::Broadcast).unwrap();
    let timing = swarm.gait_timing().unwrap();
    assert_eq!(timing.period(), Duration::from_millis(1800));
    assert_eq!(timing.pulse_interval(), Duration::from_micros(1_764_300));
}

#[test]
#[serial]
fn test_start_then_stop_sends_no_pulse() {
    let (mock, mut swarm) = swarm(false);
    swarm.init_gait(&short_gait(), Addressing::Broadcast).unwrap();
    swarm.init_sync().unwrap();
    mock.take_sent();

    swarm.start_sync().unwrap();
    swarm.stop_sync().unwrap();
    let period = swarm.gait_timing().unwrap().period();
    thread::sleep(period + Duration::from_millis(100));

    assert_eq!(mock.count_matching(&[SYNC_PULSE]), 0);
    // servo enable and disable only
    assert_eq!(mock.sent_count(), 2);
    assert!(!swarm.is_syncing());
}

#[test]
#[serial]
fn test_pulses_follow_corrected_period() {
    let (mock, mut swarm) = swarm(true);
    swarm.init_gait(&short_gait(), Addressing::Broadcast).unwrap();
    swarm.init_sync().unwrap();

    let start = Instant::now();
    swarm.start_sync().unwrap();
    thread::sleep(Duration::from_millis(600));
    swarm.stop_sync().unwrap();
    let elapsed = start.elapsed();

    let pulses = mock.count_matching(&[SYNC_PULSE]);
    assert!(pulses >= 2, "expected pulses, got {}", pulses);
    assert!(pulses as u128 <= elapsed.as_millis() / 164);

    let stamps = swarm.sync_timestamps();
    assert_eq!(stamps.len(), pulses);
    for pair in stamps.windows(2) {
        let gap = pair[1].duration_since(pair[0]).unwrap();
        assert!(gap >= Duration::from_millis(160), "gap {:?}", gap);
    }
    assert_eq!(swarm.metrics().sync_pulses, pulses as u64);
}

#[test]
#[serial]
fn test_sync_resumes_after_stop() {
    let (mock, mut swarm) = swarm(false);
    swarm.init_gait(&short_gait(), Addressing::Broadcast).unwrap();
    swarm.init_sync().unwrap();

    swarm.start_sync().unwrap();
    swarm.stop_sync().unwrap();
    swarm.start_sync().unwrap();
    thread::sleep(Duration::from_millis(250));
    swarm.stop_sync().unwrap();

    assert!(mock.count_matching(&[SYNC_PULSE]) >= 1);
}

#[test]
fn test_new_gait_requires_new_sync() {
    let (_mock, mut swarm) = swarm(false);
    swarm.init_gait(&short_gait(), Addressing::Broadcast).unwrap();
    swarm.init_sync().unwrap();
    swarm.init_gait(&short_gait(), Addressing::Broadcast).unwrap();
    assert!(matches!(swarm.start_sync(), Err(DriverError::SyncNotInitialized)));
}
