//! 队列分发集成测试

use smarticle_sdk::link::{Destination, DeviceRegistry, MockTransport};
use smarticle_sdk::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn swarm(n: u64) -> (Arc<MockTransport>, Swarm) {
    let mock = Arc::new(MockTransport::new());
    let swarm = Swarm::new(mock.clone(), SwarmConfig::default());
    swarm.dispatcher().publish_registry(DeviceRegistry::from_discovered(
        (1..=n).map(|i| RemoteHandle::new(i, format!("SMART{:02}", i))),
    ));
    (mock, swarm)
}

fn id(n: u8) -> DeviceId {
    DeviceId::new(n).unwrap()
}

fn plank_bytes(state: bool) -> Vec<u8> {
    Command::SetPlank(vec![state]).encode().unwrap().as_bytes().to_vec()
}

fn unicasts(mock: &MockTransport) -> Vec<(u64, Vec<u8>)> {
    mock.sent()
        .into_iter()
        .map(|f| match f.destination {
            Destination::Unicast { address, acknowledged: false } => (address, f.bytes),
            other => panic!("unexpected destination {:?}", other),
        })
        .collect()
}

#[test]
fn test_deplank_then_plank_order() {
    let (mock, swarm) = swarm(2);
    // slow transport keeps both entries queued at once
    mock.set_send_delay(Duration::from_millis(20));
    let queue = swarm.plank_queue().unwrap();
    queue.enqueue(PlankEntry::deplank(id(1))).unwrap();
    queue.enqueue(PlankEntry::plank(id(2))).unwrap();
    queue.shutdown();

    assert_eq!(
        unicasts(&mock),
        vec![(1, plank_bytes(false)), (2, plank_bytes(true))]
    );
}

#[test]
fn test_policy_from_action_scores() {
    let (mock, swarm) = swarm(3);
    let ids: Vec<DeviceId> = swarm.registry().ids().collect();
    let queue = swarm.plank_queue().unwrap();
    let mut policy = PlankPolicy::new();

    policy.update(&queue, &[0.9, 0.1, 0.0, 0.0], &ids).unwrap();
    policy.update(&queue, &[0.8, 0.1, 0.0, 0.1], &ids).unwrap();
    policy.update(&queue, &[0.0, 0.2, 0.7, 0.1], &ids).unwrap();
    policy.update(&queue, &[0.0, 0.0, 0.0, 1.0], &ids).unwrap();
    assert_eq!(policy.planked(), None);
    queue.shutdown();

    assert_eq!(
        unicasts(&mock),
        vec![
            (1, plank_bytes(true)),
            (1, plank_bytes(false)),
            (3, plank_bytes(true)),
            (3, plank_bytes(false)),
        ]
    );
}

#[test]
fn test_pose_queue_streams_raw_subframes() {
    let (mock, swarm) = swarm(2);
    let queue = swarm.pose_queue().unwrap();
    queue.enqueue(PoseEntry::new(10, 20, id(2))).unwrap();
    queue.enqueue(PoseEntry::new(250, 0, id(1))).unwrap();
    queue.shutdown();

    assert_eq!(
        unicasts(&mock),
        vec![(2, vec![42, 52, 0x12]), (1, vec![254, 32, 0x12])]
    );
    assert_eq!(swarm.metrics().queue_items, 2);
}
