mod common;

use common::{addr, decode, member, settings, TestNode};
use murmur::gossip::{GossipMessage, MessageType};
use murmur::membership::HeartbeatState;
use murmur::transport::MemoryNetwork;

const NOW: i64 = 5_000_000;

#[tokio::test]
async fn test_lonely_member_sends_nothing() {
    let network = MemoryNetwork::new();
    let a = TestNode::new(&network, settings(9000, &[]));

    let summary = a.controller.run_round_at(NOW).await.unwrap();

    assert_eq!(summary.version, 1);
    assert_eq!(summary.digests, 1);
    assert!(summary.live_target.is_none());
    assert!(summary.undiscoverable_target.is_none());
    assert!(summary.seed_target.is_none());
    assert!(a.transport.sent().is_empty());
}

#[tokio::test]
async fn test_gossip_never_targets_self() {
    let network = MemoryNetwork::new();
    let a = TestNode::new(&network, settings(9000, &[]));
    for port in 9001..9005 {
        a.knows_up(&member(port), HeartbeatState::new(NOW, 1));
    }
    a.controller
        .store()
        .put_heartbeat(member(9010), HeartbeatState::new(NOW - 1_000_000, 1));
    a.controller.store().mark_down(&member(9010)).unwrap();

    for _ in 0..50 {
        let summary = a.controller.run_round_at(NOW).await.unwrap();
        let live_target = summary.live_target.unwrap();
        assert_ne!(live_target, a.member());
        assert_eq!(summary.undiscoverable_target, Some(member(9010)));
    }

    assert!(a.transport.sent_to(addr(9000)).is_empty());
    assert_eq!(a.sent_types_to(addr(9010)).len(), 50);
}

#[tokio::test]
async fn test_sync_carries_every_endpoint() {
    let network = MemoryNetwork::new();
    let a = TestNode::new(&network, settings(9000, &[]));
    a.knows_up(&member(9001), HeartbeatState::new(NOW - 10, 3));

    a.controller.run_round_at(NOW).await.unwrap();

    let sent = a.transport.sent_to(addr(9001));
    assert_eq!(sent.len(), 1);
    match decode(&sent[0]) {
        GossipMessage::Sync(digests) => {
            assert_eq!(digests.len(), 2);
            let own = digests.iter().find(|d| d.id == "m9000").unwrap();
            assert_eq!(own.heartbeat(), HeartbeatState::new(NOW, 1));
            let other = digests.iter().find(|d| d.id == "m9001").unwrap();
            assert_eq!(other.heartbeat(), HeartbeatState::new(NOW - 10, 3));
        }
        other => panic!("expected SYNC, got {:?}", other),
    }
}

#[tokio::test]
async fn test_seed_contacted_when_nobody_is_live() {
    let network = MemoryNetwork::new();
    let a = TestNode::new(&network, settings(9000, &[9100]));

    let summary = a.controller.run_round_at(NOW).await.unwrap();

    assert!(summary.live_target.is_none());
    assert_eq!(summary.seed_target, Some(addr(9100)));
    assert_eq!(a.sent_types_to(addr(9100)), vec![MessageType::Sync]);
}

#[tokio::test]
async fn test_seed_that_is_self_is_skipped() {
    let network = MemoryNetwork::new();
    let a = TestNode::new(&network, settings(9000, &[9000]));

    let summary = a.controller.run_round_at(NOW).await.unwrap();

    assert!(summary.seed_target.is_none());
    assert!(a.transport.sent().is_empty());
}

#[tokio::test]
async fn test_live_seed_target_suppresses_extra_seed_send() {
    let network = MemoryNetwork::new();
    let a = TestNode::new(&network, settings(9000, &[9001]));
    a.knows_up(&member(9001), HeartbeatState::new(NOW, 1));

    for _ in 0..20 {
        // the only other live member is the seed and live(2) > seeds(1)
        let summary = a.controller.run_round_at(NOW).await.unwrap();
        assert_eq!(summary.live_target, Some(member(9001)));
        assert!(summary.seed_target.is_none());
    }
    assert_eq!(a.sent_types_to(addr(9001)).len(), 20);
}

#[tokio::test]
async fn test_seed_fallback_when_few_members_are_live() {
    let network = MemoryNetwork::new();
    let a = TestNode::new(&network, settings(9000, &[9001, 9100]));
    a.knows_up(&member(9001), HeartbeatState::new(NOW, 1));

    // live(2) <= seeds(2): a seed send is attempted with probability 2/2
    let summary = a.controller.run_round_at(NOW).await.unwrap();
    assert_eq!(summary.live_target, Some(member(9001)));
    let seed = summary.seed_target.unwrap();
    assert!(seed == addr(9001) || seed == addr(9100));
}

#[tokio::test]
async fn test_seed_traffic_thins_out_in_large_views() {
    let network = MemoryNetwork::new();
    let a = TestNode::new(&network, settings(9000, &[9100]));
    for port in 9001..9005 {
        a.knows_up(&member(port), HeartbeatState::new(NOW, 1));
    }

    // five live members and one seed: probability 1/5 per round
    let mut seed_sends = 0;
    for _ in 0..200 {
        if a.controller.run_round_at(NOW).await.unwrap().seed_target.is_some() {
            seed_sends += 1;
        }
    }
    assert!(seed_sends > 0);
    assert!(seed_sends < 200);
    assert_eq!(a.sent_types_to(addr(9100)).len(), seed_sends);
}

#[tokio::test]
async fn test_unreachable_target_does_not_abort_round() {
    let network = MemoryNetwork::new();
    let a = TestNode::new(&network, settings(9000, &[9100, 9101]));
    a.knows_up(&member(9001), HeartbeatState::new(NOW, 1));
    network.set_unreachable(addr(9001));

    let summary = a.controller.run_round_at(NOW).await.unwrap();

    // the failed live send is absorbed and the seed step still runs
    assert_eq!(summary.live_target, Some(member(9001)));
    assert!(summary.seed_target.is_some());
    assert!(a.transport.sent_to(addr(9001)).is_empty());
    assert_eq!(a.transport.sent().len(), 1);
}
