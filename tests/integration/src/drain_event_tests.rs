//! Battery drain and event fan-out against live routing

use crate::test_utils::{node, request, TestMesh, T0};
use himesh_core::{MeshEvent, NodeStatus};
use himesh_mesh::BatteryDrain;
use himesh_messaging::ServiceError;
use std::time::Duration;

#[test]
fn test_drain_breaks_long_links() {
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("BSF-BRAVO", 45.0);
    mesh.registry.update_battery(&node("BSF-BRAVO"), 25.0).unwrap();

    mesh.service
        .send_at(request("ARMY-ALPHA", "BSF-BRAVO", "before"), T0)
        .unwrap();

    let drain = BatteryDrain::new(mesh.registry.clone(), Duration::from_secs(30), 5.0);
    assert_eq!(drain.tick(), 2);

    let bravo = mesh.registry.get(&node("BSF-BRAVO")).unwrap();
    assert_eq!(bravo.battery_level, 20.0);
    assert_eq!(bravo.status, NodeStatus::Active);
    assert_eq!(mesh.registry.snapshot().active_connections(), 2);

    drain.tick();
    let bravo = mesh.registry.get(&node("BSF-BRAVO")).unwrap();
    assert_eq!(bravo.status, NodeStatus::LowBattery);
    assert_eq!(mesh.registry.snapshot().active_connections(), 0);

    assert!(matches!(
        mesh.service.send_at(request("ARMY-ALPHA", "BSF-BRAVO", "after"), T0 + 1),
        Err(ServiceError::RouteNotFound { .. })
    ));
}

#[tokio::test]
async fn test_events_follow_message_lifecycle() {
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("BSF-BRAVO", 10.0);
    let mut rx = mesh.registry.events().subscribe();

    let receipt = mesh
        .service
        .send_at(request("ARMY-ALPHA", "BSF-BRAVO", "status report"), T0)
        .unwrap();
    mesh.service.receive_at("BSF-BRAVO", T0 + 1).unwrap();
    mesh.registry.remove(&node("ARMY-ALPHA")).unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let MeshEvent::MessageDelivered { message_id, .. } = &event {
            assert_eq!(message_id, &receipt.message_id);
        }
        kinds.push(event.kind());
    }
    assert_eq!(
        kinds,
        vec!["message_routed", "message_delivered", "node_removed", "topology_changed"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_running_drain_reaches_subscribers() {
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("BSF-BRAVO", 10.0);
    mesh.registry
        .update_status(&node("BSF-BRAVO"), NodeStatus::Offline)
        .unwrap();
    let mut rx = mesh.registry.events().subscribe();

    let handle = tokio::spawn(
        BatteryDrain::new(mesh.registry.clone(), Duration::from_secs(60), 0.5).run(),
    );

    match rx.recv().await.unwrap() {
        MeshEvent::TopologyChanged { nodes, connections, .. } => {
            let alpha = nodes.iter().find(|n| n.id == node("ARMY-ALPHA")).unwrap();
            let bravo = nodes.iter().find(|n| n.id == node("BSF-BRAVO")).unwrap();
            assert_eq!(alpha.battery_level, 99.5);
            assert_eq!(bravo.battery_level, 100.0);
            // Offline nodes keep their geometric links
            assert_eq!(connections.len(), 2);
        }
        other => panic!("unexpected event {other:?}"),
    }
    handle.abort();
}
