//! End-to-end mesh scenarios
//!
//! These tests drive the full pipeline through `MeshService`:
//! 1. Nodes register and receive identities
//! 2. Sends route over a fresh topology snapshot and seal for the receiver
//! 3. Receives open, verify and mark delivered

use crate::test_utils::{init_tracing, node, position_north, request, TestMesh, T0};
use himesh_core::{NodeStatus, Position};
use himesh_messaging::message::DEFAULT_TTL_MS;
use himesh_messaging::playback::{timeline, PlaybackEvent, DEFAULT_STEP};
use himesh_messaging::ServiceError;

#[test]
fn test_direct_delivery_scenario() {
    init_tracing();
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("BSF-BRAVO", 10.0);

    let receipt = mesh
        .service
        .send_at(request("ARMY-ALPHA", "BSF-BRAVO", "Convoy departing at 0600"), T0)
        .unwrap();
    assert_eq!(receipt.hop_count, 0);
    assert_eq!(receipt.path, vec![node("ARMY-ALPHA"), node("BSF-BRAVO")]);

    // Stored but not yet delivered
    let stored = mesh.service.ledger().get(&receipt.message_id, T0).unwrap().unwrap();
    assert!(!stored.delivered);
    assert_eq!(stored.delivered_at, None);
    assert_eq!(stored.failed_attempts, 0);
    assert_eq!(stored.expires_at, T0 + DEFAULT_TTL_MS);

    let inbox = mesh.service.receive_at("BSF-BRAVO", T0 + 500).unwrap();
    assert_eq!(inbox.failed, 0);
    assert_eq!(inbox.messages.len(), 1);
    assert_eq!(inbox.messages[0].content, "Convoy departing at 0600");
    assert!(inbox.messages[0].signature_valid);

    let stored = mesh.service.ledger().get(&receipt.message_id, T0 + 500).unwrap().unwrap();
    assert!(stored.delivered);
    assert_eq!(stored.delivered_at, Some(T0 + 500));

    // The sender never sees its own message as pending
    assert!(mesh.service.receive_at("ARMY-ALPHA", T0 + 600).unwrap().messages.is_empty());
}

#[test]
fn test_relay_chain_with_playback() {
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("ITBP-RELAY", 45.0);
    mesh.place_at("MED-CHARLIE", 90.0);

    let receipt = mesh
        .service
        .send_at(request("ARMY-ALPHA", "MED-CHARLIE", "Casualty at grid 41"), T0)
        .unwrap();
    assert_eq!(receipt.hop_count, 1);
    assert_eq!(receipt.path[1], node("ITBP-RELAY"));

    let events = timeline(&receipt.message_id, &receipt.to, &receipt.path, DEFAULT_STEP);
    assert_eq!(events.len(), 4);
    assert_eq!(events[3].offset_ms, 3_000);
    assert!(matches!(
        &events[3].event,
        PlaybackEvent::Delivered { to, .. } if to == &node("MED-CHARLIE")
    ));

    let inbox = mesh.service.receive_at("MED-CHARLIE", T0 + 1).unwrap();
    assert_eq!(inbox.messages[0].hop_count, 1);
    assert_eq!(inbox.messages[0].path.len(), 3);
}

#[test]
fn test_derated_links_break_routes() {
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("BSF-BRAVO", 45.0);
    // 40 south but 2500 higher: range drops to 35
    mesh.place("ITBP-PEAK", -40.0, 6500.0);

    mesh.service
        .send_at(request("ARMY-ALPHA", "BSF-BRAVO", "radio check"), T0)
        .unwrap();
    assert!(matches!(
        mesh.service.send_at(request("ARMY-ALPHA", "ITBP-PEAK", "radio check"), T0),
        Err(ServiceError::RouteNotFound { .. })
    ));

    // Low battery on either end drops the range to 40
    mesh.registry.update_battery(&node("BSF-BRAVO"), 15.0).unwrap();
    assert!(matches!(
        mesh.service.send_at(request("ARMY-ALPHA", "BSF-BRAVO", "radio check"), T0 + 1),
        Err(ServiceError::RouteNotFound { .. })
    ));

    // Moving closer restores the link
    mesh.registry
        .update_location(&node("BSF-BRAVO"), position_north(30.0, 4000.0))
        .unwrap();
    assert!(mesh
        .service
        .send_at(request("ARMY-ALPHA", "BSF-BRAVO", "radio check"), T0 + 2)
        .is_ok());
}

#[test]
fn test_offline_relay_is_avoided() {
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("BSF-NEAR", 40.0);
    mesh.place_at("MED-CHARLIE", 80.0);

    mesh.registry
        .update_status(&node("BSF-NEAR"), NodeStatus::Offline)
        .unwrap();
    assert!(matches!(
        mesh.service.send_at(request("ARMY-ALPHA", "MED-CHARLIE", "x"), T0),
        Err(ServiceError::RouteNotFound { .. })
    ));

    mesh.registry
        .update_status(&node("BSF-NEAR"), NodeStatus::Active)
        .unwrap();
    let receipt = mesh
        .service
        .send_at(request("ARMY-ALPHA", "MED-CHARLIE", "x"), T0)
        .unwrap();
    assert_eq!(receipt.hop_count, 1);
}

#[test]
fn test_rate_limit_window() {
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("BSF-BRAVO", 10.0);

    for i in 0..10 {
        mesh.service
            .send_at(request("ARMY-ALPHA", "BSF-BRAVO", &format!("update {i}")), T0 + i)
            .unwrap();
    }
    assert!(matches!(
        mesh.service.send_at(request("ARMY-ALPHA", "BSF-BRAVO", "update 10"), T0 + 30_000),
        Err(ServiceError::RateLimitExceeded(_))
    ));

    // Other senders are unaffected
    mesh.service
        .send_at(request("BSF-BRAVO", "ARMY-ALPHA", "ack"), T0 + 30_000)
        .unwrap();

    mesh.service
        .send_at(request("ARMY-ALPHA", "BSF-BRAVO", "update 10"), T0 + 60_000)
        .unwrap();
    assert_eq!(mesh.service.stats_at(T0 + 60_000).unwrap().total, 12);
}

#[test]
fn test_tampered_message_stays_pending() {
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("BSF-BRAVO", 10.0);

    let receipt = mesh
        .service
        .send_at(request("ARMY-ALPHA", "BSF-BRAVO", "Hold the bridge"), T0)
        .unwrap();

    let mut stored = mesh.service.ledger().get(&receipt.message_id, T0).unwrap().unwrap();
    let mut signature = stored.envelope.signature.into_bytes();
    signature[0] = if signature[0] == b'0' { b'1' } else { b'0' };
    stored.envelope.signature = String::from_utf8(signature).unwrap();
    stored.id = "MSG-0000000000000001".to_string();
    mesh.service.ledger().create(stored).unwrap();

    let inbox = mesh.service.receive_at("BSF-BRAVO", T0 + 1).unwrap();
    assert_eq!(inbox.messages.len(), 2);
    let tampered = inbox
        .messages
        .iter()
        .find(|m| m.message_id == "MSG-0000000000000001")
        .unwrap();
    assert!(!tampered.signature_valid);

    let stats = mesh.service.stats_at(T0 + 2).unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.delivery_rate, 0.5);
}

#[test]
fn test_expired_messages_are_not_delivered() {
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("BSF-BRAVO", 10.0);

    let receipt = mesh
        .service
        .send_at(request("ARMY-ALPHA", "BSF-BRAVO", "stale by morning"), T0)
        .unwrap();

    let late = receipt.expires_at;
    assert!(mesh.service.receive_at("BSF-BRAVO", late).unwrap().messages.is_empty());
    assert!(mesh.service.history_at("BSF-BRAVO", late).unwrap().is_empty());
    assert_eq!(mesh.service.purge_expired(late).unwrap(), 1);
    assert!(mesh.service.ledger().get(&receipt.message_id, T0).unwrap().is_none());
}

#[test]
fn test_removed_sender_leaves_messages_unopenable() {
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("BSF-BRAVO", 10.0);

    mesh.service
        .send_at(request("ARMY-ALPHA", "BSF-BRAVO", "last words"), T0)
        .unwrap();
    mesh.registry.remove(&node("ARMY-ALPHA")).unwrap();

    // Messages are not cascaded, but the sender key is gone
    let inbox = mesh.service.receive_at("BSF-BRAVO", T0 + 1).unwrap();
    assert!(inbox.messages.is_empty());
    assert_eq!(inbox.failed, 1);

    // History still decrypts without verification
    let history = mesh.service.history_at("BSF-BRAVO", T0 + 2).unwrap();
    assert_eq!(history[0].content.as_deref(), Some("last words"));
    assert!(!history[0].delivered);
}

#[test]
fn test_registration_validation() {
    let mesh = TestMesh::new();
    mesh.place_at("ARMY-ALPHA", 0.0);

    let duplicate = mesh.service.register(himesh_mesh::Registration {
        node_id: "ARMY-ALPHA".to_string(),
        name: "Second Alpha".to_string(),
        unit: "Indian Army".to_string(),
        post: "Kargil".to_string(),
        position: Position::new(34.0, 77.5, 4000.0),
    });
    assert!(matches!(duplicate, Err(ServiceError::Validation(_))));

    let out_of_theatre = mesh.service.register(himesh_mesh::Registration {
        node_id: "BSF-DELTA".to_string(),
        name: "Delta".to_string(),
        unit: "BSF".to_string(),
        post: "Rann".to_string(),
        position: Position::new(23.5, 70.0, 50.0),
    });
    assert!(matches!(out_of_theatre, Err(ServiceError::Validation(_))));
    assert_eq!(mesh.registry.len(), 1);
}
