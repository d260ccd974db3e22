//! The service running over the SQLite ledger

use crate::test_utils::{node, request, temp_db_path, TestMesh, T0};
use himesh_messaging::{MessageStore, SqliteLedger};
use std::path::Path;
use std::sync::Arc;

fn remove_db(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}

#[test]
fn test_delivery_survives_reopen() {
    let path = temp_db_path();
    let message_id;
    {
        let ledger = Arc::new(SqliteLedger::open(&path).unwrap());
        let mesh = TestMesh::with_ledger(ledger);
        mesh.place_at("ARMY-ALPHA", 0.0);
        mesh.place_at("ITBP-RELAY", 45.0);
        mesh.place_at("MED-CHARLIE", 90.0);

        let mut req = request("ARMY-ALPHA", "MED-CHARLIE", "Evac at first light");
        req.priority = Some("critical".to_string());
        req.message_type = Some("medical-emergency".to_string());
        req.attachment = Some("data:image/jpeg;base64,/9j/4AAQ".to_string());
        let receipt = mesh.service.send_at(req, T0).unwrap();
        message_id = receipt.message_id;

        let inbox = mesh.service.receive_at("MED-CHARLIE", T0 + 10).unwrap();
        assert_eq!(inbox.messages.len(), 1);
        assert_eq!(
            inbox.messages[0].attachment.as_deref(),
            Some("data:image/jpeg;base64,/9j/4AAQ")
        );
    }

    let reopened = SqliteLedger::open(&path).unwrap();
    let stored = reopened.get(&message_id, T0 + 20).unwrap().unwrap();
    assert!(stored.delivered);
    assert_eq!(stored.delivered_at, Some(T0 + 10));
    assert_eq!(stored.hop_count, 1);
    assert_eq!(stored.path_ids()[1], node("ITBP-RELAY"));
    assert!(stored.envelope.has_attachment);

    let stats = reopened.stats(T0 + 20).unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.critical, 1);
    assert_eq!(stats.with_attachments, 1);
    assert_eq!(stats.average_hop_count, 1.0);

    drop(reopened);
    remove_db(&path);
}

#[test]
fn test_history_and_expiry_on_sqlite() {
    let mesh = TestMesh::with_ledger(Arc::new(SqliteLedger::in_memory().unwrap()));
    mesh.place_at("ARMY-ALPHA", 0.0);
    mesh.place_at("BSF-BRAVO", 10.0);

    let first = mesh
        .service
        .send_at(request("ARMY-ALPHA", "BSF-BRAVO", "first"), T0)
        .unwrap();
    mesh.service
        .send_at(request("BSF-BRAVO", "ARMY-ALPHA", "second"), T0 + 1_000)
        .unwrap();

    let history = mesh.service.history_at("BSF-BRAVO", T0 + 2_000).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].content.is_none());
    assert_eq!(history[1].message_id, first.message_id);
    assert_eq!(history[1].content.as_deref(), Some("first"));

    // Only the first has expired at its own deadline
    let history = mesh.service.history_at("BSF-BRAVO", first.expires_at).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(mesh.service.purge_expired(first.expires_at).unwrap(), 1);
    assert_eq!(mesh.service.stats_at(first.expires_at).unwrap().total, 1);
}
