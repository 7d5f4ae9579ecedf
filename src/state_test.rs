use super::*;
use test_helpers::{assert_no_frame, recv_frame, test_member};

#[test]
fn room_state_new_is_empty() {
    let room = RoomState::new("r1", 10);
    assert_eq!(room.room_id, "r1");
    assert_eq!(room.member_count(), 0);
    assert!(room.list_members().is_empty());
    assert!(room.history.is_empty());
    assert_eq!(room.history.limit(), 10);
    assert!(room.created_at > 0);
}

#[test]
fn add_member_rejects_duplicate_connection() {
    let mut room = RoomState::new("r1", 10);
    let (user, tx, _rx) = test_member("Ada");

    assert!(room.add_member(user.clone(), tx.clone()));
    assert!(!room.add_member(user.clone(), tx));
    assert_eq!(room.member_count(), 1);
    assert!(room.is_member(user.connection_id));
}

#[test]
fn remove_then_add_restores_single_entry() {
    let mut room = RoomState::new("r1", 10);
    let (user, tx, _rx) = test_member("Ada");
    let id = user.connection_id;

    for _ in 0..3 {
        room.add_member(user.clone(), tx.clone());
        room.add_member(user.clone(), tx.clone());
        assert!(room.remove_member(id).is_some());
        assert!(room.remove_member(id).is_none());
        room.add_member(user.clone(), tx.clone());
        let occurrences = room.list_members().iter().filter(|m| m.id == id).count();
        assert_eq!(occurrences, 1);
        room.remove_member(id);
    }
    assert_eq!(room.member_count(), 0);
}

#[test]
fn list_members_keeps_join_order() {
    let mut room = RoomState::new("r1", 10);
    let (a, tx_a, _rx_a) = test_member("Ada");
    let (b, tx_b, _rx_b) = test_member("Bob");
    room.add_member(a, tx_a);
    room.add_member(b, tx_b);

    let names: Vec<String> = room.list_members().into_iter().map(|m| m.display_name).collect();
    assert_eq!(names, vec!["Ada", "Bob"]);
}

#[test]
fn member_mut_updates_activity() {
    let mut room = RoomState::new("r1", 10);
    let (user, tx, _rx) = test_member("Ada");
    let id = user.connection_id;
    room.add_member(user, tx);

    room.member_mut(id).expect("member").last_active_at = 42;
    assert_eq!(room.member(id).map(|m| m.last_active_at), Some(42));
}

#[tokio::test]
async fn broadcast_skips_excluded_member() {
    let mut room = RoomState::new("r1", 10);
    let (a, tx_a, mut rx_a) = test_member("Ada");
    let (b, tx_b, mut rx_b) = test_member("Bob");
    let a_id = a.connection_id;
    room.add_member(a, tx_a);
    room.add_member(b, tx_b);

    room.broadcast(&ServerFrame::MemberLeft { id: Uuid::nil() }, Some(a_id));

    assert_eq!(recv_frame(&mut rx_b).await, ServerFrame::MemberLeft { id: Uuid::nil() });
    assert_no_frame(&mut rx_a).await;
}

#[tokio::test]
async fn full_queue_releases_member_sender() {
    let mut room = RoomState::new("r1", 10);
    let (slow_tx, mut slow_rx) = mpsc::channel(1);
    let slow = ConnectedUser::new(Uuid::new_v4(), "Slow", "#000");
    let slow_id = slow.connection_id;
    room.add_member(slow, slow_tx);

    room.broadcast(&ServerFrame::CanvasCleared { requester_id: Uuid::nil() }, None);
    room.broadcast(&ServerFrame::MemberLeft { id: Uuid::nil() }, None);

    // The queued frame still arrives, then the stream ends instead of skipping ahead.
    assert!(matches!(recv_frame(&mut slow_rx).await, ServerFrame::CanvasCleared { .. }));
    assert!(slow_rx.recv().await.is_none());
    assert!(room.is_member(slow_id));
}

#[tokio::test]
async fn full_queue_drops_cursor_updates_only() {
    let mut room = RoomState::new("r1", 10);
    let (slow_tx, mut slow_rx) = mpsc::channel(1);
    let slow = ConnectedUser::new(Uuid::new_v4(), "Slow", "#000");
    room.add_member(slow, slow_tx);

    let cursor = |x| ServerFrame::CursorUpdate {
        id: Uuid::nil(),
        display_name: "Ada".into(),
        display_color: "#000".into(),
        x,
        y: 0.0,
    };
    room.broadcast(&cursor(1.0), None);
    room.broadcast(&cursor(2.0), None);

    assert_eq!(recv_frame(&mut slow_rx).await, cursor(1.0));
    room.broadcast(&ServerFrame::CanvasCleared { requester_id: Uuid::nil() }, None);
    assert!(matches!(recv_frame(&mut slow_rx).await, ServerFrame::CanvasCleared { .. }));
}

#[test]
fn connected_user_info_exposes_public_fields() {
    let user = ConnectedUser::new(Uuid::nil(), "Ada", "#ff0000");
    let info = user.info();
    assert_eq!(info.id, Uuid::nil());
    assert_eq!(info.display_name, "Ada");
    assert_eq!(info.display_color, "#ff0000");
    assert!(user.last_active_at > 0);
}
