use rusty_livechat::core::connection::Connection;
use rusty_livechat::core::message::ChatUser;
use rusty_livechat::core::server::{ChatServer, SendOutcome, SharedChatServer};
use rusty_livechat::error::LiveChatError;
use rusty_livechat::moderation::BlockReason;
use rusty_livechat::storage::memory::{MemoryStore, SeedData};
use rusty_livechat::storage::traits::{BannedWordRule, ChatRoom, Consequence};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;
use warp::ws::Message;

fn seeded_server(history_length: usize) -> (SharedChatServer, Arc<MemoryStore>) {
    let seed = SeedData {
        rooms: vec![
            ChatRoom {
                id: 1,
                organization_id: 100,
                identifier: "chatroom_launch".to_string(),
                title: "Launch".to_string(),
            },
            ChatRoom {
                id: 2,
                organization_id: 200,
                identifier: "chatroom_other".to_string(),
                title: "Other".to_string(),
            },
        ],
        banned_words: vec![BannedWordRule {
            id: 1,
            organization_id: None,
            word: "badword".to_string(),
            consequence: Consequence::PermanentBan,
        }],
        mutes: Vec::new(),
    };
    let store = Arc::new(MemoryStore::from_seed(seed));
    let server = ChatServer::builder()
        .history_length(history_length)
        .memory_store(store.clone())
        .build()
        .unwrap();
    (server, store)
}

fn connect(server: &SharedChatServer, id: &str, ip: &str) -> UnboundedReceiver<Message> {
    let (tx, rx) = mpsc::unbounded_channel();
    server.connect(Connection::with_id(id.to_string(), tx, Some(ip.parse().unwrap())));
    rx
}

fn user(name: &str) -> ChatUser {
    ChatUser {
        username: name.to_string(),
        photo_url: Some(format!("https://cdn.example.com/{}.png", name)),
    }
}

async fn next_event(rx: &mut UnboundedReceiver<Message>) -> Value {
    let msg = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed");
    serde_json::from_str(msg.to_str().unwrap()).unwrap()
}

async fn assert_silent(rx: &mut UnboundedReceiver<Message>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "unexpected event delivered");
}

#[tokio::test]
async fn test_join_delivers_history_in_order() {
    let (server, _store) = seeded_server(3);
    let _sender_rx = connect(&server, "sender", "192.0.2.1");

    for text in ["one", "two", "three", "four"] {
        server
            .send_message("sender", "chatroom_launch", user("alice"), text.to_string())
            .await
            .unwrap();
    }

    let mut rx = connect(&server, "viewer", "192.0.2.2");
    let count = server.join_room("viewer", "chatroom_launch").await.unwrap();
    assert_eq!(count, 3);

    let event = next_event(&mut rx).await;
    assert_eq!(event["event"], "chat.messages");
    let texts: Vec<&str> = event["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["two", "three", "four"]);
    assert_eq!(event["data"][0]["username"], "alice");
}

#[tokio::test]
async fn test_join_empty_room_sends_empty_snapshot() {
    let (server, _store) = seeded_server(5);
    let mut rx = connect(&server, "viewer", "192.0.2.2");

    assert_eq!(server.join_room("viewer", "chatroom_launch").await.unwrap(), 0);
    let event = next_event(&mut rx).await;
    assert_eq!(event["event"], "chat.messages");
    assert_eq!(event["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_message_reaches_members_only() {
    let (server, _store) = seeded_server(5);
    let mut alice = connect(&server, "alice", "192.0.2.1");
    let mut bob = connect(&server, "bob", "192.0.2.2");
    let mut outsider = connect(&server, "outsider", "192.0.2.3");

    server.join_room("alice", "chatroom_launch").await.unwrap();
    server.join_room("bob", "chatroom_launch").await.unwrap();
    server.join_room("outsider", "chatroom_other").await.unwrap();
    next_event(&mut alice).await;
    next_event(&mut bob).await;
    next_event(&mut outsider).await;

    let outcome = server
        .send_message("alice", "chatroom_launch", user("alice"), "hello all".to_string())
        .await
        .unwrap();
    let id = match outcome {
        SendOutcome::Delivered(id) => id,
        other => panic!("unexpected outcome {:?}", other),
    };

    // The sender is a member and receives its own message
    for rx in [&mut alice, &mut bob] {
        let event = next_event(rx).await;
        assert_eq!(event["event"], "chat.messages");
        assert_eq!(event["data"][0]["id"], id.as_str());
        assert_eq!(event["data"][0]["message"], "hello all");
        assert_eq!(event["data"][0]["photo_url"], "https://cdn.example.com/alice.png");
    }
    assert_silent(&mut outsider).await;
}

#[tokio::test]
async fn test_leave_stops_delivery() {
    let (server, _store) = seeded_server(5);
    let mut viewer = connect(&server, "viewer", "192.0.2.2");
    let _sender = connect(&server, "sender", "192.0.2.1");

    server.join_room("viewer", "chatroom_launch").await.unwrap();
    next_event(&mut viewer).await;
    server.leave_room("viewer", "chatroom_launch").await.unwrap();

    server
        .send_message("sender", "chatroom_launch", user("sam"), "anyone?".to_string())
        .await
        .unwrap();
    assert_silent(&mut viewer).await;
}

#[tokio::test]
async fn test_revoke_removes_from_history_and_notifies() {
    let (server, _store) = seeded_server(5);
    let mut viewer = connect(&server, "viewer", "192.0.2.2");
    let _sender = connect(&server, "sender", "192.0.2.1");
    server.join_room("viewer", "chatroom_launch").await.unwrap();
    next_event(&mut viewer).await;

    let id = match server
        .send_message("sender", "chatroom_launch", user("sam"), "oops".to_string())
        .await
        .unwrap()
    {
        SendOutcome::Delivered(id) => id,
        other => panic!("unexpected outcome {:?}", other),
    };
    server
        .revoke_message("sender", "chatroom_launch", &id)
        .await
        .unwrap();
    assert!(server.history().snapshot(1).is_empty());

    // The message frame always precedes its revoke
    let event = next_event(&mut viewer).await;
    assert_eq!(event["event"], "chat.messages");
    assert_eq!(event["data"][0]["id"], id.as_str());
    let event = next_event(&mut viewer).await;
    assert_eq!(event["event"], "chat.revoke-message");
    assert_eq!(event["data"]["id"], id.as_str());
    assert!(server.history().snapshot(1).is_empty());

    // Revoking an unknown id still notifies and succeeds
    server
        .revoke_message("sender", "chatroom_launch", "no-such-id")
        .await
        .unwrap();
    assert_eq!(next_event(&mut viewer).await["data"]["id"], "no-such-id");
}

#[tokio::test]
async fn test_banned_word_blocks_and_mutes_sender() {
    let (server, store) = seeded_server(5);
    let mut viewer = connect(&server, "viewer", "192.0.2.2");
    let _sender = connect(&server, "sender", "198.51.100.9");
    server.join_room("viewer", "chatroom_launch").await.unwrap();
    next_event(&mut viewer).await;

    let outcome = server
        .send_message("sender", "chatroom_launch", user("troll"), "BADWORD!".to_string())
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        SendOutcome::Blocked(BlockReason::BannedWord { rule_id: 1, .. })
    ));
    assert_silent(&mut viewer).await;
    assert!(server.history().snapshot(1).is_empty());

    // The auto-mute also catches a new username from the same address
    let mut muted = false;
    for _ in 0..50 {
        if !store.all_mutes().await.is_empty() {
            muted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(muted);

    let outcome = server
        .send_message("sender", "chatroom_launch", user("fresh-name"), "hi".to_string())
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Blocked(BlockReason::Muted));
    assert_silent(&mut viewer).await;
    assert!(server.history().snapshot(1).is_empty());
}

#[tokio::test]
async fn test_invalid_sends_are_rejected() {
    let (server, _store) = seeded_server(5);
    let _rx = connect(&server, "sender", "192.0.2.1");

    let err = server
        .send_message("sender", "chatroom_launch", user("sam"), "   ".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, LiveChatError::ValidationError(_)));

    let err = server
        .send_message("sender", "chatroom_missing", user("sam"), "hi".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, LiveChatError::RoomNotFound(_)));
}

#[tokio::test]
async fn test_disconnect_leaves_every_room() {
    let (server, _store) = seeded_server(5);
    let _rx = connect(&server, "viewer", "192.0.2.2");
    server.join_room("viewer", "chatroom_launch").await.unwrap();
    server.join_room("viewer", "chatroom_other").await.unwrap();
    assert_eq!(server.broadcaster().rooms_of("viewer").len(), 2);

    server.disconnect("viewer");

    assert!(server.broadcaster().rooms_of("viewer").is_empty());
    assert!(server.broadcaster().members(1).is_empty());
    assert!(server.broadcaster().members(2).is_empty());
    assert_eq!(server.broadcaster().connection_count(), 0);
}

#[tokio::test]
async fn test_sent_message_is_in_history_when_send_returns() {
    let (server, _store) = seeded_server(5);
    let _sender = connect(&server, "sender", "192.0.2.1");

    let outcome = server
        .send_message("sender", "chatroom_launch", user("sam"), "first".to_string())
        .await
        .unwrap();
    let snapshot = server.history().snapshot(1);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(SendOutcome::Delivered(snapshot[0].id.clone()), outcome);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_immediate_revoke_never_leaves_message_buffered() {
    let (server, _store) = seeded_server(25);
    let _sender = connect(&server, "sender", "192.0.2.1");

    for i in 0..200 {
        let id = match server
            .send_message("sender", "chatroom_launch", user("sam"), format!("msg {}", i))
            .await
            .unwrap()
        {
            SendOutcome::Delivered(id) => id,
            other => panic!("unexpected outcome {:?}", other),
        };
        server
            .revoke_message("sender", "chatroom_launch", &id)
            .await
            .unwrap();
    }

    // Give any stray background work a chance to run
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.history().snapshot(1).is_empty());
}

#[tokio::test]
async fn test_join_snapshot_excludes_later_messages() {
    let (server, _store) = seeded_server(5);
    let _sender = connect(&server, "sender", "192.0.2.1");
    server
        .send_message("sender", "chatroom_launch", user("sam"), "before".to_string())
        .await
        .unwrap();

    let mut viewer = connect(&server, "viewer", "192.0.2.2");
    server.join_room("viewer", "chatroom_launch").await.unwrap();
    server
        .send_message("sender", "chatroom_launch", user("sam"), "after".to_string())
        .await
        .unwrap();

    let snapshot = next_event(&mut viewer).await;
    assert_eq!(snapshot["event"], "chat.messages");
    let texts: Vec<&str> = snapshot["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["before"]);

    let live = next_event(&mut viewer).await;
    assert_eq!(live["event"], "chat.messages");
    assert_eq!(live["data"].as_array().unwrap().len(), 1);
    assert_eq!(live["data"][0]["message"], "after");
    assert_silent(&mut viewer).await;
}
