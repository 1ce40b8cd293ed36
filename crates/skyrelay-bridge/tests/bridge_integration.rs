#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for skyrelay-bridge: outbound forwarding, inbound
//! dispatch, session renewal, loop lifecycle and relay commands, driven
//! through in-memory stand-ins for both networks.

use async_trait::async_trait;
use parking_lot::Mutex;
use skyrelay_bridge::label::colorize;
use skyrelay_bridge::{
    Bridge, CommandContext, Credentials, InstanceSlot, LocalNetwork, MemoryRelayStore,
    RelayRegistry, RemoteClient, RemoteSession, SessionManager, SESSION_RENEWAL_INTERVAL,
};
use skyrelay_core::{
    LocalDelivery, LocalMessage, Relay, RelayError, RelayResult, RemoteChat, RemoteEvent,
    RemoteMessage,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ROOM: &str = "19:abc@thread.skype";
const OTHER_ROOM: &str = "19:other@thread.skype";
const BROKEN_ROOM: &str = "19:broken@thread.skype";
const BOT_ID: &str = "8:bridge";

// ── Mocks ───────────────────────────────────────────────────────────────────

struct MockSession {
    batches: Mutex<VecDeque<Vec<RemoteEvent>>>,
    sent: Arc<Mutex<Vec<(String, String)>>>,
    pulls: AtomicUsize,
}

impl MockSession {
    fn push(&self, events: Vec<RemoteEvent>) {
        self.batches.lock().push_back(events);
    }
}

#[async_trait]
impl RemoteSession for MockSession {
    fn user_id(&self) -> &str {
        BOT_ID
    }

    async fn pull_events(&self) -> RelayResult<Vec<RemoteEvent>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let batch = self.batches.lock().pop_front();
        match batch {
            Some(events) => Ok(events),
            None => {
                // Long-poll timeout with nothing new.
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn send_message(&self, room_id: &str, content: &str) -> RelayResult<()> {
        if room_id == BROKEN_ROOM {
            return Err(RelayError::Delivery("chat not found".into()));
        }
        self.sent
            .lock()
            .push((room_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn recent_chats(&self) -> RelayResult<Vec<RemoteChat>> {
        Ok(vec![
            RemoteChat {
                id: ROOM.to_string(),
                topic: "Project".to_string(),
                is_group: true,
            },
            RemoteChat {
                id: "8:alice".to_string(),
                topic: String::new(),
                is_group: false,
            },
        ])
    }
}

#[derive(Default)]
struct MockClient {
    sessions: Mutex<Vec<Arc<MockSession>>>,
    /// First batch handed out by every session created from now on.
    backlog: Mutex<Vec<RemoteEvent>>,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockClient {
    fn session(&self, index: usize) -> Arc<MockSession> {
        self.sessions.lock()[index].clone()
    }

    fn logins(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[async_trait]
impl RemoteClient for MockClient {
    async fn login(&self, username: &str, password: &str) -> RelayResult<Arc<dyn RemoteSession>> {
        if username != "bot" || password != "secret" {
            return Err(RelayError::Authentication("invalid credentials".into()));
        }
        let mut batches = VecDeque::new();
        let backlog = self.backlog.lock().clone();
        if !backlog.is_empty() {
            batches.push_back(backlog);
        }
        let session = Arc::new(MockSession {
            batches: Mutex::new(batches),
            sent: self.sent.clone(),
            pulls: AtomicUsize::new(0),
        });
        self.sessions.lock().push(session.clone());
        Ok(session)
    }
}

#[derive(Default)]
struct MockLocal {
    delivered: Mutex<Vec<LocalDelivery>>,
    errors: Mutex<Vec<String>>,
}

impl MockLocal {
    fn texts(&self) -> Vec<String> {
        self.delivered.lock().iter().map(|d| d.text.clone()).collect()
    }
}

impl LocalNetwork for MockLocal {
    fn has_network(&self, network: &str) -> bool {
        network == "freenode" || network == "oftc"
    }

    fn own_nick(&self, _network: &str) -> String {
        "relaybot".to_string()
    }

    fn deliver(&self, delivery: LocalDelivery) {
        self.delivered.lock().push(delivery);
    }

    fn report_error(&self, _network: &str, channel: &str, message: &str) {
        self.errors.lock().push(format!("{channel}: {message}"));
    }
}

struct Harness {
    bridge: Bridge,
    client: Arc<MockClient>,
    local: Arc<MockLocal>,
    slot: InstanceSlot,
}

fn harness_with(relays: Vec<Relay>, credentials: Credentials) -> Harness {
    let client = Arc::new(MockClient::default());
    let local = Arc::new(MockLocal::default());
    let slot = InstanceSlot::new();
    let registry = Arc::new(RelayRegistry::new(Arc::new(MemoryRelayStore::new(relays))));
    let sessions = Arc::new(SessionManager::new(client.clone(), credentials));
    let bridge = Bridge::from_parts(
        registry,
        sessions,
        local.clone(),
        slot.clone(),
        Duration::from_millis(10),
    );
    Harness {
        bridge,
        client,
        local,
        slot,
    }
}

fn harness(relays: Vec<Relay>) -> Harness {
    harness_with(relays, Credentials::new("bot", "secret"))
}

fn new_message(user: &str, room: &str, content: &str) -> RemoteEvent {
    RemoteEvent::NewMessage(RemoteMessage::new(user, room, content))
}

async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

fn owner() -> CommandContext {
    CommandContext {
        network: "freenode".to_string(),
        channel: Some("#test".to_string()),
        sender: "admin".to_string(),
        is_owner: true,
    }
}

// ── Outbound ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_forward_message_action_notice_and_topic() {
    let h = harness(vec![Relay::new("freenode", "#test", ROOM)]);
    let forward = |msg: LocalMessage| {
        let bridge = h.bridge.clone();
        async move { bridge.on_local_message(msg).await.unwrap() }
    };

    let errors = forward(LocalMessage::message(
        "freenode",
        "#test",
        Some("alice"),
        "hi & <bye>",
    ))
    .await;
    assert!(errors.is_empty());
    forward(LocalMessage::action("freenode", "#test", Some("alice"), "waves")).await;
    forward(LocalMessage::notice("freenode", "#test", None, "\x02build\x02 ok")).await;
    forward(LocalMessage::topic("freenode", "#test", Some("bob"), "Release day")).await;

    let sent = h.client.sent.lock().clone();
    let contents: Vec<&str> = sent.iter().map(|(_, c)| c.as_str()).collect();
    assert_eq!(
        contents,
        vec![
            "&lt;alice&gt; hi &amp; &lt;bye&gt;",
            "* alice waves",
            r#"&lt;relaybot&gt; <b raw_pre="*" raw_post="*">build</b> ok"#,
            "--- bob changed the topic to: Release day",
        ]
    );
    assert!(sent.iter().all(|(room, _)| room == ROOM));
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_relayed_lines_are_never_sent() {
    let h = harness(vec![Relay::new("freenode", "#test", ROOM)]);
    let msg = LocalMessage::message("freenode", "#test", None, "<8:alice> hello").mark_relayed();
    h.bridge.on_local_message(msg).await.unwrap();
    assert!(h.client.sent.lock().is_empty());
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_failed_relay_does_not_abort_fan_out() {
    let h = harness(vec![
        Relay::new("freenode", "#test", BROKEN_ROOM),
        Relay::new("freenode", "#test", ROOM),
        Relay::new("freenode", "#other", OTHER_ROOM),
    ]);
    let errors = h
        .bridge
        .on_local_message(LocalMessage::message("freenode", "#test", Some("alice"), "hi"))
        .await
        .unwrap();

    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], RelayError::Delivery(_)));
    let sent = h.client.sent.lock().clone();
    assert_eq!(sent, vec![(ROOM.to_string(), "&lt;alice&gt; hi".to_string())]);
    let reported = h.local.errors.lock().clone();
    assert_eq!(reported.len(), 1);
    assert!(reported[0].starts_with("#test: Failed to relay message"));
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_missing_credentials_surface_on_forward() {
    let h = harness_with(
        vec![Relay::new("freenode", "#test", ROOM)],
        Credentials::default(),
    );
    h.bridge.shutdown();

    let err = h
        .bridge
        .on_local_message(LocalMessage::message("freenode", "#test", Some("alice"), "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Config(_)));

    // Unbridged channels never need a session.
    let ok = h
        .bridge
        .on_local_message(LocalMessage::message("freenode", "#quiet", Some("alice"), "hi"))
        .await
        .unwrap();
    assert!(ok.is_empty());
}

// ── Inbound ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_poll_once_dispatches_and_suppresses_echo() {
    let h = harness(vec![Relay::new("freenode", "#test", ROOM)]);
    h.bridge.sessions().get_session().await.unwrap();
    h.client.session(0).push(vec![
        new_message("8:alice", ROOM, "<b>hi</b>"),
        new_message(BOT_ID, ROOM, "&lt;alice&gt; echo"),
        RemoteEvent::EditMessage(RemoteMessage::new(BOT_ID, ROOM, "edited echo")),
    ]);

    let delivered = h.bridge.poll_once().await.unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(h.local.texts(), vec![format!("<{}> hi", colorize("8:alice"))]);
}

#[tokio::test]
async fn test_poll_once_fans_out_to_every_linked_channel() {
    let h = harness(vec![
        Relay::new("freenode", "#a", ROOM),
        Relay::new("oftc", "#b", ROOM),
        Relay::new("freenode", "#c", OTHER_ROOM),
    ]);
    h.bridge.sessions().get_session().await.unwrap();
    h.client.session(0).push(vec![
        new_message("8:alice", ROOM, "hello"),
        new_message("8:alice", "19:unlinked@thread.skype", "nobody hears this"),
    ]);

    assert_eq!(h.bridge.poll_once().await.unwrap(), 2);
    let targets: Vec<(String, String)> = h
        .local
        .delivered
        .lock()
        .iter()
        .map(|d| (d.network.clone(), d.channel.clone()))
        .collect();
    assert_eq!(
        targets,
        vec![
            ("freenode".to_string(), "#a".to_string()),
            ("oftc".to_string(), "#b".to_string()),
        ]
    );
    h.bridge.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_renewal_drains_new_session_and_pulls_old_once_more() {
    let h = harness(vec![Relay::new("freenode", "#test", ROOM)]);

    let old = h.bridge.sessions().get_session().await.unwrap();
    h.client.session(0).push(vec![new_message("8:alice", ROOM, "in flight")]);
    *h.client.backlog.lock() = vec![new_message("8:alice", ROOM, "backlog")];

    tokio::time::advance(SESSION_RENEWAL_INTERVAL + Duration::from_secs(1)).await;
    assert!(h.bridge.sessions().renewal_due(&old));

    assert_eq!(h.bridge.poll_once().await.unwrap(), 1);
    assert_eq!(h.client.logins(), 2);
    assert_eq!(
        h.local.texts(),
        vec![format!("<{}> in flight", colorize("8:alice"))]
    );

    // Let the background drain on the new session run.
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(h.client.session(1).pulls.load(Ordering::SeqCst), 1);

    // Subsequent polls use the new session; its backlog was discarded.
    h.bridge.poll_once().await.unwrap();
    assert_eq!(h.client.session(1).pulls.load(Ordering::SeqCst), 2);
    assert_eq!(h.client.session(0).pulls.load(Ordering::SeqCst), 1);
    assert_eq!(h.local.texts().len(), 1);
    h.bridge.shutdown();
}

// ── Loop lifecycle ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_loop_starts_lazily_and_stops_on_shutdown() {
    let h = harness(vec![Relay::new("freenode", "#test", ROOM)]);
    assert!(!h.bridge.is_loop_running());

    h.bridge
        .on_local_message(LocalMessage::message("freenode", "#quiet", Some("alice"), "hi"))
        .await
        .unwrap();
    assert!(h.bridge.is_loop_running());
    assert!(!h.bridge.ensure_loop_started());

    let client = h.client.clone();
    assert!(wait_until(|| client.logins() == 1).await);
    h.client.session(0).push(vec![new_message("8:alice", ROOM, "from the loop")]);
    let local = h.local.clone();
    assert!(wait_until(|| !local.delivered.lock().is_empty()).await);

    h.bridge.shutdown();
    h.bridge.join_loop().await;
    assert!(!h.bridge.is_loop_running());
    assert!(!h.bridge.ensure_loop_started());
    assert_eq!(h.slot.current(), None);
}

#[tokio::test]
async fn test_stale_instance_loop_exits() {
    let h = harness(vec![]);
    assert!(h.bridge.ensure_loop_started());

    // A reloaded bridge takes over the slot.
    let successor = harness(vec![]);
    h.slot.claim(successor.bridge.id());

    h.bridge.join_loop().await;
    assert!(!h.bridge.is_loop_running());
    successor.bridge.shutdown();
}

#[tokio::test]
async fn test_loop_survives_login_failures() {
    let h = harness_with(vec![], Credentials::new("bot", "wrong"));
    assert!(h.bridge.ensure_loop_started());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.bridge.is_loop_running());

    h.bridge
        .sessions()
        .update_credentials(Credentials::new("bot", "secret"))
        .await;
    let client = h.client.clone();
    assert!(wait_until(|| client.logins() == 1).await);

    h.bridge.shutdown();
    h.bridge.join_loop().await;
}

// ── Commands ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_relay_commands() {
    let h = harness(vec![]);
    let commands = h.bridge.commands();
    let ctx = owner();

    assert_eq!(
        commands.list(&ctx).unwrap(),
        vec!["There are currently no configured relays."]
    );
    commands.add(&ctx, None, None, ROOM).unwrap();
    assert_eq!(
        commands.list(&ctx).unwrap(),
        vec!["#test@freenode <-> 19:abc@thread.skype"]
    );

    let err = commands.add(&ctx, None, None, ROOM).unwrap_err();
    assert!(matches!(err, RelayError::Duplicate(_)));
    let err = commands
        .add(&ctx, Some("oftc"), Some("#x"), "not-a-valid-id")
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(commands.list(&ctx).unwrap().len(), 1);

    commands
        .remove(&ctx, Some("freenode"), Some("#test"), ROOM)
        .unwrap();
    let err = commands.remove(&ctx, None, None, ROOM).unwrap_err();
    assert_eq!(err.to_string(), "Not found: This relay already does not exist.");
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_commands_require_owner() {
    let h = harness(vec![]);
    let mut ctx = owner();
    ctx.is_owner = false;
    let err = h.bridge.commands().add(&ctx, None, None, ROOM).unwrap_err();
    assert!(matches!(err, RelayError::Unauthorized(_)));
    assert!(h.bridge.registry().list().unwrap().is_empty());
    h.bridge.shutdown();
}

#[tokio::test]
async fn test_recent_chats_lists_group_chats() {
    let h = harness(vec![]);
    let replies = h.bridge.commands().recent_chats(&owner()).await.unwrap();
    assert_eq!(replies, vec!["\x02Project\x02 (19:abc@thread.skype)"]);
    h.bridge.shutdown();
}
