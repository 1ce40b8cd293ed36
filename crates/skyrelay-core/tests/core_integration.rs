#![allow(clippy::unwrap_used, clippy::expect_used)]

use skyrelay_core::*;

// ---------------------------------------------------------------------------
// 1. Remote events decoded from a JSON feed
// ---------------------------------------------------------------------------

#[test]
fn remote_events_decode_from_tagged_json() {
    let feed = r#"[
        {"kind": "new_message", "user_id": "8:alice", "chat_id": "19:a@thread.skype",
         "content": "<b>hi</b>", "msg_type": "RichText"},
        {"kind": "message", "user_id": "8:bob", "chat_id": "19:a@thread.skype",
         "msg_type": "ThreadActivity/TopicUpdate", "topic": "Release"},
        {"kind": "membership_change", "chat_id": "19:a@thread.skype"},
        {"kind": "typing", "user_id": "8:bob", "chat_id": "19:a@thread.skype"},
        {"kind": "unknown", "event_type": "EndpointPresence"}
    ]"#;

    let events: Vec<RemoteEvent> = serde_json::from_str(feed).unwrap();
    assert_eq!(events.len(), 5);

    let RemoteEvent::NewMessage(msg) = &events[0] else {
        panic!("expected a new message, got {:?}", events[0]);
    };
    assert_eq!(msg.content, "<b>hi</b>");
    assert_eq!(msg.topic, None);

    let RemoteEvent::Message(topic) = &events[1] else {
        panic!("expected a generic message, got {:?}", events[1]);
    };
    assert_eq!(topic.subtype(), MessageSubtype::TopicUpdate);
    assert_eq!(topic.topic.as_deref(), Some("Release"));

    assert_eq!(
        events[2],
        RemoteEvent::MembershipChange {
            chat_id: "19:a@thread.skype".into(),
            user_ids: Vec::new(),
        }
    );
    assert_eq!(events[3].kind(), "typing");
    assert_eq!(events[4].kind(), "EndpointPresence");
    assert_eq!(events[4].chat_id(), None);
}

// ---------------------------------------------------------------------------
// 2. Relay records survive the store format
// ---------------------------------------------------------------------------

#[test]
fn relay_records_parse_and_validate() {
    let lines = [
        "freenode #dev 19:abc@thread.skype",
        "oftc  #ops\t19:def@thread.skype  ",
    ];
    let relays: Vec<Relay> = lines
        .iter()
        .map(|l| Relay::from_record(l).unwrap())
        .collect();

    for relay in &relays {
        relay.validate().unwrap();
        assert_eq!(Relay::from_record(&relay.to_record()).unwrap(), *relay);
    }
    assert_eq!(relays[1].to_string(), "#ops@oftc <-> 19:def@thread.skype");
    assert!(relays[0].is_local("freenode", "#dev"));
    assert!(!relays[0].is_local("oftc", "#dev"));
}

#[test]
fn invalid_relays_are_classified_as_validation_errors() {
    let bad_room = Relay::new("freenode", "#dev", "alice");
    assert!(bad_room.validate().unwrap_err().is_validation());

    let malformed = Relay::from_record("freenode #dev").unwrap_err();
    assert!(matches!(malformed, RelayError::MalformedRecord(_)));
    assert!(!malformed.is_validation());
}

// ---------------------------------------------------------------------------
// 3. Local messages
// ---------------------------------------------------------------------------

#[test]
fn local_messages_carry_kind_and_relay_flag() {
    let msg = LocalMessage::action("freenode", "#dev", Some("alice"), "waves");
    assert_eq!(msg.kind, LocalMessageKind::Action);
    assert!(!msg.relayed);
    assert!(msg.mark_relayed().relayed);

    assert!(is_channel_name("#dev"));
    assert!(!is_channel_name("alice"));
}
