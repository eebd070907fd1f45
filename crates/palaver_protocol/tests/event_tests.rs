use palaver_domain::{ChannelId, MessageAddress, MessageId, UserId};
use palaver_protocol::{ClientEvent, EventError, MessageKind, ServerEvent, decode_frame, encode_frame};
use proptest::prelude::*;

#[test]
fn decodes_new_message_frame() {
	let text = r#"{
		"event": "newMessage",
		"data": {
			"_id": "m42",
			"channelId": "general",
			"senderId": "u7",
			"content": "hello world",
			"createdAt": "2024-05-01T12:00:00Z",
			"reactions": [{"emoji": "👍", "byUserId": "u9"}],
			"readBy": [{"userId": "u9", "readAt": "2024-05-01T12:00:05Z"}]
		}
	}"#;

	let ev = decode_frame(text).expect("decode newMessage");
	let ServerEvent::NewMessage(msg) = ev else {
		panic!("expected NewMessage, got {ev:?}");
	};
	assert_eq!(msg.id.as_str(), "m42");
	assert_eq!(msg.address.channel_id.as_ref().unwrap().as_str(), "general");
	assert_eq!(msg.sender_id.as_str(), "u7");
	assert_eq!(msg.reactions.len(), 1);
	assert_eq!(msg.read_by.len(), 1);
}

#[test]
fn decodes_typing_frames_for_both_conversation_kinds() {
	let channel = r#"{"event":"userTyping","data":{"userId":"u1","username":"ana","isTyping":true,"channelId":"c1"}}"#;
	let ev = decode_frame(channel).expect("decode channel typing");
	let ServerEvent::UserTyping(sig) = ev else {
		panic!("expected UserTyping");
	};
	assert!(sig.active);
	assert_eq!(sig.address.channel_id.as_ref().unwrap().as_str(), "c1");
	assert!(sig.address.recipient_id.is_none());

	let direct = r#"{"event":"userTyping","data":{"userId":"u1","username":"ana","isTyping":false,"recipientId":"u2"}}"#;
	let ev = decode_frame(direct).expect("decode direct typing");
	let ServerEvent::UserTyping(sig) = ev else {
		panic!("expected UserTyping");
	};
	assert!(!sig.active);
	assert_eq!(sig.address.recipient_id.as_ref().unwrap().as_str(), "u2");
}

#[test]
fn decodes_status_change_and_read_receipt() {
	let status = r#"{"event":"userStatusChange","data":{"userId":"u1","isOnline":false}}"#;
	match decode_frame(status).expect("decode status") {
		ServerEvent::UserStatusChange { user_id, is_online } => {
			assert_eq!(user_id.as_str(), "u1");
			assert!(!is_online);
		}
		other => panic!("unexpected event: {other:?}"),
	}

	let read = r#"{"event":"messageRead","data":{"messageId":"m1","readBy":"u2","readAt":"2024-05-01T09:00:00Z"}}"#;
	match decode_frame(read).expect("decode read") {
		ServerEvent::MessageRead { message_id, read_by, .. } => {
			assert_eq!(message_id.as_str(), "m1");
			assert_eq!(read_by.as_str(), "u2");
		}
		other => panic!("unexpected event: {other:?}"),
	}
}

#[test]
fn unknown_event_name_surfaces_as_error() {
	let err = decode_frame(r#"{"event":"serverDigest","data":{}}"#).unwrap_err();
	assert!(matches!(err, EventError::UnknownEvent(name) if name == "serverDigest"));
}

#[test]
fn malformed_frame_surfaces_as_json_error() {
	assert!(matches!(decode_frame("not json").unwrap_err(), EventError::Json(_)));
	assert!(matches!(decode_frame(r#"{"data":{}}"#).unwrap_err(), EventError::Json(_)));
}

#[test]
fn encodes_join_channel_and_reaction() {
	let join = ClientEvent::JoinChannel {
		channel_id: ChannelId::new("general").unwrap(),
	};
	let frame: serde_json::Value = serde_json::from_str(&encode_frame(&join).unwrap()).unwrap();
	assert_eq!(frame["event"], "joinChannel");
	assert_eq!(frame["data"]["channelId"], "general");

	let react = ClientEvent::MessageReaction {
		message_id: MessageId::new("m1").unwrap(),
		emoji: "👍".to_string(),
	};
	let frame: serde_json::Value = serde_json::from_str(&encode_frame(&react).unwrap()).unwrap();
	assert_eq!(frame["event"], "messageReaction");
	assert_eq!(frame["data"]["messageId"], "m1");
	assert_eq!(frame["data"]["emoji"], "👍");
}

#[test]
fn send_message_addresses_exactly_one_target() {
	let dm = ClientEvent::SendMessage {
		content: "hi".to_string(),
		address: MessageAddress::direct(UserId::new("u2").unwrap()),
		kind: MessageKind::Text,
		file_url: None,
	};
	let frame: serde_json::Value = serde_json::from_str(&encode_frame(&dm).unwrap()).unwrap();
	assert_eq!(frame["data"]["recipientId"], "u2");
	assert_eq!(frame["data"]["channelId"], serde_json::Value::Null);
	assert_eq!(frame["data"]["type"], "text");
}

proptest! {
	#[test]
	fn send_message_content_survives_framing(content in ".*", is_image in any::<bool>()) {
		let ev = ClientEvent::SendMessage {
			content: content.clone(),
			address: MessageAddress::channel(ChannelId::new("c1").unwrap()),
			kind: if is_image { MessageKind::Image } else { MessageKind::File },
			file_url: Some("https://files.example/x".to_string()),
		};
		let frame: serde_json::Value = serde_json::from_str(&encode_frame(&ev).unwrap()).unwrap();
		prop_assert_eq!(frame["data"]["content"].as_str().unwrap(), content.as_str());
		prop_assert_eq!(frame["data"]["fileUrl"].as_str().unwrap(), "https://files.example/x");
	}

	#[test]
	fn typing_frames_roundtrip_the_flag(is_typing in any::<bool>()) {
		let ev = ClientEvent::Typing {
			address: MessageAddress::direct(UserId::new("u9").unwrap()),
			is_typing,
		};
		let frame: serde_json::Value = serde_json::from_str(&encode_frame(&ev).unwrap()).unwrap();
		prop_assert_eq!(frame["event"].as_str().unwrap(), "typing");
		prop_assert_eq!(frame["data"]["isTyping"].as_bool().unwrap(), is_typing);
	}
}
