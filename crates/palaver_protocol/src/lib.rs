#![forbid(unsafe_code)]

pub mod events;

pub use events::{
	ClientEvent, EventError, MessageKind, ServerEvent, UploadResponse, decode_frame, decode_server_event,
	encode_client_event, encode_frame,
};
