#![forbid(unsafe_code)]

//! Concrete transport for the engine seams: a bearer-authenticated
//! `reqwest` REST client and a `tokio-tungstenite` event socket.

pub mod rest;
pub mod socket;

pub use rest::RestClient;
pub use socket::{WsSink, WsStream, connect_socket, socket_connector};
