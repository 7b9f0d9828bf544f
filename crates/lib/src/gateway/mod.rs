//! Gateway: HTTP + WebSocket relay server.
//!
//! Single port serves HTTP and WebSocket. Each `sendMessage` event on a
//! connection is relayed to the completion service and answered with a
//! `receiveMessage` (or `error`) event on the same connection.

mod protocol;
mod server;

pub use protocol::{
    ErrorPayload, MessagePayload, WsEvent, ERROR_EVENT, RECEIVE_MESSAGE, SEND_MESSAGE,
};
pub use server::{run_gateway, GatewayState};
