//! Gateway: the HTTP messaging endpoint that hosts the processor.
//!
//! Activities arrive on `POST /api/messages`; replies go back through the channel service
//! connector, or in the response body when the activity carries no service URL.

mod auth;
mod connector;
mod server;

pub use auth::{TokenProvider, TokenSource};
pub use connector::{ConnectorClient, ConnectorError, HttpTurnContext};
pub use server::{router, run_server, ServerState};
