//! Client-facing relay.
//!
//! - `messages` - client frame types and size validation
//! - `fallback` - ordered model candidates per connection
//! - `registry` - process-wide set of live connections
//! - `connection` - per-connection state machine

pub mod connection;
pub mod fallback;
pub mod messages;
pub mod registry;

pub use connection::{RelayConnection, RelayState, RelayWake, labels};
pub use fallback::ModelAttemptList;
pub use messages::{
    MAX_MEDIA_SIZE, MAX_MODEL_ID_SIZE, MAX_TEXT_SIZE, RelayIncomingMessage, RelayValidationError,
};
pub use registry::{ConnectionId, ConnectionInfo, ConnectionRegistry};
