//! Turn handling for a chat relay: conversation state, backend dispatch,
//! reply chunking and activity signalling.

pub mod channel;
pub mod chunk;
pub mod heartbeat;
pub mod orchestrator;

pub use channel::{ChannelError, MessageRef, OutputChannel};
pub use chunk::{DEFAULT_CHUNK_SIZE, split_into_chunks};
pub use heartbeat::{Heartbeat, HeartbeatGuard};
pub use orchestrator::{Orchestrator, TurnError, TurnOutcome};
