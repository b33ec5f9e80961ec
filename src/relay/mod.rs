//! Multicast relay engine.
//!
//! # Data Flow
//! ```text
//! request path
//!     → path.rs (segments → GroupAddress, 400/403 rejections)
//!     → address.rs (class-D validation)
//!     → multicast.rs (bind, join, timed reads)
//!     → stream.rs (first-byte / idle-timeout state machine)
//!     → sink.rs (response head + body chunks to the HTTP layer)
//! ```
//!
//! # Design Decisions
//! - Every request owns its own socket and membership; nothing is shared
//! - The loop is generic over source and sink so each transition is
//!   testable without a network

pub mod address;
pub mod multicast;
pub mod path;
pub mod sink;
pub mod stream;

pub use address::{is_class_d, GroupAddress, DEFAULT_GROUP_PORT};
pub use multicast::{ActiveSessions, DatagramSource, MulticastSession, ReadOutcome, SessionSettings};
pub use path::{parse_request_path, PathRejection};
pub use sink::{ChannelSink, ResponseSink};
pub use stream::{RelayOutcome, RelayReport, RelayState, RelayStream};
