pub mod chunk;
pub mod codec;
pub mod constants;
pub mod events;
pub mod framing;
pub mod protocol;

pub use codec::{DecodeError, EncodeError};
pub use events::Event;
pub use protocol::EventType;
