pub mod codec;
pub mod message;

pub use message::ControlMessage;
