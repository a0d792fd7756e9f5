pub mod connection;
pub mod transport;

pub use connection::{Pumps, attach, spawn_reader, spawn_writer};
pub use transport::{FrameSender, FrameTransport};
