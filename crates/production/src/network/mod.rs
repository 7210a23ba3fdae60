//! TCP networking.
//!
//! Every call opens one connection, writes one request frame and reads one
//! response frame. There is no connection reuse: peers come and go and the
//! protocol tolerates lost calls.

pub mod codec;
mod server;
mod transport;

pub use codec::{CodecError, MAX_FRAME_SIZE};
pub use server::{serve, Service};
pub use transport::{Transport, TransportConfig, TransportError};
