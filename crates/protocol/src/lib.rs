//! Wire protocol for fileferry client-server communication.
//!
//! Control traffic travels as JSON text envelopes ([`envelope::Message`]);
//! bulk content (upload chunks, download shards) travels as length-prefixed
//! binary frames ([`wire`]). The message shapes mirror the service's three
//! operations: chunked upload, sharded download, and the health check.

pub mod codes;
pub mod constants;
pub mod envelope;
pub mod messages;
pub mod wire;

pub use codes::ErrorCode;
pub use constants::MessageType;
pub use envelope::Message;
