//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, one supervised task per connection)
//!     → handler.rs (read loop, limits, idle timeout)
//!         → buffer.rs (growable request buffer)
//!         → parser.rs (resumable request parser)
//!     → dispatch (handler program writes the response)
//!     or response.rs (synthesized 400/500/501)
//! ```

pub mod buffer;
pub mod handler;
pub mod parser;
pub mod response;
pub mod server;

pub use handler::{handle_connection, Outcome};
pub use parser::{Method, ParseError, ParsedRequest, RequestParser, Verdict, Version};
pub use response::Status;
pub use server::HttpServer;
