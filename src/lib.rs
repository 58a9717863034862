//! reqexec: a minimal HTTP/1.x front-end for handler programs.
//!
//! Each connection carries one request. The request is parsed incrementally,
//! then handed to an external program that receives the method and path as
//! arguments, the raw headers in `REQHEADERS`, the body in `REQBODY` or on
//! stdin, and the client socket as stdout.

pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
