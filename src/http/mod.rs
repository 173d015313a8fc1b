//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, body buffering)
//!     → dispatch (select peer, forward, retry, fail over)
//!     → response.rs (hop-by-hop stripping, uniform 503)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
