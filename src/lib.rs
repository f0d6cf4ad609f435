// Library root: exposes internals for integration tests and the binary.
// The binary entry point is src/main.rs.

pub mod bootstrap;
pub mod comms;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod logger;
pub mod router;
pub mod widgets;
