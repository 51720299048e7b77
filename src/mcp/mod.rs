//! Model Context Protocol (MCP) server handling and JSON-RPC implementations
//!
//! Provides the JSON-RPC envelope, the dispatch contract shared by both transports
//! and the notification sink abstraction they implement.

pub mod rpc;
pub mod server;
