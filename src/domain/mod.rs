//! Tool catalog and business logic exposed over the MCP protocol

pub mod tools;
