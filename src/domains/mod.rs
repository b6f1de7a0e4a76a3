//! Domains module containing business logic organized by bounded contexts.
//!
//! The server currently has one domain: tools, the operation registry and
//! the adapters that populate it.

pub mod tools;
