//! Cavemap Backend Library
//!
//! Exposes core modules for use by binaries and integration tests.

pub mod auth;
pub mod location;
pub mod middleware;
pub mod routes;
