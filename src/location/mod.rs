//! Location Module
//! Mission: Read-only domain API over cavern nodes and link edges

pub mod api;
pub mod models;
pub mod store;

pub use api::LocationState;
pub use store::{LocationStore, Page};
