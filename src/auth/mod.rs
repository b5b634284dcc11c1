//! Authentication Module
//! Mission: JWT token lifecycle with single-use refresh rotation

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod refresh_store;
pub mod user_store;

pub use api::AuthState;
pub use jwt::TokenService;
pub use middleware::{auth_middleware, optional_auth_middleware, AuthLayerState};
pub use refresh_store::RefreshTokenStore;
pub use user_store::UserStore;
