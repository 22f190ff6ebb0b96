// src/services/core/auth/mod.rs

pub mod token_manager;

pub use token_manager::{AuthConfig, AuthExchange, AuthSession, IssuedToken, TokenManager};
