//! Nexus auto-login: short-lived token and the per-request flow

pub mod flow;
pub mod token;

pub use flow::{AutoLoginDecision, AutoLoginFlow, AutoLoginRequest, AutoLoginState};
pub use token::{TokenCodec, TokenError};
