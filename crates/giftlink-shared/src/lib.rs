//! # giftlink-shared
//!
//! Types shared by the Giftlink store and server crates: the identity
//! claims a Mini App launch carries, and the verifier that proves those
//! claims were signed by the messaging platform.

pub mod constants;
pub mod error;
pub mod identity;
pub mod launch_data;

pub use error::AuthError;
pub use identity::UserClaims;
pub use launch_data::{sign_launch_data, verify, LaunchData, LaunchDataVerifier};
