//! # tether-auth
//!
//! Signed, time-bounded identity tokens.
//!
//! - [`TokenIssuer`]: mints short-lived, refresh, and permanent tokens bound
//!   to an identity string, and verifies them on presentation
//! - [`Claims`]: the claim set carried by every token
//! - [`Clock`]: injectable time source used for expiry

#![deny(unsafe_code)]

pub mod claims;
pub mod clock;
pub mod errors;
pub mod issuer;

pub use claims::{Claims, TokenKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::AuthError;
pub use issuer::{TokenConfig, TokenIssuer};
