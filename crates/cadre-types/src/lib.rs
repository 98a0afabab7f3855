//! Domain types shared by the cadre state machine, client and devnet.
//!
//! Everything here is passive data: addresses and keys, the staking request variants, the
//! validator records those requests mutate, chain parameters, and the shapes in which a node
//! reports transaction results back to callers.

use std::any::type_name;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse invalid {0}")]
pub struct ParseError(&'static str);

impl ParseError {
    /// A parse error for the type `T`.
    pub fn of<T: ?Sized>() -> Self {
        ParseError(type_name::<T>())
    }
}

mod address;
pub use address::Address;

pub mod key;
pub use key::PublicKey;

pub mod lifecycle;
pub mod params;
pub mod response;
pub mod transaction;
pub mod validator;

pub use params::Params;
