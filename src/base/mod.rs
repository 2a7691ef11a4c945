//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): typed errors, translated from native codes
//! - [`StreamState`](streamstate::StreamState): per-exchange lifecycle

pub mod context;
pub mod neterror;
pub mod streamstate;
