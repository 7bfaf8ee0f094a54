//! Entry point (v0.7), account factory, smart account, ERC-20 and sponsor pool bindings.
//!
//! The contracts themselves are external; this module only pins their ABI surface and the
//! protocol constants the pipeline relies on.

pub mod constants;
pub mod interfaces;
