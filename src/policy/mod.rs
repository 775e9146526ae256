//! Authorization policy.

pub mod chain;
