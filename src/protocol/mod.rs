//! Wire models and key types.

pub mod models;
