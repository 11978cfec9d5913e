// src/utils/mod.rs
//! Helper functions: hashing, encoding, and canonical serialization.

pub mod crypto;
pub mod serialization;
