// src/models/mod.rs
//! Data structures shared across the identity system.

pub mod credential;
pub mod did;
