// src/storage/mod.rs
//! Optional content-addressed storage for public profile credentials.

pub mod profile_store;

pub use profile_store::{InMemoryProfileStore, ProfileStore};
