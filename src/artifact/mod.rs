// src/artifact/mod.rs

//! Versioned storage for the data tasks hand to each other.

pub mod store;

pub use store::{Artifact, ArtifactStore};
