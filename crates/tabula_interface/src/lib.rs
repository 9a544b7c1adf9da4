//! Trait definitions for the collaborators of the table API.
//!
//! The orchestrator never talks to a concrete store. Table and view metadata
//! come from a [`MetadataStore`], and each base's rows live behind a
//! [`TableConnection`] found through a [`ConnectionResolver`].

mod connection;
mod metadata;

pub use connection::{ConnectionResolver, TableConnection};
pub use metadata::MetadataStore;
