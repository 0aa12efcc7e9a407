//! Integrations with external providers.

pub mod integrations;
