//! Dynamic plugin commands.
//!
//! A plugin is a declarative manifest (command name, prompt template,
//! allowed tools) generated by the model from a natural-language
//! description, validated statically, registered under a stable name, and
//! persisted as a JSON file. Registered plugins are never replaced in
//! place: remove, then create.

pub mod error;
pub mod generator;
pub mod manifest;
pub mod registry;
pub mod store;

pub use {
    error::{Error, Result},
    generator::generate_manifest,
    manifest::{INPUT_PLACEHOLDER, PluginManifest},
    registry::PluginRegistry,
    store::PluginStore,
};
