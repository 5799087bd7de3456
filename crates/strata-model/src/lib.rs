//! # Strata model
//!
//! The immutable schema layer: entity, attribute, and relationship
//! descriptors, loaded once from a named bundle resource and shared
//! read-only by the store and every session.
//!
//! A model is either built in code (`Model::builder()`) or loaded from a
//! `ModelBundle` (`load_model`). Loading validates structure up front so
//! that downstream layers never see a malformed schema.

pub mod bundle;
pub mod error;
pub mod model;

pub use bundle::{ModelBundle, load_model};
pub use error::ModelError;
pub use model::{Attribute, AttributeKind, Entity, Model, ModelBuilder, Relationship};
