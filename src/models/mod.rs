//! Data models for the gallery cache.
//!
//! Field names serialize in camelCase to match the backend's JSON resources.

mod annotation;
mod category;
pub mod entity;
mod id;
pub mod journal;
mod image;

pub use annotation::*;
pub use category::*;
pub use entity::{same_content, Entity, EntityKind};
pub use id::*;
pub use image::*;
pub use journal::{Journal, Promotion, PruneStats};
