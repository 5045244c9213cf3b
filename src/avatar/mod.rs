//! Profile-image lifecycle management
//!
//! A user's profile images form a bounded, content-addressed pool with at
//! most one image flagged active (the avatar). This module owns ingestion
//! (validation + normalization), content addressing, and the pool state
//! machine that keeps the bound and the active-image invariant.

pub mod gate;
pub mod models;
pub mod pool;

pub use models::{ImageRef, UserImage};
pub use pool::AvatarPool;
