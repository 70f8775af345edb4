// src/db/models/mod.rs

//! Row models for the product database
//!
//! Each struct mirrors one table and carries its own queries.

mod product;
mod tag;

pub use product::ProductEntry;
pub use tag::TagEntry;

/// Name of the declaring user, as recorded with declarations and tags
pub fn current_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .ok()
        .filter(|user| !user.is_empty())
}
