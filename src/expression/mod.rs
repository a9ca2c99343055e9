//! Value-level matching helpers used by filters.

pub mod pattern;

pub use pattern::eval_like;
