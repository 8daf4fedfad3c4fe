//! Lexically scoped thread launches.

#[allow(clippy::module_inception)]
mod scope;

pub use self::scope::{scope, Scope};
