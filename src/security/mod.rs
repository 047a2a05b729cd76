//! Security module: path confinement for all tool filesystem operations.

pub mod path_guard;

pub use path_guard::PathGuard;
