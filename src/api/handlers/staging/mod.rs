pub mod manage;
pub mod merge;
pub mod types;
pub mod upload;

pub use types::*;

// Globs carry the `__path_*` items utoipa generates next to each handler.
pub use manage::*;
pub use merge::*;
pub use upload::*;
