pub mod format;
pub mod paths;
pub mod tracing;

pub use format::{format_price, truncate_chars};
pub use paths::AppPaths;
