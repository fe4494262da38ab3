pub mod offer;
pub mod search;

// Re-exports for convenience
pub use offer::*;
pub use search::*;
