//! Update sources and the wrappers that pace or record them

pub mod capture;
pub mod history;
pub mod memory;
pub mod replay;

pub use capture::CaptureProvider;
pub use history::HistoryProvider;
pub use memory::MemoryProvider;
pub use replay::{ReplayOptions, ReplayProvider};
