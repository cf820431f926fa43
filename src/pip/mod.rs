pub mod backend;
pub mod version;

pub use backend::PipBackend;
pub use version::ParsedVersion;
