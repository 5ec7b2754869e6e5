pub mod cancel;
pub mod encoding;
pub mod tracing;
