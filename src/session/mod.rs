// Session-scoped conversations
//
// Every logical session owns one pipeline (and therefore one conversation).
// Sessions are addressed by an explicit key and never share memory.

pub mod registry;

// Re-export key types
pub use registry::{SessionInfo, SessionRegistry};
