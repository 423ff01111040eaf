/// Store event stream payloads.
pub mod events;
/// Single-writer runtime handle.
pub mod handle;
