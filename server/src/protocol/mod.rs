//! JSON payloads exchanged with the browser front-end

pub mod messages;

pub use messages::*;
