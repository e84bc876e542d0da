//! Transport layer: the demo HTTP surface and the stdin trigger.

pub mod console;
pub mod http;
