//! Wire formats for collected snapshots.
//!
//! - `stdout`     : pretty JSON to any writer
//! - `push`       : newline-delimited JSON over TCP with retry/backoff
//! - `prometheus` : text exposition for pull scrapes

pub mod prometheus;
pub mod push;
pub mod stdout;

pub use push::{PushExporter, TcpTransport, Transport};
pub use stdout::StdoutExporter;
