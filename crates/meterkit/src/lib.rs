//! Top-level facade crate for meterkit.
//!
//! Re-exports the engine and the gateway library so users can depend on a
//! single crate. Most applications only need [`prelude`].

pub mod core {
    pub use meterkit_core::*;
}

pub mod gateway {
    pub use meterkit_gateway::*;
}

/// Types needed to build a provider, create instruments and collect.
pub mod prelude {
    pub use meterkit_core::{
        Aggregation, KeyValue, ManualReader, Meter, MeterProvider, MetricReader, Observations,
        Observer, Pattern, Resource, Scope, View,
    };
    pub use meterkit_gateway::export::{PushExporter, StdoutExporter, TcpTransport};
    pub use meterkit_gateway::reader::PeriodicReader;
}
