//! Demo workload: simulated request handling plus a runtime observer.

pub mod runtime;
pub mod work;

pub use runtime::GcObserver;
pub use work::RequestWork;
