pub mod ports;
pub mod relay;

pub use relay::{NoOpReason, RelayError, RelayOutcome, RelayService};
