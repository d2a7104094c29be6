//! Shared types for the oracle feeder workspace.
//!
//! Every crate in the workspace speaks in terms of these types: quotations
//! coming from upstream price sources, the derived updates pushed on-chain,
//! the transactions that carry them, and the events emitted while doing so.

pub mod delivery;
pub mod events;
pub mod quotation;
pub mod update;
pub mod validation;

pub use delivery::*;
pub use events::*;
pub use quotation::*;
pub use update::*;
pub use validation::*;
