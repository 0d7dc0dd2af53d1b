//! Headless search kernel (ports, adapters, owner-side results state).

pub mod results;
pub mod services;
pub(crate) mod sync;

pub use results::{HighlightContext, ResultsState, SearchResultsModel};
