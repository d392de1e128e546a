//! Concurrent multi-source search with incremental streaming delivery
//!
//! A search request fans out to every enabled source at once and streams each
//! source's batch back to the client the moment it lands, so the first result
//! arrives at first-source latency rather than slowest-source latency.
//!
//! ## Submodules
//!
//! - [`dispatcher`] — one bounded, timeout-guarded task per source, outcomes
//!   pushed onto a single channel in completion order
//! - [`merger`] — drains the outcome channel into the client-facing event
//!   sequence with exactly one terminal done marker
//! - [`frame`] — wire framing: encoding events as line-delimited records and
//!   reassembling records split across chunk boundaries

pub mod dispatcher;
pub mod frame;
pub mod merger;

pub use dispatcher::SourceOutcome;
pub use frame::FrameDecoder;
pub use merger::SearchEvent;
