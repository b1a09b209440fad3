#![deny(unsafe_code)]
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::items_after_statements,
    clippy::too_many_lines,
    clippy::type_complexity
)]

//! # seqpipe - parallel transform pipelines
//!
//! This library runs a caller-supplied transform over a stream of inputs on a bounded
//! pool of worker threads and hands the results to a caller-supplied sink, either in
//! input order or in completion order.
//!
//! ## Overview
//!
//! ### Core Functionality
//!
//! - **[`pipeline`]** - Worker pool, ordered/unordered/grouped entry points, configuration
//! - **[`reorder_buffer`]** - Min-heap buffer that restores input order
//! - **[`source`]** - Sequence-numbering pull adapter and push-style sources
//! - **[`grouper`]** - Grouping consecutive inputs before they enter a pipeline
//!
//! ### Utilities
//!
//! - **[`cancel`]** - Cooperative cancellation token
//! - **[`errors`]** - The single error type a run can return
//! - **[`progress`]** - Interval progress logging
//! - **[`logging`]** - Count, duration, and rate formatting
//!
//! ## Quick Start
//!
//! ```
//! use seqpipe_lib::pipeline::{PipelineConfig, run_ordered};
//! use seqpipe_lib::source::infallible;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut sum = 0.0;
//! run_ordered(
//!     &PipelineConfig::new(4),
//!     infallible(1..=100_u32),
//!     |x, _seq, _worker| Ok::<_, std::io::Error>(f64::from(x).sqrt()),
//!     |root| {
//!         sum += root;
//!         Ok::<_, std::io::Error>(())
//!     },
//! )?;
//! assert!((sum - 671.46).abs() < 0.01);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure model
//!
//! Each run returns exactly one outcome. The first error detected anywhere (source,
//! transform, sink, or a panicking worker) stops the run and is returned; concurrent
//! later errors are dropped. A zero thread count is a programming error and panics.

pub mod cancel;
pub mod errors;
pub mod grouper;
pub mod logging;
pub mod pipeline;
pub mod progress;
pub mod reorder_buffer;
pub mod sequenced;
pub mod source;

pub use cancel::CancellationToken;
pub use errors::{BoxError, PipelineError};
pub use pipeline::{
    Emitter, PipelineConfig, PipelineStats, run_grouped, run_ordered, run_unordered,
};
pub use sequenced::SequencedItem;
