//! # StreamWeave Windowing
//!
//! Windowed, keyed aggregation over partitioned async streams.
//!
//! A [`Flow`](flow::Flow) wires partitioned [`Dataset`](dataset::Dataset)s
//! from sources through element-wise operators, shuffles and window-wise
//! operators into sinks, then runs every partition concurrently on Tokio.
//!
//! ## Key Features
//!
//! - **Window assigners**: time (event or processing time), count, and
//!   gap-based session windows, or attached windows reusing upstream labels
//! - **Explicit triggers**: every window fires from a small state machine
//!   driven by element, notification, timer and end-of-stream events
//! - **Session merging**: overlapping sessions merge along with their
//!   accumulated state
//! - **Repartition invariance**: window labels and close notifications
//!   travel with the data, so results do not depend on partitioning
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use streamweave_windowing::flow::Flow;
//! use streamweave_windowing::reduce_by_key::ReduceByKey;
//! use streamweave_windowing::sink::ListSink;
//! use streamweave_windowing::source::ListSource;
//! use streamweave_windowing::windowing::TimeWindowing;
//!
//! # async fn example() -> Result<(), streamweave_windowing::error::FlowError> {
//! let flow = Flow::create("word-count");
//! let input = flow.create_input(ListSource::bounded(vec![vec![
//!   ("one", 0i64),
//!   ("two", 10),
//!   ("one", 1_200),
//! ]]));
//! let sink = ListSink::new(1);
//! ReduceByKey::of(input)
//!   .key_by(|(word, _)| word.to_string())
//!   .value_by(|_| 1u64)
//!   .combine_by(|a, b| a + b)
//!   .window_by(TimeWindowing::seconds(1).using(|(_, ts): &(&str, i64)| *ts))
//!   .output()?
//!   .persist(sink.clone())?;
//! flow.run().await?;
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

/// Accumulators and aggregation modes.
pub mod accumulator;
/// Arena of live session records.
pub mod arena;
/// Processing-time clocks.
pub mod clock;
/// Flow configuration.
pub mod config;
/// Partitioned datasets and element-wise operators.
pub mod dataset;
/// Error types.
pub mod error;
/// Flow construction and execution.
pub mod flow;
/// Ready-made combine functions.
pub mod functions;
/// Tracing subscriber setup.
pub mod logging;
/// Merging of overlapping session windows.
pub mod merge;
/// The message envelope carried between operators.
pub mod message;
/// Per-partition window operator state machine.
pub(crate) mod operator;
/// Partitioners used by shuffles.
pub mod partitioner;
/// Keyed window-wise aggregation.
pub mod reduce_by_key;
/// Shuffles between partitionings.
pub mod shuffle;
/// Data sinks and late-data collectors.
pub mod sink;
/// Data sources.
pub mod source;
/// Operator statistics.
pub mod stats;
/// Window triggers.
pub mod trigger;
/// Window labels and intervals.
pub mod window;
/// Window assigners.
pub mod windowing;
