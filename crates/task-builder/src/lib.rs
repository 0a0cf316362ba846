//!
//! # Task Builder
//!
//! Spacedrive's Task Builder is a library to describe background tasks once and hand them to a
//! scheduler, with a uniform way to report how they ended back to whoever is watching.
//!
//! Configure a [`TaskSpecBuilder`] and `build` an immutable [`TaskSpec`], the builder itself
//! schedules nothing. Aside from the work unit, a spec carries:
//! - A title and a group key, to find, cancel or join related tasks together;
//! - A priority and a visibility hint for the scheduler and progress listings;
//! - An optional [`ExclusionRule`], tasks whose rules share a name never run at the same time;
//! - An optional [`FeedbackPolicy`], telling what to do with the [`TaskResult`] on a single
//!   designated thread, right away or once the user comes back to look at the task;
//! - An optional [`TaskListener`] for lifecycle events.
//!
//! Work units may be plain async or blocking closures, which report indeterminate progress, or
//! [`ProgressWork`] implementations reporting fine grained progress and honoring cancellation.
//! Errors and panics raised by any of them end up as a failed [`TaskResult`] holding a [`TaskFault`].
//!
//! ## Basic example
//!
//! ```
//! use sd_task_builder::{LocalScheduler, Outcome, SchedulerConfig, TaskResult, TaskSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = LocalScheduler::new(SchedulerConfig::default())?;
//!
//!     let handle = TaskSpec::builder()
//!         .title("Sync")?
//!         .work(|| async { Ok::<_, std::io::Error>(()) })
//!         .runs_not_concurrently()
//!         .immediate_feedback(|result: &TaskResult, immediate| {
//!             assert!(result.is_success() && immediate);
//!         })
//!         .build_and_schedule(&scheduler)?;
//!
//!     assert_eq!(handle.join().await.outcome(), Outcome::Success);
//!
//!     Ok(())
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod builder;
mod config;
mod error;
mod feedback;
mod listener;
mod progress;
mod rule;
mod scheduler;
mod spec;
mod work;

pub use builder::{TaskSpecBuilder, DEFAULT_TITLE};
pub use config::SchedulerConfig;
pub use error::{BuildError, FaultKind, SchedulerError, TaskFault, WorkError};
pub use feedback::{
	Attachment, Delivery, DesignatedThread, Feedback, FeedbackDispatcher, FeedbackJob,
	FeedbackPolicy, FeedbackState, FeedbackTiming, Observer, UiThread,
};
pub use listener::{TaskEvent, TaskListener};
pub use progress::{Progress, ProgressMonitor};
pub use rule::ExclusionRule;
pub use scheduler::{LocalScheduler, Scheduler, TaskHandle, TaskStatus};
pub use spec::{DisplayHint, GroupKey, Priority, TaskSpec, TaskSpecId, Visibility};
pub use work::{BlockingWork, ExecStatus, Outcome, PlainWork, ProgressWork, TaskResult, Work};
