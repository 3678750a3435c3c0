//! Workflow Orchestration Runtime
//!
//! A small event-driven runtime: typed events are routed to registered steps,
//! sibling branches fan out and join through Context-held guards, nested
//! workflows run as degraded-on-failure sub-runs, and progress notifications are
//! streamed to an external observer while the run is in flight.

mod context;
mod dispatcher;
mod event;
mod fanout;
mod progress;
mod run;
mod step;
mod subworkflow;
mod workflow;

pub use context::{Context, ContextKey};
pub use dispatcher::{dispatch, Dispatch, StepFailure, StepRegistry};
pub use event::{Event, EventKind};
pub use fanout::{fan_out, FanIn, FanInStatus};
pub use progress::{progress_channel, ProgressEmitter, ProgressNotification, ProgressStream};
pub use run::{Run, RunError, RunHandle, RunOutcome};
pub use step::{Step, StepContext, StepError, StepOutput, StepResult};
pub use subworkflow::{build_and_run_sub_workflow, degraded_result, run_sub_workflow};
pub use workflow::{Workflow, WorkflowBuilder};
