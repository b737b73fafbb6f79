mod dispatcher;
mod job;
mod pipeline;
mod report;
mod source;
#[cfg(test)]
mod testing;

pub use dispatcher::{DispatchError, Dispatcher};
pub use job::{DispatchJob, MessageAttachment};
pub use pipeline::{Pipeline, PipelineError, PipelineState, RunConfig};
pub use report::{DispatchOutcome, FailedDispatch, Report, ReportCollector};
pub use source::{RowSource, SourceError, UploadedSource, read_rows};
