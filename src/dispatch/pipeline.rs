//! Drives one bulk send from an opened row source to a finished [`Report`].
//!
//! Rows are read one at a time and every eligible row is dispatched on its
//! own task, so slow SMTP exchanges never hold up parsing. Once the source is
//! exhausted the pipeline waits for every task before returning the report.

use std::{collections::HashMap, sync::Arc};

use tokio::task::JoinSet;
use tracing::Instrument;

use super::{
    dispatcher::Dispatcher,
    job::DispatchJob,
    report::{DispatchOutcome, Report, ReportCollector},
    source::{RowSource, SourceError, read_rows},
};
use crate::{
    domain::{CcList, DefaultFields, RecipientData, RecipientRow},
    email_client::{SmtpAccount, TransportConnector},
    template,
};

/// Everything a caller submits for one run, besides the rows themselves.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub account: SmtpAccount,
    pub subject: String,
    pub cc: CcList,
    pub template: String,
    pub defaults: DefaultFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Streaming,
    Draining,
    Finalizing,
    Done,
}

/// Aborts a whole run. Never returned together with a report.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("malformed recipient list: {0}")]
    MalformedSource(#[source] csv::Error),
    #[error("couldn't read the recipient list to the end: {0}")]
    Interrupted(#[source] csv::Error),
    #[error("couldn't read the recipient list: {0}")]
    Reader(#[from] tokio::task::JoinError),
    #[error("couldn't set up the mail transport: {0}")]
    Transport(#[source] anyhow::Error),
}

impl From<csv::Error> for PipelineError {
    fn from(e: csv::Error) -> Self {
        if e.is_io_error() {
            Self::Interrupted(e)
        } else {
            Self::MalformedSource(e)
        }
    }
}

pub struct Pipeline {
    dispatcher: Arc<Dispatcher>,
    subject: String,
    cc: CcList,
    template: String,
    defaults: DefaultFields,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(
        config: RunConfig,
        connector: &dyn TransportConnector,
    ) -> Result<Self, PipelineError> {
        let transport = connector
            .connect(&config.account)
            .map_err(PipelineError::Transport)?;
        let dispatcher = Dispatcher::new(transport, config.account.user);

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            subject: config.subject,
            cc: config.cc,
            template: config.template,
            defaults: config.defaults,
            state: PipelineState::Streaming,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!(from = ?self.state, to = ?next, "Pipeline state change");
        self.state = next;
    }

    /// Build the job for an eligible row; ineligible rows yield nothing.
    pub fn admit(&self, row: &RecipientRow) -> Option<DispatchJob> {
        if !row.is_eligible() {
            return None;
        }
        let recipient = row.recipient_email()?.into_inner();
        let data = RecipientData::from(row);

        Some(DispatchJob {
            recipient,
            cc: self.cc.clone(),
            subject: self.subject.clone(),
            body: template::render(&self.template, &data, &self.defaults),
            attachment: None,
        })
    }

    #[tracing::instrument(name = "Running bulk send", skip(self, source, http_client))]
    pub async fn run(
        mut self,
        source: RowSource,
        http_client: &reqwest::Client,
    ) -> Result<Report, PipelineError> {
        let outcome = self.ingest(&source, http_client).await;

        self.transition(PipelineState::Finalizing);
        if let Some(upload) = source.into_upload() {
            upload.discard().await;
        }
        self.transition(PipelineState::Done);

        match &outcome {
            Ok(report) => tracing::info!(
                successes = report.successes.len(),
                failures = report.failures.len(),
                "Bulk send finished"
            ),
            Err(e) => tracing::error!(error = %e, "Bulk send aborted"),
        }
        outcome
    }

    async fn ingest(
        &mut self,
        source: &RowSource,
        http_client: &reqwest::Client,
    ) -> Result<Report, PipelineError> {
        let reader = source.open(http_client).await?;
        let (mut rows, reader_handle) = read_rows(reader);
        let collector = ReportCollector::default();
        let mut dispatches = JoinSet::new();
        let mut in_flight = HashMap::new();

        while let Some(row) = rows.recv().await {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    // In-flight sends run to completion; their outcomes are dropped.
                    dispatches.detach_all();
                    return Err(e.into());
                }
            };
            let Some(job) = self.admit(&row) else {
                continue;
            };

            let recipient = job.recipient.clone();
            let dispatcher = Arc::clone(&self.dispatcher);
            let collector = collector.clone();
            let task = dispatches.spawn(
                async move {
                    let outcome = dispatcher.send(job).await;
                    collector.record(outcome);
                }
                .in_current_span(),
            );
            in_flight.insert(task.id(), recipient);
        }
        if let Err(e) = reader_handle.await {
            dispatches.detach_all();
            return Err(e.into());
        }

        self.transition(PipelineState::Draining);
        while let Some(joined) = dispatches.join_next_with_id().await {
            match joined {
                Ok((id, ())) => {
                    in_flight.remove(&id);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Dispatch task did not complete");
                    // The task never recorded an outcome, so record one for it.
                    if let Some(email) = in_flight.remove(&e.id()) {
                        collector.record(DispatchOutcome::Failure {
                            email,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        Ok(collector.finish())
    }
}
