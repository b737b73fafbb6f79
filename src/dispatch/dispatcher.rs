use std::sync::Arc;

use lettre::{
    Message,
    address::AddressError,
    message::{
        Attachment, Mailbox, MultiPart, SinglePart,
        header::{ContentType, ContentTypeErr},
    },
};
use tracing::Instrument;

use super::{
    job::{DispatchJob, MessageAttachment},
    report::DispatchOutcome,
};
use crate::email_client::MailTransport;

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("invalid {role} address `{address}`: {source}")]
    InvalidAddress {
        role: &'static str,
        address: String,
        #[source]
        source: AddressError,
    },
    #[error("invalid attachment content type: {0}")]
    AttachmentType(#[from] ContentTypeErr),
    #[error("couldn't build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("{0}")]
    Transport(#[source] anyhow::Error),
}

/// Sends one message per job and turns whatever happens into an outcome.
pub struct Dispatcher {
    transport: Arc<dyn MailTransport>,
    sender: String,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn MailTransport>, sender: String) -> Self {
        Self { transport, sender }
    }

    /// A single delivery attempt. Never fails: errors become a `Failure`.
    pub async fn send(&self, job: DispatchJob) -> DispatchOutcome {
        let email = job.recipient.clone();
        let span = tracing::info_span!("Dispatching email", recipient_email = %email);

        match self.try_send(job).instrument(span).await {
            Ok(()) => {
                tracing::info!(recipient_email = %email, "Email sent");
                DispatchOutcome::Success(email)
            }
            Err(e) => {
                tracing::warn!(recipient_email = %email, error = %e, "Email not sent");
                DispatchOutcome::Failure {
                    email,
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_send(&self, job: DispatchJob) -> Result<(), DispatchError> {
        let message = self.build_message(job)?;
        self.transport
            .deliver(message)
            .await
            .map_err(DispatchError::Transport)
    }

    fn build_message(&self, job: DispatchJob) -> Result<Message, DispatchError> {
        let mut builder = Message::builder()
            .from(parse_mailbox("sender", &self.sender)?)
            .to(parse_mailbox("recipient", &job.recipient)?)
            .subject(job.subject);
        for cc in job.cc.iter() {
            builder = builder.cc(parse_mailbox("cc", cc)?);
        }

        let html = SinglePart::html(job.body);
        let message = match job.attachment {
            Some(MessageAttachment { filename, content }) => {
                let attachment = Attachment::new(filename)
                    .body(content, ContentType::parse("application/octet-stream")?);
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(html)
                        .singlepart(attachment),
                )?
            }
            None => builder.singlepart(html)?,
        };
        Ok(message)
    }
}

fn parse_mailbox(role: &'static str, address: &str) -> Result<Mailbox, DispatchError> {
    address
        .parse()
        .map_err(|source| DispatchError::InvalidAddress {
            role,
            address: address.to_owned(),
            source,
        })
}
