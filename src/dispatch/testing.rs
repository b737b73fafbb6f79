use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::Message;

use crate::email_client::{MailTransport, SmtpAccount, TransportConnector};

/// Keeps every delivered message; recipients listed in `rejects` fail instead
/// and recipients listed in `panics` bring the delivering task down.
#[derive(Default)]
pub struct RecordingTransport {
    pub rejects: Vec<String>,
    pub panics: Vec<String>,
    pub sent: Mutex<Vec<Message>>,
}

impl RecordingTransport {
    pub fn rejecting(rejects: &[&str]) -> Self {
        Self {
            rejects: rejects.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn panicking(panics: &[&str]) -> Self {
        Self {
            panics: panics.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn sent_to(&self) -> Vec<String> {
        let mut recipients: Vec<String> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .flat_map(|message| message.envelope().to().to_vec())
            .map(|address| address.to_string())
            .collect();
        recipients.sort();
        recipients
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn deliver(&self, message: Message) -> anyhow::Result<()> {
        let addressed_to_any = |list: &[String]| {
            message
                .envelope()
                .to()
                .iter()
                .any(|address| list.contains(&address.to_string()))
        };
        if addressed_to_any(&self.panics) {
            panic!("transport crashed");
        }
        if addressed_to_any(&self.rejects) {
            anyhow::bail!("550 mailbox unavailable");
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct StubConnector(pub Arc<RecordingTransport>);

impl TransportConnector for StubConnector {
    fn connect(&self, _account: &SmtpAccount) -> anyhow::Result<Arc<dyn MailTransport>> {
        Ok(self.0.clone())
    }
}

pub struct FailingConnector;

impl TransportConnector for FailingConnector {
    fn connect(&self, _account: &SmtpAccount) -> anyhow::Result<Arc<dyn MailTransport>> {
        anyhow::bail!("invalid TLS parameters")
    }
}
