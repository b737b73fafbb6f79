use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use secrecy::{ExposeSecret, SecretString};

/// Providers that are reached over implicit TLS on port 465.
///
/// Anything not listed here is reached on 587 with STARTTLS when offered.
pub const IMPLICIT_TLS_HOSTS: &[&str] = &["smtp.gmail.com", "smtp.zoho.com"];

pub const IMPLICIT_TLS_PORT: u16 = 465;
pub const SUBMISSION_PORT: u16 = 587;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    pub port: u16,
    pub implicit_tls: bool,
}

impl TransportSettings {
    pub fn for_host(host: &str) -> Self {
        let host = host.trim();
        let implicit_tls = IMPLICIT_TLS_HOSTS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(host));

        if implicit_tls {
            Self {
                port: IMPLICIT_TLS_PORT,
                implicit_tls: true,
            }
        } else {
            Self {
                port: SUBMISSION_PORT,
                implicit_tls: false,
            }
        }
    }
}

/// Relay account supplied with a run; the user doubles as the sender address.
#[derive(Debug, Clone)]
pub struct SmtpAccount {
    pub host: String,
    pub user: String,
    pub password: SecretString,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: Message) -> anyhow::Result<()>;
}

#[async_trait]
impl MailTransport for AsyncSmtpTransport<Tokio1Executor> {
    async fn deliver(&self, message: Message) -> anyhow::Result<()> {
        self.send(message).await?;
        Ok(())
    }
}

/// Opens a transport for the account of a single run.
pub trait TransportConnector: Send + Sync {
    fn connect(&self, account: &SmtpAccount) -> anyhow::Result<Arc<dyn MailTransport>>;
}

pub struct SmtpConnector {
    timeout: Duration,
}

impl SmtpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl TransportConnector for SmtpConnector {
    #[tracing::instrument(
        name = "Opening SMTP transport",
        skip(self, account),
        fields(host = %account.host)
    )]
    fn connect(&self, account: &SmtpAccount) -> anyhow::Result<Arc<dyn MailTransport>> {
        let host = account.host.trim();
        let settings = TransportSettings::for_host(host);
        let tls_parameters = TlsParameters::new(host.to_owned())?;
        let tls = if settings.implicit_tls {
            Tls::Wrapper(tls_parameters)
        } else {
            Tls::Opportunistic(tls_parameters)
        };

        let credentials = Credentials::new(
            account.user.clone(),
            account.password.expose_secret().to_owned(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(settings.port)
            .tls(tls)
            .credentials(credentials)
            .timeout(Some(self.timeout))
            .build();

        tracing::info!(
            port = settings.port,
            implicit_tls = settings.implicit_tls,
            "SMTP transport ready"
        );
        Ok(Arc::new(transport))
    }
}
