use std::{
    path::PathBuf,
    sync::{Arc, LazyLock, Mutex},
};

use async_trait::async_trait;
use bulk_mailer::{
    configuration::get_configuration,
    email_client::{MailTransport, SmtpAccount, TransportConnector},
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};
use lettre::Message;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use uuid::Uuid;

// Ensure that the `tracing` stack is only initialised once using `LazyLock`
static TRACING: LazyLock<()> = LazyLock::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    };
});

pub const REJECTED_RECIPIENT: &str = "rejected@example.com";

/// Stands in for the SMTP relay: keeps what it was asked to deliver.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Message>>,
}

impl RecordingTransport {
    pub fn messages(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self) -> Vec<String> {
        let mut recipients: Vec<String> = self
            .messages()
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
        let rejected = message
            .envelope()
            .to()
            .iter()
            .any(|address| address.to_string() == REJECTED_RECIPIENT);
        if rejected {
            anyhow::bail!("550 mailbox unavailable");
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct RecordingConnector {
    transport: Arc<RecordingTransport>,
    accounts: Mutex<Vec<(String, String, String)>>,
}

impl TransportConnector for RecordingConnector {
    fn connect(&self, account: &SmtpAccount) -> anyhow::Result<Arc<dyn MailTransport>> {
        self.accounts.lock().unwrap().push((
            account.host.clone(),
            account.user.clone(),
            account.password.expose_secret().to_owned(),
        ));
        Ok(self.transport.clone())
    }
}

pub struct TestApp {
    pub address: String,
    pub upload_dir: PathBuf,
    pub transport: Arc<RecordingTransport>,
    pub connector: Arc<RecordingConnector>,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn post_send_emails(&self, form: RunForm) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/send_emails", &self.address))
            .multipart(form.into_multipart())
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub fn stored_uploads(&self) -> usize {
        std::fs::read_dir(&self.upload_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub fn accounts(&self) -> Vec<(String, String, String)> {
        self.connector.accounts.lock().unwrap().clone()
    }
}

/// A `/send_emails` submission, valid unless a test says otherwise.
pub struct RunForm {
    fields: Vec<(&'static str, String)>,
    csv: Option<String>,
}

impl RunForm {
    pub fn with_csv(csv: &str) -> Self {
        Self {
            fields: vec![
                ("smtp_host", "smtp.example.com".into()),
                ("smtp_user", "sender@example.com".into()),
                ("smtp_pass", "app-password".into()),
                ("subject", "A note for you".into()),
                ("template", "Hello {{salutation}} {{name}},".into()),
            ],
            csv: Some(csv.into()),
        }
    }

    pub fn with_url(url: String) -> Self {
        Self {
            csv: None,
            ..Self::with_csv("")
        }
        .set("file_url", url)
    }

    pub fn set(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.retain(|(field, _)| *field != name);
        self.fields.push((name, value.into()));
        self
    }

    pub fn without(mut self, name: &'static str) -> Self {
        self.fields.retain(|(field, _)| *field != name);
        self
    }

    pub fn without_file(mut self) -> Self {
        self.csv = None;
        self
    }

    fn into_multipart(self) -> Form {
        let form = self
            .fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));
        match self.csv {
            Some(csv) => form.part(
                "file",
                Part::bytes(csv.into_bytes())
                    .file_name("recipients.csv")
                    .mime_str("text/csv")
                    .unwrap(),
            ),
            None => form,
        }
    }
}

pub async fn spawn_app() -> TestApp {
    LazyLock::force(&TRACING);

    let upload_dir = std::env::temp_dir().join(format!("bulk-mailer-{}", Uuid::new_v4()));
    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        // Use a random OS port
        c.application.port = 0;
        c.upload.directory = upload_dir.clone();
        c
    };

    let transport = Arc::new(RecordingTransport::default());
    let connector = Arc::new(RecordingConnector {
        transport: transport.clone(),
        accounts: Mutex::new(Vec::new()),
    });

    let application = Application::build(configuration, connector.clone())
        .await
        .expect("Failed to build application.");
    let application_port = application.port();
    let _ = tokio::spawn(application.run_until_stopped());

    TestApp {
        address: format!("http://127.0.0.1:{}", application_port),
        upload_dir,
        transport,
        connector,
        api_client: reqwest::Client::new(),
    }
}
