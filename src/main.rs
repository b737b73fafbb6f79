use std::sync::Arc;

use bulk_mailer::{
    configuration::get_configuration,
    email_client::SmtpConnector,
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber("bulk-mailer".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let configuration = get_configuration()?;

    let connector = Arc::new(SmtpConnector::new(configuration.smtp.timeout()));
    let application = Application::build(configuration, connector).await?;

    application.run_until_stopped().await
}
