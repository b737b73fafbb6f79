use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    response::Response,
    routing::{get, post},
    serve::Serve,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Span, info, info_span};
use uuid::Uuid;

use crate::{
    configuration::Settings,
    email_client::TransportConnector,
    routes::{health_check, index, send_emails},
};

pub struct AppState {
    pub connector: Arc<dyn TransportConnector>,
    pub http_client: reqwest::Client,
    pub upload_dir: PathBuf,
    pub max_source_bytes: usize,
}

pub async fn run(
    listener: TcpListener,
    app_state: AppState,
) -> anyhow::Result<Serve<TcpListener, Router, Router>> {
    let max_upload_bytes = app_state.max_source_bytes;
    // Handlers share one state; cloning the Arc is cheaper than cloning the
    // HTTP client and connector per request.
    let app_state = Arc::new(app_state);
    let app = Router::new()
        .route("/", get(index))
        .route("/health_check", get(health_check))
        .route(
            "/send_emails",
            post(send_emails).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(app_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let request_id = Uuid::new_v4();
                    info_span!(
                        "http_request",
                        method = ?request.method(),
                        uri = ?request.uri(),
                        version = ?request.version(),
                        request_id = ?request_id,
                        status = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response, latency: Duration, span: &Span| {
                    let status = response.status();
                    let headers = response.headers();
                    span.record("status", status.as_u16());
                    info!(parent: span, ?status, ?headers, ?latency, "Response sent");
                }),
        );

    Ok(axum::serve(listener, app))
}

pub struct Application {
    port: u16,
    server: Serve<TcpListener, Router, Router>,
}

impl Application {
    pub async fn build(
        configuration: Settings,
        connector: Arc<dyn TransportConnector>,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(configuration.upload.fetch_timeout())
            .build()?;
        let app_state = AppState {
            connector,
            http_client,
            upload_dir: configuration.upload.directory.clone(),
            max_source_bytes: configuration.upload.max_file_size_bytes,
        };

        let listener = TcpListener::bind(format!(
            "{}:{}",
            configuration.application.host, configuration.application.port
        ))
        .await?;
        let port = listener.local_addr()?.port();

        let server = run(listener, app_state).await?;

        Ok(Self { server, port })
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        Ok(self.server.await?)
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}
