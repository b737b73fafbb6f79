use std::{path::Path, sync::Arc};

use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reqwest::Url;
use secrecy::SecretString;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{
    dispatch::{Pipeline, PipelineError, Report, RowSource, RunConfig, UploadedSource},
    domain::{CcList, DefaultFields},
    email_client::SmtpAccount,
    startup::AppState,
};

/// The fields of a submitted run, as they came off the wire.
#[derive(Default)]
struct SendEmailsForm {
    smtp_host: Option<String>,
    smtp_user: Option<String>,
    smtp_pass: Option<String>,
    subject: Option<String>,
    cc: Option<String>,
    template: Option<String>,
    default_fields: Option<String>,
    file_url: Option<String>,
    upload: Option<UploadedSource>,
}

impl SendEmailsForm {
    /// Read every part, streaming the recipient list to `upload_dir`.
    ///
    /// A stored upload is removed again if the body turns out to be unreadable.
    async fn read(mut multipart: Multipart, upload_dir: &Path) -> Result<Self, SendEmailsError> {
        let mut form = Self::default();
        if let Err(e) = form.read_fields(&mut multipart, upload_dir).await {
            form.discard().await;
            return Err(e);
        }
        Ok(form)
    }

    async fn read_fields(
        &mut self,
        multipart: &mut Multipart,
        upload_dir: &Path,
    ) -> Result<(), SendEmailsError> {
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            let slot = match name.as_str() {
                "file" => {
                    let has_file = field.file_name().is_some_and(|name| !name.is_empty());
                    if has_file && self.upload.is_none() {
                        self.upload = Some(store_upload(field, upload_dir).await?);
                    }
                    continue;
                }
                "smtp_host" => &mut self.smtp_host,
                "smtp_user" => &mut self.smtp_user,
                "smtp_pass" => &mut self.smtp_pass,
                "subject" => &mut self.subject,
                "cc" => &mut self.cc,
                "template" => &mut self.template,
                "default_fields" => &mut self.default_fields,
                "file_url" => &mut self.file_url,
                other => {
                    tracing::debug!(field = other, "Ignoring unknown form field");
                    continue;
                }
            };
            *slot = Some(field.text().await?);
        }
        Ok(())
    }

    async fn discard(&mut self) {
        if let Some(upload) = self.upload.take() {
            upload.discard().await;
        }
    }

    fn run_config(&self) -> Result<RunConfig, String> {
        // Blank values are rejected, but the rest are passed on as submitted.
        let required = |value: &Option<String>, name: &str| {
            value
                .as_deref()
                .filter(|value| !value.trim().is_empty())
                .map(str::to_owned)
                .ok_or_else(|| format!("{} is required", name))
        };

        Ok(RunConfig {
            account: SmtpAccount {
                host: required(&self.smtp_host, "smtp_host")?.trim().to_owned(),
                user: required(&self.smtp_user, "smtp_user")?,
                password: SecretString::from(required(&self.smtp_pass, "smtp_pass")?),
            },
            subject: required(&self.subject, "subject")?,
            cc: CcList::parse(self.cc.as_deref().unwrap_or_default()),
            template: required(&self.template, "template")?,
            defaults: DefaultFields::parse(self.default_fields.as_deref().unwrap_or_default()),
        })
    }

    fn source(&mut self, max_bytes: usize) -> Result<RowSource, String> {
        if let Some(upload) = self.upload.take() {
            return Ok(RowSource::Upload(upload));
        }
        match self.file_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Url::parse(url)
                .map(|url| RowSource::Remote { url, max_bytes })
                .map_err(|e| format!("file_url is not a valid url, {}", e)),
            _ => Err("either a file or a file_url is required".to_string()),
        }
    }

    /// Split the form into a run, discarding the upload if it is incomplete.
    async fn into_run(
        mut self,
        max_source_bytes: usize,
    ) -> Result<(RunConfig, RowSource), SendEmailsError> {
        let config = match self.run_config() {
            Ok(config) => config,
            Err(e) => {
                self.discard().await;
                return Err(SendEmailsError::InvalidForm(e));
            }
        };
        let source = self
            .source(max_source_bytes)
            .map_err(SendEmailsError::InvalidForm)?;
        Ok((config, source))
    }
}

#[tracing::instrument(name = "Storing uploaded recipient list", skip(field, upload_dir))]
async fn store_upload(
    mut field: Field<'_>,
    upload_dir: &Path,
) -> Result<UploadedSource, SendEmailsError> {
    tokio::fs::create_dir_all(upload_dir).await?;
    let upload = UploadedSource::new(upload_dir.join(format!("{}.csv", Uuid::new_v4())));
    let mut file = tokio::fs::File::create(upload.path()).await?;

    let written = async {
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok::<(), SendEmailsError>(())
    }
    .await;

    match written {
        Ok(()) => Ok(upload),
        Err(e) => {
            upload.discard().await;
            Err(e)
        }
    }
}

#[tracing::instrument(
    name = "Sending emails to a recipient list",
    skip(app_state, multipart)
)]
pub async fn send_emails(
    State(app_state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Report>, SendEmailsError> {
    let form = SendEmailsForm::read(multipart, &app_state.upload_dir).await?;
    let (config, source) = form.into_run(app_state.max_source_bytes).await?;

    let pipeline = match Pipeline::new(config, app_state.connector.as_ref()) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            if let Some(upload) = source.into_upload() {
                upload.discard().await;
            }
            return Err(e.into());
        }
    };

    let report = pipeline.run(source, &app_state.http_client).await?;
    Ok(Json(report))
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum SendEmailsError {
    #[error("invalid submission, {0}")]
    InvalidForm(String),
    #[error("couldn't read multipart body, {0}")]
    Multipart(#[from] MultipartError),
    #[error("couldn't store uploaded file, {0}")]
    Upload(#[from] std::io::Error),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for SendEmailsError {
    fn into_response(self) -> Response {
        match self {
            SendEmailsError::InvalidForm(e) => {
                tracing::error!("{}", e);
                (StatusCode::BAD_REQUEST, e).into_response()
            }
            SendEmailsError::Multipart(e) => {
                tracing::error!("{}", e);
                (e.status(), e.body_text()).into_response()
            }
            SendEmailsError::Upload(e) => {
                tracing::error!("{}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            SendEmailsError::Pipeline(e) => {
                tracing::error!("{}", e);
                let body = ErrorBody {
                    error: e.to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
