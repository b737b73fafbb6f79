use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::{StatusCode, Url};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::io::{StreamReader, SyncIoBridge};

use crate::{
    domain::{RecipientRow, normalize_header},
    telemetry::spawn_blocking_with_tracing,
};

/// Rows in flight between the reader thread and the pipeline.
const ROW_BUFFER: usize = 64;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("couldn't open uploaded file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("couldn't fetch {url}: {source}")]
    Fetch {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("fetching {url} returned {status}")]
    Status { url: Url, status: StatusCode },
    #[error("{url} is larger than the {max_bytes} byte limit")]
    TooLarge { url: Url, max_bytes: usize },
}

/// A recipient list written to disk for the duration of one run.
#[derive(Debug)]
pub struct UploadedSource {
    path: PathBuf,
}

impl UploadedSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file. Consumes the handle so it happens exactly once.
    pub async fn discard(self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Uploaded source removed"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove uploaded source"
            ),
        }
    }
}

/// Where the rows of a run come from.
#[derive(Debug)]
pub enum RowSource {
    Upload(UploadedSource),
    /// Streamed over HTTP; reading fails once more than `max_bytes` arrive.
    Remote { url: Url, max_bytes: usize },
}

impl RowSource {
    /// Open the source as a plain byte reader, whichever kind it is.
    #[tracing::instrument(name = "Opening row source", skip(self, http_client))]
    pub async fn open(
        &self,
        http_client: &reqwest::Client,
    ) -> Result<Box<dyn Read + Send>, SourceError> {
        match self {
            RowSource::Upload(upload) => {
                let file = tokio::fs::File::open(upload.path())
                    .await
                    .map_err(|source| SourceError::Open {
                        path: upload.path().to_owned(),
                        source,
                    })?;
                Ok(Box::new(file.into_std().await))
            }
            RowSource::Remote { url, max_bytes } => {
                let fetch_error = |source| SourceError::Fetch {
                    url: url.clone(),
                    source,
                };
                let response = http_client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(fetch_error)?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SourceError::Status {
                        url: url.clone(),
                        status,
                    });
                }
                if response
                    .content_length()
                    .is_some_and(|length| length > *max_bytes as u64)
                {
                    return Err(SourceError::TooLarge {
                        url: url.clone(),
                        max_bytes: *max_bytes,
                    });
                }
                let body = capped(response.bytes_stream(), *max_bytes);
                Ok(Box::new(SyncIoBridge::new(StreamReader::new(Box::pin(body)))))
            }
        }
    }

    /// Hand back the uploaded file, if this run owns one.
    pub fn into_upload(self) -> Option<UploadedSource> {
        match self {
            RowSource::Upload(upload) => Some(upload),
            RowSource::Remote { .. } => None,
        }
    }
}

/// Pass `body` through until more than `max_bytes` have arrived, then fail.
fn capped<S, E>(body: S, max_bytes: usize) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut received = 0usize;
    body.map(move |chunk| {
        let chunk = chunk.map_err(io::Error::other)?;
        received += chunk.len();
        if received > max_bytes {
            return Err(io::Error::other(format!(
                "recipient list is larger than the {max_bytes} byte limit"
            )));
        }
        Ok(chunk)
    })
}

/// Parse `reader` as CSV on a blocking thread, one row at a time.
///
/// Rows arrive in file order. A parse error is sent as the last item and
/// ends the stream; a closed receiver stops the reader early.
pub fn read_rows(
    reader: Box<dyn Read + Send>,
) -> (mpsc::Receiver<Result<RecipientRow, csv::Error>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(ROW_BUFFER);
    let handle = spawn_blocking_with_tracing(move || {
        let mut csv_reader = csv::ReaderBuilder::new().from_reader(reader);
        let headers: Vec<String> = match csv_reader.headers() {
            Ok(headers) => headers.iter().map(normalize_header).collect(),
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                return;
            }
        };

        for record in csv_reader.records() {
            let row = record.map(|record| {
                RecipientRow::from_record(headers.iter().map(String::as_str), record.iter())
            });
            let failed = row.is_err();
            if tx.blocking_send(row).is_err() || failed {
                return;
            }
        }
    });
    (rx, handle)
}
