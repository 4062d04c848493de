use reqwest::blocking::{Body, Client};
use reqwest::header::CONTENT_LENGTH;
use std::fs::{self, File};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::app::ports::{UploadRequest, UploadSink};
use crate::domain::specification::FeedSpecification;
use crate::error::{FeedError, Result};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Streams the feed file to the specification's pre-signed URL with a PUT
#[derive(Debug, Clone)]
pub struct HttpPutSink {
    client: Client,
}

impl HttpPutSink {
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

impl UploadSink for HttpPutSink {
    fn save(&self, spec: &FeedSpecification, request: &UploadRequest) -> Result<()> {
        let url = spec
            .pre_signed_url
            .as_deref()
            .ok_or_else(|| FeedError::Config("preSignedUrl is required to upload a feed".into()))?;

        let file = File::open(&request.file)?;
        let length = file.metadata()?.len();
        debug!(kind = request.kind.as_str(), bytes = length, "PUT feed file");

        let response = self
            .client
            .put(url)
            .header(CONTENT_LENGTH, length)
            .body(Body::sized(file, length))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(FeedError::Upload {
                status: status.as_u16(),
                message,
            });
        }
        info!(status = status.as_u16(), bytes = length, "Feed uploaded");
        Ok(())
    }
}

/// Copies committed feed files into a local directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl UploadSink for DirectorySink {
    fn save(&self, _spec: &FeedSpecification, request: &UploadRequest) -> Result<()> {
        let name = request
            .file
            .file_name()
            .ok_or_else(|| FeedError::Config(format!("{} has no file name", request.file.display())))?;
        fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(name);
        let bytes = fs::copy(&request.file, &target)?;
        info!(target = %target.display(), bytes, "Feed copied");
        Ok(())
    }
}
