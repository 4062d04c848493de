use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::{UploadRequest, UploadSink};
use crate::config::AppConfig;
use crate::constants::{COMPRESSION_CHUNK_SIZE, DEFAULT_FEED_TYPE, DEFAULT_STORAGE_TYPE};
use crate::domain::product::ProductRow;
use crate::domain::specification::FeedSpecification;
use crate::error::{FeedError, Result};
use crate::observability::metrics;
use crate::pipeline::storage::compress::{gzip_file, is_gzip_target};
use crate::pipeline::storage::file::{remove_if_exists, FeedFile, FileFactory};
use crate::pipeline::storage::formatter::FormatterPool;
use crate::pipeline::storage::name::NameGenerator;
use crate::pipeline::storage::{FileInfo, Storage, StorageState};

/// Writes the feed to a local file and hands it to an upload sink on commit
pub struct PreSignedUrlStorage {
    work_dir: PathBuf,
    names: NameGenerator,
    files: FileFactory,
    formatters: FormatterPool,
    sink: Arc<dyn UploadSink>,
    chunk_size: usize,
    state: StorageState,
    spec: Option<FeedSpecification>,
    file: Option<Box<dyn FeedFile>>,
    info: Option<FileInfo>,
    rows_written: usize,
}

impl PreSignedUrlStorage {
    pub fn new(work_dir: impl Into<PathBuf>, sink: Arc<dyn UploadSink>) -> Self {
        Self {
            work_dir: work_dir.into(),
            names: NameGenerator::new(DEFAULT_FEED_TYPE, DEFAULT_STORAGE_TYPE),
            files: FileFactory::default(),
            formatters: FormatterPool::default(),
            sink,
            chunk_size: COMPRESSION_CHUNK_SIZE,
            state: StorageState::Uninitialized,
            spec: None,
            file: None,
            info: None,
            rows_written: 0,
        }
    }

    pub fn from_config(config: &AppConfig, sink: Arc<dyn UploadSink>) -> Self {
        Self::new(config.app.work_dir.clone(), sink)
            .with_names(NameGenerator::new(&config.storage.feed_type, &config.storage.storage_type))
            .with_chunk_size(config.storage.compression_chunk_size)
    }

    pub fn with_names(mut self, names: NameGenerator) -> Self {
        self.names = names;
        self
    }

    pub fn with_files(mut self, files: FileFactory) -> Self {
        self.files = files;
        self
    }

    pub fn with_formatters(mut self, formatters: FormatterPool) -> Self {
        self.formatters = formatters;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn is_supported_format(&self, format: &str) -> bool {
        self.formatters.get(format).is_some() && self.files.is_supported_format(format)
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Local path of the current feed file
    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_ref().and_then(|f| f.path())
    }

    fn check_format(&self, format: &str) -> Result<()> {
        if format.is_empty() {
            return Err(FeedError::EmptyFormat);
        }
        if !self.is_supported_format(format) {
            return Err(FeedError::UnsupportedFormat(format.to_string()));
        }
        Ok(())
    }

    /// Open runs accept data; anything else is rejected for `operation`
    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        match self.state {
            StorageState::Uninitialized => Err(FeedError::NotInitialized("file")),
            state if state.is_terminal() => Err(FeedError::InvalidState {
                operation,
                state: state.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn upload(&self, file: &mut dyn FeedFile, spec: &FeedSpecification, compressed: &mut Option<PathBuf>) -> Result<FileInfo> {
        file.commit()?;
        let path = file.path().ok_or(FeedError::NotInitialized("file"))?.to_path_buf();
        let name = file.name().unwrap_or_default().to_string();

        let gzip = spec.pre_signed_url.as_deref().is_some_and(is_gzip_target);
        let upload_path = if gzip {
            let target = gzip_file(&path, self.chunk_size)?;
            *compressed = Some(target.clone());
            target
        } else {
            path
        };

        let (size, sha256) = checksum(&upload_path)?;
        metrics::storage::file_bytes(size);
        let info = FileInfo {
            name,
            uploaded_name: upload_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size,
            sha256,
            compressed: gzip,
        };

        debug!(file = %upload_path.display(), size, "Uploading feed file");
        self.sink.save(spec, &UploadRequest::stream(upload_path))?;
        Ok(info)
    }
}

fn checksum(path: &Path) -> Result<(u64, String)> {
    let mut hasher = Sha256::new();
    let mut file = File::open(path)?;
    let size = std::io::copy(&mut file, &mut hasher)?;
    Ok((size, hex::encode(hasher.finalize())))
}

impl Storage for PreSignedUrlStorage {
    #[instrument(skip_all, fields(format = %spec.format))]
    fn initiate(&mut self, spec: &FeedSpecification) -> Result<()> {
        if matches!(self.state, StorageState::Initiated | StorageState::Writing) {
            return Err(FeedError::InvalidState {
                operation: "initiate",
                state: self.state.to_string(),
            });
        }
        self.check_format(&spec.format)?;

        let mut file = self.files.create(&spec.format)?;
        let name = self.names.generate();
        file.initialize(&self.work_dir, &name, spec)?;
        info!(file = ?file.path(), "Feed file initiated");

        self.file = Some(file);
        self.spec = Some(spec.clone());
        self.info = None;
        self.rows_written = 0;
        self.state = StorageState::Initiated;
        Ok(())
    }

    fn add_data(&mut self, rows: Vec<ProductRow>) -> Result<()> {
        self.ensure_open("add data")?;
        let spec = self.spec.as_ref().ok_or(FeedError::NotInitialized("specification"))?;
        self.check_format(&spec.format)?;
        let formatter = self
            .formatters
            .get(&spec.format)
            .ok_or_else(|| FeedError::UnsupportedFormat(spec.format.clone()))?;
        let file = self.file.as_mut().ok_or(FeedError::NotInitialized("file"))?;

        let records = formatter.format(rows, spec)?;
        file.append_data(&records)?;

        self.rows_written += records.len();
        self.state = StorageState::Writing;
        metrics::storage::rows_written(records.len() as u64);
        Ok(())
    }

    fn commit(&mut self, delete_file_after: bool) -> Result<()> {
        self.ensure_open("commit")?;
        let spec = self.spec.clone().ok_or(FeedError::NotInitialized("specification"))?;
        let mut file = self.file.take().ok_or(FeedError::NotInitialized("file"))?;

        let mut compressed = None;
        let outcome = self.upload(file.as_mut(), &spec, &mut compressed);

        if delete_file_after {
            if let Err(e) = file.delete() {
                warn!(error = %e, "Failed to delete local feed file");
            }
            if let Some(path) = &compressed {
                if let Err(e) = remove_if_exists(path) {
                    warn!(error = %e, file = %path.display(), "Failed to delete compressed feed file");
                }
            }
        }
        self.file = Some(file);

        match outcome {
            Ok(info) => {
                info!(name = %info.name, size = info.size, rows = self.rows_written, "Feed committed");
                metrics::storage::upload_success();
                self.info = Some(info);
                self.state = StorageState::Committed;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Feed commit failed, nothing was uploaded");
                metrics::storage::upload_error();
                self.state = StorageState::RolledBack;
                Err(e)
            }
        }
    }

    fn rollback(&mut self) -> Result<()> {
        self.ensure_open("rollback")?;
        if let Some(file) = self.file.as_mut() {
            file.rollback()?;
        }
        info!(rows = self.rows_written, "Feed rolled back");
        metrics::storage::rollback();
        self.state = StorageState::RolledBack;
        Ok(())
    }

    fn state(&self) -> StorageState {
        self.state
    }

    fn additional_data(&self) -> Option<&FileInfo> {
        self.info.as_ref()
    }
}
