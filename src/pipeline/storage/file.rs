use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::{FORMAT_CSV, FORMAT_JSON};
use crate::domain::product::FeedRecord;
use crate::domain::specification::FeedSpecification;
use crate::error::{FeedError, Result};

/// Append-only feed file.
///
/// Lifecycle: `initialize` once, `append_data` any number of times, then
/// `commit` to finalize the content or `rollback` to discard it.
pub trait FeedFile: Send {
    fn extension(&self) -> &'static str;

    /// Creates `<dir>/<name>.<extension>`
    fn initialize(&mut self, dir: &Path, name: &str, spec: &FeedSpecification) -> Result<()>;

    fn append_data(&mut self, records: &[FeedRecord]) -> Result<()>;

    /// Flushes and closes the file; it stays on disk
    fn commit(&mut self) -> Result<()>;

    /// Closes and removes the file
    fn rollback(&mut self) -> Result<()>;

    fn path(&self) -> Option<&Path>;

    fn name(&self) -> Option<&str>;

    /// Removes whatever is left on disk
    fn delete(&mut self) -> Result<()> {
        if let Some(path) = self.path() {
            remove_if_exists(path)?;
        }
        Ok(())
    }
}

pub(crate) fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed feed file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn create(dir: &Path, name: &str, extension: &str) -> Result<(PathBuf, String, BufWriter<File>)> {
    fs::create_dir_all(dir)?;
    let file_name = format!("{name}.{extension}");
    let path = dir.join(&file_name);
    let writer = BufWriter::new(File::create(&path)?);
    Ok((path, file_name, writer))
}

/// A single JSON array streamed record by record
#[derive(Default)]
pub struct JsonFile {
    path: Option<PathBuf>,
    name: Option<String>,
    writer: Option<BufWriter<File>>,
    written: usize,
}

impl FeedFile for JsonFile {
    fn extension(&self) -> &'static str {
        FORMAT_JSON
    }

    fn initialize(&mut self, dir: &Path, name: &str, _spec: &FeedSpecification) -> Result<()> {
        let (path, file_name, mut writer) = create(dir, name, self.extension())?;
        writer.write_all(b"[")?;
        self.path = Some(path);
        self.name = Some(file_name);
        self.writer = Some(writer);
        self.written = 0;
        Ok(())
    }

    fn append_data(&mut self, records: &[FeedRecord]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(FeedError::NotInitialized("file"))?;
        for record in records {
            if self.written > 0 {
                writer.write_all(b",")?;
            }
            serde_json::to_writer(&mut *writer, record)?;
            self.written += 1;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let mut writer = self.writer.take().ok_or(FeedError::NotInitialized("file"))?;
        writer.write_all(b"]")?;
        writer.flush()?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.writer = None;
        self.delete()
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Delimited file whose header covers every column of every batch.
///
/// Batches are staged as one JSON line per record next to the target and
/// the CSV itself is written on `commit`, once the full column set is known.
#[derive(Default)]
pub struct CsvFile {
    path: Option<PathBuf>,
    name: Option<String>,
    staging_path: Option<PathBuf>,
    staged: Option<BufWriter<File>>,
    delimiter: u8,
    header: Vec<String>,
}

const STAGING_EXTENSION: &str = "rows";

impl CsvFile {
    fn extend_header(&mut self, record: &FeedRecord) {
        for key in record.keys() {
            if !self.header.iter().any(|h| h == key) {
                self.header.push(key.to_string());
            }
        }
    }

    fn write_csv(&self, path: &Path, staging: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(BufWriter::new(File::create(path)?));
        if !self.header.is_empty() {
            writer.write_record(&self.header)?;
        }
        for line in BufReader::new(File::open(staging)?).lines() {
            let line = line?;
            let cells: HashMap<String, String> = serde_json::from_str::<Vec<(String, String)>>(&line)?
                .into_iter()
                .collect();
            writer.write_record(
                self.header
                    .iter()
                    .map(|column| cells.get(column).map(String::as_str).unwrap_or_default()),
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl FeedFile for CsvFile {
    fn extension(&self) -> &'static str {
        FORMAT_CSV
    }

    fn initialize(&mut self, dir: &Path, name: &str, spec: &FeedSpecification) -> Result<()> {
        let target = format!("{name}.{}", self.extension());
        let (staging_path, _, staged) = create(dir, &target, STAGING_EXTENSION)?;
        self.path = Some(dir.join(&target));
        self.name = Some(target);
        self.staging_path = Some(staging_path);
        self.staged = Some(staged);
        self.delimiter = spec.delimiter as u8;
        self.header.clear();
        Ok(())
    }

    fn append_data(&mut self, records: &[FeedRecord]) -> Result<()> {
        if self.staged.is_none() {
            return Err(FeedError::NotInitialized("file"));
        }
        for record in records {
            self.extend_header(record);
            let cells: Vec<(&str, String)> = record
                .fields()
                .iter()
                .map(|(key, value)| (key.as_str(), value.to_display_string()))
                .collect();
            if let Some(staged) = self.staged.as_mut() {
                serde_json::to_writer(&mut *staged, &cells)?;
                staged.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let mut staged = self.staged.take().ok_or(FeedError::NotInitialized("file"))?;
        staged.flush()?;
        drop(staged);

        let path = self.path.clone().ok_or(FeedError::NotInitialized("file"))?;
        let staging = self.staging_path.clone().ok_or(FeedError::NotInitialized("file"))?;
        self.write_csv(&path, &staging)?;
        remove_if_exists(&staging)?;
        debug!(columns = self.header.len(), "CSV feed written");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.staged = None;
        self.delete()
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn delete(&mut self) -> Result<()> {
        self.staged = None;
        if let Some(staging) = &self.staging_path {
            remove_if_exists(staging)?;
        }
        if let Some(path) = &self.path {
            remove_if_exists(path)?;
        }
        Ok(())
    }
}

type FileConstructor = fn() -> Box<dyn FeedFile>;

/// Feed file types by format code
pub struct FileFactory {
    files: BTreeMap<String, FileConstructor>,
}

impl Default for FileFactory {
    fn default() -> Self {
        Self::empty()
            .register(FORMAT_JSON, || Box::new(JsonFile::default()))
            .register(FORMAT_CSV, || Box::new(CsvFile::default()))
    }
}

impl FileFactory {
    pub fn empty() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    pub fn register(mut self, format: &str, constructor: FileConstructor) -> Self {
        self.files.insert(format.to_string(), constructor);
        self
    }

    pub fn is_supported_format(&self, format: &str) -> bool {
        self.files.contains_key(format)
    }

    pub fn create(&self, format: &str) -> Result<Box<dyn FeedFile>> {
        self.files
            .get(format)
            .map(|constructor| constructor())
            .ok_or_else(|| FeedError::UnsupportedFormat(format.to_string()))
    }
}
