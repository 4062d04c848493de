use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{FORMAT_CSV, FORMAT_JSON, GZIP_EXTENSION};
use crate::error::{FeedError, Result};
use crate::observability::metrics;
use crate::pipeline::storage::file::remove_if_exists;

/// True when the upload URL path names a gzipped JSON or CSV file
pub fn is_gzip_target(url: &str) -> bool {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url.split('?').next().unwrap_or_default().to_ascii_lowercase(),
    };
    [FORMAT_JSON, FORMAT_CSV]
        .iter()
        .any(|format| path.ends_with(&format!(".{format}.{GZIP_EXTENSION}")))
}

/// Writes `<source>.gz` next to `source`, streaming in `chunk_size` pieces
pub fn gzip_file(source: &Path, chunk_size: usize) -> Result<PathBuf> {
    let mut target = source.as_os_str().to_owned();
    target.push(format!(".{GZIP_EXTENSION}"));
    let target = PathBuf::from(target);

    let input = File::open(source).map_err(|e| FeedError::Compression {
        path: source.to_path_buf(),
        source: e,
    })?;
    let output = File::create(&target).map_err(|e| FeedError::Compression {
        path: target.clone(),
        source: e,
    })?;

    let total = match compress(input, output, chunk_size.max(1)) {
        Ok(total) => total,
        Err(e) => {
            if let Err(cleanup) = remove_if_exists(&target) {
                warn!(error = %cleanup, file = %target.display(), "Failed to remove partial archive");
            }
            return Err(e);
        }
    };

    debug!(source = %source.display(), bytes = total, "Compressed feed file");
    metrics::storage::compressed();
    Ok(target)
}

fn compress(input: File, output: File, chunk_size: usize) -> Result<u64> {
    let mut reader = BufReader::with_capacity(chunk_size, input);
    let mut encoder = GzEncoder::new(output, Compression::default());
    let mut buffer = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        encoder.write_all(&buffer[..read])?;
        total += read as u64;
    }
    encoder.finish()?.flush()?;
    Ok(total)
}
