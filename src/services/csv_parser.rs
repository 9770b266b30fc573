//! Streaming CSV parsing into header-keyed records.
//!
//! The first row is the header and is never emitted. Every later row is
//! zipped positionally with the header:
//! - a row shorter than the header gets its missing trailing fields filled
//!   with `""`
//! - a row longer than the header has its excess fields dropped
//!
//! Repeated header names are made unique by suffixing `_2`, `_3`, ... so a
//! record always carries exactly one key per header column.
//!
//! Field bytes that are not valid UTF-8 are decoded lossily. The only
//! failure is an I/O error on the underlying reader.

use crate::models::Record;
use async_stream::try_stream;
use csv_async::{AsyncReaderBuilder, ByteRecord};
use futures::{Stream, TryStreamExt};
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read CSV stream: {0}")]
    Read(#[from] csv_async::Error),
}

/// Lazily parses `reader` into records. The stream is finite and cannot be
/// restarted; it ends after the first error.
pub fn record_stream<R>(reader: R) -> impl Stream<Item = Result<Record, ParseError>> + Send
where
    R: AsyncRead + Unpin + Send,
{
    try_stream! {
        let mut rdr = AsyncReaderBuilder::new()
            .has_headers(true)
            // Row length is reconciled against the header below.
            .flexible(true)
            .create_reader(reader);

        let header = header_names(rdr.byte_headers().await.map_err(ParseError::from)?);
        let mut row = ByteRecord::new();

        while rdr.read_byte_record(&mut row).await.map_err(ParseError::from)? {
            yield zip_row(&header, &row);
        }
    }
}

/// Parses the whole file at `path`. An empty or header-only file yields no
/// records.
pub async fn parse_file(path: &Path) -> Result<Vec<Record>, ParseError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| ParseError::Open {
            path: path.display().to_string(),
            source,
        })?;

    record_stream(file).try_collect().await
}

fn header_names(raw: &ByteRecord) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(raw.len());
    for field in raw.iter() {
        let base = String::from_utf8_lossy(field).into_owned();
        let mut name = base.clone();
        let mut suffix = 2;
        while names.contains(&name) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        names.push(name);
    }
    names
}

fn zip_row(header: &[String], row: &ByteRecord) -> Record {
    let fields = header
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let value = row
                .get(i)
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default();
            (name.clone(), value)
        })
        .collect();
    Record::new(fields)
}
