//! Capture file provider
//!
//! A capture holds one record per line, `<timestamp_ns>:<category>:<json-payload>`.
//! Reading stops at end of file or at the first empty line.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tracing::{debug, info};

use crate::provider::Provider;
use crate::types::Update;
use crate::{Result, TimingError};

type RecordLines = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

/// Provider that reads updates from a capture file or stream
pub struct CaptureProvider {
    lines: RecordLines,
    /// File the records come from; `None` for stdin and bare readers
    path: Option<PathBuf>,
    /// Records yielded so far; also the next sequence number
    records: u64,
    /// Lines read so far, for error reporting
    line: usize,
    ended: bool,
}

impl CaptureProvider {
    /// Open a capture file. `"-"` reads standard input.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path == Path::new("-") {
            info!("Reading capture from stdin");
            return Ok(Self::from_reader(tokio::io::stdin()));
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| TimingError::file_error(path.to_path_buf(), e))?;
        info!("Opened capture file: {}", path.display());
        Ok(Self { path: Some(path.to_path_buf()), ..Self::from_reader(file) })
    }

    /// Read records from any async reader
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            lines: BufReader::new(reader).lines(),
            path: None,
            records: 0,
            line: 0,
            ended: false,
        }
    }

    /// Number of records read so far
    pub fn records_read(&self) -> u64 {
        self.records
    }
}

#[async_trait::async_trait]
impl Provider for CaptureProvider {
    async fn next_update(&mut self) -> Result<Option<Update>> {
        if self.ended {
            return Ok(None);
        }

        let read = self.lines.next_line().await.map_err(|e| match &self.path {
            Some(path) => TimingError::file_error(path.clone(), e),
            None => TimingError::capture(self.line + 1, e.to_string()),
        });
        let Some(record) = read? else {
            debug!(records = self.records, "Capture reached end of file");
            self.ended = true;
            return Ok(None);
        };
        self.line += 1;

        match Update::parse_record(&record, self.line)? {
            Some(update) => {
                let update = update.with_sequence(self.records);
                self.records += 1;
                Ok(Some(update))
            }
            None => {
                debug!(records = self.records, line = self.line, "Capture end-of-stream marker");
                self.ended = true;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURE: &str = "\
100:SessionStatus:{\"Status\":\"Started\"}
200:Heartbeat:{\"Utc\":\"2025-08-03T13:03:00Z\"}

300:TrackStatus:{\"Status\":\"2\",\"Message\":\"Yellow\"}
";

    #[tokio::test]
    async fn reads_until_empty_record() {
        let mut provider = CaptureProvider::from_reader(CAPTURE.as_bytes());

        let first = provider.next_update().await.unwrap().unwrap();
        assert_eq!(
            (first.sequence, first.received_at, first.category.as_str()),
            (0, 100, "SessionStatus")
        );

        let second = provider.next_update().await.unwrap().unwrap();
        assert_eq!(second.sequence, 1);

        assert!(provider.next_update().await.unwrap().is_none());
        assert!(provider.next_update().await.unwrap().is_none());
        assert_eq!(provider.records_read(), 2);
    }

    #[tokio::test]
    async fn bad_record_reports_line() {
        let mut provider = CaptureProvider::from_reader("100:init:{}\nnot a record\n".as_bytes());
        provider.next_update().await.unwrap();
        let err = provider.next_update().await.unwrap_err();
        assert!(matches!(err, TimingError::Capture { line: 2, .. }));
    }

    #[tokio::test]
    async fn missing_file_is_a_file_error() {
        let err = CaptureProvider::open("/nonexistent/capture.txt").await.err().unwrap();
        match err {
            TimingError::File { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/capture.txt"))
            }
            other => panic!("Expected File error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_errors_name_the_capture_file() {
        let name = format!("livetiming-capture-{}.txt", std::process::id());
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, b"100:init:{}\n200:init:\xff\xfe\n").unwrap();

        let mut provider = CaptureProvider::open(&path).await.unwrap();
        provider.next_update().await.unwrap();
        let err = provider.next_update().await.unwrap_err();
        std::fs::remove_file(&path).unwrap();
        match err {
            TimingError::File { path: reported, source } => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidData);
            }
            other => panic!("Expected File error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reader_errors_report_the_line() {
        let mut provider = CaptureProvider::from_reader(&b"100:init:{}\n200:init:\xff\n"[..]);
        provider.next_update().await.unwrap();
        let err = provider.next_update().await.unwrap_err();
        assert!(matches!(err, TimingError::Capture { line: 2, .. }));
    }
}
