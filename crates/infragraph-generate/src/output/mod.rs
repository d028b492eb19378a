//! File-backed sinks: a replayable Cypher script and a bulk-import CSV export.

pub mod csv;
pub mod cypher;

use std::io::Write;

pub use self::csv::CsvExportSink;
pub use self::cypher::CypherScriptSink;

use crate::sink::SinkError;

pub(crate) struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let size = self.inner.write(buf)?;
        self.bytes = self.bytes.saturating_add(size as u64);
        Ok(size)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

pub(crate) fn unavailable(err: impl std::fmt::Display) -> SinkError {
    SinkError::BackendUnavailable(err.to_string())
}
