use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::domain::types::Block;
use crate::error::{Error, Result};
use crate::source::BlockSource;

/// Newline-delimited JSON blocks, as dumped by the watcher. Blank lines are
/// skipped.
pub struct JsonLinesBlockSource<R> {
    reader: R,
    line_no: u64,
    buf: String,
}

impl JsonLinesBlockSource<BufReader<tokio::fs::File>> {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::Source(format!("open {}: {e}", path.display())))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesBlockSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }
}

#[async_trait::async_trait]
impl<R: AsyncBufRead + Unpin + Send> BlockSource for JsonLinesBlockSource<R> {
    async fn next_block(&mut self) -> Result<Option<Block>> {
        loop {
            self.buf.clear();
            let n = self
                .reader
                .read_line(&mut self.buf)
                .await
                .map_err(|e| Error::Source(format!("read line {}: {e}", self.line_no + 1)))?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }
            return serde_json::from_str(line)
                .map(Some)
                .map_err(|e| Error::Decode(format!("line {}: {e}", self.line_no)));
        }
    }
}
