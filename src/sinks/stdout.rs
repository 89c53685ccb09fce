use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::core::display::{DisplaySink, PublishError};

/// Writes each label on its own line, for status bars that read a pipe.
///
/// A reader that stops draining the pipe fails the publish after `timeout`
/// instead of stalling the display.
pub struct LineSink<W> {
    writer: Mutex<W>,
    timeout: Duration,
}

pub type StdoutSink = LineSink<tokio::io::Stdout>;

impl StdoutSink {
    pub fn stdout(timeout: Duration) -> Self {
        LineSink::new(tokio::io::stdout(), timeout)
    }
}

impl<W: AsyncWrite + Unpin + Send> LineSink<W> {
    pub fn new(writer: W, timeout: Duration) -> Self {
        LineSink {
            writer: Mutex::new(writer),
            timeout,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> DisplaySink for LineSink<W> {
    async fn publish(&self, label: &str) -> Result<(), PublishError> {
        let line = format!("{label}\n");
        let write = async {
            let mut writer = self.writer.lock().await;
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        };

        tokio::time::timeout(self.timeout, write)
            .await
            .map_err(|_| {
                PublishError::Unreachable(format!(
                    "output not drained within {:?}",
                    self.timeout
                ))
            })??;
        Ok(())
    }
}
