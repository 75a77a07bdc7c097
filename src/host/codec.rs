//! Chrome native-messaging framing: every document is prefixed with its
//! byte length as a 32-bit little-endian integer.

use std::io::ErrorKind;

use anyhow::{bail, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use super::messages::{BrowserEvent, OutboundMessage};

/// Chrome refuses messages above 1 MiB in the extension-bound direction; the
/// daemon applies the same bound both ways.
pub const MAX_FRAME_BYTES: u32 = 1024 * 1024;

pub struct MessageReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Yields the next well-formed event, skipping frames that don't parse
    /// (an extension/daemon version skew shouldn't kill the accounting).
    /// `None` means the browser closed the channel.
    pub async fn next_event(&mut self) -> Result<Option<BrowserEvent>> {
        loop {
            let Some(frame) = self.next_frame().await? else {
                return Ok(None);
            };
            match serde_json::from_slice(&frame) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    warn!(
                        "Skipping malformed frame {}: {e}",
                        String::from_utf8_lossy(&frame)
                    );
                }
            }
        }
    }

    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        match self.inner.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes(len_buf);
        if len > MAX_FRAME_BYTES {
            bail!("frame of {len} bytes exceeds the native messaging limit");
        }
        let mut frame = vec![0u8; len as usize];
        self.inner.read_exact(&mut frame).await?;
        Ok(Some(frame))
    }
}

pub struct MessageWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn write(&mut self, message: &OutboundMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        let len = u32::try_from(payload.len())?;
        if len > MAX_FRAME_BYTES {
            bail!("outbound frame of {len} bytes exceeds the native messaging limit");
        }
        self.inner.write_all(&len.to_le_bytes()).await?;
        self.inner.write_all(&payload).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use anyhow::Result;

    use crate::host::messages::{BrowserEvent, OutboundMessage};

    use super::{MessageReader, MessageWriter};

    fn frame(payload: &str) -> Vec<u8> {
        let mut bytes = (payload.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(payload.as_bytes());
        bytes
    }

    #[tokio::test]
    async fn reads_length_prefixed_events() -> Result<()> {
        let mut input = frame(r#"{"type":"tabActivated","url":"https://a.com/","windowFocused":true}"#);
        input.extend(frame(r#"{"type":"getCurrentSession"}"#));

        let mut reader = MessageReader::new(Cursor::new(input));
        assert_eq!(
            reader.next_event().await?,
            Some(BrowserEvent::TabActivated {
                url: "https://a.com/".into(),
                window_focused: true,
            })
        );
        assert_eq!(
            reader.next_event().await?,
            Some(BrowserEvent::GetCurrentSession)
        );
        assert_eq!(reader.next_event().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() -> Result<()> {
        let mut input = frame(r#"{"type":"unknownKind","x":1}"#);
        input.extend(frame("not json"));
        input.extend(frame(r#"{"type":"install"}"#));

        let mut reader = MessageReader::new(Cursor::new(input));
        assert_eq!(reader.next_event().await?, Some(BrowserEvent::Install));
        assert_eq!(reader.next_event().await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_frame_is_an_error() {
        let input = (u32::MAX).to_le_bytes().to_vec();
        let mut reader = MessageReader::new(Cursor::new(input));
        assert!(reader.next_event().await.is_err());
    }

    #[tokio::test]
    async fn written_frames_read_back() -> Result<()> {
        let mut writer = MessageWriter::new(Cursor::new(Vec::new()));
        writer
            .write(&OutboundMessage::Notification {
                id: "reminder-a.com-1".into(),
                title: "Reminder".into(),
                message: "time's up".into(),
            })
            .await?;
        let buffer = writer.inner.into_inner();

        let len = u32::from_le_bytes(buffer[..4].try_into().unwrap()) as usize;
        assert_eq!(len, buffer.len() - 4);
        let parsed: OutboundMessage = serde_json::from_slice(&buffer[4..])?;
        assert_eq!(
            parsed,
            OutboundMessage::Notification {
                id: "reminder-a.com-1".into(),
                title: "Reminder".into(),
                message: "time's up".into(),
            }
        );
        Ok(())
    }
}
