//! The connection to the hosting browser: native-messaging framing over
//! stdin/stdout, plus the outbound port abstraction the engine talks to.

pub mod codec;
pub mod messages;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, Stdout};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::EngineMessage;

use codec::{MessageReader, MessageWriter};
use messages::{HostPort, OutboundMessage};

/// [HostPort] over the process's own stdio, the shape Chrome launches a
/// native-messaging host with.
pub struct StdioHost {
    writer: MessageWriter<Stdout>,
}

impl StdioHost {
    pub fn new() -> Self {
        Self {
            writer: MessageWriter::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdioHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostPort for StdioHost {
    async fn send(&mut self, message: OutboundMessage) -> Result<()> {
        self.writer.write(&message).await
    }
}

/// Reads browser events off the wire and feeds them to the engine channel.
/// Channel closure on the browser side shuts the whole daemon down.
pub struct EventPump<R> {
    reader: MessageReader<R>,
    next: mpsc::Sender<EngineMessage>,
    shutdown: CancellationToken,
}

impl<R: AsyncRead + Unpin> EventPump<R> {
    pub fn new(
        input: R,
        next: mpsc::Sender<EngineMessage>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reader: MessageReader::new(input),
            next,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let result = self.pump().await;
        // Nothing else will see stdin again; whatever ended the pump, clean
        // EOF or a broken stream, ends the daemon with it.
        self.shutdown.cancel();
        result
    }

    async fn pump(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                event = self.reader.next_event() => match event? {
                    Some(event) => {
                        debug!("Received browser event {:?}", event);
                        if self.next.send(EngineMessage::Event(event)).await.is_err() {
                            return Ok(());
                        }
                    }
                    None => {
                        info!("Browser closed the message channel");
                        return Ok(());
                    }
                }
            }
        }
    }
}
