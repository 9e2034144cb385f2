use statum::{machine, state};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection::{LineReader, LineWriter};
use super::error::LinkError;
use super::session::{emit, LinkEvent};
use crate::config::DeviceProfile;
use crate::wire::{self, Message};

/// Join sequence states, walked once right after the transport opens.
#[state]
#[derive(Debug, Clone)]
pub enum SetupState {
    Greeting,
    Introducing,
    Ready,
}

#[machine]
pub struct LinkSetup<S: SetupState> {
    reader: LineReader,
    writer: LineWriter,
    events: mpsc::Sender<LinkEvent>,
    pad_id: Option<i64>,
}

impl LinkSetup<Greeting> {
    pub fn begin(
        reader: LineReader,
        writer: LineWriter,
        events: mpsc::Sender<LinkEvent>,
    ) -> Self {
        Self::new(reader, writer, events, None)
    }

    /// Waits for the server's welcome line.
    ///
    /// The greeting is best effort: a timeout, garbage, or an unexpected
    /// message type leaves the session without an id until a later
    /// `connection_info` supplies one.
    pub async fn await_welcome(mut self) -> LinkSetup<Introducing> {
        match self.reader.read_line().await {
            Ok(line) => match wire::decode(&line) {
                Ok(Message::Welcome {
                    gamepad_id,
                    message,
                }) => {
                    info!("Registered with server as gamepad {}", gamepad_id);
                    if let Some(text) = message {
                        debug!("Server greeting: {}", text);
                    }
                    self.pad_id = Some(gamepad_id);
                    emit(
                        &self.events,
                        LinkEvent::Status {
                            text: format!("Connected as GamePad {}", gamepad_id),
                            pad_id: Some(gamepad_id),
                        },
                    );
                }
                Ok(other) => debug!("Expected welcome, got {:?}", other),
                Err(e) => warn!("Could not parse welcome line: {}", e),
            },
            Err(e) => warn!("No welcome from server: {}", e),
        }
        self.transition()
    }
}

impl LinkSetup<Introducing> {
    /// Reports this client's identity to the server.
    pub async fn introduce(self, profile: &DeviceProfile) -> Result<LinkSetup<Ready>, LinkError> {
        let message = wire::device_info(
            &profile.device_model,
            &profile.os_version,
            &profile.device_name,
        );
        let line = wire::encode(&message)?;
        self.writer.write_line(&line).await?;
        debug!("Device info sent for {}", profile.device_name);
        Ok(self.transition())
    }
}

impl LinkSetup<Ready> {
    /// Hands the read side and the assigned id over to the session tasks.
    pub fn into_parts(self) -> (LineReader, Option<i64>) {
        (self.reader, self.pad_id)
    }
}
