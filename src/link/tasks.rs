use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{LineReader, LineWriter};
use super::error::LinkError;
use super::session::{
    LinkEvent, LinkInner, ACTIVE_SEND_INTERVAL, HEARTBEAT_INTERVAL, IDLE_POLL_INTERVAL,
};
use crate::wire::{self, Message};

/// Sends a liveness beat on a fixed cadence, input or not.
pub async fn run_heartbeat(writer: LineWriter, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let beat = wire::heartbeat(Utc::now().timestamp_millis());
                if let Err(e) = send(&writer, &beat).await {
                    warn!("Heartbeat send failed: {}", e);
                    cancel.cancel();
                    break;
                }
                debug!("Heartbeat sent");
            }
        }
    }
    debug!("Heartbeat loop stopped");
}

/// Streams pad snapshots.
///
/// Fast cadence while any control is active, a quiet re-check cadence while
/// everything is neutral, and an immediate frame whenever a setter wakes the
/// task. The wake path is what carries the final all-released frame.
pub async fn run_streaming(inner: Arc<LinkInner>, writer: LineWriter, cancel: CancellationToken) {
    loop {
        let wait = if inner.pad.has_active_input() {
            if send_snapshot(&inner, &writer, &cancel).await.is_err() {
                break;
            }
            ACTIVE_SEND_INTERVAL
        } else {
            IDLE_POLL_INTERVAL
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = inner.wake.notified() => {
                if send_snapshot(&inner, &writer, &cancel).await.is_err() {
                    break;
                }
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }
    debug!("Streaming loop stopped");
}

async fn send_snapshot(
    inner: &LinkInner,
    writer: &LineWriter,
    cancel: &CancellationToken,
) -> Result<(), ()> {
    let frame = wire::input_frame(&inner.pad.snapshot());
    match send(writer, &frame).await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("Input frame send failed: {}", e);
            cancel.cancel();
            Err(())
        }
    }
}

async fn send(writer: &LineWriter, message: &Message) -> Result<(), LinkError> {
    let line = wire::encode(message)?;
    writer.write_line(&line).await
}

/// Consumes inbound lines until the peer goes away or the session is
/// cancelled. Idle read timeouts just re-arm the read; the heartbeat keeps
/// a healthy server talking back often enough in practice.
pub async fn run_listener(
    mut reader: LineReader,
    inner: Arc<LinkInner>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            read = reader.read_line() => match read {
                Ok(line) => handle_server_line(&inner, &line),
                Err(LinkError::ReadTimeout) => {
                    debug!("Idle read window elapsed, listening again");
                }
                Err(LinkError::Closed) => {
                    info!("Server closed the connection");
                    cancel.cancel();
                    break;
                }
                Err(e) => {
                    warn!("Listener read failed: {}", e);
                    cancel.cancel();
                    break;
                }
            }
        }
    }
    debug!("Listener loop stopped");
}

fn handle_server_line(inner: &LinkInner, line: &str) {
    if line.is_empty() {
        debug!("Dropping empty server line");
        return;
    }
    match wire::decode(line) {
        Ok(Message::Vibration {
            left_motor,
            right_motor,
        }) => {
            debug!(
                "Vibration request: left={:.2} right={:.2}",
                left_motor, right_motor
            );
            inner.emit(LinkEvent::Vibration {
                left_motor,
                right_motor,
            });
        }
        Ok(Message::ConnectionInfo { gamepad_id }) => {
            info!("Server assigned pad id {}", gamepad_id);
            inner.pad_id.store(gamepad_id, Ordering::SeqCst);
        }
        Ok(other) => debug!("Ignoring server message: {:?}", other),
        Err(e) => warn!("Dropping unparseable server line: {}", e),
    }
}

/// Waits for cancellation, joins the workers, then runs the one and only
/// teardown. Every failure path merely cancels the shared token.
pub async fn supervise(
    inner: Arc<LinkInner>,
    writer: LineWriter,
    workers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
) {
    cancel.cancelled().await;
    for worker in workers {
        if let Err(e) = worker.await {
            warn!("Session task panicked: {}", e);
        }
    }
    inner.teardown(&writer).await;
    info!("Session closed");
}
