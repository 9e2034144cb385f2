use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::{Connection, LineWriter};
use super::error::LinkError;
use super::handshake::LinkSetup;
use super::tasks;
use crate::config::DeviceProfile;
use crate::pad::{DpadDirection, PadButton, PadState};

/// How long a blocking read may sit idle before it re-arms.
pub const READ_TIMEOUT: Duration = Duration::from_millis(30_000);
/// Liveness beat cadence.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(3000);
/// Snapshot cadence while any control is active.
pub const ACTIVE_SEND_INTERVAL: Duration = Duration::from_millis(50);
/// Re-check cadence while every control is neutral.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Connection lifecycle as observable at runtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LinkPhase {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl LinkPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LinkPhase::Connecting,
            2 => LinkPhase::Connected,
            _ => LinkPhase::Disconnected,
        }
    }
}

/// Notifications out of the link, consumed from the channel handed to
/// [`LinkHandle::new`].
#[derive(Clone, Debug, PartialEq)]
pub enum LinkEvent {
    /// Human-readable connection progress, with the pad id when one is known.
    Status { text: String, pad_id: Option<i64> },
    /// Rumble request from the server, for a haptics consumer.
    Vibration { left_motor: f32, right_motor: f32 },
    /// The session is gone, whichever side ended it.
    Closed,
}

/// Non-blocking event emission; the consumer must never be able to stall
/// a session task.
pub(crate) fn emit(events: &mpsc::Sender<LinkEvent>, event: LinkEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!("Link event channel full, dropping {:?}", event);
        }
        Err(mpsc::error::TrySendError::Closed(event)) => {
            debug!("No link event consumer, dropping {:?}", event);
        }
    }
}

pub(crate) struct LinkInner {
    pub(crate) pad: PadState,
    pub(crate) pad_id: AtomicI64,
    pub(crate) wake: Notify,
    phase: AtomicU8,
    events: mpsc::Sender<LinkEvent>,
    profile: DeviceProfile,
    active: Mutex<Option<ActiveSession>>,
}

struct ActiveSession {
    cancel: CancellationToken,
    supervisor: JoinHandle<()>,
}

impl LinkInner {
    pub(crate) fn phase(&self) -> LinkPhase {
        LinkPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn set_phase(&self, phase: LinkPhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    pub(crate) fn emit(&self, event: LinkEvent) {
        emit(&self.events, event);
    }

    /// The single teardown path. Clears everything and reports the close,
    /// but only if this session ever reached `Connected`.
    pub(crate) async fn teardown(&self, writer: &LineWriter) {
        writer.shutdown().await;
        self.pad.reset();
        self.pad_id.store(-1, Ordering::SeqCst);

        let was_connected = self
            .phase
            .swap(LinkPhase::Disconnected as u8, Ordering::SeqCst)
            == LinkPhase::Connected as u8;
        if was_connected {
            self.emit(LinkEvent::Status {
                text: "Disconnected".to_string(),
                pad_id: None,
            });
            self.emit(LinkEvent::Closed);
        }
    }
}

/// Client side of one gamepad link.
///
/// Cheap to clone; every clone shares the same pad state and session. Input
/// setters are synchronous and never block on the network, so they can be
/// called straight from an input thread.
#[derive(Clone)]
pub struct LinkHandle {
    inner: Arc<LinkInner>,
}

impl LinkHandle {
    pub fn new(profile: DeviceProfile, events: mpsc::Sender<LinkEvent>) -> Self {
        Self {
            inner: Arc::new(LinkInner {
                pad: PadState::new(),
                pad_id: AtomicI64::new(-1),
                wake: Notify::new(),
                phase: AtomicU8::new(LinkPhase::Disconnected as u8),
                events,
                profile,
                active: Mutex::new(None),
            }),
        }
    }

    pub fn phase(&self) -> LinkPhase {
        self.inner.phase()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.phase() == LinkPhase::Connected
    }

    /// Server-assigned pad id, -1 while unassigned.
    pub fn pad_id(&self) -> i64 {
        self.inner.pad_id.load(Ordering::SeqCst)
    }

    /// Opens a session: TCP connect, welcome, device info, then the
    /// heartbeat, streaming and listener tasks under one supervisor.
    ///
    /// Allowed only while disconnected. There is no automatic reconnect;
    /// after the session closes a fresh `connect` starts the next one.
    pub async fn connect(&self, host: &str, port: u16) -> Result<(), LinkError> {
        if self
            .inner
            .phase
            .compare_exchange(
                LinkPhase::Disconnected as u8,
                LinkPhase::Connecting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(LinkError::AlreadyConnected);
        }

        info!("Connecting to {}:{}", host, port);
        let connection = match Connection::open(host, port, READ_TIMEOUT).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!("Connect failed: {}", e);
                // Same cleanup the teardown path runs: input staged while
                // disconnected must not leak into the next session.
                self.inner.pad.reset();
                self.inner.pad_id.store(-1, Ordering::SeqCst);
                self.inner.set_phase(LinkPhase::Disconnected);
                self.inner.emit(LinkEvent::Status {
                    text: format!("Connection failed: {}", e),
                    pad_id: None,
                });
                return Err(e);
            }
        };

        self.inner.set_phase(LinkPhase::Connected);
        self.inner.emit(LinkEvent::Status {
            text: "Connected".to_string(),
            pad_id: None,
        });

        let (reader, writer) = connection.split();
        let setup = LinkSetup::begin(reader, writer.clone(), self.inner.events.clone())
            .await_welcome()
            .await;
        let setup = match setup.introduce(&self.inner.profile).await {
            Ok(setup) => setup,
            Err(e) => {
                warn!("Could not introduce device: {}", e);
                self.inner.teardown(&writer).await;
                return Err(e);
            }
        };
        let (reader, pad_id) = setup.into_parts();
        if let Some(id) = pad_id {
            self.inner.pad_id.store(id, Ordering::SeqCst);
        }

        let cancel = CancellationToken::new();
        let workers = vec![
            tokio::spawn(tasks::run_heartbeat(writer.clone(), cancel.clone())),
            tokio::spawn(tasks::run_streaming(
                self.inner.clone(),
                writer.clone(),
                cancel.clone(),
            )),
            tokio::spawn(tasks::run_listener(
                reader,
                self.inner.clone(),
                cancel.clone(),
            )),
        ];
        let supervisor = tokio::spawn(tasks::supervise(
            self.inner.clone(),
            writer,
            workers,
            cancel.clone(),
        ));

        *self.inner.active.lock().await = Some(ActiveSession { cancel, supervisor });
        info!("Session established with {}:{}", host, port);
        Ok(())
    }

    /// Tears the active session down and waits for it to finish.
    /// Safe to call repeatedly and from any phase.
    pub async fn disconnect(&self) {
        let active = self.inner.active.lock().await.take();
        match active {
            Some(session) => {
                info!("Disconnect requested");
                session.cancel.cancel();
                if let Err(e) = session.supervisor.await {
                    warn!("Session supervisor panicked: {}", e);
                }
            }
            None => debug!("Disconnect requested with no active session"),
        }
    }

    pub fn set_left_stick(&self, x: f32, y: f32) {
        self.inner.pad.set_left_stick(x, y);
        self.poke();
    }

    pub fn set_right_stick(&self, x: f32, y: f32) {
        self.inner.pad.set_right_stick(x, y);
        self.poke();
    }

    pub fn set_left_trigger(&self, value: f32) {
        self.inner.pad.set_left_trigger(value);
        self.poke();
    }

    pub fn set_right_trigger(&self, value: f32) {
        self.inner.pad.set_right_trigger(value);
        self.poke();
    }

    pub fn press_button(&self, button: PadButton) {
        self.inner.pad.press_button(button);
        self.poke();
    }

    pub fn release_button(&self, button: PadButton) {
        self.inner.pad.release_button(button);
        self.poke();
    }

    /// Holds one d-pad direction, releasing the other three.
    pub fn set_dpad(&self, direction: DpadDirection) {
        self.inner.pad.set_dpad(direction);
        self.poke();
    }

    pub fn release_dpad(&self) {
        self.inner.pad.release_dpad();
        self.poke();
    }

    // Wakes the streaming task so the change reaches the wire promptly.
    // Wake-ups coalesce, so setter bursts cost one extra frame at most.
    fn poke(&self) {
        if self.is_connected() {
            self.inner.wake.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const WELCOME_7: &str = r#"{"type":"welcome","gamepad_id":7,"message":"registered"}"#;

    struct ServerSide {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl ServerSide {
        async fn accept(listener: &TcpListener) -> Self {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, write) = stream.into_split();
            Self {
                reader: BufReader::new(read),
                writer: write,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
        }

        async fn recv(&mut self) -> Option<String> {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line).await.unwrap();
            if read == 0 {
                None
            } else {
                Some(line.trim_end().to_string())
            }
        }

        async fn recv_json(&mut self) -> serde_json::Value {
            let line = self.recv().await.expect("server connection closed");
            serde_json::from_str(&line).unwrap()
        }
    }

    async fn bind() -> (TcpListener, String, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr.ip().to_string(), addr.port())
    }

    fn new_handle() -> (LinkHandle, mpsc::Receiver<LinkEvent>) {
        let (tx, rx) = mpsc::channel(16);
        (LinkHandle::new(DeviceProfile::default(), tx), rx)
    }

    /// Connects while scripting the server's side of the greeting.
    async fn connect_with_greeting(
        handle: &LinkHandle,
        listener: &TcpListener,
        host: &str,
        port: u16,
        greeting: &str,
    ) -> ServerSide {
        let (connected, server) = tokio::join!(handle.connect(host, port), async {
            let mut server = ServerSide::accept(listener).await;
            server.send(greeting).await;
            server
        });
        connected.unwrap();
        server
    }

    async fn next_event(rx: &mut mpsc::Receiver<LinkEvent>) -> LinkEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for link event")
            .expect("event channel closed")
    }

    async fn assert_no_event(rx: &mut mpsc::Receiver<LinkEvent>) {
        assert!(
            timeout(Duration::from_millis(150), rx.recv()).await.is_err(),
            "expected no further link events"
        );
    }

    async fn recv_frame_where(
        server: &mut ServerSide,
        predicate: impl Fn(&serde_json::Value) -> bool,
    ) -> serde_json::Value {
        timeout(Duration::from_secs(5), async {
            loop {
                let value = server.recv_json().await;
                if value["type"] == "gamepad_input" && predicate(&value) {
                    return value;
                }
            }
        })
        .await
        .expect("expected input frame not seen in time")
    }

    #[tokio::test]
    async fn welcome_sets_pad_id_and_reports_both_statuses() {
        let (listener, host, port) = bind().await;
        let (handle, mut rx) = new_handle();

        let mut server = connect_with_greeting(&handle, &listener, &host, port, WELCOME_7).await;

        assert!(handle.is_connected());
        assert_eq!(handle.phase(), LinkPhase::Connected);
        assert_eq!(handle.pad_id(), 7);

        assert_eq!(
            next_event(&mut rx).await,
            LinkEvent::Status {
                text: "Connected".to_string(),
                pad_id: None,
            }
        );
        assert_eq!(
            next_event(&mut rx).await,
            LinkEvent::Status {
                text: "Connected as GamePad 7".to_string(),
                pad_id: Some(7),
            }
        );

        let device_info = server.recv_json().await;
        assert_eq!(device_info["type"], "device_info");
        assert_eq!(device_info["device_data"]["device_name"], "padlink");

        handle.disconnect().await;
    }

    #[tokio::test]
    async fn garbage_welcome_connects_without_an_id() {
        let (listener, host, port) = bind().await;
        let (handle, mut rx) = new_handle();

        let mut server =
            connect_with_greeting(&handle, &listener, &host, port, "not a welcome").await;

        assert!(handle.is_connected());
        assert_eq!(handle.pad_id(), -1);
        assert_eq!(
            next_event(&mut rx).await,
            LinkEvent::Status {
                text: "Connected".to_string(),
                pad_id: None,
            }
        );
        assert_no_event(&mut rx).await;

        let device_info = server.recv_json().await;
        assert_eq!(device_info["type"], "device_info");

        handle.disconnect().await;
    }

    #[tokio::test]
    async fn connection_info_updates_pad_id_without_a_status_event() {
        let (listener, host, port) = bind().await;
        let (handle, mut rx) = new_handle();

        let mut server = connect_with_greeting(&handle, &listener, &host, port, WELCOME_7).await;
        next_event(&mut rx).await;
        next_event(&mut rx).await;

        server
            .send(r#"{"type":"connection_info","gamepad_id":9}"#)
            .await;

        timeout(Duration::from_secs(5), async {
            while handle.pad_id() != 9 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("pad id never updated");

        assert_no_event(&mut rx).await;
        handle.disconnect().await;
    }

    #[tokio::test]
    async fn unparseable_server_lines_do_not_end_the_session() {
        let (listener, host, port) = bind().await;
        let (handle, mut rx) = new_handle();

        let mut server = connect_with_greeting(&handle, &listener, &host, port, WELCOME_7).await;
        next_event(&mut rx).await;
        next_event(&mut rx).await;

        server.send("}}} not json {{{").await;
        server.send("").await;
        server
            .send(r#"{"type":"vibration","left_motor":0.5,"right_motor":1.0}"#)
            .await;

        assert_eq!(
            next_event(&mut rx).await,
            LinkEvent::Vibration {
                left_motor: 0.5,
                right_motor: 1.0,
            }
        );
        assert!(handle.is_connected());

        handle.disconnect().await;
    }

    #[tokio::test]
    async fn server_drop_tears_down_exactly_once() {
        let (listener, host, port) = bind().await;
        let (handle, mut rx) = new_handle();

        let server = connect_with_greeting(&handle, &listener, &host, port, WELCOME_7).await;
        next_event(&mut rx).await;
        next_event(&mut rx).await;

        drop(server);

        assert_eq!(
            next_event(&mut rx).await,
            LinkEvent::Status {
                text: "Disconnected".to_string(),
                pad_id: None,
            }
        );
        assert_eq!(next_event(&mut rx).await, LinkEvent::Closed);
        assert!(!handle.is_connected());
        assert_eq!(handle.pad_id(), -1);

        // A later explicit disconnect is a no-op.
        handle.disconnect().await;
        assert_no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn caller_disconnect_reports_close_once() {
        let (listener, host, port) = bind().await;
        let (handle, mut rx) = new_handle();

        let _server = connect_with_greeting(&handle, &listener, &host, port, WELCOME_7).await;
        next_event(&mut rx).await;
        next_event(&mut rx).await;

        handle.disconnect().await;
        assert!(!handle.is_connected());
        assert_eq!(handle.pad_id(), -1);

        assert_eq!(
            next_event(&mut rx).await,
            LinkEvent::Status {
                text: "Disconnected".to_string(),
                pad_id: None,
            }
        );
        assert_eq!(next_event(&mut rx).await, LinkEvent::Closed);

        handle.disconnect().await;
        assert_no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn connect_failure_reports_status_and_stays_disconnected() {
        let (listener, host, port) = bind().await;
        drop(listener);
        let (handle, mut rx) = new_handle();

        let err = handle.connect(&host, port).await.unwrap_err();
        assert!(matches!(err, LinkError::Connect { .. }));
        assert!(!handle.is_connected());

        match next_event(&mut rx).await {
            LinkEvent::Status { text, pad_id } => {
                assert!(text.starts_with("Connection failed"), "got {}", text);
                assert_eq!(pad_id, None);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn failed_connect_clears_any_staged_input() {
        let (listener, host, port) = bind().await;
        drop(listener);
        let (handle, mut rx) = new_handle();

        // Input staged while disconnected, as a UI would before connecting.
        handle.press_button(PadButton::A);
        handle.set_left_stick(0.9, 0.0);

        let err = handle.connect(&host, port).await.unwrap_err();
        assert!(matches!(err, LinkError::Connect { .. }));

        assert_eq!(handle.inner.pad.snapshot(), crate::pad::PadSnapshot::default());
        assert_eq!(handle.pad_id(), -1);

        match next_event(&mut rx).await {
            LinkEvent::Status { text, .. } => {
                assert!(text.starts_with("Connection failed"), "got {}", text);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn peer_reset_during_writes_tears_down_exactly_once() {
        let (listener, host, port) = bind().await;
        let (handle, mut rx) = new_handle();

        let (connected, server) = tokio::join!(handle.connect(&host, port), async {
            let (stream, _) = listener.accept().await.unwrap();
            // Linger zero makes the drop below reset the socket, so client
            // writes start failing instead of filling a dead buffer.
            stream.set_linger(Some(Duration::ZERO)).unwrap();
            let (read, write) = stream.into_split();
            let mut server = ServerSide {
                reader: BufReader::new(read),
                writer: write,
            };
            server.send(WELCOME_7).await;
            server
        });
        connected.unwrap();
        next_event(&mut rx).await;
        next_event(&mut rx).await;

        // Held input keeps the streaming task writing, so a send hits the
        // reset socket well before the next heartbeat would.
        handle.press_button(PadButton::A);
        drop(server);

        assert_eq!(
            next_event(&mut rx).await,
            LinkEvent::Status {
                text: "Disconnected".to_string(),
                pad_id: None,
            }
        );
        assert_eq!(next_event(&mut rx).await, LinkEvent::Closed);
        assert!(!handle.is_connected());
        assert_no_event(&mut rx).await;

        handle.disconnect().await;
        assert_no_event(&mut rx).await;
    }

    #[tokio::test]
    async fn second_connect_while_active_is_rejected() {
        let (listener, host, port) = bind().await;
        let (handle, mut rx) = new_handle();

        let _server = connect_with_greeting(&handle, &listener, &host, port, WELCOME_7).await;
        next_event(&mut rx).await;
        next_event(&mut rx).await;

        let err = handle.connect(&host, port).await.unwrap_err();
        assert!(matches!(err, LinkError::AlreadyConnected));
        assert!(handle.is_connected());

        handle.disconnect().await;
    }

    #[tokio::test]
    async fn heartbeats_flow_from_session_start() {
        let (listener, host, port) = bind().await;
        let (handle, _rx) = new_handle();

        let mut server = connect_with_greeting(&handle, &listener, &host, port, WELCOME_7).await;

        let beat = timeout(Duration::from_secs(5), async {
            loop {
                let value = server.recv_json().await;
                if value["type"] == "heartbeat" {
                    return value;
                }
            }
        })
        .await
        .expect("no heartbeat within the first interval");
        assert!(beat["timestamp"].is_i64());

        handle.disconnect().await;
    }

    #[tokio::test]
    async fn button_press_and_release_stream_promptly() {
        let (listener, host, port) = bind().await;
        let (handle, _rx) = new_handle();

        let mut server = connect_with_greeting(&handle, &listener, &host, port, WELCOME_7).await;
        let first = server.recv_json().await;
        assert_eq!(first["type"], "device_info");

        handle.press_button(PadButton::A);
        let frame = recv_frame_where(&mut server, |value| {
            value["input_data"]["buttons"] == json!({"a": true})
        })
        .await;
        assert_eq!(frame["input_data"]["left_joystick"], json!({"x": 0.0, "y": 0.0}));

        handle.release_button(PadButton::A);
        recv_frame_where(&mut server, |value| {
            value["input_data"]["buttons"] == json!({})
        })
        .await;

        // With everything neutral again, idle cycles send no input frames.
        let quiet = timeout(Duration::from_millis(400), async {
            loop {
                let value = server.recv_json().await;
                if value["type"] == "gamepad_input" {
                    return value;
                }
            }
        })
        .await;
        assert!(quiet.is_err(), "expected no idle frames, got {:?}", quiet);

        handle.disconnect().await;
    }

    #[tokio::test]
    async fn held_input_streams_repeatedly() {
        let (listener, host, port) = bind().await;
        let (handle, _rx) = new_handle();

        let mut server = connect_with_greeting(&handle, &listener, &host, port, WELCOME_7).await;

        handle.set_left_stick(0.5, 0.0);

        let mut frames = 0;
        let started = std::time::Instant::now();
        while started.elapsed() < Duration::from_millis(500) {
            match timeout(Duration::from_millis(250), server.recv()).await {
                Ok(Some(line)) => {
                    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
                    if value["type"] == "gamepad_input" {
                        assert_eq!(value["input_data"]["left_joystick"]["x"], 0.5);
                        frames += 1;
                    }
                }
                _ => break,
            }
        }
        assert!(frames >= 3, "expected a stream of frames, got {}", frames);

        handle.disconnect().await;
    }

    #[tokio::test]
    async fn dpad_frames_carry_one_direction_at_a_time() {
        let (listener, host, port) = bind().await;
        let (handle, _rx) = new_handle();

        let mut server = connect_with_greeting(&handle, &listener, &host, port, WELCOME_7).await;

        handle.set_dpad(DpadDirection::Up);
        recv_frame_where(&mut server, |value| {
            value["input_data"]["buttons"] == json!({"dpad_up": true})
        })
        .await;

        handle.set_dpad(DpadDirection::Left);
        recv_frame_where(&mut server, |value| {
            value["input_data"]["buttons"] == json!({"dpad_left": true})
        })
        .await;

        handle.disconnect().await;
    }
}
