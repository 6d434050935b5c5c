//! Connection session
//!
//! A session owns one open socket. The read half stays with the read loop in
//! [`ConnectionSession::run`]; the write half moves into a writer task fed by a
//! bounded queue, so a slow device never blocks reads and callers never block
//! on the socket.
//!
//! [`SessionLink`] is the handle the rest of the gateway keeps. It survives
//! reconnects: every new session attaches its queue to the same link.

use crate::config::SessionConfig;
use crate::decoder::FrameDecoder;
use crate::frame::Frame;
use crate::liveness::{Liveness, LivenessCheck};
use crate::model::ModelProfile;
use crate::state::SessionState;
use crate::statistics::SessionStatistics;
use eiscp_core::{Command, EiscpError, EiscpResult};
use eiscp_transport::{
    DeviceAddress, StreamReader, StreamWriter, TcpReader, TcpSettings, TcpTransport, TcpWriter,
};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Read buffer size for one socket read
const READ_BUFFER_SIZE: usize = 1024;

/// Frames queued for the writer before new ones are dropped
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Time the writer gets to flush queued frames once the session ends
const WRITER_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Receives every valid command read from the device
///
/// Called from the read loop, so implementations must not block.
pub trait InboundHandler: Send + Sync {
    fn on_command(&self, command: &Command);
}

/// Why a session ended
#[derive(Debug)]
pub enum SessionExit {
    /// Teardown was requested
    Cancelled,
    /// The device stopped answering keep-alive queries
    Stalled,
    /// The device closed the connection
    Closed,
    /// A socket read failed
    Failed(EiscpError),
}

impl SessionExit {
    /// Check if the supervisor should dial again
    pub fn should_redial(&self) -> bool {
        !matches!(self, SessionExit::Cancelled)
    }
}

impl fmt::Display for SessionExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionExit::Cancelled => f.write_str("cancelled"),
            SessionExit::Stalled => f.write_str("device stopped answering"),
            SessionExit::Closed => f.write_str("closed by device"),
            SessionExit::Failed(e) => write!(f, "read failed: {}", e),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct LinkInner {
    address: DeviceAddress,
    model: ModelProfile,
    state: Mutex<SessionState>,
    outbound: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    statistics: Mutex<SessionStatistics>,
}

/// Shared handle to the device link
#[derive(Clone)]
pub struct SessionLink {
    inner: Arc<LinkInner>,
}

impl fmt::Debug for SessionLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLink")
            .field("address", &self.inner.address)
            .field("state", &self.state())
            .finish()
    }
}

impl SessionLink {
    pub fn new(address: DeviceAddress, model: ModelProfile) -> Self {
        Self {
            inner: Arc::new(LinkInner {
                address,
                model,
                state: Mutex::new(SessionState::Disconnected),
                outbound: Mutex::new(None),
                statistics: Mutex::new(SessionStatistics::new()),
            }),
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.inner.address
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.inner.state)
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow
    pub fn transition(&self, next: SessionState) -> EiscpResult<()> {
        let mut state = lock(&self.inner.state);
        state.validate_transition(next)?;
        if *state != next {
            log::debug!("Link to {}: {} -> {}", self.inner.address, *state, next);
        }
        *state = next;
        Ok(())
    }

    /// Queue `command` for the device
    ///
    /// # Errors
    /// Returns `EiscpError::NotConnected` when no session is attached or its
    /// writer has stopped, and `EiscpError::Protocol` when the outbound queue
    /// is full.
    pub fn try_send(&self, command: &Command) -> EiscpResult<()> {
        let outbound = lock(&self.inner.outbound);
        let tx = outbound.as_ref().ok_or(EiscpError::NotConnected)?;
        tx.try_send(Frame::encode(command, &self.inner.model))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    EiscpError::Protocol("Outbound queue full".to_string())
                }
                mpsc::error::TrySendError::Closed(_) => EiscpError::NotConnected,
            })?;
        log::debug!("Packet {} queued", command);
        Ok(())
    }

    /// Queue `command` for the device, dropping it on failure
    ///
    /// Returns false when no session is connected or the queue is full.
    pub fn send(&self, command: &Command) -> bool {
        match self.try_send(command) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Dropping {} for {}: {}", command, self.inner.address, e);
                false
            }
        }
    }

    /// Snapshot of the link counters
    pub fn statistics(&self) -> SessionStatistics {
        lock(&self.inner.statistics).clone()
    }

    fn record(&self, update: impl FnOnce(&mut SessionStatistics)) {
        update(&mut lock(&self.inner.statistics));
    }

    fn attach(&self, tx: mpsc::Sender<Vec<u8>>) {
        *lock(&self.inner.outbound) = Some(tx);
    }

    fn detach(&self) {
        lock(&self.inner.outbound).take();
    }

    fn force(&self, next: SessionState) {
        if let Err(e) = self.transition(next) {
            log::error!("Link to {}: {}", self.inner.address, e);
        }
    }
}

/// Dial the device until it answers or `cancel` fires
///
/// Retries forever at a fixed `backoff` interval. Returns None if cancelled.
pub async fn dial(
    settings: &TcpSettings,
    backoff: Duration,
    cancel: &CancellationToken,
) -> Option<(TcpReader, TcpWriter)> {
    loop {
        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            attempt = TcpTransport::open(settings) => attempt,
        };

        match attempt {
            Ok(halves) => {
                log::info!("Connected to device at {}", settings.address);
                return Some(halves);
            }
            Err(e) => {
                log::warn!(
                    "Connection to {} failed ({}), retrying in {:?}",
                    settings.address,
                    e,
                    backoff
                );
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}

/// One open connection to the device
pub struct ConnectionSession<R, W> {
    reader: R,
    writer: W,
    link: SessionLink,
    config: SessionConfig,
    handler: Arc<dyn InboundHandler>,
}

impl<R, W> ConnectionSession<R, W>
where
    R: StreamReader,
    W: StreamWriter + 'static,
{
    pub fn new(
        reader: R,
        writer: W,
        link: SessionLink,
        config: SessionConfig,
        handler: Arc<dyn InboundHandler>,
    ) -> Self {
        Self {
            reader,
            writer,
            link,
            config,
            handler,
        }
    }

    /// Run until cancelled, stalled or closed
    ///
    /// The link must be `Connecting`. On return it is `Disconnected`, the
    /// writer task has finished and the socket is closed.
    pub async fn run(self, cancel: &CancellationToken) -> SessionExit {
        let ConnectionSession {
            mut reader,
            writer,
            link,
            config,
            handler,
        } = self;

        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let stop_writer = CancellationToken::new();
        let mut writer_task = tokio::spawn(write_loop(
            writer,
            rx,
            link.clone(),
            stop_writer.clone(),
        ));
        link.attach(tx);
        link.force(SessionState::Connected);
        link.record(SessionStatistics::increment_connects);

        let exit = read_loop(&mut reader, &link, &config, handler.as_ref(), cancel).await;
        log::info!(
            "Session with {} ended: {} ({:.1}% of inbound data rejected)",
            link.address(),
            exit,
            link.statistics().reject_rate()
        );

        link.force(SessionState::Draining);
        link.detach();
        let joined = match tokio::time::timeout(WRITER_DRAIN_GRACE, &mut writer_task).await {
            Ok(joined) => joined,
            Err(_) => {
                log::warn!(
                    "Writer for {} still blocked after {:?}, discarding queued frames",
                    link.address(),
                    WRITER_DRAIN_GRACE
                );
                stop_writer.cancel();
                writer_task.await
            }
        };
        if let Err(e) = joined {
            log::error!("Writer task for {} failed: {}", link.address(), e);
        }
        link.force(SessionState::Disconnected);
        exit
    }
}

async fn read_loop<R: StreamReader>(
    reader: &mut R,
    link: &SessionLink,
    config: &SessionConfig,
    handler: &dyn InboundHandler,
    cancel: &CancellationToken,
) -> SessionExit {
    let mut liveness = Liveness::new(Instant::now(), config.read_timeout, config.liveness_window);
    let mut decoder = FrameDecoder::with_max_payload(config.max_payload);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let deadline = liveness.deadline();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionExit::Cancelled,
            read = tokio::time::timeout_at(deadline, reader.read(&mut buf)) => read,
        };

        match read {
            Err(_elapsed) => match liveness.on_deadline(Instant::now()) {
                LivenessCheck::Probe => {
                    log::debug!("No traffic from {}, sending keep-alive", link.address());
                    link.record(SessionStatistics::increment_keepalive_probes);
                    link.send(&config.keepalive);
                }
                LivenessCheck::Suspect => {
                    log::debug!(
                        "Keep-alive to {} unanswered after {:?}",
                        link.address(),
                        config.liveness_window
                    );
                }
                LivenessCheck::Dead => {
                    log::warn!("Connection to {} appears to be gone, closing", link.address());
                    link.record(SessionStatistics::increment_stalls);
                    return SessionExit::Stalled;
                }
            },
            Ok(Ok(0)) => return SessionExit::Closed,
            Ok(Ok(n)) => {
                liveness.on_read(Instant::now());
                decoder.extend(&buf[..n]);
                dispatch(&mut decoder, link, handler);
            }
            Ok(Err(e)) => return SessionExit::Failed(e),
        }
    }
}

fn dispatch(decoder: &mut FrameDecoder, link: &SessionLink, handler: &dyn InboundHandler) {
    while let Some(item) = decoder.decode_next() {
        match item.and_then(|frame| frame.command()) {
            Ok(command) => {
                log::debug!("Packet {} received", command);
                link.record(SessionStatistics::increment_frames_received);
                handler.on_command(&command);
            }
            Err(e) => {
                log::debug!("Discarding inbound data from {}: {}", link.address(), e);
                link.record(SessionStatistics::increment_frames_rejected);
            }
        }
    }
}

/// Drain the outbound queue into the socket
///
/// Ends when the queue closes or `stop` fires. A write blocked on a device
/// that stopped reading is abandoned when `stop` fires.
async fn write_loop<W: StreamWriter>(
    mut writer: W,
    mut rx: mpsc::Receiver<Vec<u8>>,
    link: SessionLink,
    stop: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        let written = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            written = writer.write_all(&frame) => written,
        };
        match written {
            Ok(()) => link.record(SessionStatistics::increment_frames_sent),
            Err(e) => {
                log::error!("Write to {} failed: {}", link.address(), e);
                link.record(SessionStatistics::increment_write_failures);
            }
        }
    }
    match tokio::time::timeout(WRITER_DRAIN_GRACE, writer.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::debug!("Closing connection to {}: {}", link.address(), e),
        Err(_) => log::debug!("Closing connection to {} timed out", link.address()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::HEADER_LENGTH;
    use eiscp_core::PropertyCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_test::assert_ok;

    #[derive(Default)]
    struct Collector {
        commands: Mutex<Vec<Command>>,
    }

    impl InboundHandler for Collector {
        fn on_command(&self, command: &Command) {
            self.commands.lock().unwrap().push(command.clone());
        }
    }

    impl Collector {
        async fn wait_for(&self, count: usize) -> Vec<Command> {
            for _ in 0..100 {
                let commands = self.commands.lock().unwrap().clone();
                if commands.len() >= count {
                    return commands;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("expected {} commands", count);
        }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            read_timeout: Duration::from_millis(150),
            liveness_window: Duration::from_millis(50),
            dial_backoff: Duration::from_millis(50),
            ..SessionConfig::default()
        }
    }

    async fn connected_pair() -> (TcpStream, TcpReader, TcpWriter, SessionLink) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (peer, _) = listener.accept().await.unwrap();
        let (reader, writer) = TcpTransport::from_connected_stream(client).unwrap();
        let link = SessionLink::new(
            DeviceAddress::new("127.0.0.1", addr.port()),
            ModelProfile::default(),
        );
        link.transition(SessionState::Connecting).unwrap();
        (peer, reader, writer, link)
    }

    async fn read_frame(peer: &mut TcpStream) -> Frame {
        let mut header = [0u8; HEADER_LENGTH];
        peer.read_exact(&mut header).await.unwrap();
        let length = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let mut data = header.to_vec();
        data.resize(HEADER_LENGTH + length, 0);
        peer.read_exact(&mut data[HEADER_LENGTH..]).await.unwrap();
        Frame::decode(&data).unwrap()
    }

    fn device_frame(payload: &str) -> Vec<u8> {
        Frame::encode(&Command::parse(payload).unwrap(), &ModelProfile::default())
    }

    #[tokio::test]
    async fn test_inbound_frames_reach_handler() {
        let (mut peer, reader, writer, link) = connected_pair().await;
        let collector = Arc::new(Collector::default());
        let cancel = CancellationToken::new();
        let session =
            ConnectionSession::new(reader, writer, link.clone(), fast_config(), collector.clone());
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { session.run(&cancel).await })
        };

        let mut bytes = device_frame("!1PWR01");
        bytes.extend(device_frame("!1MVL2A"));
        peer.write_all(&bytes[..10]).await.unwrap();
        peer.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        peer.write_all(&bytes[10..]).await.unwrap();

        let commands = collector.wait_for(2).await;
        assert_eq!(commands[0].to_payload(), "!1PWR01");
        assert_eq!(commands[1].to_payload(), "!1MVL2A");
        assert_eq!(link.state(), SessionState::Connected);

        cancel.cancel();
        let exit = task.await.unwrap();
        assert!(matches!(exit, SessionExit::Cancelled));
        assert!(!exit.should_redial());
        assert_eq!(link.state(), SessionState::Disconnected);
        assert_eq!(link.statistics().frames_received, 2);
    }

    #[tokio::test]
    async fn test_send_writes_frame() {
        let (mut peer, reader, writer, link) = connected_pair().await;
        let cancel = CancellationToken::new();
        let session = ConnectionSession::new(
            reader,
            writer,
            link.clone(),
            fast_config(),
            Arc::new(Collector::default()),
        );
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { session.run(&cancel).await })
        };

        while !link.is_connected() {
            tokio::task::yield_now().await;
        }
        let code = PropertyCode::new("MVL").unwrap();
        assert!(link.send(&Command::assign(code, "20").unwrap()));

        let frame = read_frame(&mut peer).await;
        assert_eq!(frame.message(), "!1MVL20");
        assert_eq!(frame.header().version(), 1);

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(link.statistics().frames_sent, 1);

        let mut rest = Vec::new();
        assert_ok!(peer.read_to_end(&mut rest).await);
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_send_without_session_is_dropped() {
        let link = SessionLink::new(DeviceAddress::new("127.0.0.1", 1), ModelProfile::default());
        assert!(!link.send(&Command::power_query()));
        assert!(matches!(
            link.try_send(&Command::power_query()),
            Err(EiscpError::NotConnected)
        ));
        assert_eq!(link.statistics().frames_sent, 0);
    }

    #[tokio::test]
    async fn test_teardown_with_unread_peer() {
        let (peer, reader, writer, link) = connected_pair().await;
        let cancel = CancellationToken::new();
        let session = ConnectionSession::new(
            reader,
            writer,
            link.clone(),
            SessionConfig::default(),
            Arc::new(Collector::default()),
        );
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { session.run(&cancel).await })
        };
        while !link.is_connected() {
            tokio::task::yield_now().await;
        }

        let code = PropertyCode::new("NTC").unwrap();
        let bulk = Command::assign(code, &"A".repeat(60 * 1024)).unwrap();
        let mut full = false;
        for _ in 0..1000 {
            if matches!(link.try_send(&bulk), Err(EiscpError::Protocol(_))) {
                full = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(full);

        cancel.cancel();
        let exit = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(exit, SessionExit::Cancelled));
        assert_eq!(link.state(), SessionState::Disconnected);
        assert!(matches!(link.try_send(&bulk), Err(EiscpError::NotConnected)));
        drop(peer);
    }

    #[tokio::test]
    async fn test_silent_device_stalls() {
        let (mut peer, reader, writer, link) = connected_pair().await;
        let session = ConnectionSession::new(
            reader,
            writer,
            link.clone(),
            fast_config(),
            Arc::new(Collector::default()),
        );
        let task = tokio::spawn(async move { session.run(&CancellationToken::new()).await });

        let keepalive = read_frame(&mut peer).await;
        assert_eq!(keepalive.message(), "!1PWRQSTN");

        let exit = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(exit, SessionExit::Stalled));
        assert!(exit.should_redial());

        let stats = link.statistics();
        assert_eq!(stats.keepalive_probes, 1);
        assert_eq!(stats.stalls, 1);
        assert_eq!(link.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_answered_probe_keeps_session() {
        let (mut peer, reader, writer, link) = connected_pair().await;
        let cancel = CancellationToken::new();
        let session = ConnectionSession::new(
            reader,
            writer,
            link.clone(),
            fast_config(),
            Arc::new(Collector::default()),
        );
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { session.run(&cancel).await })
        };

        for _ in 0..3 {
            let keepalive = read_frame(&mut peer).await;
            assert_eq!(keepalive.message(), "!1PWRQSTN");
            peer.write_all(&device_frame("!1PWR01")).await.unwrap();
        }
        assert_eq!(link.state(), SessionState::Connected);

        cancel.cancel();
        assert!(matches!(task.await.unwrap(), SessionExit::Cancelled));
        assert_eq!(link.statistics().stalls, 0);
    }

    #[tokio::test]
    async fn test_peer_close_ends_session() {
        let (peer, reader, writer, link) = connected_pair().await;
        let session = ConnectionSession::new(
            reader,
            writer,
            link.clone(),
            fast_config(),
            Arc::new(Collector::default()),
        );
        drop(peer);
        let exit = session.run(&CancellationToken::new()).await;
        assert!(matches!(exit, SessionExit::Closed));
        assert_eq!(link.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_garbage_is_counted_and_skipped() {
        let (mut peer, reader, writer, link) = connected_pair().await;
        let collector = Arc::new(Collector::default());
        let cancel = CancellationToken::new();
        let session =
            ConnectionSession::new(reader, writer, link.clone(), fast_config(), collector.clone());
        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move { session.run(&cancel).await })
        };

        let mut bytes = device_frame("!1PWR01");
        let mut bad = bytes.clone();
        bad[16] = b'?';
        bytes.splice(0..0, bad);
        peer.write_all(&bytes).await.unwrap();

        let commands = collector.wait_for(1).await;
        assert_eq!(commands.len(), 1);
        assert_eq!(link.statistics().frames_rejected, 1);
        assert_eq!(link.statistics().reject_rate(), 50.0);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_dial_retries_until_listener_appears() {
        let port = {
            let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            reserved.local_addr().unwrap().port()
        };
        let settings = TcpSettings::with_timeout(
            DeviceAddress::new("127.0.0.1", port),
            Duration::from_millis(200),
        );
        let cancel = CancellationToken::new();
        let dialer = tokio::spawn(async move {
            dial(&settings, Duration::from_millis(50), &cancel).await.is_some()
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.is_ok() });

        assert!(dialer.await.unwrap());
        assert!(accept.await.unwrap());
    }

    #[tokio::test]
    async fn test_dial_cancelled() {
        let port = {
            let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            reserved.local_addr().unwrap().port()
        };
        let settings = TcpSettings::new(DeviceAddress::new("127.0.0.1", port));
        let cancel = CancellationToken::new();
        let dialer = {
            let cancel = cancel.clone();
            tokio::spawn(async move { dial(&settings, Duration::from_secs(1), &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_millis(500), dialer)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_none());
    }
}
