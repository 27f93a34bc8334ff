//! HTTP/2 client connection.
//!
//! One driver task owns the write half, the HPACK state and every stream's
//! flow-control window; a reader task feeds it parsed frames. Callers hold a
//! cloneable [`H2Connection`] and talk to the driver over a command channel,
//! so frames leave in submission order and no lock guards the socket.

use super::frame::{self, error_code, error_from_code, read_frame, Frame, PREFACE};
use super::hpack::{Decoder, Encoder};
use crate::base::neterror::NetError;
use crate::http::h2fingerprint::{
    H2Fingerprint, PseudoId, PseudoOrder, Setting, SettingId, StreamDependency,
    DEFAULT_HEADER_TABLE_SIZE, DEFAULT_MAX_FRAME_SIZE, DEFAULT_WINDOW_SIZE,
};
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::response::ResponseHead;
use bytes::{Bytes, BytesMut};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Hop-by-hop headers that are illegal in HTTP/2 (RFC 9113 8.2.2).
const CONNECTION_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "host",
];

const MAX_WINDOW: i64 = (1 << 31) - 1;
const MAX_HEADER_BLOCK: usize = 1 << 20;
const MAX_STREAM_ID: u32 = (1 << 31) - 1;

/// One request to open as a stream. `headers` are the merged request
/// headers in emission order; pseudo-headers are added from the fields.
#[derive(Debug, Clone)]
pub struct H2Request {
    pub method: http::Method,
    pub scheme: String,
    pub authority: String,
    pub path: String,
    pub headers: OrderedHeaderMap,
    pub body: Bytes,
}

#[derive(Debug)]
enum StreamEvent {
    Head(ResponseHead),
    Data(Bytes),
    End,
}

type EventTx = mpsc::UnboundedSender<Result<StreamEvent, NetError>>;

enum Command {
    Open {
        key: u64,
        request: H2Request,
        events: EventTx,
    },
    Release {
        key: u64,
        len: usize,
    },
    Cancel {
        key: u64,
    },
    Close,
}

#[derive(Debug)]
struct Shared {
    id: u64,
    closed: AtomicBool,
    going_away: AtomicBool,
    active: AtomicUsize,
    next_key: AtomicU64,
}

/// Handle to a multiplexed HTTP/2 connection. Clones share the connection;
/// it shuts down once every handle and stream is gone.
#[derive(Clone)]
pub struct H2Connection {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for H2Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("H2Connection")
            .field("id", &self.shared.id)
            .field("active", &self.shared.active.load(Ordering::Relaxed))
            .field("closed", &self.shared.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl H2Connection {
    /// Send the connection preface in the fingerprint's shape (SETTINGS,
    /// WINDOW_UPDATE, PRIORITY frames) and start the connection tasks.
    pub async fn handshake<S>(mut io: S, fingerprint: &H2Fingerprint, id: u64) -> Result<Self, NetError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut out = BytesMut::with_capacity(256);
        out.extend_from_slice(PREFACE);
        Frame::Settings {
            ack: false,
            settings: fingerprint.settings.clone(),
        }
        .encode(&mut out);
        if fingerprint.connection_window_increment > 0 {
            Frame::WindowUpdate {
                stream_id: 0,
                increment: fingerprint.connection_window_increment,
            }
            .encode(&mut out);
        }
        for priority in &fingerprint.priorities {
            Frame::Priority(*priority).encode(&mut out);
        }
        io.write_all(&out).await?;
        io.flush().await?;
        tracing::debug!(session = id, akamai = %fingerprint.akamai(), "HTTP/2 preface sent");

        let max_frame = fingerprint
            .setting(SettingId::MaxFrameSize)
            .unwrap_or(DEFAULT_MAX_FRAME_SIZE);
        let (reader, writer) = tokio::io::split(io);
        let (frame_tx, frame_rx) = mpsc::channel(64);
        tokio::spawn(read_loop(reader, max_frame, frame_tx));

        let shared = Arc::new(Shared {
            id,
            closed: AtomicBool::new(false),
            going_away: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            next_key: AtomicU64::new(0),
        });
        let (commands, command_rx) = mpsc::unbounded_channel();
        let driver = Driver::new(writer, fingerprint, Arc::clone(&shared), command_rx, frame_rx);
        tokio::spawn(driver.run());

        Ok(Self { shared, commands })
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Whether new streams may be opened.
    pub fn is_usable(&self) -> bool {
        !self.shared.closed.load(Ordering::Acquire)
            && !self.shared.going_away.load(Ordering::Acquire)
            && !self.commands.is_closed()
    }

    pub fn active_streams(&self) -> usize {
        self.shared.active.load(Ordering::Relaxed)
    }

    /// Send GOAWAY and tear the connection down. In-flight streams fail
    /// with `Aborted`.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        let _ = self.commands.send(Command::Close);
    }

    /// Queue a request. Streams beyond the peer's MAX_CONCURRENT_STREAMS
    /// wait in the driver until a slot frees.
    pub fn send_request(&self, request: H2Request) -> Result<H2Stream, NetError> {
        if self.shared.going_away.load(Ordering::Acquire) {
            return Err(NetError::Http2GoAway);
        }
        if !self.is_usable() {
            return Err(NetError::ConnectionClosed);
        }
        let key = self.shared.next_key.fetch_add(1, Ordering::Relaxed);
        let (events, rx) = mpsc::unbounded_channel();
        self.commands
            .send(Command::Open {
                key,
                request,
                events,
            })
            .map_err(|_| NetError::ConnectionClosed)?;
        Ok(H2Stream {
            key,
            events: rx,
            conn: self.clone(),
            finished: false,
        })
    }

    fn release(&self, key: u64, len: usize) {
        if len > 0 {
            let _ = self.commands.send(Command::Release { key, len });
        }
    }
}

/// The response side of one request stream.
///
/// Dropping it before the body ends resets the stream with CANCEL.
#[derive(Debug)]
pub struct H2Stream {
    key: u64,
    events: mpsc::UnboundedReceiver<Result<StreamEvent, NetError>>,
    conn: H2Connection,
    finished: bool,
}

impl H2Stream {
    /// Wait for the final (non-1xx) response HEADERS.
    pub async fn response_head(&mut self) -> Result<ResponseHead, NetError> {
        match self.events.recv().await {
            Some(Ok(StreamEvent::Head(head))) => Ok(head),
            Some(Ok(_)) => {
                self.finished = true;
                Err(NetError::Http2ProtocolError)
            }
            Some(Err(e)) => {
                self.finished = true;
                Err(e)
            }
            None => {
                self.finished = true;
                Err(NetError::ConnectionClosed)
            }
        }
    }

    /// Next body chunk, `None` after END_STREAM. Consumed bytes are
    /// returned to the peer's send window.
    pub async fn data(&mut self) -> Option<Result<Bytes, NetError>> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().await;
        match event {
            Some(Ok(StreamEvent::Data(chunk))) => {
                self.conn.release(self.key, chunk.len());
                Some(Ok(chunk))
            }
            Some(Ok(StreamEvent::End)) => {
                self.finished = true;
                None
            }
            Some(Ok(StreamEvent::Head(_))) => {
                self.finished = true;
                Some(Err(NetError::Http2ProtocolError))
            }
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e))
            }
            None => {
                self.finished = true;
                Some(Err(NetError::ConnectionClosed))
            }
        }
    }

    pub fn session_id(&self) -> u64 {
        self.conn.id()
    }
}

impl Drop for H2Stream {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut unreleased = 0;
        while let Ok(event) = self.events.try_recv() {
            if let Ok(StreamEvent::Data(chunk)) = event {
                unreleased += chunk.len();
            }
        }
        self.conn.release(self.key, unreleased);
        let _ = self.conn.commands.send(Command::Cancel { key: self.key });
    }
}

async fn read_loop<R>(mut reader: R, max_frame: u32, tx: mpsc::Sender<Result<Frame, NetError>>)
where
    R: AsyncRead + Unpin,
{
    loop {
        let item = match read_frame(&mut reader, max_frame).await {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => Err(NetError::ConnectionClosed),
            Err(e) => Err(e),
        };
        let stop = item.is_err();
        if tx.send(item).await.is_err() || stop {
            break;
        }
    }
}

struct Stream {
    key: u64,
    events: EventTx,
    send_window: i64,
    recv_window: i64,
    recv_unacked: u32,
    body: Bytes,
    end_sent: bool,
    head_received: bool,
    remote_closed: bool,
}

enum BlockKind {
    Headers { end_stream: bool },
    Push { promised_id: u32 },
}

struct PendingBlock {
    stream_id: u32,
    kind: BlockKind,
    buf: BytesMut,
}

struct Driver<W> {
    writer: W,
    out: BytesMut,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_closed: bool,
    frames: mpsc::Receiver<Result<Frame, NetError>>,
    encoder: Encoder,
    decoder: Decoder,
    pseudo_order: PseudoOrder,
    headers_priority: Option<StreamDependency>,
    push_enabled: bool,
    streams: HashMap<u32, Stream>,
    keys: HashMap<u64, u32>,
    queued: VecDeque<(u64, H2Request, EventTx)>,
    next_stream_id: u32,
    continuation: Option<PendingBlock>,
    conn_send_window: i64,
    conn_recv_window: i64,
    conn_recv_unacked: u32,
    conn_recv_target: u32,
    stream_recv_target: u32,
    peer_initial_window: u32,
    peer_max_frame: usize,
    peer_max_streams: u32,
}

impl<W> Driver<W>
where
    W: AsyncWrite + Unpin,
{
    fn new(
        writer: W,
        fingerprint: &H2Fingerprint,
        shared: Arc<Shared>,
        commands: mpsc::UnboundedReceiver<Command>,
        frames: mpsc::Receiver<Result<Frame, NetError>>,
    ) -> Self {
        // Streams named by PRIORITY frames are idle placeholders; requests
        // start above them.
        let next_stream_id = fingerprint
            .priorities
            .iter()
            .map(|p| p.stream_id)
            .max()
            .map_or(1, |id| (id + 2) | 1);
        Self {
            writer,
            out: BytesMut::with_capacity(16 * 1024),
            shared,
            commands,
            commands_closed: false,
            frames,
            encoder: Encoder::new(DEFAULT_HEADER_TABLE_SIZE as usize),
            decoder: Decoder::new(fingerprint.header_table_size() as usize),
            pseudo_order: fingerprint.pseudo_order,
            headers_priority: fingerprint.headers_priority,
            push_enabled: fingerprint.setting(SettingId::EnablePush) != Some(0),
            streams: HashMap::new(),
            keys: HashMap::new(),
            queued: VecDeque::new(),
            next_stream_id,
            continuation: None,
            conn_send_window: DEFAULT_WINDOW_SIZE as i64,
            conn_recv_window: fingerprint.connection_window() as i64,
            conn_recv_unacked: 0,
            conn_recv_target: fingerprint.connection_window(),
            stream_recv_target: fingerprint.initial_window_size(),
            peer_initial_window: DEFAULT_WINDOW_SIZE,
            peer_max_frame: DEFAULT_MAX_FRAME_SIZE as usize,
            peer_max_streams: u32::MAX,
        }
    }

    async fn run(mut self) {
        let id = self.shared.id;
        match self.drive().await {
            Ok(()) => tracing::debug!(session = id, "HTTP/2 connection finished"),
            Err(err) => {
                if let Some(code) = goaway_code(&err) {
                    self.goaway(code);
                    let _ = self.write_out().await;
                }
                tracing::debug!(session = id, error = %err, "HTTP/2 connection closed");
                self.fail_all(err);
            }
        }
        self.shared.closed.store(true, Ordering::Release);
        self.shared.active.store(0, Ordering::Relaxed);
        let _ = self.writer.shutdown().await;
    }

    async fn drive(&mut self) -> Result<(), NetError> {
        loop {
            if !self.shared.going_away.load(Ordering::Acquire) {
                self.open_queued();
            }
            self.flush_bodies();
            self.write_out().await?;

            if self.streams.is_empty() && self.queued.is_empty() {
                if self.commands_closed {
                    self.goaway(error_code::NO_ERROR);
                    self.write_out().await?;
                    return Ok(());
                }
                if self.shared.going_away.load(Ordering::Acquire) {
                    return Err(NetError::Http2GoAway);
                }
            }

            tokio::select! {
                command = self.commands.recv(), if !self.commands_closed => match command {
                    Some(Command::Close) => {
                        self.goaway(error_code::NO_ERROR);
                        self.write_out().await?;
                        return Err(NetError::Aborted);
                    }
                    Some(command) => self.on_command(command),
                    None => self.commands_closed = true,
                },
                frame = self.frames.recv() => match frame {
                    Some(Ok(frame)) => self.on_frame(frame)?,
                    Some(Err(e)) => return Err(e),
                    None => return Err(NetError::ConnectionClosed),
                },
            }
        }
    }

    async fn write_out(&mut self) -> Result<(), NetError> {
        if self.out.is_empty() {
            return Ok(());
        }
        self.writer.write_all(&self.out).await?;
        self.writer.flush().await?;
        self.out.clear();
        Ok(())
    }

    fn goaway(&mut self, code: u32) {
        let last_stream_id = 0;
        Frame::GoAway {
            last_stream_id,
            error_code: code,
            debug: Bytes::new(),
        }
        .encode(&mut self.out);
    }

    fn fail_all(&mut self, err: NetError) {
        for (_, stream) in self.streams.drain() {
            let _ = stream.events.send(Err(err.clone()));
        }
        for (_, _, events) in self.queued.drain(..) {
            let _ = events.send(Err(err.clone()));
        }
        self.keys.clear();
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Open {
                key,
                request,
                events,
            } => {
                if self.shared.going_away.load(Ordering::Acquire) {
                    let _ = events.send(Err(NetError::Http2GoAway));
                } else {
                    self.queued.push_back((key, request, events));
                }
            }
            Command::Release { key, len } => {
                let len = len as u32;
                self.release_conn(len);
                if let Some(&stream_id) = self.keys.get(&key) {
                    self.release_stream(stream_id, len);
                }
            }
            Command::Cancel { key } => {
                self.queued.retain(|(k, _, _)| *k != key);
                if let Some(stream_id) = self.keys.get(&key).copied() {
                    if self.remove_stream(stream_id).is_some() {
                        tracing::trace!(session = self.shared.id, stream_id, "stream cancelled");
                        Frame::RstStream {
                            stream_id,
                            error_code: error_code::CANCEL,
                        }
                        .encode(&mut self.out);
                    }
                }
            }
            Command::Close => {}
        }
    }

    fn open_queued(&mut self) {
        while (self.streams.len() as u64) < self.peer_max_streams as u64 {
            let Some((key, request, events)) = self.queued.pop_front() else {
                break;
            };
            if events.is_closed() {
                continue;
            }
            if self.next_stream_id > MAX_STREAM_ID {
                self.shared.going_away.store(true, Ordering::Release);
                let _ = events.send(Err(NetError::ConnectionClosed));
                continue;
            }
            self.open_stream(key, request, events);
        }
    }

    fn open_stream(&mut self, key: u64, request: H2Request, events: EventTx) {
        let stream_id = self.next_stream_id;
        self.next_stream_id += 2;

        let fields = request_fields(&request, self.pseudo_order);
        let mut block = BytesMut::new();
        self.encoder
            .encode(fields.iter().map(|(n, v)| (n.as_str(), v.as_str())), &mut block);
        let end_stream = request.body.is_empty();
        for frame in frame::header_frames(
            stream_id,
            block.freeze(),
            end_stream,
            self.headers_priority,
            self.peer_max_frame,
        ) {
            frame.encode(&mut self.out);
        }
        tracing::trace!(
            session = self.shared.id,
            stream_id,
            method = %request.method,
            path = %request.path,
            "HEADERS sent"
        );

        self.streams.insert(
            stream_id,
            Stream {
                key,
                events,
                send_window: self.peer_initial_window as i64,
                recv_window: self.stream_recv_target as i64,
                recv_unacked: 0,
                body: request.body,
                end_sent: end_stream,
                head_received: false,
                remote_closed: false,
            },
        );
        self.keys.insert(key, stream_id);
        self.shared.active.store(self.streams.len(), Ordering::Relaxed);
    }

    fn flush_bodies(&mut self) {
        let mut ids: Vec<u32> = self
            .streams
            .iter()
            .filter(|(_, s)| !s.end_sent)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        for stream_id in ids {
            let Some(stream) = self.streams.get_mut(&stream_id) else {
                continue;
            };
            while !stream.end_sent {
                let room = self
                    .conn_send_window
                    .min(stream.send_window)
                    .min(self.peer_max_frame as i64);
                if room <= 0 {
                    break;
                }
                let n = (room as usize).min(stream.body.len());
                let chunk = stream.body.split_to(n);
                let end_stream = stream.body.is_empty();
                stream.send_window -= n as i64;
                self.conn_send_window -= n as i64;
                stream.end_sent = end_stream;
                Frame::Data {
                    stream_id,
                    payload: chunk,
                    end_stream,
                    flow_len: n as u32,
                }
                .encode(&mut self.out);
            }
            let done = stream.end_sent && stream.remote_closed;
            if done {
                self.remove_stream(stream_id);
            }
        }
    }

    fn remove_stream(&mut self, stream_id: u32) -> Option<Stream> {
        let stream = self.streams.remove(&stream_id)?;
        self.keys.remove(&stream.key);
        self.shared.active.store(self.streams.len(), Ordering::Relaxed);
        Some(stream)
    }

    fn reset_stream(&mut self, stream_id: u32, code: u32, err: NetError) {
        if let Some(stream) = self.remove_stream(stream_id) {
            Frame::RstStream {
                stream_id,
                error_code: code,
            }
            .encode(&mut self.out);
            let _ = stream.events.send(Err(err));
        }
    }

    fn release_conn(&mut self, len: u32) {
        self.conn_recv_unacked = self.conn_recv_unacked.saturating_add(len);
        if self.conn_recv_unacked >= self.conn_recv_target / 2 {
            Frame::WindowUpdate {
                stream_id: 0,
                increment: self.conn_recv_unacked,
            }
            .encode(&mut self.out);
            self.conn_recv_window += self.conn_recv_unacked as i64;
            self.conn_recv_unacked = 0;
        }
    }

    fn release_stream(&mut self, stream_id: u32, len: u32) {
        let target = self.stream_recv_target;
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return;
        };
        if stream.remote_closed {
            return;
        }
        stream.recv_unacked = stream.recv_unacked.saturating_add(len);
        if stream.recv_unacked >= target / 2 {
            Frame::WindowUpdate {
                stream_id,
                increment: stream.recv_unacked,
            }
            .encode(&mut self.out);
            stream.recv_window += stream.recv_unacked as i64;
            stream.recv_unacked = 0;
        }
    }

    fn on_frame(&mut self, frame: Frame) -> Result<(), NetError> {
        if let Some(pending) = &self.continuation {
            let continues = matches!(
                &frame,
                Frame::Continuation { stream_id, .. } if *stream_id == pending.stream_id
            );
            if !continues {
                return Err(NetError::Http2ProtocolError);
            }
        }

        match frame {
            Frame::Settings { ack: true, .. } => {
                tracing::trace!(session = self.shared.id, "SETTINGS acknowledged");
            }
            Frame::Settings {
                ack: false,
                settings,
            } => {
                self.apply_settings(&settings)?;
                Frame::Settings {
                    ack: true,
                    settings: Vec::new(),
                }
                .encode(&mut self.out);
            }
            Frame::Ping { ack: false, payload } => {
                Frame::Ping { ack: true, payload }.encode(&mut self.out);
            }
            Frame::Ping { ack: true, .. } => {}
            Frame::WindowUpdate {
                stream_id: 0,
                increment,
            } => {
                if increment == 0 {
                    return Err(NetError::Http2ProtocolError);
                }
                self.conn_send_window += increment as i64;
                if self.conn_send_window > MAX_WINDOW {
                    return Err(NetError::Http2FlowControlError);
                }
            }
            Frame::WindowUpdate {
                stream_id,
                increment,
            } => {
                let window = self.streams.get_mut(&stream_id).map(|stream| {
                    stream.send_window += increment as i64;
                    stream.send_window
                });
                match window {
                    Some(_) if increment == 0 => {
                        self.reset_stream(stream_id, error_code::PROTOCOL_ERROR, NetError::Http2ProtocolError);
                    }
                    Some(window) if window > MAX_WINDOW => {
                        self.reset_stream(
                            stream_id,
                            error_code::FLOW_CONTROL_ERROR,
                            NetError::Http2FlowControlError,
                        );
                    }
                    _ => {}
                }
            }
            Frame::Headers {
                stream_id,
                block,
                end_stream,
                end_headers,
                ..
            } => {
                self.begin_block(stream_id, BlockKind::Headers { end_stream }, block, end_headers)?;
            }
            Frame::PushPromise {
                stream_id,
                promised_id,
                block,
                end_headers,
            } => {
                if !self.push_enabled {
                    return Err(NetError::Http2ProtocolError);
                }
                self.begin_block(stream_id, BlockKind::Push { promised_id }, block, end_headers)?;
            }
            Frame::Continuation {
                block, end_headers, ..
            } => {
                let Some(mut pending) = self.continuation.take() else {
                    return Err(NetError::Http2ProtocolError);
                };
                pending.buf.extend_from_slice(&block);
                if pending.buf.len() > MAX_HEADER_BLOCK {
                    return Err(NetError::ResponseHeadersTooBig);
                }
                if end_headers {
                    self.finish_block(pending)?;
                } else {
                    self.continuation = Some(pending);
                }
            }
            Frame::Data {
                stream_id,
                payload,
                end_stream,
                flow_len,
            } => self.on_data(stream_id, payload, end_stream, flow_len)?,
            Frame::RstStream {
                stream_id,
                error_code,
            } => {
                if let Some(stream) = self.remove_stream(stream_id) {
                    tracing::debug!(session = self.shared.id, stream_id, error_code, "RST_STREAM received");
                    let _ = stream.events.send(Err(error_from_code(error_code)));
                }
            }
            Frame::GoAway {
                last_stream_id,
                error_code,
                debug,
            } => self.on_goaway(last_stream_id, error_code, &debug),
            Frame::Priority(_) | Frame::Unknown { .. } => {}
        }
        Ok(())
    }

    fn apply_settings(&mut self, settings: &[Setting]) -> Result<(), NetError> {
        tracing::debug!(session = self.shared.id, ?settings, "peer SETTINGS");
        for setting in settings {
            match setting.id {
                SettingId::HeaderTableSize => self
                    .encoder
                    .set_max_table_size((setting.value.min(DEFAULT_HEADER_TABLE_SIZE)) as usize),
                SettingId::EnablePush if setting.value > 1 => {
                    return Err(NetError::Http2ProtocolError);
                }
                SettingId::MaxConcurrentStreams => self.peer_max_streams = setting.value,
                SettingId::InitialWindowSize => {
                    if setting.value as i64 > MAX_WINDOW {
                        return Err(NetError::Http2FlowControlError);
                    }
                    let delta = setting.value as i64 - self.peer_initial_window as i64;
                    for stream in self.streams.values_mut() {
                        stream.send_window += delta;
                    }
                    self.peer_initial_window = setting.value;
                }
                SettingId::MaxFrameSize => {
                    if !(DEFAULT_MAX_FRAME_SIZE..=frame::MAX_FRAME_SIZE_LIMIT).contains(&setting.value) {
                        return Err(NetError::Http2ProtocolError);
                    }
                    self.peer_max_frame = setting.value as usize;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn begin_block(
        &mut self,
        stream_id: u32,
        kind: BlockKind,
        block: Bytes,
        end_headers: bool,
    ) -> Result<(), NetError> {
        let pending = PendingBlock {
            stream_id,
            kind,
            buf: BytesMut::from(&block[..]),
        };
        if end_headers {
            self.finish_block(pending)
        } else {
            self.continuation = Some(pending);
            Ok(())
        }
    }

    fn finish_block(&mut self, pending: PendingBlock) -> Result<(), NetError> {
        // Decoded even for cancelled streams to keep HPACK state in sync.
        let fields = self.decoder.decode(&pending.buf)?;
        match pending.kind {
            BlockKind::Push { promised_id } => {
                Frame::RstStream {
                    stream_id: promised_id,
                    error_code: error_code::REFUSED_STREAM,
                }
                .encode(&mut self.out);
                Ok(())
            }
            BlockKind::Headers { end_stream } => {
                self.on_headers(pending.stream_id, fields, end_stream);
                Ok(())
            }
        }
    }

    fn on_headers(&mut self, stream_id: u32, fields: Vec<(String, String)>, end_stream: bool) {
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return;
        };
        if !stream.head_received {
            match parse_head(fields) {
                Ok(head) if head.status < 200 && head.status != 101 => {
                    if end_stream {
                        self.reset_stream(stream_id, error_code::PROTOCOL_ERROR, NetError::Http2ProtocolError);
                    }
                    return;
                }
                Ok(head) => {
                    tracing::trace!(session = self.shared.id, stream_id, status = head.status, "response HEADERS");
                    stream.head_received = true;
                    let _ = stream.events.send(Ok(StreamEvent::Head(head)));
                }
                Err(err) => {
                    self.reset_stream(stream_id, error_code::PROTOCOL_ERROR, err);
                    return;
                }
            }
        } else if !end_stream {
            // A second HEADERS block is only valid as trailers.
            self.reset_stream(stream_id, error_code::PROTOCOL_ERROR, NetError::Http2ProtocolError);
            return;
        }
        if end_stream {
            self.end_remote(stream_id);
        }
    }

    fn end_remote(&mut self, stream_id: u32) {
        let Some(stream) = self.streams.get_mut(&stream_id) else {
            return;
        };
        stream.remote_closed = true;
        let _ = stream.events.send(Ok(StreamEvent::End));
        if !stream.end_sent {
            // Response completed before the request body; stop sending it.
            Frame::RstStream {
                stream_id,
                error_code: error_code::NO_ERROR,
            }
            .encode(&mut self.out);
        }
        self.remove_stream(stream_id);
    }

    fn on_data(
        &mut self,
        stream_id: u32,
        payload: Bytes,
        end_stream: bool,
        flow_len: u32,
    ) -> Result<(), NetError> {
        self.conn_recv_window -= flow_len as i64;
        if self.conn_recv_window < 0 {
            return Err(NetError::Http2FlowControlError);
        }
        let padding = flow_len - payload.len() as u32;

        let Some(stream) = self.streams.get_mut(&stream_id) else {
            if stream_id >= self.next_stream_id {
                return Err(NetError::Http2ProtocolError);
            }
            // Late data for a stream we already dropped.
            self.release_conn(flow_len);
            return Ok(());
        };
        if !stream.head_received || stream.remote_closed {
            self.reset_stream(stream_id, error_code::PROTOCOL_ERROR, NetError::Http2ProtocolError);
            self.release_conn(flow_len);
            return Ok(());
        }
        stream.recv_window -= flow_len as i64;
        if stream.recv_window < 0 {
            self.reset_stream(stream_id, error_code::FLOW_CONTROL_ERROR, NetError::Http2FlowControlError);
            self.release_conn(flow_len);
            return Ok(());
        }
        if !payload.is_empty() {
            let len = payload.len() as u32;
            // The reader is gone and its Cancel is still queued; nobody else
            // will hand these bytes back to the connection window.
            if stream.events.send(Ok(StreamEvent::Data(payload))).is_err() {
                self.release_conn(len);
            }
        }
        if padding > 0 {
            self.release_conn(padding);
            self.release_stream(stream_id, padding);
        }
        if end_stream {
            self.end_remote(stream_id);
        }
        Ok(())
    }

    fn on_goaway(&mut self, last_stream_id: u32, code: u32, debug_data: &[u8]) {
        self.shared.going_away.store(true, Ordering::Release);
        if code == error_code::NO_ERROR {
            tracing::debug!(session = self.shared.id, last_stream_id, "GOAWAY received");
        } else {
            tracing::warn!(
                session = self.shared.id,
                last_stream_id,
                error_code = code,
                debug = %String::from_utf8_lossy(debug_data),
                "GOAWAY received"
            );
        }
        let doomed: Vec<u32> = self
            .streams
            .keys()
            .copied()
            .filter(|id| *id > last_stream_id)
            .collect();
        for stream_id in doomed {
            if let Some(stream) = self.remove_stream(stream_id) {
                let _ = stream.events.send(Err(NetError::Http2GoAway));
            }
        }
        for (_, _, events) in self.queued.drain(..) {
            let _ = events.send(Err(NetError::Http2GoAway));
        }
    }
}

fn goaway_code(err: &NetError) -> Option<u32> {
    match err {
        NetError::Http2ProtocolError | NetError::ResponseHeadersTooBig => Some(error_code::PROTOCOL_ERROR),
        NetError::Http2FlowControlError => Some(error_code::FLOW_CONTROL_ERROR),
        NetError::Http2FrameSizeError => Some(error_code::FRAME_SIZE_ERROR),
        NetError::Http2CompressionError => Some(error_code::COMPRESSION_ERROR),
        _ => None,
    }
}

/// Pseudo-headers in fingerprint order, then the merged headers lower-cased
/// with hop-by-hop fields removed.
fn request_fields(request: &H2Request, order: PseudoOrder) -> Vec<(String, String)> {
    let mut fields = Vec::with_capacity(request.headers.len() + 4);
    for pseudo in order.iter() {
        let value = match pseudo {
            PseudoId::Method => request.method.as_str().to_string(),
            PseudoId::Authority => request.authority.clone(),
            PseudoId::Scheme => request.scheme.clone(),
            PseudoId::Path => request.path.clone(),
        };
        fields.push((pseudo.name().to_string(), value));
    }
    for (name, value) in request.headers.iter() {
        let name = name.to_ascii_lowercase();
        if CONNECTION_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if name == "te" && !value.eq_ignore_ascii_case("trailers") {
            continue;
        }
        fields.push((name, value.to_string()));
    }
    fields
}

fn parse_head(fields: Vec<(String, String)>) -> Result<ResponseHead, NetError> {
    let mut status = None;
    let mut headers = OrderedHeaderMap::with_capacity(fields.len());
    for (name, value) in fields {
        if let Some(pseudo) = name.strip_prefix(':') {
            if pseudo != "status" || status.is_some() || !headers.is_empty() {
                return Err(NetError::Http2ProtocolError);
            }
            status = Some(value.parse::<u16>().map_err(|_| NetError::Http2ProtocolError)?);
        } else {
            headers.push_raw(name, value);
        }
    }
    let status = status.ok_or(NetError::Http2ProtocolError)?;
    if !(100..=999).contains(&status) {
        return Err(NetError::Http2ProtocolError);
    }
    Ok(ResponseHead {
        status,
        version: http::Version::HTTP_2,
        headers,
    })
}
