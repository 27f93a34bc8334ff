//! HTTP/2 frame codec (RFC 9113 section 4 and 6).

use crate::base::neterror::NetError;
use crate::http::h2fingerprint::{Priority, Setting, SettingId, StreamDependency};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

pub const FRAME_HEADER_LEN: usize = 9;
pub const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";
/// Largest SETTINGS_MAX_FRAME_SIZE a peer may advertise.
pub const MAX_FRAME_SIZE_LIMIT: u32 = (1 << 24) - 1;

pub mod kind {
    pub const DATA: u8 = 0x0;
    pub const HEADERS: u8 = 0x1;
    pub const PRIORITY: u8 = 0x2;
    pub const RST_STREAM: u8 = 0x3;
    pub const SETTINGS: u8 = 0x4;
    pub const PUSH_PROMISE: u8 = 0x5;
    pub const PING: u8 = 0x6;
    pub const GOAWAY: u8 = 0x7;
    pub const WINDOW_UPDATE: u8 = 0x8;
    pub const CONTINUATION: u8 = 0x9;
}

pub mod flags {
    pub const END_STREAM: u8 = 0x1;
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;
}

pub mod error_code {
    pub const NO_ERROR: u32 = 0x0;
    pub const PROTOCOL_ERROR: u32 = 0x1;
    pub const INTERNAL_ERROR: u32 = 0x2;
    pub const FLOW_CONTROL_ERROR: u32 = 0x3;
    pub const STREAM_CLOSED: u32 = 0x5;
    pub const FRAME_SIZE_ERROR: u32 = 0x6;
    pub const REFUSED_STREAM: u32 = 0x7;
    pub const CANCEL: u32 = 0x8;
    pub const COMPRESSION_ERROR: u32 = 0x9;
    pub const HTTP_1_1_REQUIRED: u32 = 0xd;
}

/// Map an RST_STREAM / GOAWAY code to the error surfaced to callers.
pub fn error_from_code(code: u32) -> NetError {
    match code {
        error_code::REFUSED_STREAM => NetError::Http2ServerRefusedStream,
        error_code::FLOW_CONTROL_ERROR => NetError::Http2FlowControlError,
        error_code::FRAME_SIZE_ERROR => NetError::Http2FrameSizeError,
        error_code::COMPRESSION_ERROR => NetError::Http2CompressionError,
        error_code::STREAM_CLOSED => NetError::Http2StreamClosed,
        error_code::HTTP_1_1_REQUIRED => NetError::Http11Required,
        error_code::CANCEL => NetError::Aborted,
        _ => NetError::Http2ProtocolError,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub kind: u8,
    pub flags: u8,
    pub stream_id: u32,
}

impl FrameHeader {
    pub fn parse(buf: &[u8; FRAME_HEADER_LEN]) -> Self {
        Self {
            length: u32::from_be_bytes([0, buf[0], buf[1], buf[2]]),
            kind: buf[3],
            flags: buf[4],
            stream_id: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]) & 0x7fff_ffff,
        }
    }

    fn encode(&self, dst: &mut BytesMut) {
        dst.put_uint(self.length as u64, 3);
        dst.put_u8(self.kind);
        dst.put_u8(self.flags);
        dst.put_u32(self.stream_id & 0x7fff_ffff);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data {
        stream_id: u32,
        payload: Bytes,
        end_stream: bool,
        /// Bytes counted against flow control, padding included.
        flow_len: u32,
    },
    Headers {
        stream_id: u32,
        block: Bytes,
        end_stream: bool,
        end_headers: bool,
        priority: Option<StreamDependency>,
    },
    Priority(Priority),
    RstStream {
        stream_id: u32,
        error_code: u32,
    },
    Settings {
        ack: bool,
        settings: Vec<Setting>,
    },
    PushPromise {
        stream_id: u32,
        promised_id: u32,
        block: Bytes,
        end_headers: bool,
    },
    Ping {
        ack: bool,
        payload: [u8; 8],
    },
    GoAway {
        last_stream_id: u32,
        error_code: u32,
        debug: Bytes,
    },
    WindowUpdate {
        stream_id: u32,
        increment: u32,
    },
    Continuation {
        stream_id: u32,
        block: Bytes,
        end_headers: bool,
    },
    Unknown {
        kind: u8,
        stream_id: u32,
    },
}

fn strip_padding(flags_byte: u8, payload: &mut Bytes) -> Result<(), NetError> {
    if flags_byte & flags::PADDED == 0 {
        return Ok(());
    }
    if payload.is_empty() {
        return Err(NetError::Http2ProtocolError);
    }
    let pad = payload.get_u8() as usize;
    if pad > payload.len() {
        return Err(NetError::Http2ProtocolError);
    }
    payload.truncate(payload.len() - pad);
    Ok(())
}

fn read_dependency(payload: &mut Bytes) -> StreamDependency {
    let raw = payload.get_u32();
    let weight = payload.get_u8() as u16 + 1;
    StreamDependency::new(raw & 0x7fff_ffff, weight, raw & 0x8000_0000 != 0)
}

fn write_dependency(dep: &StreamDependency, dst: &mut BytesMut) {
    let mut raw = dep.dependency_id & 0x7fff_ffff;
    if dep.exclusive {
        raw |= 0x8000_0000;
    }
    dst.put_u32(raw);
    dst.put_u8(dep.wire_weight());
}

impl Frame {
    pub fn stream_id(&self) -> u32 {
        match self {
            Frame::Data { stream_id, .. }
            | Frame::Headers { stream_id, .. }
            | Frame::RstStream { stream_id, .. }
            | Frame::PushPromise { stream_id, .. }
            | Frame::WindowUpdate { stream_id, .. }
            | Frame::Continuation { stream_id, .. }
            | Frame::Unknown { stream_id, .. } => *stream_id,
            Frame::Priority(p) => p.stream_id,
            Frame::Settings { .. } | Frame::Ping { .. } | Frame::GoAway { .. } => 0,
        }
    }

    /// Parse a frame body. `payload` is exactly `header.length` bytes.
    pub fn decode(header: FrameHeader, mut payload: Bytes) -> Result<Frame, NetError> {
        let sid = header.stream_id;
        let frame = match header.kind {
            kind::DATA => {
                if sid == 0 {
                    return Err(NetError::Http2ProtocolError);
                }
                let flow_len = payload.len() as u32;
                strip_padding(header.flags, &mut payload)?;
                Frame::Data {
                    stream_id: sid,
                    payload,
                    end_stream: header.flags & flags::END_STREAM != 0,
                    flow_len,
                }
            }
            kind::HEADERS => {
                if sid == 0 {
                    return Err(NetError::Http2ProtocolError);
                }
                strip_padding(header.flags, &mut payload)?;
                let priority = if header.flags & flags::PRIORITY != 0 {
                    if payload.len() < 5 {
                        return Err(NetError::Http2FrameSizeError);
                    }
                    Some(read_dependency(&mut payload))
                } else {
                    None
                };
                Frame::Headers {
                    stream_id: sid,
                    block: payload,
                    end_stream: header.flags & flags::END_STREAM != 0,
                    end_headers: header.flags & flags::END_HEADERS != 0,
                    priority,
                }
            }
            kind::PRIORITY => {
                if sid == 0 {
                    return Err(NetError::Http2ProtocolError);
                }
                if payload.len() != 5 {
                    return Err(NetError::Http2FrameSizeError);
                }
                Frame::Priority(Priority::new(sid, read_dependency(&mut payload)))
            }
            kind::RST_STREAM => {
                if sid == 0 {
                    return Err(NetError::Http2ProtocolError);
                }
                if payload.len() != 4 {
                    return Err(NetError::Http2FrameSizeError);
                }
                Frame::RstStream {
                    stream_id: sid,
                    error_code: payload.get_u32(),
                }
            }
            kind::SETTINGS => {
                if sid != 0 {
                    return Err(NetError::Http2ProtocolError);
                }
                let ack = header.flags & flags::ACK != 0;
                if payload.len() % 6 != 0 || (ack && !payload.is_empty()) {
                    return Err(NetError::Http2FrameSizeError);
                }
                let mut settings = Vec::with_capacity(payload.len() / 6);
                while payload.has_remaining() {
                    let id = SettingId::from_code(payload.get_u16());
                    settings.push(Setting::new(id, payload.get_u32()));
                }
                Frame::Settings { ack, settings }
            }
            kind::PUSH_PROMISE => {
                strip_padding(header.flags, &mut payload)?;
                if payload.len() < 4 {
                    return Err(NetError::Http2FrameSizeError);
                }
                Frame::PushPromise {
                    stream_id: sid,
                    promised_id: payload.get_u32() & 0x7fff_ffff,
                    block: payload,
                    end_headers: header.flags & flags::END_HEADERS != 0,
                }
            }
            kind::PING => {
                if sid != 0 {
                    return Err(NetError::Http2ProtocolError);
                }
                if payload.len() != 8 {
                    return Err(NetError::Http2FrameSizeError);
                }
                let mut data = [0u8; 8];
                payload.copy_to_slice(&mut data);
                Frame::Ping {
                    ack: header.flags & flags::ACK != 0,
                    payload: data,
                }
            }
            kind::GOAWAY => {
                if sid != 0 {
                    return Err(NetError::Http2ProtocolError);
                }
                if payload.len() < 8 {
                    return Err(NetError::Http2FrameSizeError);
                }
                Frame::GoAway {
                    last_stream_id: payload.get_u32() & 0x7fff_ffff,
                    error_code: payload.get_u32(),
                    debug: payload,
                }
            }
            kind::WINDOW_UPDATE => {
                if payload.len() != 4 {
                    return Err(NetError::Http2FrameSizeError);
                }
                Frame::WindowUpdate {
                    stream_id: sid,
                    increment: payload.get_u32() & 0x7fff_ffff,
                }
            }
            kind::CONTINUATION => {
                if sid == 0 {
                    return Err(NetError::Http2ProtocolError);
                }
                Frame::Continuation {
                    stream_id: sid,
                    block: payload,
                    end_headers: header.flags & flags::END_HEADERS != 0,
                }
            }
            other => Frame::Unknown {
                kind: other,
                stream_id: sid,
            },
        };
        Ok(frame)
    }

    /// Serialize, header included. Padding is never emitted.
    pub fn encode(&self, dst: &mut BytesMut) {
        let start = dst.len();
        // Placeholder header, patched once the payload length is known.
        dst.put_slice(&[0u8; FRAME_HEADER_LEN]);
        let (kind, flags_byte, stream_id) = match self {
            Frame::Data {
                stream_id,
                payload,
                end_stream,
                ..
            } => {
                dst.put_slice(payload);
                (kind::DATA, if *end_stream { flags::END_STREAM } else { 0 }, *stream_id)
            }
            Frame::Headers {
                stream_id,
                block,
                end_stream,
                end_headers,
                priority,
            } => {
                let mut f = 0;
                if let Some(dep) = priority {
                    write_dependency(dep, dst);
                    f |= flags::PRIORITY;
                }
                dst.put_slice(block);
                if *end_stream {
                    f |= flags::END_STREAM;
                }
                if *end_headers {
                    f |= flags::END_HEADERS;
                }
                (kind::HEADERS, f, *stream_id)
            }
            Frame::Priority(p) => {
                write_dependency(&p.dependency, dst);
                (kind::PRIORITY, 0, p.stream_id)
            }
            Frame::RstStream {
                stream_id,
                error_code,
            } => {
                dst.put_u32(*error_code);
                (kind::RST_STREAM, 0, *stream_id)
            }
            Frame::Settings { ack, settings } => {
                for s in settings {
                    dst.put_u16(s.id.code());
                    dst.put_u32(s.value);
                }
                (kind::SETTINGS, if *ack { flags::ACK } else { 0 }, 0)
            }
            Frame::PushPromise {
                stream_id,
                promised_id,
                block,
                end_headers,
            } => {
                dst.put_u32(*promised_id);
                dst.put_slice(block);
                (
                    kind::PUSH_PROMISE,
                    if *end_headers { flags::END_HEADERS } else { 0 },
                    *stream_id,
                )
            }
            Frame::Ping { ack, payload } => {
                dst.put_slice(payload);
                (kind::PING, if *ack { flags::ACK } else { 0 }, 0)
            }
            Frame::GoAway {
                last_stream_id,
                error_code,
                debug,
            } => {
                dst.put_u32(*last_stream_id);
                dst.put_u32(*error_code);
                dst.put_slice(debug);
                (kind::GOAWAY, 0, 0)
            }
            Frame::WindowUpdate {
                stream_id,
                increment,
            } => {
                dst.put_u32(*increment & 0x7fff_ffff);
                (kind::WINDOW_UPDATE, 0, *stream_id)
            }
            Frame::Continuation {
                stream_id,
                block,
                end_headers,
            } => {
                dst.put_slice(block);
                (
                    kind::CONTINUATION,
                    if *end_headers { flags::END_HEADERS } else { 0 },
                    *stream_id,
                )
            }
            Frame::Unknown { kind, stream_id } => (*kind, 0, *stream_id),
        };
        let header = FrameHeader {
            length: (dst.len() - start - FRAME_HEADER_LEN) as u32,
            kind,
            flags: flags_byte,
            stream_id,
        };
        let mut head = BytesMut::with_capacity(FRAME_HEADER_LEN);
        header.encode(&mut head);
        dst[start..start + FRAME_HEADER_LEN].copy_from_slice(&head);
    }
}

/// Split an encoded header block into HEADERS plus CONTINUATION frames no
/// larger than `max_frame_size`.
pub fn header_frames(
    stream_id: u32,
    block: Bytes,
    end_stream: bool,
    priority: Option<StreamDependency>,
    max_frame_size: usize,
) -> Vec<Frame> {
    let first_room = max_frame_size.saturating_sub(if priority.is_some() { 5 } else { 0 }).max(1);
    let mut rest = block;
    let first = rest.split_to(first_room.min(rest.len()));
    let mut frames = vec![Frame::Headers {
        stream_id,
        block: first,
        end_stream,
        end_headers: rest.is_empty(),
        priority,
    }];
    while !rest.is_empty() {
        let chunk = rest.split_to(max_frame_size.max(1).min(rest.len()));
        frames.push(Frame::Continuation {
            stream_id,
            block: chunk,
            end_headers: rest.is_empty(),
        });
    }
    frames
}

/// Read one frame. `Ok(None)` on a clean EOF between frames.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: u32) -> Result<Option<Frame>, NetError>
where
    R: AsyncRead + Unpin,
{
    let mut head = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut head).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(NetError::from(e)),
    }
    let header = FrameHeader::parse(&head);
    if header.length > max_frame_size {
        return Err(NetError::Http2FrameSizeError);
    }
    let mut payload = vec![0u8; header.length as usize];
    reader.read_exact(&mut payload).await?;
    Frame::decode(header, Bytes::from(payload)).map(Some)
}
