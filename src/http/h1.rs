//! HTTP/1.1 request writer and response parser.
//!
//! Headers go out exactly as merged, in order and casing. Responses keep
//! duplicates and the server's casing.

use crate::base::neterror::NetError;
use crate::http::orderedheaders::{title_case, OrderedHeaderMap};
use crate::http::response::ResponseHead;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const MAX_HEAD_SIZE: usize = 256 * 1024;
const MAX_LINE: usize = 64 * 1024;
const READ_CHUNK: usize = 16 * 1024;

/// Serialize the request line, headers and body.
pub fn encode_request(
    method: &http::Method,
    target: &str,
    headers: &OrderedHeaderMap,
    title_case_headers: bool,
    body: &[u8],
    dst: &mut BytesMut,
) {
    dst.reserve(256 + body.len());
    dst.put_slice(method.as_str().as_bytes());
    dst.put_u8(b' ');
    dst.put_slice(target.as_bytes());
    dst.put_slice(b" HTTP/1.1\r\n");
    for (name, value) in headers.iter() {
        if title_case_headers {
            dst.put_slice(title_case(name).as_bytes());
        } else {
            dst.put_slice(name.as_bytes());
        }
        dst.put_slice(b": ");
        dst.put_slice(value.as_bytes());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(b"\r\n");
    dst.put_slice(body);
}

async fn read_line<R>(reader: &mut R, line: &mut Vec<u8>) -> Result<usize, NetError>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(line.len());
        }
        let (used, done) = match available.iter().position(|b| *b == b'\n') {
            Some(i) => {
                line.extend_from_slice(&available[..=i]);
                (i + 1, true)
            }
            None => {
                line.extend_from_slice(available);
                (available.len(), false)
            }
        };
        reader.consume(used);
        if line.len() > MAX_LINE {
            return Err(NetError::ResponseHeadersTooBig);
        }
        if done {
            return Ok(line.len());
        }
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn parse_status_line(line: &[u8]) -> Result<(http::Version, u16), NetError> {
    let line = std::str::from_utf8(line).map_err(|_| NetError::InvalidHttpResponse)?;
    let mut parts = line.splitn(3, ' ');
    let version = match parts.next() {
        Some("HTTP/1.1") => http::Version::HTTP_11,
        Some("HTTP/1.0") => http::Version::HTTP_10,
        _ => return Err(NetError::InvalidHttpResponse),
    };
    let code = parts.next().ok_or(NetError::InvalidHttpResponse)?;
    if code.len() != 3 {
        return Err(NetError::InvalidHttpResponse);
    }
    let status = code.parse::<u16>().map_err(|_| NetError::InvalidHttpResponse)?;
    if status < 100 {
        return Err(NetError::InvalidHttpResponse);
    }
    Ok((version, status))
}

/// Read one response head, skipping interim 1xx responses other than 101.
pub async fn read_head<R>(reader: &mut R) -> Result<ResponseHead, NetError>
where
    R: AsyncBufRead + Unpin,
{
    let mut first = true;
    loop {
        let head = read_one_head(reader, first).await?;
        first = false;
        if head.status >= 200 || head.status == 101 {
            return Ok(head);
        }
        tracing::trace!(status = head.status, "skipping interim response");
    }
}

async fn read_one_head<R>(reader: &mut R, first: bool) -> Result<ResponseHead, NetError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::with_capacity(128);
    if read_line(reader, &mut line).await? == 0 {
        return Err(if first {
            NetError::EmptyResponse
        } else {
            NetError::ConnectionClosed
        });
    }
    let (version, status) = parse_status_line(trim_eol(&line))?;

    let mut headers = OrderedHeaderMap::new();
    let mut total = line.len();
    loop {
        let n = read_line(reader, &mut line).await?;
        if n == 0 {
            return Err(NetError::ConnectionClosed);
        }
        total += n;
        if total > MAX_HEAD_SIZE {
            return Err(NetError::ResponseHeadersTooBig);
        }
        let field = trim_eol(&line);
        if field.is_empty() {
            break;
        }
        let field = String::from_utf8_lossy(field);
        if field.starts_with([' ', '\t']) {
            // obs-fold continuation of the previous field.
            match headers.last_value_mut() {
                Some(value) => {
                    value.push(' ');
                    value.push_str(field.trim());
                }
                None => return Err(NetError::InvalidHttpResponse),
            }
            continue;
        }
        let (name, value) = field.split_once(':').ok_or(NetError::InvalidHttpResponse)?;
        if name.is_empty() || name.ends_with([' ', '\t']) {
            return Err(NetError::InvalidHttpResponse);
        }
        headers.push_raw(name.to_string(), value.trim().to_string());
    }

    Ok(ResponseHead {
        status,
        version,
        headers,
    })
}

/// How the response body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Empty,
    Length(u64),
    Chunked,
    CloseDelimited,
}

impl BodyKind {
    pub fn for_response(method: &http::Method, head: &ResponseHead) -> Result<Self, NetError> {
        if *method == http::Method::HEAD
            || head.status == 204
            || head.status == 304
            || (100..200).contains(&head.status)
        {
            return Ok(BodyKind::Empty);
        }
        if let Some(te) = head.headers.get("transfer-encoding") {
            let last = te.rsplit(',').next().unwrap_or("").trim();
            return Ok(if last.eq_ignore_ascii_case("chunked") {
                BodyKind::Chunked
            } else {
                BodyKind::CloseDelimited
            });
        }
        let mut length = None;
        for value in head.headers.get_all("content-length") {
            for part in value.split(',') {
                let n = part
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| NetError::InvalidHttpResponse)?;
                if length.is_some_and(|prev| prev != n) {
                    return Err(NetError::InvalidHttpResponse);
                }
                length = Some(n);
            }
        }
        Ok(match length {
            Some(0) => BodyKind::Empty,
            Some(n) => BodyKind::Length(n),
            None => BodyKind::CloseDelimited,
        })
    }
}

/// Whether the connection may carry another request after this response.
pub fn is_keep_alive(head: &ResponseHead, kind: BodyKind) -> bool {
    if kind == BodyKind::CloseDelimited || head.status == 101 {
        return false;
    }
    let tokens = head
        .headers
        .get_all("connection")
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .collect::<Vec<_>>();
    if tokens.iter().any(|t| t == "close") {
        return false;
    }
    head.version == http::Version::HTTP_11 || tokens.iter().any(|t| t == "keep-alive")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    Size,
    Data(u64),
    DataEnd,
    Done,
}

/// Incremental body decoder over the connection's buffered reader.
#[derive(Debug)]
pub struct BodyReader {
    kind: BodyKind,
    remaining: u64,
    chunk: ChunkState,
    done: bool,
}

impl BodyReader {
    pub fn new(kind: BodyKind) -> Self {
        let remaining = match kind {
            BodyKind::Length(n) => n,
            _ => 0,
        };
        Self {
            kind,
            remaining,
            chunk: ChunkState::Size,
            done: kind == BodyKind::Empty,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Next chunk of body bytes, `None` once the body is complete.
    pub async fn next_chunk<R>(&mut self, reader: &mut R) -> Result<Option<Bytes>, NetError>
    where
        R: AsyncBufRead + Unpin,
    {
        if self.done {
            return Ok(None);
        }
        match self.kind {
            BodyKind::Empty => {
                self.done = true;
                Ok(None)
            }
            BodyKind::Length(_) => {
                let chunk = read_some(reader, self.remaining.min(READ_CHUNK as u64) as usize).await?;
                if chunk.is_empty() {
                    return Err(NetError::ContentLengthMismatch);
                }
                self.remaining -= chunk.len() as u64;
                if self.remaining == 0 {
                    self.done = true;
                }
                Ok(Some(chunk))
            }
            BodyKind::CloseDelimited => {
                let chunk = read_some(reader, READ_CHUNK).await?;
                if chunk.is_empty() {
                    self.done = true;
                    return Ok(None);
                }
                Ok(Some(chunk))
            }
            BodyKind::Chunked => self.next_chunked(reader).await,
        }
    }

    async fn next_chunked<R>(&mut self, reader: &mut R) -> Result<Option<Bytes>, NetError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = Vec::new();
        loop {
            match self.chunk {
                ChunkState::Size => {
                    if read_line(reader, &mut line).await? == 0 {
                        return Err(NetError::IncompleteChunkedEncoding);
                    }
                    let text = std::str::from_utf8(trim_eol(&line))
                        .map_err(|_| NetError::InvalidChunkedEncoding)?;
                    let size = text.split(';').next().unwrap_or("").trim();
                    let size = u64::from_str_radix(size, 16).map_err(|_| NetError::InvalidChunkedEncoding)?;
                    if size == 0 {
                        // Trailer section, discarded.
                        loop {
                            if read_line(reader, &mut line).await? == 0 {
                                return Err(NetError::IncompleteChunkedEncoding);
                            }
                            if trim_eol(&line).is_empty() {
                                break;
                            }
                        }
                        self.chunk = ChunkState::Done;
                    } else {
                        self.chunk = ChunkState::Data(size);
                    }
                }
                ChunkState::Data(left) => {
                    let chunk = read_some(reader, left.min(READ_CHUNK as u64) as usize).await?;
                    if chunk.is_empty() {
                        return Err(NetError::IncompleteChunkedEncoding);
                    }
                    let left = left - chunk.len() as u64;
                    self.chunk = if left == 0 {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data(left)
                    };
                    return Ok(Some(chunk));
                }
                ChunkState::DataEnd => {
                    if read_line(reader, &mut line).await? == 0 {
                        return Err(NetError::IncompleteChunkedEncoding);
                    }
                    if !trim_eol(&line).is_empty() {
                        return Err(NetError::InvalidChunkedEncoding);
                    }
                    self.chunk = ChunkState::Size;
                }
                ChunkState::Done => {
                    self.done = true;
                    return Ok(None);
                }
            }
        }
    }
}

async fn read_some<R>(reader: &mut R, max: usize) -> Result<Bytes, NetError>
where
    R: AsyncBufRead + Unpin,
{
    let available = reader.fill_buf().await?;
    let n = available.len().min(max);
    let chunk = Bytes::copy_from_slice(&available[..n]);
    reader.consume(n);
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_body(kind: BodyKind, mut input: &[u8]) -> Result<Vec<u8>, NetError> {
        let mut reader = BodyReader::new(kind);
        let mut body = Vec::new();
        while let Some(chunk) = reader.next_chunk(&mut input).await? {
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    #[test]
    fn test_request_encoding_keeps_order_and_casing() {
        let mut headers = OrderedHeaderMap::new();
        headers.push_raw("Host".into(), "example.com".into());
        headers.push_raw("sec-ch-ua".into(), "\"x\"".into());
        headers.push_raw("User-Agent".into(), "ua".into());
        let mut buf = BytesMut::new();
        encode_request(&http::Method::GET, "/a?b=1", &headers, false, b"", &mut buf);
        assert_eq!(
            &buf[..],
            b"GET /a?b=1 HTTP/1.1\r\nHost: example.com\r\nsec-ch-ua: \"x\"\r\nUser-Agent: ua\r\n\r\n"
        );

        let mut buf = BytesMut::new();
        encode_request(&http::Method::POST, "/", &headers, true, b"hi", &mut buf);
        assert!(buf.starts_with(b"POST / HTTP/1.1\r\nHost: example.com\r\nSec-Ch-Ua: "));
        assert!(buf.ends_with(b"\r\n\r\nhi"));
    }

    #[tokio::test]
    async fn test_head_keeps_duplicates_and_casing() {
        let mut input: &[u8] = b"HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nX-Custom-Header: v\r\nset-cookie: b=2\r\n\r\nrest";
        let head = read_head(&mut input).await.unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(head.version, http::Version::HTTP_11);
        let all: Vec<(&str, &str)> = head.headers.iter().collect();
        assert_eq!(
            all,
            [("Set-Cookie", "a=1"), ("X-Custom-Header", "v"), ("set-cookie", "b=2")]
        );
        assert_eq!(head.headers.get_all("SET-COOKIE").count(), 2);
        assert_eq!(input, b"rest");
    }

    #[tokio::test]
    async fn test_interim_responses_are_skipped() {
        let mut input: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n";
        assert_eq!(read_head(&mut input).await.unwrap().status, 201);
    }

    #[tokio::test]
    async fn test_malformed_heads() {
        let mut empty: &[u8] = b"";
        assert_eq!(read_head(&mut empty).await.unwrap_err(), NetError::EmptyResponse);
        let mut garbage: &[u8] = b"SSH-2.0-OpenSSH\r\n\r\n";
        assert_eq!(read_head(&mut garbage).await.unwrap_err(), NetError::InvalidHttpResponse);
        let mut no_colon: &[u8] = b"HTTP/1.1 200 OK\r\nbroken\r\n\r\n";
        assert_eq!(read_head(&mut no_colon).await.unwrap_err(), NetError::InvalidHttpResponse);
        let mut truncated: &[u8] = b"HTTP/1.1 200 OK\r\nA: b\r\n";
        assert_eq!(read_head(&mut truncated).await.unwrap_err(), NetError::ConnectionClosed);
    }

    #[tokio::test]
    async fn test_chunked_body() {
        let body = read_body(
            BodyKind::Chunked,
            b"5;ext=1\r\nhello\r\n7\r\n, world\r\n0\r\nTrailer: x\r\n\r\n",
        )
        .await
        .unwrap();
        assert_eq!(body, b"hello, world");

        assert_eq!(
            read_body(BodyKind::Chunked, b"zz\r\n").await.unwrap_err(),
            NetError::InvalidChunkedEncoding
        );
        assert_eq!(
            read_body(BodyKind::Chunked, b"5\r\nhel").await.unwrap_err(),
            NetError::IncompleteChunkedEncoding
        );
    }

    #[tokio::test]
    async fn test_length_and_close_delimited() {
        assert_eq!(read_body(BodyKind::Length(3), b"abcdef").await.unwrap(), b"abc");
        assert_eq!(
            read_body(BodyKind::Length(10), b"abc").await.unwrap_err(),
            NetError::ContentLengthMismatch
        );
        assert_eq!(read_body(BodyKind::CloseDelimited, b"until eof").await.unwrap(), b"until eof");
    }

    #[tokio::test]
    async fn test_body_kind_selection() {
        let mut input: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nContent-Length: 5\r\n\r\n";
        let head = read_head(&mut input).await.unwrap();
        assert_eq!(BodyKind::for_response(&http::Method::GET, &head).unwrap(), BodyKind::Length(5));
        assert_eq!(BodyKind::for_response(&http::Method::HEAD, &head).unwrap(), BodyKind::Empty);
        assert!(is_keep_alive(&head, BodyKind::Length(5)));

        let mut input: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nContent-Length: 6\r\n\r\n";
        let head = read_head(&mut input).await.unwrap();
        assert!(BodyKind::for_response(&http::Method::GET, &head).is_err());

        let mut input: &[u8] = b"HTTP/1.0 200 OK\r\nTransfer-Encoding: gzip, chunked\r\n\r\n";
        let head = read_head(&mut input).await.unwrap();
        let kind = BodyKind::for_response(&http::Method::GET, &head).unwrap();
        assert_eq!(kind, BodyKind::Chunked);
        assert!(!is_keep_alive(&head, kind));

        let mut input: &[u8] = b"HTTP/1.1 304 Not Modified\r\nConnection: close\r\n\r\n";
        let head = read_head(&mut input).await.unwrap();
        let kind = BodyKind::for_response(&http::Method::GET, &head).unwrap();
        assert_eq!(kind, BodyKind::Empty);
        assert!(!is_keep_alive(&head, kind));
    }
}
