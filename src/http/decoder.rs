//! Content-Encoding and charset decoding for materialized bodies.

use crate::base::neterror::NetError;
use async_compression::tokio::bufread::{BrotliDecoder, GzipDecoder, ZlibDecoder, ZstdDecoder};
use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Undo the codings listed in `Content-Encoding`, last applied first.
///
/// Unknown codings are passed through untouched.
pub async fn decompress(content_encoding: Option<&str>, body: Bytes) -> Result<Bytes, NetError> {
    let Some(header) = content_encoding else {
        return Ok(body);
    };
    if body.is_empty() {
        return Ok(body);
    }

    let mut body = body;
    for coding in header.rsplit(',').map(str::trim) {
        body = match coding.to_ascii_lowercase().as_str() {
            "" | "identity" => body,
            "gzip" | "x-gzip" => drain(GzipDecoder::new(&body[..])).await?,
            "deflate" => drain(ZlibDecoder::new(&body[..])).await?,
            "br" => drain(BrotliDecoder::new(&body[..])).await?,
            "zstd" => drain(ZstdDecoder::new(&body[..])).await?,
            other => {
                tracing::debug!(coding = other, "unsupported content-encoding, passing through");
                return Ok(body);
            }
        };
    }
    Ok(body)
}

async fn drain<R: AsyncRead + Unpin>(mut decoder: R) -> Result<Bytes, NetError> {
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .await
        .map_err(|_| NetError::ContentDecodingFailed)?;
    Ok(Bytes::from(out))
}

/// The `charset` parameter of a Content-Type value.
pub fn charset(content_type: Option<&str>) -> Option<&'static Encoding> {
    let mime: mime::Mime = content_type?.parse().ok()?;
    let label = mime.get_param(mime::CHARSET)?;
    Encoding::for_label(label.as_str().as_bytes())
}

/// Decode body bytes to text. A BOM wins, then the Content-Type charset,
/// then UTF-8. Malformed sequences become U+FFFD.
pub fn decode_text(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = charset(content_type).unwrap_or(UTF_8);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::trace!(encoding = used.name(), "replaced malformed sequences while decoding text");
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::bufread::{BrotliEncoder, GzipEncoder, ZlibEncoder};

    async fn compress<E: AsyncRead + Unpin>(encoder: E) -> Bytes {
        drain(encoder).await.unwrap()
    }

    #[tokio::test]
    async fn test_decompress_each_coding() {
        let plain = b"{\"hello\":\"world\"}".repeat(20);

        let gz = compress(GzipEncoder::new(&plain[..])).await;
        assert_eq!(decompress(Some("gzip"), gz).await.unwrap(), plain);

        let zlib = compress(ZlibEncoder::new(&plain[..])).await;
        assert_eq!(decompress(Some("deflate"), zlib).await.unwrap(), plain);

        let br = compress(BrotliEncoder::new(&plain[..])).await;
        assert_eq!(decompress(Some("BR"), br).await.unwrap(), plain);
    }

    #[tokio::test]
    async fn test_stacked_and_passthrough() {
        let plain = b"stacked codings".to_vec();
        let inner = compress(ZlibEncoder::new(&plain[..])).await;
        let outer = compress(GzipEncoder::new(&inner[..])).await;
        assert_eq!(decompress(Some("deflate, gzip"), outer).await.unwrap(), plain);

        let raw = Bytes::from_static(b"raw");
        assert_eq!(decompress(None, raw.clone()).await.unwrap(), raw);
        assert_eq!(decompress(Some("identity"), raw.clone()).await.unwrap(), raw);
        assert_eq!(decompress(Some("compress"), raw.clone()).await.unwrap(), raw);
    }

    #[tokio::test]
    async fn test_corrupt_body() {
        let err = decompress(Some("gzip"), Bytes::from_static(b"not gzip at all"))
            .await
            .unwrap_err();
        assert_eq!(err, NetError::ContentDecodingFailed);
    }

    #[test]
    fn test_charset_decoding() {
        assert_eq!(charset(Some("text/html; charset=ISO-8859-1")).unwrap().name(), "windows-1252");
        assert!(charset(Some("text/html")).is_none());
        assert!(charset(None).is_none());

        assert_eq!(decode_text(b"caf\xe9", Some("text/plain; charset=latin1")), "café");
        let sjis = b"\x82\xb1\x82\xf1\x82\xc9\x82\xbf\x82\xcd";
        assert_eq!(decode_text(sjis, Some("text/plain; charset=shift_jis")), "こんにちは");
        assert_eq!(decode_text("café".as_bytes(), Some("application/json")), "café");
        assert_eq!(decode_text(b"bad \xff", None), "bad \u{fffd}");
    }
}
