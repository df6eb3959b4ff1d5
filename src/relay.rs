//! Relaying a streamed Shimmy response to the caller.
//!
//! Two policies: raw passthrough (chunks forwarded as they arrive) and
//! line re-framing (one non-empty line per emitted chunk). Both end with a
//! single `{"error": ...}` line if the backend fails mid-stream; once the
//! status line is out, that is the only way left to report it.
//!
//! Dropping the returned stream (caller went away) drops the upstream body
//! and with it the backend connection.

use std::convert::Infallible;
use std::fmt::Display;

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use tracing::{debug, error};

pub const NDJSON: &str = "application/x-ndjson";
pub const EVENT_STREAM: &str = "text/event-stream";

// terminal in-band error line
fn error_chunk(err: impl Display) -> Bytes {
    let mut line = serde_json::json!({ "error": err.to_string() }).to_string();
    line.push('\n');
    Bytes::from(line)
}

struct RelayState<E: 'static> {
    upstream: BoxStream<'static, Result<Bytes, E>>,
    buf: BytesMut,
    // bytes of `buf` already known to hold no newline
    scanned: usize,
    done: bool,
}

impl<E: 'static> RelayState<E> {
    fn new<S>(upstream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    {
        Self {
            upstream: upstream.boxed(),
            buf: BytesMut::new(),
            scanned: 0,
            done: false,
        }
    }
}

/// Forward chunks unmodified, as soon as they arrive.
pub fn passthrough<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    futures_util::stream::unfold(RelayState::new(upstream), |mut st| async move {
        if st.done {
            return None;
        }
        loop {
            match st.upstream.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => return Some((Ok::<_, Infallible>(chunk), st)),
                Some(Err(e)) => {
                    error!("Streaming error: {e}");
                    st.done = true;
                    return Some((Ok::<_, Infallible>(error_chunk(e)), st));
                }
                None => {
                    debug!("upstream stream finished");
                    return None;
                }
            }
        }
    })
}

/// Re-emit each non-empty upstream line followed by `\n`.
///
/// Lines may span chunk boundaries; a trailing line without a terminator is
/// flushed when the upstream ends.
pub fn reframe_lines<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    futures_util::stream::unfold(RelayState::new(upstream), |mut st| async move {
        if st.done {
            return None;
        }
        loop {
            if let Some(pos) = st.buf[st.scanned..].iter().position(|b| *b == b'\n') {
                let line = st.buf.split_to(st.scanned + pos + 1);
                st.scanned = 0;
                if let Some(out) = framed(&line) {
                    return Some((Ok::<_, Infallible>(out), st));
                }
                continue;
            }
            st.scanned = st.buf.len();

            match st.upstream.next().await {
                Some(Ok(chunk)) => st.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    error!("Streaming error: {e}");
                    st.done = true;
                    return Some((Ok::<_, Infallible>(error_chunk(e)), st));
                }
                None => {
                    st.done = true;
                    let rest = st.buf.split();
                    return framed(&rest).map(|out| (Ok::<_, Infallible>(out), st));
                }
            }
        }
    })
}

// strip the line terminator; None for blank lines
fn framed(line: &[u8]) -> Option<Bytes> {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    if end == 0 {
        return None;
    }
    let mut out = BytesMut::with_capacity(end + 1);
    out.extend_from_slice(&line[..end]);
    out.extend_from_slice(b"\n");
    Some(out.freeze())
}

/// Wrap a relay stream in a 200 response with the given content type.
pub fn streaming_response<S>(stream: S, content_type: &'static str) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
