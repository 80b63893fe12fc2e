//! Incremental decoding of streamed model responses
//!
//! Both supported backends stream their replies as line-oriented text over a
//! chunked HTTP body: Ollama sends one JSON object per line, OpenAI-compatible
//! servers send Server-Sent Events (`data: {...}` lines). Chunk boundaries do
//! not line up with line boundaries, so bytes are buffered until a full line
//! is available.

use crate::error::{Result, ThreadchatError};
use crate::providers::TextStream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;

/// What a single decoded line means for the reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A piece of reply text
    Fragment(String),
    /// The reply is complete; the payload carries any trailing text
    Done(String),
    /// Keep-alives, comments, role headers and other lines without text
    Skip,
}

struct LineState<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    idle_timeout: Duration,
    finished: bool,
}

/// Split a byte stream into lines
///
/// Trailing `\r` is removed. Bytes are decoded per complete line, so
/// multi-byte characters split across chunks survive. A transport error, or
/// no bytes arriving within `idle_timeout`, is yielded once and ends the
/// stream.
pub fn byte_lines<S, E>(
    byte_stream: S,
    idle_timeout: Duration,
) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = LineState {
        inner: Box::pin(byte_stream),
        buffer: Vec::new(),
        idle_timeout,
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(pos) = st.buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = st.buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw[..raw.len() - 1])
                    .trim_end_matches('\r')
                    .to_string();
                return Some((Ok(line), st));
            }

            if st.finished {
                if st.buffer.is_empty() {
                    return None;
                }
                let raw = std::mem::take(&mut st.buffer);
                let line = String::from_utf8_lossy(&raw)
                    .trim_end_matches('\r')
                    .to_string();
                return Some((Ok(line), st));
            }

            let next = match tokio::time::timeout(st.idle_timeout, st.inner.next()).await {
                Ok(next) => next,
                Err(_) => {
                    st.finished = true;
                    st.buffer.clear();
                    tracing::error!(
                        "Response stream stalled for {}s",
                        st.idle_timeout.as_secs_f32()
                    );
                    let err = ThreadchatError::RemoteModel(format!(
                        "Response stream timed out after {}s without data",
                        st.idle_timeout.as_secs_f32()
                    ));
                    return Some((Err(err.into()), st));
                }
            };

            match next {
                Some(Ok(chunk)) => st.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    st.finished = true;
                    st.buffer.clear();
                    tracing::error!("Response stream interrupted: {}", e);
                    let err = ThreadchatError::RemoteModel(format!(
                        "Response stream interrupted: {}",
                        e
                    ));
                    return Some((Err(err.into()), st));
                }
                None => st.finished = true,
            }
        }
    })
}

/// Turn a stream of lines into a stream of reply fragments
///
/// `decode` classifies each non-blank line. The resulting stream stops after
/// `LineEvent::Done`, after the first error, or when the lines run out.
/// Empty fragments are never yielded.
pub fn fragments<L, F>(lines: L, decode: F) -> TextStream
where
    L: Stream<Item = Result<String>> + Send + 'static,
    F: Fn(&str) -> Result<LineEvent> + Send + Sync + 'static,
{
    let lines: Pin<Box<dyn Stream<Item = Result<String>> + Send>> = Box::pin(lines);

    let stream = futures::stream::unfold(
        (lines, decode, false),
        |(mut lines, decode, done)| async move {
            if done {
                return None;
            }
            loop {
                let line = match lines.next().await {
                    None => return None,
                    Some(Err(e)) => return Some((Err(e), (lines, decode, true))),
                    Some(Ok(line)) => line,
                };

                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match decode(line) {
                    Ok(LineEvent::Skip) => continue,
                    Ok(LineEvent::Fragment(text)) => {
                        if text.is_empty() {
                            continue;
                        }
                        return Some((Ok(text), (lines, decode, false)));
                    }
                    Ok(LineEvent::Done(text)) => {
                        if text.is_empty() {
                            return None;
                        }
                        return Some((Ok(text), (lines, decode, true)));
                    }
                    Err(e) => return Some((Err(e), (lines, decode, true))),
                }
            }
        },
    );

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
        let owned: Vec<std::result::Result<Bytes, std::io::Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        futures::stream::iter(owned)
    }

    const IDLE: Duration = Duration::from_secs(5);

    fn byte_lines_of<S>(stream: S) -> impl Stream<Item = Result<String>> + Send
    where
        S: Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + 'static,
    {
        byte_lines(stream, IDLE)
    }

    async fn collect_lines<S>(stream: S) -> Vec<String>
    where
        S: Stream<Item = Result<String>>,
    {
        stream
            .map(|r| r.expect("line should decode"))
            .collect::<Vec<_>>()
            .await
    }

    #[tokio::test]
    async fn test_byte_lines_joins_chunks_across_boundaries() {
        let lines = collect_lines(byte_lines_of(chunks(&["hel", "lo\nwor", "ld\r\n", "tail"]))).await;
        assert_eq!(lines, vec!["hello", "world", "tail"]);
    }

    #[tokio::test]
    async fn test_byte_lines_keeps_split_multibyte_characters() {
        let bytes = "héllo\n".as_bytes();
        let (a, b) = bytes.split_at(2);
        let parts: Vec<std::result::Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::copy_from_slice(a)), Ok(Bytes::copy_from_slice(b))];
        let lines = collect_lines(byte_lines(futures::stream::iter(parts), IDLE)).await;
        assert_eq!(lines, vec!["héllo"]);
    }

    #[tokio::test]
    async fn test_byte_lines_stops_after_transport_error() {
        let parts: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from("one\npart")),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "reset")),
            Ok(Bytes::from("never\n")),
        ];
        let items: Vec<Result<String>> = byte_lines(futures::stream::iter(parts), IDLE).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "one");
        let err = items[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("reset"));
    }

    #[tokio::test]
    async fn test_byte_lines_times_out_when_body_stalls() {
        let parts: Vec<std::result::Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from("first\npartial"))];
        let stalled = futures::stream::iter(parts).chain(futures::stream::pending());
        let items: Vec<Result<String>> = byte_lines(stalled, Duration::from_millis(50))
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "first");
        let err = items[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    fn decode_test_line(line: &str) -> Result<LineEvent> {
        match line {
            "END" => Ok(LineEvent::Done(String::new())),
            "ENDX" => Ok(LineEvent::Done("x".to_string())),
            "BAD" => Err(ThreadchatError::RemoteModel("bad line".to_string()).into()),
            l if l.starts_with('#') => Ok(LineEvent::Skip),
            l => Ok(LineEvent::Fragment(l.trim_start_matches('+').to_string())),
        }
    }

    #[tokio::test]
    async fn test_fragments_stop_at_done() {
        let lines = byte_lines_of(chunks(&["a\n# comment\n\nb\nEND\nc\n"]));
        let parts: Vec<String> = fragments(lines, decode_test_line)
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(parts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_fragments_yield_trailing_done_text() {
        let lines = byte_lines_of(chunks(&["a\nENDX\nb\n"]));
        let parts: Vec<String> = fragments(lines, decode_test_line)
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(parts, vec!["a", "x"]);
    }

    #[tokio::test]
    async fn test_fragments_skip_empty_text() {
        let lines = byte_lines_of(chunks(&["+\na\n"]));
        let parts: Vec<String> = fragments(lines, decode_test_line)
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(parts, vec!["a"]);
    }

    #[tokio::test]
    async fn test_fragments_end_after_decode_error() {
        let lines = byte_lines_of(chunks(&["a\nBAD\nb\n"]));
        let items: Vec<Result<String>> = fragments(lines, decode_test_line).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
