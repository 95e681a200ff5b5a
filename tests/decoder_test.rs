//! Decoder behaviour over realistic, arbitrarily fragmented response bodies.

use futures::stream::{self, Stream, StreamExt};
use search_chat::{CancellationToken, Error, Result, ToolCall, decode};
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

/// Sink that remembers every text delta separately.
#[derive(Default)]
struct DeltaLog {
    deltas: Vec<String>,
}

impl Write for DeltaLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.deltas.push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl DeltaLog {
    fn text(&self) -> String {
        self.deltas.concat()
    }
}

fn text_frame(text: &str) -> String {
    format!(
        "data: {}\n",
        json!({ "choices": [{ "index": 0, "delta": { "content": text } }] })
    )
}

fn tool_frame(id: Option<&str>, name: Option<&str>, arguments: &str) -> String {
    let mut call = json!({ "index": 0, "function": { "arguments": arguments } });
    if let Some(id) = id {
        call["id"] = json!(id);
        call["type"] = json!("function");
    }
    if let Some(name) = name {
        call["function"]["name"] = json!(name);
    }
    format!(
        "data: {}\n",
        json!({ "choices": [{ "index": 0, "delta": { "tool_calls": [call] } }] })
    )
}

fn split_at_sizes(body: &[u8], size: usize) -> impl Stream<Item = Result<Vec<u8>>> + use<> {
    let reads: Vec<Result<Vec<u8>>> = body.chunks(size).map(|c| Ok(c.to_vec())).collect();
    stream::iter(reads)
}

async fn decode_bytes(reads: Vec<Vec<u8>>) -> (Vec<String>, ToolCall) {
    let mut log = DeltaLog::default();
    let body = stream::iter(reads.into_iter().map(Ok::<_, Error>));
    let call = decode(body, &CancellationToken::default(), &mut log)
        .await
        .unwrap();
    (log.deltas, call)
}

/// A body exercising everything at once: multi-byte text, a malformed frame,
/// CRLF endings, SSE noise, a split tool call, and no final terminator.
fn mixed_body() -> String {
    let mut body = String::new();
    body.push_str(": keep-alive\n");
    body.push_str(&text_frame("Grüße, "));
    body.push_str(&text_frame("世界 🦀"));
    body.push_str("data: {\"choices\":[{\"delta\":\n");
    body.push_str(&text_frame(" und mehr").replace('\n', "\r\n"));
    body.push('\n');
    body.push_str(&tool_frame(Some("call_42"), Some("webSearch"), ""));
    body.push_str(&tool_frame(None, None, "{\"query\":"));
    body.push_str(&tool_frame(None, None, ""));
    body.push_str(&tool_frame(None, None, "\"crabs ünd \\\"claws\\\"\"}"));
    body.push_str("data: [DONE]");
    body
}

#[tokio::test]
async fn test_hello_scenario() {
    let body = format!(
        "{}{}data: [DONE]\n",
        text_frame("Hel"),
        text_frame("lo")
    );

    let (deltas, call) = decode_bytes(vec![body.into_bytes()]).await;

    assert_eq!(deltas, vec!["Hel".to_string(), "lo".to_string()]);
    assert_eq!(deltas.concat(), "Hello");
    assert_eq!(call.id, "");
    assert!(!call.is_complete());
}

#[tokio::test]
async fn test_tool_call_scenario() {
    let body = format!(
        "{}{}data: [DONE]\n",
        tool_frame(Some("call_1"), Some("webSearch"), "{\"qu"),
        tool_frame(None, None, "ery\":\"x\"}")
    );

    let (deltas, call) = decode_bytes(vec![body.into_bytes()]).await;

    assert!(deltas.is_empty());
    assert_eq!(call, ToolCall::new("call_1", "webSearch", "{\"query\":\"x\"}"));
}

#[tokio::test]
async fn test_continuation_with_other_index_is_still_appended() {
    let start = json!({ "choices": [{ "delta": { "tool_calls": [{
        "index": 0, "id": "call_1", "type": "function",
        "function": { "name": "webSearch", "arguments": "{\"qu" }
    }] } }] });
    let continuation = json!({ "choices": [{ "delta": { "tool_calls": [{
        "index": 1, "function": { "arguments": "ery\":\"x\"}" }
    }] } }] });
    let body = format!("data: {}\ndata: {}\ndata: [DONE]\n", start, continuation);

    let (_, call) = decode_bytes(vec![body.into_bytes()]).await;

    assert_eq!(call, ToolCall::new("call_1", "webSearch", "{\"query\":\"x\"}"));
}

#[tokio::test]
async fn test_malformed_frame_between_text_frames() {
    let body = format!(
        "{}data: {{\"choices\": [{{\"delta\": oops}}]}}\n{}",
        text_frame("first"),
        text_frame("second")
    );

    let (deltas, call) = decode_bytes(vec![body.into_bytes()]).await;

    assert_eq!(deltas, vec!["first".to_string(), "second".to_string()]);
    assert!(!call.is_complete());
}

#[tokio::test]
async fn test_mixed_body_decodes_as_expected() {
    let (deltas, call) = decode_bytes(vec![mixed_body().into_bytes()]).await;

    assert_eq!(
        deltas,
        vec![
            "Grüße, ".to_string(),
            "世界 🦀".to_string(),
            " und mehr".to_string()
        ]
    );
    assert_eq!(call.id, "call_42");
    assert_eq!(call.function.name, "webSearch");
    assert_eq!(call.function.arguments, r#"{"query":"crabs ünd \"claws\""}"#);
}

#[tokio::test]
async fn test_fixed_size_reads_match_single_read() {
    let body = mixed_body().into_bytes();
    let expected = decode_bytes(vec![body.clone()]).await;

    for size in 1..=body.len() {
        let mut log = DeltaLog::default();
        let call = assert_ok!(
            decode(
                split_at_sizes(&body, size),
                &CancellationToken::default(),
                &mut log
            )
            .await
        );
        assert_eq!((log.deltas, call), expected, "read size {}", size);
    }
}

#[tokio::test]
async fn test_every_two_way_split_matches_single_read() {
    let body = mixed_body().into_bytes();
    let expected = decode_bytes(vec![body.clone()]).await;

    for offset in 0..=body.len() {
        let (head, tail) = body.split_at(offset);
        let actual = decode_bytes(vec![head.to_vec(), tail.to_vec()]).await;
        assert_eq!(actual, expected, "split at byte {}", offset);
    }
}

#[tokio::test]
async fn test_empty_reads_are_harmless() {
    let body = text_frame("ok").into_bytes();
    let (mid_a, mid_b) = body.split_at(5);

    let (deltas, _) = decode_bytes(vec![
        Vec::new(),
        mid_a.to_vec(),
        Vec::new(),
        mid_b.to_vec(),
        Vec::new(),
    ])
    .await;

    assert_eq!(deltas, vec!["ok".to_string()]);
}

#[tokio::test]
async fn test_signal_before_next_read_stops_output() {
    let token = CancellationToken::default();
    let signaller = token.clone();
    let reads = vec![
        text_frame("one").into_bytes(),
        text_frame("two").into_bytes(),
    ];

    // Signals while handing out the first read, i.e. before the second boundary
    let body = stream::unfold(
        (reads.into_iter(), Some(signaller)),
        |(mut reads, signaller)| async move {
            let next = reads.next()?;
            if let Some(token) = &signaller {
                token.signal();
            }
            Some((Ok::<_, Error>(next), (reads, None)))
        },
    );

    let mut log = DeltaLog::default();
    let err = assert_err!(decode(body, &token, &mut log).await);

    assert!(err.is_cancelled());
    assert_eq!(log.text(), "one");
}

#[tokio::test]
async fn test_signal_interrupts_pending_read() {
    let token = CancellationToken::default();
    let body = stream::iter(vec![Ok::<_, Error>(text_frame("partial").into_bytes())])
        .chain(stream::pending());

    let signaller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        signaller.signal();
    });

    let mut log = DeltaLog::default();
    let result = tokio::time::timeout(Duration::from_secs(5), decode(body, &token, &mut log))
        .await
        .expect("decode should observe cancellation");

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(log.text(), "partial");
}

#[tokio::test]
async fn test_sink_failure_is_reported() {
    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let body = stream::iter(vec![Ok::<_, Error>(text_frame("x").into_bytes())]);
    let err = decode(body, &CancellationToken::default(), &mut Closed)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
}
