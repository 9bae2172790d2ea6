//! `read_all` scenarios.

use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use promise_readable::{Chunk, Encoding, EventKind, PromiseReadable, ReadableOptions, SourceEvent};

use super::mock::{boom, MockReadable};

fn binary(bytes: &'static [u8]) -> Option<Chunk> {
    Some(Chunk::Binary(Bytes::from_static(bytes)))
}

/// Emit `data` only while the source is flowing.
fn emit_if_flowing(stream: &MockReadable, chunk: &'static [u8]) {
    if !stream.is_paused() {
        stream.emit_data(chunk);
    }
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn read_all_concatenates_chunks_until_end() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::new(Arc::clone(&stream));

    let pending = pr.read_all();
    emit_if_flowing(&stream, b"chunk1");
    emit_if_flowing(&stream, b"chunk2");
    stream.emit(SourceEvent::End);

    assert_eq!(pending.await.unwrap(), binary(b"chunk1chunk2"));
    assert_eq!(stream.total_listeners(), 1);
}

#[tokio::test]
async fn read_all_preserves_emission_order() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::new(Arc::clone(&stream));

    let pending = pr.read_all();
    let chunks: [&[u8]; 5] = [b"c", b"a", b"b", b"", b"d"];
    for chunk in chunks {
        stream.emit(SourceEvent::Data(Bytes::copy_from_slice(chunk)));
    }
    stream.emit(SourceEvent::Close);

    assert_eq!(pending.await.unwrap(), binary(b"cabd"));
}

#[tokio::test]
async fn read_all_decodes_the_concatenation() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::with_options(
        Arc::clone(&stream),
        ReadableOptions {
            encoding: Some(Encoding::Utf8),
            ..Default::default()
        },
    );

    // "é" split across two chunks survives because decoding happens once.
    let pending = pr.read_all();
    stream.emit_data(b"caf\xc3");
    stream.emit_data(b"\xa9");
    stream.emit(SourceEvent::End);

    assert_eq!(pending.await.unwrap(), Some(Chunk::from("café")));
}

#[tokio::test]
async fn read_all_encoded_overrides_encoding_for_one_call() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::new(Arc::clone(&stream));

    let pending = pr.read_all_encoded(Encoding::Base64);
    stream.emit_data(b"chunk1");
    stream.emit(SourceEvent::End);

    assert_eq!(pending.await.unwrap(), Some(Chunk::from("Y2h1bmsx")));
}

#[tokio::test]
async fn read_all_stays_pending_until_a_terminal_event() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::new(Arc::clone(&stream));

    let mut pending = pr.read_all();
    stream.emit_data(b"chunk1");
    assert!((&mut pending).now_or_never().is_none());

    stream.emit(SourceEvent::Destroy);
    assert_eq!(pending.await.unwrap(), binary(b"chunk1"));
}

// ============================================================================
// Empty vs. none
// ============================================================================

#[tokio::test]
async fn read_all_live_source_ending_without_chunks_resolves_empty_content() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::new(Arc::clone(&stream));

    let pending = pr.read_all();
    stream.emit(SourceEvent::End);
    assert_eq!(pending.await.unwrap(), Some(Chunk::empty(None)));

    let stream = MockReadable::new();
    let pr = PromiseReadable::new(Arc::clone(&stream));
    pr.set_encoding("utf8").unwrap();

    let pending = pr.read_all();
    stream.emit(SourceEvent::End);
    assert_eq!(pending.await.unwrap(), Some(Chunk::from("")));
}

#[tokio::test]
async fn read_all_closed_stream_resolves_none() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::new(Arc::clone(&stream));
    stream.close();

    assert_eq!(pr.read_all().await.unwrap(), None);
}

#[tokio::test]
async fn read_all_ended_stream_resolves_none() {
    let stream = MockReadable::open_ended();
    stream.set_ended();
    let pr = PromiseReadable::new(Arc::clone(&stream));

    let pending = pr.read_all();
    assert!(pending.is_immediate());
    assert_eq!(pending.await.unwrap(), None);
    assert_eq!(stream.total_listeners(), 1);
}

#[tokio::test]
async fn read_all_destroyed_stream_resolves_none() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::new(Arc::clone(&stream));
    stream.destroy();

    assert_eq!(pr.read_all().await.unwrap(), None);
}

// ============================================================================
// Overlapping operations
// ============================================================================

#[tokio::test]
async fn read_settled_while_read_all_is_pending_keeps_its_chunk() {
    let stream = MockReadable::open_ended();
    let pr = PromiseReadable::new(Arc::clone(&stream));

    let all = pr.read_all();
    let mut read = pr.read();
    stream.emit_data(b"chunk1");
    assert_eq!((&mut read).now_or_never().unwrap().unwrap(), binary(b"chunk1"));

    stream.emit_data(b"chunk2");
    stream.emit(SourceEvent::End);

    assert_eq!(all.await.unwrap(), binary(b"chunk1chunk2"));
    assert_eq!(stream.total_listeners(), 1);
}

#[tokio::test]
async fn read_all_picks_up_bytes_held_back_by_an_earlier_read() {
    let stream = MockReadable::open_ended();
    let pr = PromiseReadable::new(Arc::clone(&stream));
    pr.set_encoding("utf8").unwrap();

    stream.append(b"caf\xc3");
    assert_eq!(pr.read().await.unwrap(), Some(Chunk::from("caf")));

    let pending = pr.read_all();
    stream.emit_data(b"\xa9 au lait");
    stream.emit(SourceEvent::End);
    assert_eq!(pending.await.unwrap(), Some(Chunk::from("\u{e9} au lait")));
}

// ============================================================================
// Paused sources
// ============================================================================

#[tokio::test]
async fn read_all_on_paused_stream_leaves_resuming_to_the_caller() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::new(Arc::clone(&stream));
    stream.pause();

    let pending = pr.read_all();
    emit_if_flowing(&stream, b"chunk1");
    emit_if_flowing(&stream, b"chunk2");
    stream.emit(SourceEvent::End);

    assert!(stream.is_paused());
    assert_eq!(pending.await.unwrap(), Some(Chunk::empty(None)));
}

#[tokio::test]
async fn read_all_resumes_paused_stream_when_configured() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::with_options(
        Arc::clone(&stream),
        ReadableOptions {
            resume_on_read_all: true,
            ..Default::default()
        },
    );
    stream.pause();

    let pending = pr.read_all();
    emit_if_flowing(&stream, b"chunk1");
    emit_if_flowing(&stream, b"chunk2");
    stream.emit(SourceEvent::End);

    assert_eq!(pending.await.unwrap(), binary(b"chunk1chunk2"));
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn read_all_rejects_on_error_after_some_chunks() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::new(Arc::clone(&stream));

    let pending = pr.read_all();
    stream.emit_data(b"chunk1");
    stream.emit(SourceEvent::Error(boom()));

    let err = pending.await.unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(stream.listener_count(EventKind::Data), 0);
}

#[tokio::test]
async fn read_all_rejects_with_error_emitted_before_the_call() {
    let stream = MockReadable::new();
    let pr = PromiseReadable::new(Arc::clone(&stream));
    stream.emit(SourceEvent::Error(boom()));

    let pending = pr.read_all();
    stream.emit_data(b"chunk1");

    let err = pending.await.unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(stream.listener_count(EventKind::Data), 0);
}
