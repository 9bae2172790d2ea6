//! PromiseReadable<S> — wraps a [`ReadableSource`] so that reads and event
//! waits are issued as single operations returning a [`Settle`] future.
//!
//! # Listener model
//!
//! - One persistent `error` listener, registered in the constructor, records
//!   the latest error so operations issued afterwards reject immediately.
//! - Each operation registers its own listeners through an [`EventRace`];
//!   they are removed together as soon as the operation settles.
//!
//! The two sets are torn down on separate paths: settling never touches the
//! persistent listener, and `destroy()` removes both.
//!
//! # Decoding
//!
//! Chunks handed out one at a time go through a shared [`StreamDecoder`], so
//! a multi-byte sequence split across two chunks is delivered whole with the
//! second one. Whatever is still held back when the source finishes is
//! flushed as a last chunk before reads resolve `None`.
//!
//! # Consumers
//!
//! The adapter assumes a single consumer. Overlapping operations each run
//! their own race, so a settled operation is never affected by another, but
//! two overlapping `read` calls may both observe the same `data` event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream};
use parking_lot::Mutex;

use crate::encoding::{Chunk, Encoding, StreamDecoder};
use crate::error::{ReadableError, Result};
use crate::source::{EventKind, ListenerId, Payload, ReadableSource, SourceEvent, SourceStatus};

use super::classify::{classify, classify_once, Flags, OnceVerdict, Verdict};
use super::options::ReadableOptions;
use super::race::{Detach, EventRace};
use super::settle::Settle;

// ============================================================================
// Adapter state (held behind an Arc<Mutex<...>>)
// ============================================================================

struct AdapterState {
    encoding: Option<Encoding>,
    resume_on_read_all: bool,
    flags: Flags,
    decoder: StreamDecoder,
    /// The persistent `error` listener, until `destroy()` or drop.
    error_listener: Option<ListenerId>,
    /// Operations that may still be subscribed.
    pending: Vec<Weak<dyn Detach>>,
}

impl AdapterState {
    fn new(options: &ReadableOptions) -> Self {
        Self {
            encoding: options.encoding,
            resume_on_read_all: options.resume_on_read_all,
            flags: Flags::default(),
            decoder: StreamDecoder::new(),
            error_listener: None,
            pending: Vec::new(),
        }
    }
}

// ============================================================================
// PromiseReadable
// ============================================================================

/// Future-returning adapter over an event-emitting readable source.
pub struct PromiseReadable<S: ReadableSource> {
    source: Arc<S>,
    state: Arc<Mutex<AdapterState>>,
}

impl<S: ReadableSource> PromiseReadable<S> {
    /// Wrap `source` with default options.
    pub fn new(source: Arc<S>) -> Self {
        Self::with_options(source, ReadableOptions::default())
    }

    pub fn with_options(source: Arc<S>, options: ReadableOptions) -> Self {
        let state = Arc::new(Mutex::new(AdapterState::new(&options)));

        let captured = Arc::clone(&state);
        let id = source.on(
            EventKind::Error,
            Arc::new(move |event: &SourceEvent| {
                if let SourceEvent::Error(e) = event {
                    tracing::debug!(error = %e, "source error captured");
                    captured.lock().flags.errored = Some(Arc::clone(e));
                }
            }),
        );
        state.lock().error_listener = Some(id);

        Self { source, state }
    }

    /// The wrapped source.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn encoding(&self) -> Option<Encoding> {
        self.state.lock().encoding
    }

    /// Decode subsequent chunks with the encoding named `name`.
    ///
    /// Only the adapter's configuration changes; the source is untouched.
    pub fn set_encoding(&self, name: &str) -> Result<&Self> {
        let encoding: Encoding = name.parse()?;
        self.state.lock().encoding = Some(encoding);
        Ok(self)
    }

    /// Deliver raw binary chunks again.
    pub fn clear_encoding(&self) -> &Self {
        self.state.lock().encoding = None;
        self
    }

    /// `true` once [`destroy`](Self::destroy) has been called.
    pub fn is_destroyed(&self) -> bool {
        self.state.lock().flags.detached
    }

    // -----------------------------------------------------------------------
    // read
    // -----------------------------------------------------------------------

    /// Resolve with the next chunk, or `None` if the source is at or past its
    /// end, closed, or destroyed.
    pub fn read(&self) -> Settle<Option<Chunk>> {
        let encoding = self.encoding();
        self.read_with(encoding)
    }

    /// [`read`](Self::read) decoding with `encoding` for this call only.
    pub fn read_encoded(&self, encoding: Encoding) -> Settle<Option<Chunk>> {
        self.read_with(Some(encoding))
    }

    fn read_with(&self, encoding: Option<Encoding>) -> Settle<Option<Chunk>> {
        if let Some(settled) = self.short_circuit("read", encoding) {
            return settled;
        }

        let pull = Arc::new(Pull::default());
        let (race, settle) = EventRace::start(&self.source, "read");
        {
            let state = Arc::clone(&self.state);
            race.subscribe(EventKind::Data, move |race, event| {
                if let SourceEvent::Data(bytes) = event {
                    if !race.is_settled() {
                        let chunk = state.lock().decoder.decode(bytes, encoding);
                        race.resolve(Some(chunk));
                    }
                }
            });
        }
        {
            let state = Arc::clone(&self.state);
            let pull = Arc::clone(&pull);
            race.subscribe(EventKind::Readable, move |race, _| {
                if let Some(source) = race.source() {
                    pull_chunk(race, &*source, &pull, &state, encoding);
                }
            });
        }
        {
            let state = Arc::clone(&self.state);
            self.subscribe_terminal(&race, Some(Arc::clone(&pull)), move || {
                state.lock().decoder.flush(encoding)
            });
        }
        self.track(&race);

        pull_chunk(&race, &*self.source, &pull, &self.state, encoding);
        settle
    }

    // -----------------------------------------------------------------------
    // read_all
    // -----------------------------------------------------------------------

    /// Resolve with every chunk delivered until the source ends, concatenated.
    ///
    /// Resolves `None` if the source had already finished when called, and
    /// empty content if it finishes without delivering any chunk.
    pub fn read_all(&self) -> Settle<Option<Chunk>> {
        let encoding = self.encoding();
        self.read_all_with(encoding)
    }

    /// [`read_all`](Self::read_all) decoding with `encoding` for this call only.
    pub fn read_all_encoded(&self, encoding: Encoding) -> Settle<Option<Chunk>> {
        self.read_all_with(Some(encoding))
    }

    fn read_all_with(&self, encoding: Option<Encoding>) -> Settle<Option<Chunk>> {
        if let Some(settled) = self.short_circuit("read_all", encoding) {
            return settled;
        }

        let chunks: Arc<Mutex<Vec<Bytes>>> = Arc::new(Mutex::new(Vec::new()));
        let (race, settle) = EventRace::start(&self.source, "read_all");
        {
            let chunks = Arc::clone(&chunks);
            race.subscribe(EventKind::Data, move |race, event| {
                if let SourceEvent::Data(bytes) = event {
                    if !race.is_settled() {
                        chunks.lock().push(bytes.clone());
                    }
                }
            });
        }
        {
            let state = Arc::clone(&self.state);
            self.subscribe_terminal(&race, None, move || {
                let collected = std::mem::take(&mut *chunks.lock());
                let held = state.lock().decoder.take_pending();
                Some(concat(held, collected, encoding))
            });
        }
        self.track(&race);

        if self.state.lock().resume_on_read_all {
            self.source.resume();
        }
        settle
    }

    /// Every chunk, as a stream of successive [`read`](Self::read) calls.
    ///
    /// The stream ends when a read resolves `None`, and after yielding an
    /// error.
    pub fn chunks(&self) -> impl Stream<Item = Result<Chunk>> + '_ {
        stream::unfold(Some(self), |adapter| async move {
            let adapter = adapter?;
            match adapter.read().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(adapter))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    // -----------------------------------------------------------------------
    // once
    // -----------------------------------------------------------------------

    /// Resolve the first time `kind` fires, with its payload if it has one.
    ///
    /// An `end` or `close` while waiting for another event resolves with no
    /// payload, as does a `destroy` while waiting for `error`. An `error`
    /// rejects, including while waiting for `error` itself. Rejects
    /// immediately if the event can no longer fire.
    pub fn once(&self, kind: EventKind) -> Settle<Option<Payload>> {
        let (status, verdict) = {
            let state = self.state.lock();
            let status = self.source.status();
            (status, classify_once(kind, status, &state.flags))
        };
        match verdict {
            OnceVerdict::Wait => {}
            OnceVerdict::Resolve => {
                tracing::debug!(event = %kind, ?status, "once resolved from current status");
                return Settle::ready(Ok(None));
            }
            OnceVerdict::Reject(e) => {
                tracing::debug!(event = %kind, ?status, error = %e, "once rejected from current status");
                return Settle::ready(Err(e));
            }
        }

        let encoding = self.encoding();
        let (race, settle) = EventRace::start(&self.source, "once");
        if kind != EventKind::Error {
            let state = Arc::clone(&self.state);
            race.subscribe(kind, move |race, event| {
                if race.is_settled() {
                    return;
                }
                let payload = {
                    let mut state = state.lock();
                    state.flags.observe(event.kind());
                    payload_of(event, &mut state.decoder, encoding)
                };
                race.resolve(payload);
            });
        }
        let fallbacks: &[EventKind] = if kind == EventKind::Error {
            &[EventKind::End, EventKind::Close, EventKind::Destroy]
        } else {
            &[EventKind::End, EventKind::Close]
        };
        for &fallback in fallbacks {
            if fallback == kind {
                continue;
            }
            let state = Arc::clone(&self.state);
            race.subscribe(fallback, move |race, _| {
                state.lock().flags.observe(fallback);
                race.resolve(None);
            });
        }
        race.subscribe(EventKind::Error, reject_with_error);
        self.track(&race);
        settle
    }

    // -----------------------------------------------------------------------
    // destroy
    // -----------------------------------------------------------------------

    /// Stop observing the source.
    ///
    /// Removes the persistent error listener and the listeners of every
    /// pending operation. Operations still pending stay pending forever.
    /// The source itself is not closed. Calling this again is a no-op.
    ///
    /// Afterwards `read`/`read_all` resolve `None`, and `once` rejects with
    /// `once <event> after destroy` unless the source itself already closed
    /// or was destroyed.
    pub fn destroy(&self) {
        let (error_listener, pending) = {
            let mut state = self.state.lock();
            if state.flags.detached {
                return;
            }
            state.flags.detached = true;
            (
                state.error_listener.take(),
                std::mem::take(&mut state.pending),
            )
        };

        if let Some(id) = error_listener {
            self.source.off(EventKind::Error, id);
        }
        let detached = pending
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|op| op.detach())
            .count();
        if detached > 0 {
            tracing::warn!(
                count = detached,
                "adapter destroyed with pending operations; they will not settle"
            );
        }
        tracing::debug!("adapter destroyed");
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// Settle a `read`/`read_all` immediately if the current status allows.
    ///
    /// A finished source still yields whatever the decoder held back.
    fn short_circuit(
        &self,
        operation: &'static str,
        encoding: Option<Encoding>,
    ) -> Option<Settle<Option<Chunk>>> {
        let (verdict, tail) = {
            let mut state = self.state.lock();
            let verdict = classify(self.source.status(), &state.flags);
            let tail = match verdict {
                Verdict::Finished(_) => state.decoder.flush(encoding),
                _ => None,
            };
            (verdict, tail)
        };
        match verdict {
            Verdict::Live => None,
            Verdict::Finished(reason) => {
                tracing::debug!(
                    operation,
                    ?reason,
                    flushed = tail.is_some(),
                    "source finished; resolving without data"
                );
                Some(Settle::ready(Ok(tail)))
            }
            Verdict::Failed(e) => {
                tracing::debug!(operation, error = %e, "replaying captured error");
                Some(Settle::ready(Err(ReadableError::Source(e))))
            }
        }
    }

    /// Subscribe `end`/`close`/`destroy` to resolve with `finish()`, and
    /// `error` to reject.
    ///
    /// With a `pull`, terminal events emitted from inside the source's own
    /// `read()` are deferred until that call returns.
    fn subscribe_terminal<T, F>(
        &self,
        race: &Arc<EventRace<S, T>>,
        pull: Option<Arc<Pull>>,
        finish: F,
    ) where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let finish = Arc::new(finish);
        for kind in [EventKind::End, EventKind::Close, EventKind::Destroy] {
            let state = Arc::clone(&self.state);
            let finish = Arc::clone(&finish);
            let pull = pull.clone();
            race.subscribe(kind, move |race, _| {
                state.lock().flags.observe(kind);
                if let Some(pull) = &pull {
                    if pull.active.load(Ordering::Acquire) {
                        pull.deferred.store(true, Ordering::Release);
                        return;
                    }
                }
                if !race.is_settled() {
                    race.resolve(finish());
                }
            });
        }
        race.subscribe(EventKind::Error, reject_with_error);
    }

    fn track<T: Send + 'static>(&self, race: &Arc<EventRace<S, T>>) {
        let op: Arc<dyn Detach> = Arc::clone(race) as Arc<dyn Detach>;
        let mut state = self.state.lock();
        state
            .pending
            .retain(|weak| weak.upgrade().is_some_and(|op| !op.is_settled()));
        state.pending.push(Arc::downgrade(&op));
    }
}

impl<S: ReadableSource> Drop for PromiseReadable<S> {
    fn drop(&mut self) {
        // Pending operations keep running; only the persistent listener goes.
        let error_listener = self.state.lock().error_listener.take();
        if let Some(id) = error_listener {
            self.source.off(EventKind::Error, id);
        }
    }
}

impl<S: ReadableSource> std::fmt::Debug for PromiseReadable<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PromiseReadable")
            .field("encoding", &state.encoding)
            .field("flags", &state.flags)
            .field("status", &self.source.status())
            .finish()
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Types that are, or wrap, a [`PromiseReadable`].
///
/// Lets call sites accept a duplex adapter wherever a readable adapter is
/// expected.
pub trait AsPromiseReadable {
    type Source: ReadableSource;

    fn as_promise_readable(&self) -> &PromiseReadable<Self::Source>;
}

impl<S: ReadableSource> AsPromiseReadable for PromiseReadable<S> {
    type Source = S;

    fn as_promise_readable(&self) -> &PromiseReadable<S> {
        self
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn reject_with_error<S, T>(race: &Arc<EventRace<S, T>>, event: &SourceEvent)
where
    S: ReadableSource,
    T: Send + 'static,
{
    if let SourceEvent::Error(e) = event {
        race.reject(ReadableError::Source(Arc::clone(e)));
    }
}

/// A synchronous `read()` in progress on behalf of one `read` operation.
#[derive(Default)]
struct Pull {
    active: AtomicBool,
    /// A terminal event arrived while `active`.
    deferred: AtomicBool,
}

/// Pull one chunk through the source's synchronous `read()`.
///
/// A chunk returned by the call wins over an `end`/`close`/`destroy` the
/// source emitted from inside it.
fn pull_chunk<S: ReadableSource>(
    race: &Arc<EventRace<S, Option<Chunk>>>,
    source: &S,
    pull: &Pull,
    state: &Mutex<AdapterState>,
    encoding: Option<Encoding>,
) {
    // Skip when settled, or when the source announces `readable` from
    // inside a pull already running.
    if race.is_settled() || pull.active.swap(true, Ordering::AcqRel) {
        return;
    }
    let bytes = source.read();
    pull.active.store(false, Ordering::Release);
    let deferred = pull.deferred.swap(false, Ordering::AcqRel);

    if let Some(bytes) = bytes {
        let len = bytes.len();
        let chunk = state.lock().decoder.decode(&bytes, encoding);
        if !race.resolve(Some(chunk)) {
            tracing::warn!(len, "read settled during the pull; pulled chunk dropped");
        }
    } else if deferred {
        let tail = state.lock().decoder.flush(encoding);
        race.resolve(tail);
    }
}

fn payload_of(
    event: &SourceEvent,
    decoder: &mut StreamDecoder,
    encoding: Option<Encoding>,
) -> Option<Payload> {
    match event {
        SourceEvent::Open(fd) => Some(Payload::Handle(*fd)),
        SourceEvent::Data(bytes) => Some(Payload::Chunk(decoder.decode(bytes, encoding))),
        _ => None,
    }
}

/// Join chunks in arrival order after `content` into one block.
fn concat(mut content: BytesMut, chunks: Vec<Bytes>, encoding: Option<Encoding>) -> Chunk {
    content.reserve(chunks.iter().map(Bytes::len).sum());
    for chunk in &chunks {
        content.extend_from_slice(chunk);
    }
    Chunk::decode(content.freeze(), encoding)
}
