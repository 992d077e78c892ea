//! The streaming chat session.
//!
//! A [`ChatSession`] owns the transcript. `submit` appends the user's
//! message, posts the whole conversation to the endpoint and then folds the
//! streamed deltas into a trailing assistant message, publishing a fresh
//! [`SessionSnapshot`] after every change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{LineParseError, SubmitError, TransportError};
use crate::sse::{parse_line, SseDecoder, StreamEvent};
use crate::state::{ChatMessage, ChatRole, GenerationSettings, SessionSnapshot, Transcript};
use crate::transport::{ByteStream, ChatRequest, HttpTransport, Transport};

/// Shown as the assistant reply when the endpoint cannot be reached.
pub const APOLOGY_TEXT: &str = "Sorry, an error occurred. Please try again.";

/// Callbacks fired synchronously, in publication order.
pub trait SessionObserver: Send + Sync {
    fn on_transcript_change(&self, _transcript: &Transcript) {}

    fn on_loading_change(&self, _loading: bool) {}

    /// A single stream line was skipped because its payload was not JSON.
    fn on_line_error(&self, _error: &LineParseError) {}
}

/// How a submitted turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply finished. `sentinel` is false when the body simply ended.
    Completed { sentinel: bool },
    /// The endpoint failed; the apology message has been published.
    Failed(TransportError),
    /// The session was closed while the turn was running.
    Cancelled,
}

enum Step {
    Continue,
    Sentinel,
    Cancelled,
}

#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    state: watch::Sender<SessionSnapshot>,
    observers: RwLock<Vec<Arc<dyn SessionObserver>>>,
    in_flight: AtomicBool,
    cancel: CancellationToken,
}

/// Clears the in-flight flag on every exit path of `submit`.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ChatSession {
    pub fn new(transport: impl Transport + 'static) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                transport: Arc::new(transport),
                state,
                observers: RwLock::new(Vec::new()),
                in_flight: AtomicBool::new(false),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Session talking to the endpoint over plain HTTP.
    pub fn http() -> Self {
        Self::new(HttpTransport::new())
    }

    pub fn with_observer(self, observer: Arc<dyn SessionObserver>) -> Self {
        self.add_observer(observer);
        self
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.inner
            .observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(observer);
    }

    /// Receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn transcript(&self) -> Transcript {
        self.inner.state.borrow().transcript.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Tear the session down. A running turn stops at its next await point
    /// and nothing is published afterwards.
    pub fn close(&self) {
        if !self.inner.cancel.is_cancelled() {
            tracing::info!("closing chat session");
            self.inner.cancel.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Send `user_text` and stream the reply into the transcript.
    ///
    /// Rejected calls leave the transcript untouched. Transport failures are
    /// recovered here (the apology message is published) and reported through
    /// [`TurnOutcome::Failed`].
    pub async fn submit(
        &self,
        user_text: &str,
        settings: &GenerationSettings,
        endpoint: &str,
    ) -> Result<TurnOutcome, SubmitError> {
        if user_text.trim().is_empty() {
            return Err(SubmitError::EmptyMessage);
        }
        if self.is_closed() {
            return Err(SubmitError::Closed);
        }
        let _guard = self.inner.begin_turn().ok_or(SubmitError::Busy)?;

        let transcript = self.transcript().push(ChatMessage::user(user_text));
        self.inner.publish(&transcript, true);

        let request = ChatRequest::streaming(transcript.iter(), settings);
        tracing::info!(
            endpoint,
            model = %settings.model,
            messages = request.messages.len(),
            "sending chat request"
        );

        let opened = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => {
                tracing::debug!("session closed before the response arrived");
                return Ok(TurnOutcome::Cancelled);
            }
            opened = self.inner.transport.open(endpoint, &request) => opened,
        };

        let body = match opened {
            Ok(body) => body,
            Err(e) => return Ok(self.inner.fail(&transcript, e)),
        };

        let transcript = transcript.push(ChatMessage::assistant(""));
        if !self.inner.publish(&transcript, true) {
            return Ok(TurnOutcome::Cancelled);
        }

        Ok(self.inner.stream_reply(body, transcript).await)
    }
}

impl Inner {
    fn begin_turn(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(&self.in_flight))
    }

    fn observers(&self) -> Vec<Arc<dyn SessionObserver>> {
        self.observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the published snapshot. Returns false once the session is closed.
    fn publish(&self, transcript: &Transcript, loading: bool) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let previous = self.state.send_replace(SessionSnapshot {
            transcript: transcript.clone(),
            loading,
        });

        let transcript_changed = !previous.transcript.same_snapshot(transcript);
        let loading_changed = previous.loading != loading;
        if transcript_changed || loading_changed {
            for observer in self.observers() {
                if transcript_changed {
                    observer.on_transcript_change(transcript);
                }
                if loading_changed {
                    observer.on_loading_change(loading);
                }
            }
        }
        true
    }

    fn report_line_error(&self, error: &LineParseError) {
        tracing::warn!(%error, "skipping malformed stream line");
        for observer in self.observers() {
            observer.on_line_error(error);
        }
    }

    async fn stream_reply(&self, mut body: ByteStream, mut transcript: Transcript) -> TurnOutcome {
        let mut decoder = SseDecoder::new();
        let mut content = String::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!("session closed mid-stream");
                    return TurnOutcome::Cancelled;
                }
                next = body.next() => next,
            };

            let (lines, at_end) = match next {
                Some(Ok(chunk)) => (decoder.feed(&chunk), false),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "response stream broke");
                    return self.fail(&transcript, e);
                }
                None => (decoder.finish(), true),
            };

            match self.apply_lines(&lines, &mut content, &mut transcript) {
                Step::Continue => {}
                Step::Sentinel => {
                    tracing::debug!(chars = content.len(), "stream finished with sentinel");
                    return self.complete(&transcript, true);
                }
                Step::Cancelled => return TurnOutcome::Cancelled,
            }

            if at_end {
                tracing::debug!(chars = content.len(), "stream ended without sentinel");
                return self.complete(&transcript, false);
            }
        }
    }

    fn apply_lines(&self, lines: &[String], content: &mut String, transcript: &mut Transcript) -> Step {
        for line in lines {
            match parse_line(line) {
                Ok(Some(StreamEvent::Done)) => return Step::Sentinel,
                Ok(Some(StreamEvent::Delta(fragment))) => {
                    content.push_str(&fragment);
                    *transcript = transcript.replace_last(ChatMessage::assistant(content.as_str()));
                    if !self.publish(transcript, true) {
                        return Step::Cancelled;
                    }
                }
                Ok(None) => {}
                Err(e) => self.report_line_error(&e),
            }
        }
        Step::Continue
    }

    fn complete(&self, transcript: &Transcript, sentinel: bool) -> TurnOutcome {
        if self.publish(transcript, false) {
            TurnOutcome::Completed { sentinel }
        } else {
            TurnOutcome::Cancelled
        }
    }

    fn fail(&self, transcript: &Transcript, error: TransportError) -> TurnOutcome {
        tracing::error!(%error, "chat request failed");

        let apology = ChatMessage::assistant(APOLOGY_TEXT);
        let recovered = match transcript.last() {
            // An untouched placeholder gives way to the apology.
            Some(last) if last.role == ChatRole::Assistant && last.content.is_empty() => {
                transcript.replace_last(apology)
            }
            _ => transcript.push(apology),
        };

        if self.publish(&recovered, false) {
            TurnOutcome::Failed(error)
        } else {
            TurnOutcome::Cancelled
        }
    }
}
