//! Duplex session driver: runs one utterance over an established
//! transport.
//!
//! The driver owns the whole streaming lifecycle: it acquires a valid
//! session, opens the logical task and the utterance session, streams
//! tagged audio frames from a sender task while classifying inbound
//! messages on the receive side, and forwards typed events to the
//! consumer until a terminal event, an error, or cancellation ends the
//! run.
//!
//! Sessions are never swapped mid-utterance. When the server reports an
//! expired ticket the run ends and the caller decides whether to
//! re-handshake and restart the utterance from its first frame.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wave::framer::tag_chunks;
use wave::{classify_raw, is_session_expired, wire, Envelope, ResponseEvent, Session};

use crate::error::{AsrError, Result};
use crate::transport::{TransportSink, TransportStream};
use crate::wave_client::SessionProvider;

/// Driver lifecycle states, in normal order of progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Nothing in flight.
    Idle,
    /// Acquiring a valid session.
    Handshaking,
    /// Audio frames in flight.
    Streaming,
    /// All audio sent; waiting for remaining results.
    Draining,
    /// Run ended cleanly.
    Closed,
    /// Run ended on an error.
    Errored,
}

/// Tuning knobs for one utterance run.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Pace frames at `frame_duration` intervals instead of sending as
    /// fast as the transport accepts.
    pub realtime: bool,
    /// Nominal duration of one audio frame.
    pub frame_duration: Duration,
    /// Deadline for each inbound message.
    pub recv_timeout: Duration,
    /// Swallow an expired-ticket error event instead of forwarding it,
    /// so the caller can re-handshake and restart the utterance. Set on
    /// the first attempt only.
    pub swallow_expired: bool,
}

/// Everything needed to stream one utterance.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Correlation id, stable for the whole utterance.
    pub request_id: String,
    /// Bearer token carried on lifecycle messages.
    pub token: String,
    /// JSON session config sent on `StartSession`.
    pub session_config_json: String,
    /// Encoded audio chunks, one frame each.
    pub chunks: Vec<Vec<u8>>,
}

impl Utterance {
    /// Creates an utterance with a fresh correlation id.
    pub fn new(token: impl Into<String>, session_config_json: String, chunks: Vec<Vec<u8>>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            token: token.into(),
            session_config_json,
            chunks,
        }
    }
}

/// How one utterance run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceOutcome {
    /// `SessionFinished` received; the event sequence is complete.
    Finished,
    /// A terminal error event ended the run.
    Failed {
        /// Whether the failure was an expired session ticket, which the
        /// caller may recover from with one re-handshake.
        session_expired: bool,
    },
    /// The caller cancelled or stopped consuming events.
    Cancelled,
}

enum SenderEnd {
    Done,
    Cancelled,
}

enum Inbound {
    Event(ResponseEvent),
    Closed,
    Cancelled,
}

enum Expecting {
    TaskStarted,
    SessionStarted,
}

/// Runs one utterance to completion over the given transport halves.
///
/// Events are forwarded in arrival order. The run ends with
/// [`UtteranceOutcome::Finished`] on `SessionFinished`, with
/// [`UtteranceOutcome::Failed`] after a terminal error event, or with
/// [`UtteranceOutcome::Cancelled`] when `cancel` fires or the consumer
/// drops the event receiver. Transport and protocol failures return
/// `Err`; the caller is responsible for surfacing those as a terminal
/// error event.
pub async fn run_utterance(
    provider: &dyn SessionProvider,
    mut sink: Box<dyn TransportSink>,
    mut stream: Box<dyn TransportStream>,
    utterance: Utterance,
    options: &DriverOptions,
    events: &mpsc::Sender<ResponseEvent>,
    cancel: &CancellationToken,
) -> Result<UtteranceOutcome> {
    let mut state = DriverState::Idle;
    transition(&mut state, DriverState::Handshaking);
    let session = provider.ensure_session().await?;

    // Open the logical task, then the utterance session, before any
    // audio moves.
    let start = wire::start_task(&utterance.request_id, &utterance.token);
    send_sealed(sink.as_mut(), &session, &start).await?;
    if let Some(outcome) = await_lifecycle(
        stream.as_mut(),
        &session,
        options,
        events,
        cancel,
        Expecting::TaskStarted,
    )
    .await?
    {
        transition(&mut state, closing_state(&outcome));
        return Ok(outcome);
    }

    let open = wire::start_session(
        &utterance.request_id,
        &utterance.token,
        utterance.session_config_json.clone(),
    );
    send_sealed(sink.as_mut(), &session, &open).await?;
    if let Some(outcome) = await_lifecycle(
        stream.as_mut(),
        &session,
        options,
        events,
        cancel,
        Expecting::SessionStarted,
    )
    .await?
    {
        transition(&mut state, closing_state(&outcome));
        return Ok(outcome);
    }

    transition(&mut state, DriverState::Streaming);

    let utterance_cancel = cancel.child_token();
    let mut sender = spawn_sender(
        sink,
        session.clone(),
        utterance.request_id.clone(),
        utterance.token.clone(),
        utterance.chunks.clone(),
        options.realtime,
        options.frame_duration,
        utterance_cancel.clone(),
    );
    let mut sender_done = false;

    let outcome: Result<UtteranceOutcome> = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break Ok(UtteranceOutcome::Cancelled),

            join = &mut sender, if !sender_done => {
                sender_done = true;
                match join {
                    Ok(Ok(SenderEnd::Done)) => transition(&mut state, DriverState::Draining),
                    Ok(Ok(SenderEnd::Cancelled)) => break Ok(UtteranceOutcome::Cancelled),
                    Ok(Err(e)) => break Err(e),
                    Err(e) => break Err(AsrError::Transport(format!("sender task failed: {e}"))),
                }
            }

            received = tokio::time::timeout(options.recv_timeout, stream.recv()) => {
                let data = match received {
                    Err(_) => break Err(AsrError::Timeout("response stream".to_string())),
                    Ok(Err(e)) => break Err(e),
                    Ok(Ok(None)) => break Err(AsrError::Transport(
                        "connection closed before session finished".to_string(),
                    )),
                    Ok(Ok(Some(data))) => data,
                };

                let envelope = match Envelope::decode(&data) {
                    Ok(envelope) => envelope,
                    Err(e) => break Err(e.into()),
                };
                let plaintext = match session.open_envelope(&envelope) {
                    Ok(plaintext) => plaintext,
                    Err(e) => break Err(e.into()),
                };
                let event = classify_raw(&plaintext);

                if event.is_error() {
                    let expired = is_session_expired(event.meta().status_code);
                    if expired && options.swallow_expired {
                        debug!("session ticket expired mid-utterance");
                        break Ok(UtteranceOutcome::Failed { session_expired: true });
                    }
                    warn!(
                        status = event.meta().status_code,
                        message = %event.meta().status_message,
                        "server error event",
                    );
                    let _ = events.send(event).await;
                    break Ok(UtteranceOutcome::Failed { session_expired: expired });
                }

                let finished = matches!(event, ResponseEvent::SessionFinished(_));
                if !forward(events, event).await {
                    break Ok(UtteranceOutcome::Cancelled);
                }
                if finished {
                    break Ok(UtteranceOutcome::Finished);
                }
            }
        }
    };

    utterance_cancel.cancel();
    if !sender_done {
        sender.abort();
    }

    match &outcome {
        Ok(UtteranceOutcome::Finished) | Ok(UtteranceOutcome::Cancelled) => {
            transition(&mut state, DriverState::Closed);
        }
        _ => transition(&mut state, DriverState::Errored),
    }

    outcome
}

fn closing_state(outcome: &UtteranceOutcome) -> DriverState {
    match outcome {
        UtteranceOutcome::Cancelled => DriverState::Closed,
        _ => DriverState::Errored,
    }
}

fn transition(state: &mut DriverState, next: DriverState) {
    debug!(from = ?state, to = ?next, "driver state");
    *state = next;
}

async fn send_sealed(
    sink: &mut dyn TransportSink,
    session: &Session,
    message: &wire::AsrRequest,
) -> Result<()> {
    let envelope = session.encrypt_request(&message.encode_to_bytes())?;
    sink.send(envelope.encode()).await
}

async fn forward(events: &mpsc::Sender<ResponseEvent>, event: ResponseEvent) -> bool {
    events.send(event).await.is_ok()
}

async fn recv_one(
    stream: &mut dyn TransportStream,
    session: &Session,
    recv_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Inbound> {
    let received = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(Inbound::Cancelled),
        received = tokio::time::timeout(recv_timeout, stream.recv()) => received,
    };

    let data = match received {
        Err(_) => return Err(AsrError::Timeout("response stream".to_string())),
        Ok(Err(e)) => return Err(e),
        Ok(Ok(None)) => return Ok(Inbound::Closed),
        Ok(Ok(Some(data))) => data,
    };

    let envelope = Envelope::decode(&data)?;
    let plaintext = session.open_envelope(&envelope)?;
    Ok(Inbound::Event(classify_raw(&plaintext)))
}

/// Waits for a lifecycle acknowledgement during session setup,
/// forwarding every event on the way.
async fn await_lifecycle(
    stream: &mut dyn TransportStream,
    session: &Session,
    options: &DriverOptions,
    events: &mpsc::Sender<ResponseEvent>,
    cancel: &CancellationToken,
    expecting: Expecting,
) -> Result<Option<UtteranceOutcome>> {
    loop {
        match recv_one(stream, session, options.recv_timeout, cancel).await? {
            Inbound::Cancelled => return Ok(Some(UtteranceOutcome::Cancelled)),
            Inbound::Closed => {
                return Err(AsrError::Transport(
                    "connection closed during session setup".to_string(),
                ))
            }
            Inbound::Event(event) => {
                if event.is_error() {
                    let expired = is_session_expired(event.meta().status_code);
                    if expired && options.swallow_expired {
                        debug!("session ticket expired during setup");
                        return Ok(Some(UtteranceOutcome::Failed {
                            session_expired: true,
                        }));
                    }
                    let _ = events.send(event).await;
                    return Ok(Some(UtteranceOutcome::Failed {
                        session_expired: expired,
                    }));
                }

                let matched = matches!(
                    (&expecting, &event),
                    (Expecting::TaskStarted, ResponseEvent::TaskStarted(_))
                        | (Expecting::SessionStarted, ResponseEvent::SessionStarted(_))
                );
                if !forward(events, event).await {
                    return Ok(Some(UtteranceOutcome::Cancelled));
                }
                if matched {
                    return Ok(None);
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_sender(
    mut sink: Box<dyn TransportSink>,
    session: Arc<Session>,
    request_id: String,
    token: String,
    chunks: Vec<Vec<u8>>,
    realtime: bool,
    frame_duration: Duration,
    cancel: CancellationToken,
) -> JoinHandle<Result<SenderEnd>> {
    tokio::spawn(async move {
        let frame_ms = frame_duration.as_millis() as u64;
        let mut timestamp_ms = unix_now_ms();

        for frame in tag_chunks(request_id.clone(), chunks) {
            if cancel.is_cancelled() {
                return Ok(SenderEnd::Cancelled);
            }

            let message =
                wire::task_request(&frame.request_id, frame.payload, frame.state, timestamp_ms);
            send_sealed(sink.as_mut(), &session, &message).await?;
            timestamp_ms += frame_ms;

            if realtime {
                tokio::select! {
                    _ = tokio::time::sleep(frame_duration) => {}
                    _ = cancel.cancelled() => return Ok(SenderEnd::Cancelled),
                }
            }
        }

        let finish = wire::finish_session(&request_id, &token);
        send_sealed(sink.as_mut(), &session, &finish).await?;
        debug!("all frames sent");
        Ok(SenderEnd::Done)
    })
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wave::wire::{AsrRequest, AsrResponse, FrameState};
    use wave::SERVICE_ASR;

    const KEY: [u8; 32] = [3u8; 32];

    fn session() -> Arc<Session> {
        Arc::new(Session {
            key: KEY,
            ticket: "t".to_string(),
            ticket_long: "tl".to_string(),
            ticket_exp: 3600,
            ticket_long_exp: 86400,
            cipher_suite: 4097,
            expires_at: u64::MAX,
        })
    }

    struct StaticProvider {
        session: Arc<Session>,
        calls: Arc<AtomicUsize>,
    }

    impl SessionProvider for StaticProvider {
        fn ensure_session(
            &self,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<Arc<Session>>> + Send + '_>,
        > {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let session = self.session.clone();
            Box::pin(async move { Ok(session) })
        }

        fn invalidate(
            &self,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
            Box::pin(async {})
        }
    }

    struct ChannelSink {
        tx: mpsc::UnboundedSender<Vec<u8>>,
    }

    impl TransportSink for ChannelSink {
        fn send(
            &mut self,
            data: Vec<u8>,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> {
            let result = self
                .tx
                .send(data)
                .map_err(|_| AsrError::Transport("peer gone".to_string()));
            Box::pin(async move { result })
        }

        fn close(
            &mut self,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
    }

    struct ChannelStream {
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    }

    impl TransportStream for ChannelStream {
        fn recv(
            &mut self,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<Option<Vec<u8>>>> + Send + '_>,
        > {
            Box::pin(async move { Ok(self.rx.recv().await) })
        }
    }

    fn sealed_response(
        session: &Session,
        request_id: &str,
        message_type: &str,
        status_code: i32,
        result_json: &str,
    ) -> Vec<u8> {
        let message = AsrResponse {
            request_id: request_id.to_string(),
            task_id: "task-1".to_string(),
            service_name: SERVICE_ASR.to_string(),
            message_type: message_type.to_string(),
            status_code,
            status_message: String::new(),
            result_json: result_json.to_string(),
            opaque: 0,
        };
        session
            .encrypt_request(&message.encode_to_bytes())
            .unwrap()
            .encode()
    }

    /// Script entry: what to answer once the named method arrives.
    type Script = Vec<(&'static str, Vec<(&'static str, i32, &'static str)>)>;

    /// Runs a scripted peer over in-memory channels. Returns the
    /// transport halves for the driver plus a log of (method,
    /// frame_state) pairs the peer received.
    fn scripted_peer(
        session: Arc<Session>,
        script: Script,
    ) -> (
        Box<dyn TransportSink>,
        Box<dyn TransportStream>,
        Arc<std::sync::Mutex<Vec<(String, i32)>>>,
    ) {
        let (client_tx, mut peer_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (peer_tx, client_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = received.clone();

        tokio::spawn(async move {
            while let Some(data) = peer_rx.recv().await {
                let envelope = Envelope::decode(&data).unwrap();
                let plaintext = session.open_envelope(&envelope).unwrap();
                let request = AsrRequest::decode_bytes(&plaintext).unwrap();

                log.lock()
                    .unwrap()
                    .push((request.method_name.clone(), request.frame_state));

                for (method, responses) in &script {
                    if *method == request.method_name {
                        for (message_type, status, result_json) in responses {
                            let _ = peer_tx.send(sealed_response(
                                &session,
                                &request.request_id,
                                message_type,
                                *status,
                                result_json,
                            ));
                        }
                    }
                }
            }
        });

        (
            Box::new(ChannelSink { tx: client_tx }),
            Box::new(ChannelStream { rx: client_rx }),
            received,
        )
    }

    fn options() -> DriverOptions {
        DriverOptions {
            realtime: false,
            frame_duration: Duration::from_millis(20),
            recv_timeout: Duration::from_secs(2),
            swallow_expired: false,
        }
    }

    fn utterance(chunks: Vec<Vec<u8>>) -> Utterance {
        Utterance::new("tok", "{}".to_string(), chunks)
    }

    fn happy_script() -> Script {
        vec![
            ("StartTask", vec![("TaskStarted", 0, "")]),
            ("StartSession", vec![("SessionStarted", 0, "")]),
            (
                "FinishSession",
                vec![
                    ("InterimResult", 0, r#"{"results":[{"text":"he"}]}"#),
                    ("InterimResult", 0, r#"{"results":[{"text":"hell"}]}"#),
                    (
                        "FinalResult",
                        0,
                        r#"{"results":[{"text":"hello","is_vad_finished":true}]}"#,
                    ),
                    ("SessionFinished", 0, ""),
                ],
            ),
        ]
    }

    async fn collect(mut rx: mpsc::Receiver<ResponseEvent>) -> Vec<ResponseEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_full_utterance_event_order() {
        let session = session();
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = StaticProvider {
            session: session.clone(),
            calls: calls.clone(),
        };
        let (sink, stream, received) = scripted_peer(session, happy_script());
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let outcome = run_utterance(
            &provider,
            sink,
            stream,
            utterance(vec![vec![1], vec![2], vec![3]]),
            &options(),
            &tx,
            &cancel,
        )
        .await
        .unwrap();
        drop(tx);

        assert_eq!(outcome, UtteranceOutcome::Finished);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let events = collect(rx).await;
        assert!(matches!(events[0], ResponseEvent::TaskStarted(_)));
        assert!(matches!(events[1], ResponseEvent::SessionStarted(_)));
        assert!(matches!(events[2], ResponseEvent::InterimResult { .. }));
        assert!(matches!(events[3], ResponseEvent::InterimResult { .. }));
        assert!(matches!(events[4], ResponseEvent::FinalResult { .. }));
        assert!(matches!(events[5], ResponseEvent::SessionFinished(_)));
        assert_eq!(events.len(), 6);

        // Send side: lifecycle bracket around FIRST/MIDDLE/LAST frames.
        let sent = received.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                ("StartTask".to_string(), FrameState::Unspecified as i32),
                ("StartSession".to_string(), FrameState::Unspecified as i32),
                ("TaskRequest".to_string(), FrameState::First as i32),
                ("TaskRequest".to_string(), FrameState::Middle as i32),
                ("TaskRequest".to_string(), FrameState::Last as i32),
                ("FinishSession".to_string(), FrameState::Unspecified as i32),
            ]
        );
    }

    #[tokio::test]
    async fn test_single_chunk_sends_last_only() {
        let session = session();
        let provider = StaticProvider {
            session: session.clone(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let (sink, stream, received) = scripted_peer(session, happy_script());
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let outcome = run_utterance(
            &provider,
            sink,
            stream,
            utterance(vec![vec![1]]),
            &options(),
            &tx,
            &cancel,
        )
        .await
        .unwrap();
        drop(tx);
        let _ = collect(rx).await;

        assert_eq!(outcome, UtteranceOutcome::Finished);
        let sent = received.lock().unwrap().clone();
        let frames: Vec<i32> = sent
            .iter()
            .filter(|(m, _)| m == "TaskRequest")
            .map(|(_, s)| *s)
            .collect();
        assert_eq!(frames, vec![FrameState::Last as i32]);
    }

    #[tokio::test]
    async fn test_server_error_is_terminal() {
        let session = session();
        let provider = StaticProvider {
            session: session.clone(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let script = vec![
            ("StartTask", vec![("TaskStarted", 0, "")]),
            ("StartSession", vec![("SessionStarted", 0, "")]),
            ("FinishSession", vec![("FinalResult", 1005, "")]),
        ];
        let (sink, stream, _) = scripted_peer(session, script);
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let outcome = run_utterance(
            &provider,
            sink,
            stream,
            utterance(vec![vec![1]]),
            &options(),
            &tx,
            &cancel,
        )
        .await
        .unwrap();
        drop(tx);

        assert_eq!(
            outcome,
            UtteranceOutcome::Failed {
                session_expired: false
            }
        );

        let events = collect(rx).await;
        let last = events.last().unwrap();
        assert!(last.is_error());
        assert_eq!(last.meta().status_code, 1005);
    }

    #[tokio::test]
    async fn test_expired_ticket_swallowed_for_retry() {
        let session = session();
        let provider = StaticProvider {
            session: session.clone(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let script = vec![("StartTask", vec![("TaskStarted", 4001, "")])];
        let (sink, stream, _) = scripted_peer(session, script);
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let mut opts = options();
        opts.swallow_expired = true;

        let outcome = run_utterance(
            &provider,
            sink,
            stream,
            utterance(vec![vec![1]]),
            &opts,
            &tx,
            &cancel,
        )
        .await
        .unwrap();
        drop(tx);

        assert_eq!(
            outcome,
            UtteranceOutcome::Failed {
                session_expired: true
            }
        );
        // The expired-ticket error is not forwarded; the caller retries.
        assert!(collect(rx).await.is_empty());
    }

    #[tokio::test]
    async fn test_expired_ticket_forwarded_without_swallow() {
        let session = session();
        let provider = StaticProvider {
            session: session.clone(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let script = vec![("StartTask", vec![("TaskStarted", 4001, "")])];
        let (sink, stream, _) = scripted_peer(session, script);
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let outcome = run_utterance(
            &provider,
            sink,
            stream,
            utterance(vec![vec![1]]),
            &options(),
            &tx,
            &cancel,
        )
        .await
        .unwrap();
        drop(tx);

        assert_eq!(
            outcome,
            UtteranceOutcome::Failed {
                session_expired: true
            }
        );
        let events = collect(rx).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_error());
    }

    #[tokio::test]
    async fn test_cancellation_ends_run() {
        let session = session();
        let provider = StaticProvider {
            session: session.clone(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        // Peer never answers StartTask, so the driver sits in setup
        // until cancelled.
        let (sink, stream, _) = scripted_peer(session, vec![]);
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = run_utterance(
            &provider,
            sink,
            stream,
            utterance(vec![vec![1]]),
            &options(),
            &tx,
            &cancel,
        )
        .await
        .unwrap();

        assert_eq!(outcome, UtteranceOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_recv_timeout_is_error() {
        let session = session();
        let provider = StaticProvider {
            session: session.clone(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let (sink, stream, _) = scripted_peer(session, vec![]);
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let mut opts = options();
        opts.recv_timeout = Duration::from_millis(50);

        let result = run_utterance(
            &provider,
            sink,
            stream,
            utterance(vec![vec![1]]),
            &opts,
            &tx,
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(AsrError::Timeout(_))));
    }
}
