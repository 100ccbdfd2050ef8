//! Call Orchestrator (spec §4.1): owns one call's lifecycle end to end —
//! the model WebSocket, the carrier-facing outbound channel, the playback
//! tracker, and the barge-in debounce timer.
//!
//! Grounded on the teacher's per-node connection task (`nodes/ws.rs`'s
//! `handle_socket`): a construction step that does a handshake before any
//! message loop runs, then a single `tokio::select!` loop dispatching by
//! message source, with cleanup run exactly once on exit.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bridge_calls::{BargeInController, BargeInOutcome, PlaybackTracker};
use bridge_calls::EventLogSink;
use bridge_domain::call::{Call, CallPhase, TranscriptRole};
use bridge_domain::config::Config;
use bridge_domain::trace::TraceEvent;
use bridge_protocol::carrier::custom_param_keys;
use bridge_protocol::{CarrierInbound, CarrierOutbound, RealtimeInbound, RealtimeOutbound};
use bridge_reservations::ReservationStore;
use bridge_realtime_client::{
    await_session_ready, is_benign_error_code, is_budget_error_code, OutputItem, RealtimeClient,
    RealtimeErrorPayload, RealtimeInboundStream, ResponseDonePayload, SessionConfig, ToolDef,
    TurnDetection,
};
use bridge_tenant_config::{AssembledTenantConfig, FINALIZE_TOOL_NAME};

use crate::state::AppState;

/// `0.9 * greetingSentMs` — the fraction of the greeting that must be
/// confirmed played before the session advances to `normal` phase.
const GREETING_PLAYED_THRESHOLD: f64 = 0.9;

/// One in-progress call. Constructed by [`CallSession::start`] after the
/// carrier's `start` event and the model handshake both succeed; driven to
/// completion by [`CallSession::run`].
pub struct CallSession {
    state: AppState,
    stream_id: String,
    call_id: String,
    tenant_id: String,
    call: Arc<parking_lot::Mutex<Call>>,
    carrier_tx: mpsc::Sender<CarrierOutbound>,
    realtime: RealtimeClient,
    inbound: RealtimeInboundStream,
    playback: PlaybackTracker,
    barge_in: Arc<BargeInController>,
    barge_in_cancel: Option<CancellationToken>,
    barge_in_fire_tx: mpsc::Sender<()>,
    barge_in_fire_rx: mpsc::Receiver<()>,
    event_log: EventLogSink,
    assembled: AssembledTenantConfig,
    greeting_sent_ms: Option<u64>,
}

impl CallSession {
    /// Allocate the call, open the model socket and load the tenant config
    /// concurrently, then drive the greeting handshake through to the
    /// opening `response.create`. Returns `None` if either leg fails or the
    /// session-ready deadline passes — the caller tears down the carrier
    /// socket in that case.
    pub async fn start(
        state: AppState,
        stream_sid: String,
        call_sid: String,
        custom_parameters: std::collections::HashMap<String, String>,
        carrier_tx: mpsc::Sender<CarrierOutbound>,
    ) -> Option<Self> {
        let tenant_id = custom_parameters
            .get(custom_param_keys::TENANT_ID)
            .cloned()
            .unwrap_or_default();
        let caller_number = custom_parameters.get(custom_param_keys::CALLER_NUMBER).cloned();
        let callee_number = custom_parameters.get(custom_param_keys::CALLEE_NUMBER).cloned();
        let call_id = call_sid;

        let call = Call::new(
            stream_sid.clone(),
            call_id.clone(),
            tenant_id.clone(),
            caller_number,
            callee_number,
        );
        let call_handle = state.call_registry.register(stream_sid.clone(), call);

        let mut event_log = EventLogSink::new(&state.event_log_dir, &call_id);
        log_start(&mut event_log, &stream_sid, &call_id, &tenant_id).await;

        let endpoint = realtime_url(&state.config.realtime_model);
        let (connect_result, assembled) = tokio::join!(
            RealtimeClient::connect(&endpoint),
            state.tenant_config_loader.load(&tenant_id),
        );

        let (realtime, mut inbound) = match connect_result {
            Ok(pair) => pair,
            Err(err) => {
                tracing::error!(stream_id = %stream_sid, error = %err, "failed to connect realtime model socket");
                state.call_registry.remove(&stream_sid);
                let _ = event_log.close().await;
                return None;
            }
        };

        let session_config = build_session_config(&state.config, &assembled);
        if let Err(err) = realtime
            .send(RealtimeOutbound::session_update(session_config, false, false))
            .await
        {
            tracing::error!(stream_id = %stream_sid, error = %err, "failed to send greeting session.update");
            state.call_registry.remove(&stream_sid);
            let _ = event_log.close().await;
            return None;
        }
        log_event(
            &mut event_log,
            &TraceEvent::SessionUpdateSent {
                stream_id: stream_sid.clone(),
                call_id: call_id.clone(),
                phase: "greeting".to_string(),
            },
        )
        .await;

        let deadline = Duration::from_millis(state.config.realtime_model.session_ready_deadline_ms);
        if let Err(timeout_err) = await_session_ready(&mut inbound, deadline).await {
            log_event(
                &mut event_log,
                &TraceEvent::SessionUpdateTimeout {
                    stream_id: stream_sid.clone(),
                    call_id: call_id.clone(),
                },
            )
            .await;
            tracing::warn!(stream_id = %stream_sid, error = %timeout_err, "session-ready deadline exceeded");
            realtime.close();
            state.call_registry.remove(&stream_sid);
            let _ = event_log.close().await;
            return None;
        }
        log_event(
            &mut event_log,
            &TraceEvent::SessionUpdatedReceived {
                stream_id: stream_sid.clone(),
                call_id: call_id.clone(),
            },
        )
        .await;
        call_handle.lock().timing.session_ready = Some(Utc::now());

        let greeting_instructions = if assembled.greeting_message.is_empty() {
            None
        } else {
            Some(assembled.greeting_message.clone())
        };
        if let Err(err) = realtime.send(RealtimeOutbound::response_create(greeting_instructions)).await {
            tracing::warn!(stream_id = %stream_sid, error = %err, "failed to send greeting response.create");
        } else {
            log_event(
                &mut event_log,
                &TraceEvent::ResponseCreateSent {
                    stream_id: stream_sid.clone(),
                    call_id: call_id.clone(),
                    phase: "greeting".to_string(),
                },
            )
            .await;
        }

        let (barge_in_fire_tx, barge_in_fire_rx) = mpsc::channel(4);
        let barge_in = Arc::new(BargeInController::new(
            state.config.features.barge_in_debounce_ms,
            state.config.features.barge_in_min_remain_ms,
        ));

        Some(Self {
            state,
            stream_id: stream_sid,
            call_id,
            tenant_id,
            call: call_handle,
            carrier_tx,
            realtime,
            inbound,
            playback: PlaybackTracker::new(),
            barge_in,
            barge_in_cancel: None,
            barge_in_fire_tx,
            barge_in_fire_rx,
            event_log,
            assembled,
            greeting_sent_ms: None,
        })
    }

    /// Drive the call to completion: dispatch carrier events, model events,
    /// and barge-in debounce timers until the carrier says `stop`, either
    /// socket closes, or the carrier channel drops. Always tears down
    /// exactly once via [`Self::close`].
    pub async fn run(mut self, mut carrier_rx: mpsc::Receiver<CarrierInbound>) {
        loop {
            tokio::select! {
                msg = carrier_rx.recv() => {
                    self.state.call_registry.touch(&self.stream_id);
                    match msg {
                        Some(CarrierInbound::Media { media, .. }) => self.on_carrier_media(media.payload).await,
                        Some(CarrierInbound::Mark { mark, .. }) => self.on_carrier_mark(mark.name).await,
                        Some(CarrierInbound::Stop { .. }) => {
                            self.on_carrier_stop().await;
                            break;
                        }
                        Some(CarrierInbound::Connected) | Some(CarrierInbound::Start { .. }) => {}
                        None => break,
                    }
                }
                msg = self.inbound.recv() => {
                    self.state.call_registry.touch(&self.stream_id);
                    match msg {
                        Some(event) => {
                            if self.on_realtime_event(event).await {
                                break;
                            }
                        }
                        None => {
                            tracing::warn!(stream_id = %self.stream_id, "realtime socket closed mid-call");
                            break;
                        }
                    }
                }
                Some(()) = self.barge_in_fire_rx.recv() => {
                    self.barge_in_cancel = None;
                    self.confirm_barge_in().await;
                }
            }
        }
        self.close().await;
    }

    async fn on_carrier_media(&mut self, payload: String) {
        if self.state.config.debug.log_audio_accounting {
            if let Ok(n) = bridge_domain::codec::decoded_len(&payload) {
                tracing::debug!(stream_id = %self.stream_id, bytes = n, "carrier media frame");
            }
        }
        if let Err(err) = self
            .realtime
            .send(RealtimeOutbound::InputAudioBufferAppend { audio: payload })
            .await
        {
            tracing::warn!(stream_id = %self.stream_id, error = %err, "failed to forward carrier audio");
        }
    }

    async fn on_carrier_mark(&mut self, name: String) {
        if let Some(ack) = self.playback.ack_mark(&name) {
            if ack.advanced {
                self.maybe_advance_to_normal().await;
            }
        }
    }

    async fn maybe_advance_to_normal(&mut self) {
        let Some(greeting_sent_ms) = self.greeting_sent_ms else { return };
        if self.call.lock().phase != CallPhase::Greeting {
            return;
        }
        if (self.playback.played_ms() as f64) < GREETING_PLAYED_THRESHOLD * greeting_sent_ms as f64 {
            return;
        }

        self.call.lock().phase.advance_to_normal();
        let session_config = build_session_config(&self.state.config, &self.assembled);
        if let Err(err) = self
            .realtime
            .send(RealtimeOutbound::session_update(session_config, true, true))
            .await
        {
            tracing::warn!(stream_id = %self.stream_id, error = %err, "failed to send normal-phase session.update");
        }
        self.log_event(&TraceEvent::SessionUpdateSent {
            stream_id: self.stream_id.clone(),
            call_id: self.call_id.clone(),
            phase: "normal".to_string(),
        })
        .await;
    }

    /// Returns `true` when the call must end as a result of this event
    /// (a budget/billing error per §7 — the call select loop in `run`
    /// breaks in response).
    async fn on_realtime_event(&mut self, event: RealtimeInbound) -> bool {
        if self.state.config.debug.log_raw_frames {
            tracing::debug!(stream_id = %self.stream_id, frame = ?event, "raw realtime frame");
        }
        if let Some(delta) = event.audio_delta() {
            self.forward_audio_delta(delta.to_string()).await;
            return false;
        }

        match event {
            RealtimeInbound::SessionUpdated => {}
            RealtimeInbound::ResponseOutputItemAdded { item } => {
                if item.kind == "message" && item.role.as_deref() == Some("assistant") {
                    self.playback.reset_for_item(item.id);
                }
            }
            RealtimeInbound::ResponseDone { response } => self.on_response_done(response).await,
            RealtimeInbound::InputAudioTranscriptionCompleted { transcript } => {
                if !transcript.trim().is_empty() {
                    self.call.lock().push_transcript(TranscriptRole::User, transcript.clone());
                    self.log_event(&TraceEvent::UserUtterance {
                        stream_id: self.stream_id.clone(),
                        call_id: self.call_id.clone(),
                        text: transcript,
                    })
                    .await;
                }
            }
            RealtimeInbound::InputAudioBufferSpeechStarted => self.on_speech_started().await,
            RealtimeInbound::InputAudioBufferSpeechStopped => self.on_speech_stopped().await,
            RealtimeInbound::Error { error } => return self.on_realtime_error(error).await,
            RealtimeInbound::ResponseAudioDelta { .. } | RealtimeInbound::ResponseOutputAudioDelta { .. } => {
                unreachable!("handled by the audio_delta() fast path above")
            }
        }
        false
    }

    async fn forward_audio_delta(&mut self, delta: String) {
        self.call.lock().mark_first_audio();
        let decoded_len = match bridge_domain::codec::decoded_len(&delta) {
            Ok(n) => n as u64,
            Err(err) => {
                tracing::debug!(stream_id = %self.stream_id, error = %err, "dropping malformed audio delta");
                return;
            }
        };

        if self.carrier_tx.send(CarrierOutbound::media(&self.stream_id, delta)).await.is_err() {
            return;
        }
        if let Some(mark_name) = self.playback.account_delta(decoded_len) {
            if self.state.config.debug.log_audio_accounting {
                tracing::debug!(
                    stream_id = %self.stream_id,
                    sent_ms = self.playback.sent_ms(),
                    mark = %mark_name,
                    "assistant audio delta accounted"
                );
            }
            let _ = self.carrier_tx.send(CarrierOutbound::mark(&self.stream_id, mark_name)).await;
        }
    }

    async fn on_response_done(&mut self, response: ResponseDonePayload) {
        for item in response.output {
            match item {
                OutputItem::Message { role, content } if role == "assistant" => {
                    let text: String = content
                        .iter()
                        .filter_map(|part| part.text.clone().or_else(|| part.transcript.clone()))
                        .collect::<Vec<_>>()
                        .join("");
                    if !text.is_empty() {
                        self.call.lock().push_transcript(TranscriptRole::Assistant, text.clone());
                        self.log_event(&TraceEvent::AssistantResponse {
                            stream_id: self.stream_id.clone(),
                            call_id: self.call_id.clone(),
                            text,
                        })
                        .await;
                    }

                    let in_greeting = self.call.lock().phase == CallPhase::Greeting;
                    if in_greeting && self.greeting_sent_ms.is_none() {
                        self.greeting_sent_ms = Some(self.playback.sent_ms());
                    }
                }
                OutputItem::Message { .. } => {}
                OutputItem::FunctionCall { call_id, name, arguments } if name == FINALIZE_TOOL_NAME => {
                    self.handle_finalize(call_id, arguments).await;
                }
                OutputItem::FunctionCall { .. } => {}
            }
        }
    }

    async fn handle_finalize(&mut self, tool_call_id: String, arguments: String) {
        {
            let mut call = self.call.lock();
            if call.timing.reservation_called.is_none() {
                call.timing.reservation_called = Some(Utc::now());
            }
        }

        let outcome = self
            .state
            .finalizer
            .finalize(&self.tenant_id, &self.call_id, &self.assembled.fields, &arguments)
            .await;
        let ok = outcome.is_ok();
        if ok {
            self.call.lock().mark_reservation_committed();
        }

        let tool_result = outcome.to_tool_result();
        self.log_event(&TraceEvent::ToolCall {
            stream_id: self.stream_id.clone(),
            call_id: self.call_id.clone(),
            tool_name: FINALIZE_TOOL_NAME.to_string(),
            ok,
            arguments: arguments.clone(),
            result: tool_result.clone(),
        })
        .await;

        let result = tool_result.to_string();
        if let Err(err) = self
            .realtime
            .send(RealtimeOutbound::function_call_output(tool_call_id, result))
            .await
        {
            tracing::warn!(stream_id = %self.stream_id, error = %err, "failed to send function_call_output");
            return;
        }
        if let Err(err) = self.realtime.send(RealtimeOutbound::response_create(None)).await {
            tracing::warn!(stream_id = %self.stream_id, error = %err, "failed to trigger response.create after tool call");
        } else {
            self.log_event(&TraceEvent::ResponseCreateSent {
                stream_id: self.stream_id.clone(),
                call_id: self.call_id.clone(),
                phase: "tool_result".to_string(),
            })
            .await;
        }
    }

    async fn on_speech_started(&mut self) {
        let phase = self.call.lock().phase;
        let remaining_ms = self.playback.remaining_ms();

        match self.barge_in.evaluate(phase, remaining_ms) {
            BargeInOutcome::Ignored { reason } => {
                self.log_event(&TraceEvent::BargeInIgnored {
                    stream_id: self.stream_id.clone(),
                    call_id: self.call_id.clone(),
                    reason,
                })
                .await;
            }
            BargeInOutcome::Armed => {
                let cancel = CancellationToken::new();
                self.barge_in_cancel = Some(cancel.clone());
                let controller = self.barge_in.clone();
                let fire_tx = self.barge_in_fire_tx.clone();
                tokio::spawn(async move {
                    if matches!(controller.debounce(&cancel).await, BargeInOutcome::Confirmed) {
                        let _ = fire_tx.send(()).await;
                    }
                });
            }
            BargeInOutcome::Confirmed | BargeInOutcome::Cancelled { .. } => {
                unreachable!("evaluate() never returns Confirmed/Cancelled")
            }
        }
    }

    async fn on_speech_stopped(&mut self) {
        if let Some(cancel) = self.barge_in_cancel.take() {
            cancel.cancel();
            self.log_event(&TraceEvent::BargeInCancelled {
                stream_id: self.stream_id.clone(),
                call_id: self.call_id.clone(),
                reason: "speech_stopped_before_debounce".to_string(),
            })
            .await;
        }
    }

    async fn confirm_barge_in(&mut self) {
        let played_ms = self.playback.played_ms();
        self.playback.begin_clearing();
        let _ = self.carrier_tx.send(CarrierOutbound::clear(&self.stream_id)).await;
        if let Some(item_id) = self.playback.assistant_item_id().map(str::to_string) {
            let _ = self.realtime.send(RealtimeOutbound::truncate(item_id, played_ms)).await;
        }
        self.log_event(&TraceEvent::BargeInConfirmed {
            stream_id: self.stream_id.clone(),
            call_id: self.call_id.clone(),
            played_ms,
        })
        .await;
    }

    /// Returns `true` when the error is budget/billing-class and the call
    /// must end (§7: "escalated with distinct log markers; call ends").
    async fn on_realtime_error(&mut self, error: RealtimeErrorPayload) -> bool {
        if is_benign_error_code(error.code.as_deref()) {
            tracing::debug!(stream_id = %self.stream_id, code = ?error.code, "benign realtime error");
            return false;
        }
        if is_budget_error_code(error.code.as_deref()) {
            let err = bridge_domain::error::Error::Budget(error.message.clone());
            tracing::error!(stream_id = %self.stream_id, code = ?error.code, error = %err, "budget realtime error, ending call");
            self.log_event(&TraceEvent::RealtimeError {
                stream_id: self.stream_id.clone(),
                call_id: self.call_id.clone(),
                message: error.message,
            })
            .await;
            return true;
        }
        tracing::warn!(stream_id = %self.stream_id, code = ?error.code, message = %error.message, "realtime error");
        self.log_event(&TraceEvent::RealtimeError {
            stream_id: self.stream_id.clone(),
            call_id: self.call_id.clone(),
            message: error.message,
        })
        .await;
        false
    }

    async fn on_carrier_stop(&mut self) {
        self.log_event(&TraceEvent::Stop {
            stream_id: self.stream_id.clone(),
            call_id: self.call_id.clone(),
        })
        .await;
    }

    async fn log_event(&mut self, event: &TraceEvent) {
        log_event(&mut self.event_log, event).await;
    }

    /// Graceful shutdown (spec §5): cancel the barge-in timer, close the
    /// model socket, link the reservation to this call's log (or flag
    /// `reservation_not_created`), close the log, release the registry slot.
    async fn close(mut self) {
        if let Some(cancel) = self.barge_in_cancel.take() {
            cancel.cancel();
        }
        self.realtime.close();

        let (committed, started_at, timing) = {
            let call = self.call.lock();
            (call.reservation_committed, call.started_at, call.timing.clone())
        };
        if committed {
            if let Err(err) = self.state.reservation_store.attach_call_log(&self.call_id, &self.call_id).await {
                tracing::warn!(call_id = %self.call_id, error = %err, "failed to attach call log to reservation");
            }
        } else {
            self.log_event(&TraceEvent::ReservationNotCreated {
                stream_id: self.stream_id.clone(),
                call_id: self.call_id.clone(),
            })
            .await;
        }

        self.log_event(&TraceEvent::TimingSummary {
            stream_id: self.stream_id.clone(),
            call_id: self.call_id.clone(),
            session_ready_ms: ms_since(started_at, timing.session_ready),
            first_audio_ms: ms_since(started_at, timing.first_audio),
            first_text_ms: ms_since(started_at, timing.first_text),
            reservation_called_ms: ms_since(started_at, timing.reservation_called),
            reservation_committed_ms: ms_since(started_at, timing.reservation_committed),
        })
        .await;

        let _ = self.event_log.close().await;
        self.state.call_registry.remove(&self.stream_id);
    }
}

/// Milliseconds from `started_at` to `checkpoint`, for the `timing_summary` log record.
fn ms_since(started_at: chrono::DateTime<Utc>, checkpoint: Option<chrono::DateTime<Utc>>) -> Option<i64> {
    checkpoint.map(|t| (t - started_at).num_milliseconds())
}

fn realtime_url(config: &bridge_domain::config::RealtimeModelConfig) -> String {
    if config.endpoint_url.contains('?') {
        format!("{}&model={}", config.endpoint_url, config.model)
    } else {
        format!("{}?model={}", config.endpoint_url, config.model)
    }
}

fn build_session_config(config: &Config, assembled: &AssembledTenantConfig) -> SessionConfig {
    SessionConfig {
        instructions: assembled.instructions.clone(),
        turn_detection: TurnDetection::server_vad(config.features.vad_silence_ms, config.features.vad_threshold),
        input_audio_format: "g711_ulaw".to_string(),
        output_audio_format: "g711_ulaw".to_string(),
        voice: config.realtime_model.voice.clone(),
        tools: vec![ToolDef {
            kind: "function".to_string(),
            name: FINALIZE_TOOL_NAME.to_string(),
            description: assembled.tool_description.clone(),
            parameters: assembled.tool_parameters.clone(),
        }],
        tool_choice: "auto".to_string(),
    }
}

fn with_timestamp(event: &TraceEvent) -> Value {
    let mut value = serde_json::to_value(event).unwrap_or(Value::Null);
    if let Value::Object(ref mut obj) = value {
        obj.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
    }
    value
}

async fn log_event(sink: &mut EventLogSink, event: &TraceEvent) {
    event.emit();
    if let Err(err) = sink.write_line(&with_timestamp(event)).await {
        tracing::warn!(error = %err, "event log write failed");
    }
}

async fn log_start(sink: &mut EventLogSink, stream_id: &str, call_id: &str, tenant_id: &str) {
    log_event(
        sink,
        &TraceEvent::Start {
            stream_id: stream_id.to_string(),
            call_id: call_id.to_string(),
            tenant_id: tenant_id.to_string(),
        },
    )
    .await;
}
