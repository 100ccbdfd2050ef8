//! Realtime model channel client — owns the WebSocket to the model,
//! dispatching outbound `session.update`/`response.create`/audio-append/
//! truncate/tool-result frames and inbound events.
//!
//! Grounded on the teacher's outbound node client
//! (`crates/node-sdk/src/client.rs`): a writer task drains an `mpsc`
//! outbound queue into the socket sink, a reader task dispatches inbound
//! frames, both under a shared `CancellationToken` so a close tears both
//! down exactly once. Unlike the teacher's client, this one never
//! reconnects — a mid-call model-socket error ends the call (spec §4.1:
//! a retry would violate audio ordering).

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use bridge_protocol::realtime::RealtimeInbound;
use bridge_protocol::RealtimeOutbound;

use crate::types::RealtimeClientError;

/// A connected realtime-model channel. Dropping the last outbound sender
/// (or calling [`RealtimeClient::close`]) tears down the writer/reader
/// tasks via the shared cancellation token.
pub struct RealtimeClient {
    outbound_tx: mpsc::Sender<RealtimeOutbound>,
    cancel: CancellationToken,
}

/// Inbound events from the model, dispatched one at a time to whoever
/// drives the call's event loop (the orchestrator).
pub struct RealtimeInboundStream {
    inbound_rx: mpsc::Receiver<RealtimeInbound>,
}

impl RealtimeInboundStream {
    pub async fn recv(&mut self) -> Option<RealtimeInbound> {
        self.inbound_rx.recv().await
    }
}

impl RealtimeClient {
    /// Connect to the model endpoint and split into a writer (this
    /// handle) and a reader (the returned stream). No handshake message
    /// is sent by this layer — the first thing the caller sends is a
    /// `session.update`.
    pub async fn connect(
        endpoint_url: &str,
    ) -> Result<(Self, RealtimeInboundStream), RealtimeClientError> {
        let (ws, _response) = tokio_tungstenite::connect_async(endpoint_url)
            .await
            .map_err(|e| RealtimeClientError::WebSocket(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<RealtimeOutbound>(64);
        let (inbound_tx, inbound_rx) = mpsc::channel::<RealtimeInbound>(64);
        let cancel = CancellationToken::new();

        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_cancel.cancelled() => break,
                    msg = outbound_rx.recv() => {
                        let Some(msg) = msg else { break };
                        let json = match serde_json::to_string(&msg) {
                            Ok(j) => j,
                            Err(err) => {
                                tracing::error!(error = %err, "failed to serialize outbound realtime message");
                                continue;
                            }
                        };
                        if sink.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            let _ = sink.close().await;
        });

        let reader_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = reader_cancel.cancelled() => break,
                    frame = stream.next() => {
                        let Some(frame) = frame else { break };
                        match frame {
                            Ok(Message::Text(text)) => {
                                match serde_json::from_str::<RealtimeInbound>(&text) {
                                    Ok(event) => {
                                        if inbound_tx.send(event).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(err) => {
                                        tracing::debug!(error = %err, "unrecognized realtime event, discarding");
                                    }
                                }
                            }
                            Ok(Message::Close(_)) => {
                                tracing::info!("model closed realtime connection");
                                break;
                            }
                            Ok(_) => {}
                            Err(err) => {
                                tracing::warn!(error = %err, "realtime transport error");
                                break;
                            }
                        }
                    }
                }
            }
            reader_cancel.cancel();
        });

        Ok((
            Self {
                outbound_tx,
                cancel,
            },
            RealtimeInboundStream { inbound_rx },
        ))
    }

    pub async fn send(&self, message: RealtimeOutbound) -> Result<(), RealtimeClientError> {
        self.outbound_tx
            .send(message)
            .await
            .map_err(|_| RealtimeClientError::ChannelClosed)
    }

    /// Tear down the writer/reader tasks. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Wait for `session.updated`, discarding any other event that happens
/// to arrive first (none are expected before it), up to `deadline`.
/// Spec §4.1/§5: 3 s from `session.update` send to `session.updated`
/// receipt; expiry logs `session_update_timeout` and closes the socket.
pub async fn await_session_ready(
    inbound: &mut RealtimeInboundStream,
    deadline: Duration,
) -> Result<(), RealtimeClientError> {
    let wait = async {
        loop {
            match inbound.recv().await {
                Some(RealtimeInbound::SessionUpdated) => return Ok(()),
                Some(_) => continue,
                None => return Err(RealtimeClientError::ChannelClosed),
            }
        }
    };

    tokio::time::timeout(deadline, wait)
        .await
        .map_err(|_| RealtimeClientError::SessionReadyTimeout)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn await_session_ready_skips_unrelated_events_first() {
        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let mut stream = RealtimeInboundStream { inbound_rx };

        inbound_tx
            .send(RealtimeInbound::InputAudioBufferSpeechStarted)
            .await
            .unwrap();
        inbound_tx.send(RealtimeInbound::SessionUpdated).await.unwrap();

        let result = await_session_ready(&mut stream, Duration::from_millis(200)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn await_session_ready_times_out_when_nothing_arrives() {
        let (_inbound_tx, inbound_rx) = mpsc::channel(8);
        let mut stream = RealtimeInboundStream { inbound_rx };

        let result = await_session_ready(&mut stream, Duration::from_millis(50)).await;
        assert!(matches!(
            result,
            Err(RealtimeClientError::SessionReadyTimeout)
        ));
    }

    #[tokio::test]
    async fn await_session_ready_errors_when_channel_closes_first() {
        let (inbound_tx, inbound_rx) = mpsc::channel(8);
        let mut stream = RealtimeInboundStream { inbound_rx };
        drop(inbound_tx);

        let result = await_session_ready(&mut stream, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(RealtimeClientError::ChannelClosed)));
    }
}
