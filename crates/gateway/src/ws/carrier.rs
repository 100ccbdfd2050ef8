//! WebSocket endpoint for carrier media-stream connections (spec §4.3).
//!
//! Flow:
//! 1. Carrier connects and upgrades to WebSocket.
//! 2. Carrier sends `connected` (ignored) then `start` with the stream/call
//!    ids and custom parameters (tenant id, caller/callee numbers).
//! 3. The [`CallSession`](crate::orchestrator::CallSession) handshake runs;
//!    on success the bidirectional media loop begins: gateway sends
//!    `media`/`clear`/`mark`, carrier sends `media`/`mark`/`stop`.
//!
//! Grounded on the teacher's node connection handler
//! (`nodes/ws.rs::handle_socket`): a handshake-before-loop shape, a writer
//! task draining an outbound `mpsc` channel into the sink, and a reader
//! loop forwarding inbound frames, with cleanup run exactly once on exit.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use bridge_protocol::{CarrierInbound, CarrierOutbound};

use crate::orchestrator::CallSession;
use crate::state::AppState;

/// GET /call/stream — upgrade to WebSocket. Carrier authentication and
/// tenant/subscription gating happen upstream of this bridge (spec
/// Non-goals); this handler trusts the custom parameters it is handed.
pub async fn carrier_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

struct StartData {
    stream_sid: String,
    call_sid: String,
    custom_parameters: std::collections::HashMap<String, String>,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let start = match wait_for_start(&mut ws_stream).await {
        Some(start) => start,
        None => {
            tracing::warn!("carrier disconnected before sending a start event");
            return;
        }
    };

    let log_raw_frames = state.config.debug.log_raw_frames;
    let (carrier_out_tx, mut carrier_out_rx) = mpsc::channel::<CarrierOutbound>(64);

    let writer = tokio::spawn(async move {
        while let Some(msg) = carrier_out_rx.recv().await {
            if send_carrier_message(&mut ws_sink, &msg).await.is_err() {
                break;
            }
        }
    });

    let session = CallSession::start(
        state,
        start.stream_sid.clone(),
        start.call_sid,
        start.custom_parameters,
        carrier_out_tx,
    )
    .await;

    let Some(session) = session else {
        writer.abort();
        return;
    };

    let (carrier_in_tx, carrier_in_rx) = mpsc::channel::<CarrierInbound>(64);
    let session_task = tokio::spawn(session.run(carrier_in_rx));

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<CarrierInbound>(&text) {
                Ok(event) => {
                    if log_raw_frames {
                        tracing::debug!(stream_id = %start.stream_sid, frame = %text, "raw carrier frame");
                    }
                    let is_stop = matches!(event, CarrierInbound::Stop { .. });
                    if carrier_in_tx.send(event).await.is_err() || is_stop {
                        break;
                    }
                }
                Err(err) => {
                    tracing::debug!(stream_id = %start.stream_sid, error = %err, "ignoring unparseable carrier frame");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    drop(carrier_in_tx);
    let _ = session_task.await;
    writer.abort();
}

async fn wait_for_start(
    stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<StartData> {
    let wait = async {
        while let Some(Ok(msg)) = stream.next().await {
            let Message::Text(text) = msg else { continue };
            match serde_json::from_str::<CarrierInbound>(&text) {
                Ok(CarrierInbound::Start {
                    stream_sid,
                    call_sid,
                    custom_parameters,
                }) => {
                    return Some(StartData {
                        stream_sid,
                        call_sid,
                        custom_parameters,
                    })
                }
                Ok(CarrierInbound::Connected) => continue,
                _ => continue,
            }
        }
        None
    };

    tokio::time::timeout(std::time::Duration::from_secs(10), wait)
        .await
        .unwrap_or(None)
}

async fn send_carrier_message(
    sink: &mut (impl SinkExt<Message> + Unpin),
    msg: &CarrierOutbound,
) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
