//! Barge-in Controller (spec §4.5).
//!
//! The debounce window is grounded on the node SDK's
//! `CancellationToken`/timer-task idiom (`inflight_cancel.child_token()`,
//! `tokio::select!` against a sleep): arming the debounce starts a timer
//! that a later `speech_stopped` can cancel before it fires, exactly the
//! way the node SDK lets a disconnect cancel an in-flight tool task.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use bridge_domain::call::CallPhase;

/// Result of evaluating or waiting out a barge-in attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BargeInOutcome {
    /// Speech-started was ignored outright; the debounce timer never armed.
    Ignored { reason: String },
    /// The debounce timer armed and is running.
    Armed,
    /// The debounce window elapsed without a cancelling `speech_stopped`:
    /// treat this as a confirmed barge-in.
    Confirmed,
    /// `speech_stopped` arrived before the debounce window elapsed.
    Cancelled { reason: String },
}

/// Per-call barge-in policy: greeting lock, minimum remaining audio,
/// and the debounce window itself.
pub struct BargeInController {
    debounce: Duration,
    min_remain: Duration,
}

impl BargeInController {
    pub fn new(debounce_ms: u64, min_remain_ms: u64) -> Self {
        Self {
            debounce: Duration::from_millis(debounce_ms),
            min_remain: Duration::from_millis(min_remain_ms),
        }
    }

    /// Decide whether an `input_audio_buffer.speech_started` event should
    /// arm the debounce timer at all.
    ///
    /// Two hard gates, checked in order: the call must have left the
    /// greeting phase, and the assistant must still have enough unplayed
    /// audio left for a barge-in to be worth interrupting.
    pub fn evaluate(&self, phase: CallPhase, remaining_ms: u64) -> BargeInOutcome {
        if phase == CallPhase::Greeting {
            return BargeInOutcome::Ignored {
                reason: "greeting_phase".to_string(),
            };
        }
        if remaining_ms < self.min_remain.as_millis() as u64 {
            return BargeInOutcome::Ignored {
                reason: "insufficient_remaining_audio".to_string(),
            };
        }
        BargeInOutcome::Armed
    }

    /// Wait out the debounce window, racing a `speech_stopped` cancellation
    /// against the timer. The caller drives this as a spawned task and
    /// signals cancellation on `cancel` when `speech_stopped` arrives.
    pub async fn debounce(&self, cancel: &CancellationToken) -> BargeInOutcome {
        tokio::select! {
            _ = tokio::time::sleep(self.debounce) => BargeInOutcome::Confirmed,
            _ = cancel.cancelled() => BargeInOutcome::Cancelled {
                reason: "speech_stopped".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_during_greeting_regardless_of_remaining_audio() {
        let controller = BargeInController::new(1_000, 2_000);
        let outcome = controller.evaluate(CallPhase::Greeting, 5_000);
        assert_eq!(
            outcome,
            BargeInOutcome::Ignored {
                reason: "greeting_phase".to_string()
            }
        );
    }

    #[test]
    fn ignores_when_remaining_audio_below_minimum() {
        let controller = BargeInController::new(1_000, 2_000);
        let outcome = controller.evaluate(CallPhase::Normal, 1_500);
        assert_eq!(
            outcome,
            BargeInOutcome::Ignored {
                reason: "insufficient_remaining_audio".to_string()
            }
        );
    }

    #[test]
    fn arms_when_normal_phase_and_enough_remaining_audio() {
        let controller = BargeInController::new(1_000, 2_000);
        let outcome = controller.evaluate(CallPhase::Normal, 2_000);
        assert_eq!(outcome, BargeInOutcome::Armed);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_confirms_after_window_elapses_uncancelled() {
        let controller = BargeInController::new(200, 2_000);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { controller.debounce(&cancel).await }
        });

        tokio::time::advance(Duration::from_millis(250)).await;
        let outcome = handle.await.unwrap();
        assert_eq!(outcome, BargeInOutcome::Confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_cancelled_by_speech_stopped_before_window_elapses() {
        let controller = BargeInController::new(1_000, 2_000);
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        let handle = tokio::spawn(async move { controller.debounce(&cancel_clone).await });

        tokio::time::advance(Duration::from_millis(50)).await;
        cancel.cancel();

        let outcome = handle.await.unwrap();
        assert_eq!(
            outcome,
            BargeInOutcome::Cancelled {
                reason: "speech_stopped".to_string()
            }
        );
    }
}
