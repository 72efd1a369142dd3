use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use cquiz_chat::gateway::ChatGateway;
use cquiz_db::QuizStore;

use crate::shutdown::StopSignal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No prompt left to raise.
    Drained,
    /// Another writer changed the document; the remaining prompts wait for the next tick.
    Conflict,
    Failed,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrainReport {
    pub dispatched: usize,
    pub outcome: DrainOutcome,
}

/// Raises outstanding prompts one at a time and delivers them as direct messages.
pub struct Scheduler {
    store: QuizStore,
    gateway: Arc<dyn ChatGateway>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(store: QuizStore, gateway: Arc<dyn ChatGateway>, interval: Duration) -> Self {
        Self { store, gateway, interval }
    }

    pub async fn run(&self, stop: StopSignal) {
        info!(
            event_name = "system.scheduler.started",
            interval_ms = self.interval.as_millis() as u64,
            "prompt scheduler started"
        );

        while !stop.is_stopped() {
            let report = self.drain_once(&stop).await;
            if report.dispatched > 0 || report.outcome != DrainOutcome::Drained {
                info!(
                    event_name = "system.scheduler.tick",
                    dispatched = report.dispatched,
                    outcome = ?report.outcome,
                    "prompt scheduler tick finished"
                );
            }

            tokio::select! {
                () = tokio::time::sleep(self.interval) => {}
                () = stop.stopped() => break,
            }
        }

        info!(event_name = "system.scheduler.stopped", "prompt scheduler stopped");
    }

    /// One tick: load, raise the next prompt, save, deliver; repeated until nothing is left.
    pub async fn drain_once(&self, stop: &StopSignal) -> DrainReport {
        let mut dispatched = 0;

        loop {
            if stop.is_stopped() {
                return DrainReport { dispatched, outcome: DrainOutcome::Stopped };
            }

            let mut snapshot = match self.store.load_all().await {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    warn!(
                        event_name = "system.scheduler.load_failed",
                        error = %error,
                        "could not load quiz document"
                    );
                    return DrainReport { dispatched, outcome: DrainOutcome::Failed };
                }
            };

            let Some(prompt) = snapshot.quizzes.next_prompt() else {
                return DrainReport { dispatched, outcome: DrainOutcome::Drained };
            };

            if let Err(error) = snapshot.quizzes.apply_prompt(&prompt.transition) {
                warn!(
                    event_name = "system.scheduler.prompt_rejected",
                    quiz_id = %prompt.transition.quiz_id(),
                    user_id = %prompt.user_id,
                    error = %error,
                    "next prompt could not be applied"
                );
                return DrainReport { dispatched, outcome: DrainOutcome::Failed };
            }

            match self.store.save_all(&snapshot.quizzes, &snapshot.version).await {
                Ok(_) => {}
                Err(error) if error.is_conflict() => {
                    debug!(
                        event_name = "system.scheduler.conflict",
                        quiz_id = %prompt.transition.quiz_id(),
                        "quiz document changed during tick; deferring"
                    );
                    return DrainReport { dispatched, outcome: DrainOutcome::Conflict };
                }
                Err(error) => {
                    warn!(
                        event_name = "system.scheduler.save_failed",
                        quiz_id = %prompt.transition.quiz_id(),
                        error = %error,
                        "could not save raised prompt"
                    );
                    return DrainReport { dispatched, outcome: DrainOutcome::Failed };
                }
            }

            match self.gateway.send_direct_message(&prompt.user_id, &prompt.message).await {
                Ok(()) => {
                    dispatched += 1;
                    debug!(
                        event_name = "egress.chat.prompt_sent",
                        quiz_id = %prompt.transition.quiz_id(),
                        user_id = %prompt.user_id,
                        "prompt delivered"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "egress.chat.prompt_failed",
                        quiz_id = %prompt.transition.quiz_id(),
                        user_id = %prompt.user_id,
                        error = %error,
                        "prompt was recorded but could not be delivered"
                    );
                }
            }
        }
    }
}
