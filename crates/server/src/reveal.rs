use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use cquiz_chat::gateway::ChatGateway;
use cquiz_core::config::RevealConfig;
use cquiz_core::reveal::{
    answer_message, pick_revealed_answer, question_message, welcome_message, CANCELLED_MESSAGE,
    FAREWELL_MESSAGE,
};
use cquiz_core::Quiz;

use crate::shutdown::StopSignal;

/// Process-wide random source, seeded once at startup.
pub type SharedRng = Arc<Mutex<StdRng>>;

pub fn seeded_rng() -> SharedRng {
    Arc::new(Mutex::new(StdRng::from_entropy()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealTiming {
    pub answer_delay: Duration,
    pub pacing_delay: Duration,
}

impl From<&RevealConfig> for RevealTiming {
    fn from(config: &RevealConfig) -> Self {
        Self { answer_delay: config.answer_delay(), pacing_delay: config.pacing_delay() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    Completed { revealed: usize },
    Cancelled,
}

/// Plays a quiz back in a channel, revealing one random answer per question.
#[derive(Clone)]
pub struct RevealRoutine {
    gateway: Arc<dyn ChatGateway>,
    rng: SharedRng,
    timing: RevealTiming,
}

impl RevealRoutine {
    pub fn new(gateway: Arc<dyn ChatGateway>, rng: SharedRng, timing: RevealTiming) -> Self {
        Self { gateway, rng, timing }
    }

    pub async fn run(&self, quiz: &Quiz, channel_id: &str, stop: &StopSignal) -> RevealOutcome {
        info!(
            event_name = "quiz.reveal.started",
            quiz_id = %quiz.id,
            channel_id,
            questions = quiz.questions.len(),
            "quiz reveal started"
        );
        self.post(channel_id, &welcome_message(&quiz.id)).await;

        let mut revealed = 0;
        for question in &quiz.questions {
            if stop.is_stopped() {
                self.post(channel_id, CANCELLED_MESSAGE).await;
                info!(
                    event_name = "quiz.reveal.cancelled",
                    quiz_id = %quiz.id,
                    revealed,
                    "quiz reveal cancelled"
                );
                return RevealOutcome::Cancelled;
            }

            let pick = {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                pick_revealed_answer(question, &mut *rng)
            };
            let Some(pick) = pick else {
                continue;
            };

            let user_name = self.gateway.user_name(&pick.user_id).await.unwrap_or_default();
            self.post(
                channel_id,
                &question_message(&user_name, &question.text, self.timing.answer_delay.as_secs()),
            )
            .await;
            tokio::time::sleep(self.timing.answer_delay).await;
            self.post(channel_id, &answer_message(&pick.answer)).await;
            tokio::time::sleep(self.timing.pacing_delay).await;
            revealed += 1;
        }

        self.post(channel_id, FAREWELL_MESSAGE).await;
        info!(
            event_name = "quiz.reveal.finished",
            quiz_id = %quiz.id,
            revealed,
            "quiz reveal finished"
        );
        RevealOutcome::Completed { revealed }
    }

    async fn post(&self, channel_id: &str, text: &str) {
        if let Err(error) = self.gateway.send_channel_message(channel_id, text).await {
            warn!(
                event_name = "egress.chat.reveal_post_failed",
                channel_id,
                error = %error,
                "could not post reveal message"
            );
        }
    }
}
