use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::quiz::{Question, UserId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevealPick {
    pub user_id: UserId,
    pub answer: String,
}

/// Picks uniformly among participants that submitted a non-empty answer.
pub fn pick_revealed_answer<R>(question: &Question, rng: &mut R) -> Option<RevealPick>
where
    R: Rng + ?Sized,
{
    let candidates = question.answered_by();
    let user_id = candidates.choose(rng)?;
    let answer = question.answers.get(*user_id)?;
    Some(RevealPick { user_id: (*user_id).clone(), answer: answer.text.clone() })
}

pub fn welcome_message(quiz_id: &str) -> String {
    format!("Welcome to Colleague Quiz. Today we have the quiz `{quiz_id}`.")
}

pub fn question_message(user_name: &str, question: &str, answer_delay_secs: u64) -> String {
    format!(
        "What did {user_name} answer to `{question}`? The answer will be given in {answer_delay_secs} seconds!"
    )
}

pub fn answer_message(answer: &str) -> String {
    format!("The answer is `{answer}`.")
}

pub const CANCELLED_MESSAGE: &str = "Quiz game has been cancelled.";
pub const FAREWELL_MESSAGE: &str = "That's all for today. Thanks!";
