use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::flows::states::QuizPhase;

pub type QuizId = String;
pub type UserId = String;

/// Per-(question, participant) cell.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "Asking", default)]
    pub asking: bool,
    #[serde(rename = "Answer", default)]
    pub text: String,
}

impl Answer {
    pub fn outstanding() -> Self {
        Self { asking: true, text: String::new() }
    }

    pub fn is_answered(&self) -> bool {
        !self.text.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "Question")]
    pub text: String,
    /// Absent entries are participants that have not been contacted yet.
    #[serde(rename = "Answers", default)]
    pub answers: BTreeMap<UserId, Answer>,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), answers: BTreeMap::new() }
    }

    pub fn is_outstanding_for(&self, user_id: &str) -> bool {
        self.answers.get(user_id).is_some_and(|answer| answer.asking)
    }

    /// Participants that submitted a non-empty answer, in id order.
    pub fn answered_by(&self) -> Vec<&UserId> {
        self.answers
            .iter()
            .filter(|(_, answer)| answer.is_answered())
            .map(|(user_id, _)| user_id)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(rename = "ID")]
    pub id: QuizId,
    #[serde(rename = "CreatorID")]
    pub creator_id: UserId,
    #[serde(rename = "Participants", default)]
    pub participants: Vec<UserId>,
    #[serde(rename = "Questions", default)]
    pub questions: Vec<Question>,
    #[serde(rename = "Complete", default)]
    pub complete: bool,
    #[serde(rename = "AskingParticipants", default)]
    pub asking_participants: bool,
    #[serde(rename = "AskingForNewQuestion", default)]
    pub asking_for_new_question: bool,
}

impl Quiz {
    pub fn new(id: impl Into<QuizId>, creator_id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            creator_id: creator_id.into(),
            participants: Vec::new(),
            questions: Vec::new(),
            complete: false,
            asking_participants: false,
            asking_for_new_question: false,
        }
    }

    /// Lifecycle phase derived from the persisted fields.
    pub fn phase(&self) -> QuizPhase {
        if self.complete {
            QuizPhase::Complete
        } else if self.participants.is_empty() {
            QuizPhase::Draft
        } else {
            QuizPhase::Collecting
        }
    }

    pub fn creator_is_asked(&self) -> bool {
        self.asking_participants || self.asking_for_new_question
    }

    /// True once every participant has answered every question.
    pub fn is_fully_answered(&self) -> bool {
        self.complete
            && self.questions.iter().all(|question| {
                self.participants.iter().all(|participant| {
                    question.answers.get(participant).is_some_and(|answer| !answer.asking)
                })
            })
    }

    /// `(answered, expected)` answer cells for progress reporting.
    pub fn answer_progress(&self) -> (usize, usize) {
        let expected = self.questions.len() * self.participants.len();
        let answered = self
            .questions
            .iter()
            .map(|question| {
                self.participants
                    .iter()
                    .filter(|participant| {
                        question.answers.get(*participant).is_some_and(|answer| !answer.asking)
                    })
                    .count()
            })
            .sum();
        (answered, expected)
    }
}

/// All quizzes as stored under a single key, ordered by quiz id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizDocument {
    pub quizzes: BTreeMap<QuizId, Quiz>,
}

impl QuizDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, quiz_id: &str) -> Option<&Quiz> {
        self.quizzes.get(quiz_id)
    }

    pub fn get_mut(&mut self, quiz_id: &str) -> Option<&mut Quiz> {
        self.quizzes.get_mut(quiz_id)
    }

    pub fn contains(&self, quiz_id: &str) -> bool {
        self.quizzes.contains_key(quiz_id)
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Quiz> {
        self.quizzes.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.quizzes.keys().map(String::as_str)
    }
}
