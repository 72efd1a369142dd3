//! Decision logic over an in-memory [`QuizDocument`] snapshot.
//!
//! Every operation is pure: callers load a snapshot, apply one of these methods and
//! persist the result with a compare-and-swap. A rejected operation leaves the snapshot
//! untouched.

use crate::domain::quiz::{Answer, Question, Quiz, QuizDocument, UserId};
use crate::errors::DomainError;
use crate::flows::engine::FlowEngine;
use crate::flows::states::{
    AskKind, CreatorReply, ParticipantResolution, PendingAsk, Prompt, PromptTransition, QuizEvent,
};

/// Creator reply that closes question collection.
pub const END_KEYWORD: &str = "end";

/// Splits raw participant text into user names, dropping a leading `@`.
pub fn parse_participant_names(raw: &str) -> Vec<String> {
    raw.split_whitespace()
        .map(|token| token.strip_prefix('@').unwrap_or(token))
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

impl QuizDocument {
    pub fn create_quiz(&mut self, name: &str, creator_id: &str) -> Result<&Quiz, DomainError> {
        if self.quizzes.contains_key(name) {
            return Err(DomainError::AlreadyExists { quiz_id: name.to_owned() });
        }
        Ok(self.quizzes.entry(name.to_owned()).or_insert_with(|| Quiz::new(name, creator_id)))
    }

    /// False while the user owes the bot a reply anywhere in the document.
    pub fn is_user_available(&self, user_id: &str) -> bool {
        !self.iter().any(|quiz| {
            (quiz.creator_id == user_id && quiz.creator_is_asked())
                || quiz.questions.iter().any(|question| question.is_outstanding_for(user_id))
        })
    }

    pub fn pending_ask(&self, user_id: &str) -> Option<PendingAsk> {
        for quiz in self.iter() {
            if quiz.creator_id == user_id {
                if quiz.asking_participants {
                    return Some(PendingAsk {
                        kind: AskKind::ForParticipants,
                        quiz_id: quiz.id.clone(),
                        question_index: None,
                    });
                }
                if quiz.asking_for_new_question {
                    return Some(PendingAsk {
                        kind: AskKind::ForNewQuestion,
                        quiz_id: quiz.id.clone(),
                        question_index: None,
                    });
                }
            }
            if let Some(index) =
                quiz.questions.iter().position(|question| question.is_outstanding_for(user_id))
            {
                return Some(PendingAsk {
                    kind: AskKind::ForAnswer,
                    quiz_id: quiz.id.clone(),
                    question_index: Some(index),
                });
            }
        }
        None
    }

    /// The first askable prompt in quiz id order, if any.
    pub fn next_prompt(&self) -> Option<Prompt> {
        for quiz in self.iter() {
            if !quiz.complete {
                if !self.is_user_available(&quiz.creator_id) {
                    continue;
                }
                return Some(if quiz.participants.is_empty() {
                    Prompt {
                        user_id: quiz.creator_id.clone(),
                        message: format!("Type all the participants for quiz {}.", quiz.id),
                        transition: PromptTransition::AskParticipants { quiz_id: quiz.id.clone() },
                    }
                } else {
                    Prompt {
                        user_id: quiz.creator_id.clone(),
                        message: format!(
                            "Type a new question for the quiz `{}` or type `{END_KEYWORD}` to finish adding questions.",
                            quiz.id
                        ),
                        transition: PromptTransition::AskNewQuestion { quiz_id: quiz.id.clone() },
                    }
                });
            }

            for participant in &quiz.participants {
                if !self.is_user_available(participant) {
                    continue;
                }
                let unasked = quiz
                    .questions
                    .iter()
                    .enumerate()
                    .find(|(_, question)| !question.answers.contains_key(participant));
                if let Some((question_index, question)) = unasked {
                    return Some(Prompt {
                        user_id: participant.clone(),
                        message: format!("Answer this question: {}", question.text),
                        transition: PromptTransition::AskAnswer {
                            quiz_id: quiz.id.clone(),
                            question_index,
                            user_id: participant.clone(),
                        },
                    });
                }
            }
        }
        None
    }

    /// Raises the ask described by a transition returned from [`Self::next_prompt`].
    pub fn apply_prompt(&mut self, transition: &PromptTransition) -> Result<(), DomainError> {
        match transition {
            PromptTransition::AskParticipants { quiz_id } => {
                let quiz = self.open_quiz(quiz_id)?;
                if !quiz.participants.is_empty() || quiz.creator_is_asked() {
                    return Err(DomainError::InvariantViolation(format!(
                        "quiz `{quiz_id}` cannot be asked for participants"
                    )));
                }
                quiz.asking_participants = true;
            }
            PromptTransition::AskNewQuestion { quiz_id } => {
                let quiz = self.open_quiz(quiz_id)?;
                if quiz.participants.is_empty() || quiz.creator_is_asked() {
                    return Err(DomainError::InvariantViolation(format!(
                        "quiz `{quiz_id}` cannot be asked for a new question"
                    )));
                }
                quiz.asking_for_new_question = true;
            }
            PromptTransition::AskAnswer { quiz_id, question_index, user_id } => {
                let quiz = self.completed_quiz(quiz_id)?;
                if !quiz.participants.contains(user_id) {
                    return Err(DomainError::InvariantViolation(format!(
                        "user `{user_id}` is not a participant of quiz `{quiz_id}`"
                    )));
                }
                let question = question_mut(quiz, *question_index)?;
                if question.answers.contains_key(user_id) {
                    return Err(DomainError::InvariantViolation(format!(
                        "user `{user_id}` was already asked question {question_index} of `{quiz_id}`"
                    )));
                }
                question.answers.insert(user_id.clone(), Answer::outstanding());
            }
        }
        Ok(())
    }

    pub fn apply_participants(
        &mut self,
        quiz_id: &str,
        creator_id: &str,
        resolution: ParticipantResolution,
    ) -> Result<Vec<UserId>, DomainError> {
        let quiz = self.open_quiz(quiz_id)?;
        if quiz.creator_id != creator_id {
            return Err(DomainError::InvariantViolation(format!(
                "only the creator of `{quiz_id}` may set participants"
            )));
        }
        if !quiz.asking_participants {
            return Err(DomainError::InvariantViolation(format!(
                "quiz `{quiz_id}` is not waiting for participants"
            )));
        }
        if resolution.resolved.is_empty() {
            return Err(DomainError::PartialFailure { unresolved: resolution.unresolved });
        }
        FlowEngine::default().apply(quiz.phase(), QuizEvent::ParticipantsSet)?;

        let mut participants: Vec<UserId> = Vec::with_capacity(resolution.resolved.len());
        for user_id in resolution.resolved {
            if !participants.contains(&user_id) {
                participants.push(user_id);
            }
        }
        quiz.participants = participants;
        quiz.asking_participants = false;
        Ok(quiz.participants.clone())
    }

    pub fn apply_new_question_or_end(
        &mut self,
        quiz_id: &str,
        text: &str,
    ) -> Result<CreatorReply, DomainError> {
        let quiz = self.open_quiz(quiz_id)?;
        if !quiz.asking_for_new_question {
            return Err(DomainError::InvariantViolation(format!(
                "quiz `{quiz_id}` is not waiting for a question"
            )));
        }

        if text == END_KEYWORD {
            FlowEngine::default().apply(quiz.phase(), QuizEvent::CollectionEnded)?;
            quiz.complete = true;
            quiz.asking_for_new_question = false;
            return Ok(CreatorReply::QuizCompleted);
        }

        FlowEngine::default().apply(quiz.phase(), QuizEvent::QuestionAdded)?;
        quiz.questions.push(Question::new(text));
        quiz.asking_for_new_question = false;
        Ok(CreatorReply::QuestionAdded { question_index: quiz.questions.len() - 1 })
    }

    pub fn apply_answer(
        &mut self,
        quiz_id: &str,
        question_index: usize,
        user_id: &str,
        text: &str,
    ) -> Result<(), DomainError> {
        let quiz = self.completed_quiz(quiz_id)?;
        FlowEngine::default().apply(quiz.phase(), QuizEvent::AnswerSubmitted)?;
        let question = question_mut(quiz, question_index)?;
        match question.answers.get_mut(user_id) {
            Some(answer) if answer.asking => {
                answer.text = text.to_owned();
                answer.asking = false;
                Ok(())
            }
            _ => Err(DomainError::InvariantViolation(format!(
                "user `{user_id}` has no outstanding ask for question {question_index} of `{quiz_id}`"
            ))),
        }
    }

    fn quiz_mut(&mut self, quiz_id: &str) -> Result<&mut Quiz, DomainError> {
        self.quizzes.get_mut(quiz_id).ok_or_else(|| DomainError::quiz_not_found(quiz_id))
    }

    fn open_quiz(&mut self, quiz_id: &str) -> Result<&mut Quiz, DomainError> {
        let quiz = self.quiz_mut(quiz_id)?;
        if quiz.complete {
            return Err(DomainError::InvariantViolation(format!(
                "quiz `{quiz_id}` is already complete"
            )));
        }
        Ok(quiz)
    }

    fn completed_quiz(&mut self, quiz_id: &str) -> Result<&mut Quiz, DomainError> {
        let quiz = self.quiz_mut(quiz_id)?;
        if !quiz.complete {
            return Err(DomainError::InvariantViolation(format!(
                "quiz `{quiz_id}` is still collecting questions"
            )));
        }
        Ok(quiz)
    }
}

fn question_mut(quiz: &mut Quiz, question_index: usize) -> Result<&mut Question, DomainError> {
    let quiz_id = quiz.id.clone();
    quiz.questions.get_mut(question_index).ok_or(DomainError::NotFound {
        entity: "question",
        key: format!("{quiz_id}#{question_index}"),
    })
}

#[cfg(test)]
mod tests {
    use crate::domain::quiz::QuizDocument;
    use crate::errors::DomainError;
    use crate::flows::machine::parse_participant_names;
    use crate::flows::states::{
        AskKind, CreatorReply, ParticipantResolution, PendingAsk, PromptTransition,
    };

    fn resolved(ids: &[&str]) -> ParticipantResolution {
        ParticipantResolution {
            resolved: ids.iter().map(|id| (*id).to_owned()).collect(),
            unresolved: Vec::new(),
        }
    }

    /// Applies `next_prompt` until nothing is askable, returning the prompted users.
    fn drain(document: &mut QuizDocument) -> Vec<String> {
        let mut prompted = Vec::new();
        while let Some(prompt) = document.next_prompt() {
            document.apply_prompt(&prompt.transition).expect("prompt applies");
            prompted.push(prompt.user_id);
        }
        prompted
    }

    fn outstanding_asks(document: &QuizDocument, user_id: &str) -> usize {
        document
            .iter()
            .map(|quiz| {
                let flags = usize::from(
                    quiz.creator_id == user_id
                        && (quiz.asking_participants || quiz.asking_for_new_question),
                );
                let cells = quiz
                    .questions
                    .iter()
                    .filter(|question| question.is_outstanding_for(user_id))
                    .count();
                flags + cells
            })
            .sum()
    }

    #[test]
    fn creating_duplicate_quiz_fails_and_leaves_document_unchanged() {
        let mut document = QuizDocument::new();
        document.create_quiz("Sprint", "U1").expect("first create");
        let before = document.clone();

        let error = document.create_quiz("Sprint", "U2").expect_err("duplicate");

        assert_eq!(error, DomainError::AlreadyExists { quiz_id: "Sprint".to_owned() });
        assert_eq!(document, before);
    }

    #[test]
    fn sprint_scenario_runs_end_to_end() {
        let mut document = QuizDocument::new();
        document.create_quiz("Sprint", "U1").expect("create");

        let prompt = document.next_prompt().expect("creator prompt");
        assert_eq!(prompt.user_id, "U1");
        assert_eq!(prompt.message, "Type all the participants for quiz Sprint.");
        document.apply_prompt(&prompt.transition).expect("ask participants");
        assert!(document.next_prompt().is_none());

        let pending = document.pending_ask("U1").expect("creator pending");
        assert_eq!(pending.kind, AskKind::ForParticipants);
        let ids = document
            .apply_participants("Sprint", "U1", resolved(&["alice", "bob"]))
            .expect("participants");
        assert_eq!(ids, vec!["alice", "bob"]);

        let prompt = document.next_prompt().expect("question prompt");
        assert_eq!(
            prompt.message,
            "Type a new question for the quiz `Sprint` or type `end` to finish adding questions."
        );
        document.apply_prompt(&prompt.transition).expect("ask question");
        let reply =
            document.apply_new_question_or_end("Sprint", "Favorite color?").expect("question");
        assert_eq!(reply, CreatorReply::QuestionAdded { question_index: 0 });

        let prompt = document.next_prompt().expect("question prompt again");
        document.apply_prompt(&prompt.transition).expect("ask question again");
        let reply = document.apply_new_question_or_end("Sprint", "end").expect("end");
        assert_eq!(reply, CreatorReply::QuizCompleted);

        let alice = document.next_prompt().expect("alice prompt");
        assert_eq!(alice.user_id, "alice");
        assert_eq!(alice.message, "Answer this question: Favorite color?");
        document.apply_prompt(&alice.transition).expect("ask alice");
        let bob = document.next_prompt().expect("bob prompt");
        assert_eq!(bob.user_id, "bob");
        document.apply_prompt(&bob.transition).expect("ask bob");
        assert!(document.next_prompt().is_none());

        assert_eq!(
            document.pending_ask("alice"),
            Some(PendingAsk {
                kind: AskKind::ForAnswer,
                quiz_id: "Sprint".to_owned(),
                question_index: Some(0)
            })
        );
        document.apply_answer("Sprint", 0, "alice", "blue").expect("alice answers");
        document.apply_answer("Sprint", 0, "bob", "green").expect("bob answers");

        let quiz = document.get("Sprint").expect("quiz");
        assert!(quiz.is_fully_answered());
        assert!(document.next_prompt().is_none());
    }

    #[test]
    fn unresolved_participants_keep_the_creator_flag_raised() {
        let mut document = QuizDocument::new();
        document.create_quiz("Sprint", "U1").expect("create");
        drain(&mut document);

        let names = parse_participant_names("@nobody");
        let error = document
            .apply_participants(
                "Sprint",
                "U1",
                ParticipantResolution { resolved: Vec::new(), unresolved: names },
            )
            .expect_err("no participants resolved");

        assert_eq!(error, DomainError::PartialFailure { unresolved: vec!["nobody".to_owned()] });
        let quiz = document.get("Sprint").expect("quiz");
        assert!(quiz.asking_participants);
        assert!(quiz.participants.is_empty());
    }

    #[test]
    fn repeated_participants_are_stored_once_in_first_seen_order() {
        let mut document = QuizDocument::new();
        document.create_quiz("Sprint", "U1").expect("create");
        drain(&mut document);

        let participants = document
            .apply_participants("Sprint", "U1", resolved(&["U3", "U2", "U3", "U2"]))
            .expect("participants");

        assert_eq!(participants, vec!["U3", "U2"]);
        assert_eq!(document.get("Sprint").expect("quiz").participants, vec!["U3", "U2"]);
    }

    #[test]
    fn next_prompt_never_targets_unavailable_users() {
        let mut document = QuizDocument::new();
        document.create_quiz("Alpha", "U1").expect("create alpha");
        document.create_quiz("Beta", "U1").expect("create beta");

        let prompted = drain(&mut document);

        assert_eq!(prompted, vec!["U1"]);
        assert!(!document.is_user_available("U1"));
        assert_eq!(document.pending_ask("U1").map(|ask| ask.quiz_id), Some("Alpha".to_owned()));
    }

    #[test]
    fn no_user_holds_more_than_one_outstanding_ask() {
        let users = ["U1", "alice"];
        let mut document = QuizDocument::new();
        document.create_quiz("Alpha", "U1").expect("create alpha");
        document.create_quiz("Beta", "U1").expect("create beta");

        for _ in 0..64 {
            drain(&mut document);
            for user in users {
                assert!(outstanding_asks(&document, user) <= 1, "{user} has several asks");
            }

            let asks: Vec<_> = users
                .iter()
                .filter_map(|user| document.pending_ask(user).map(|ask| (*user, ask)))
                .collect();
            if asks.is_empty() {
                break;
            }
            for (user, ask) in asks {
                match ask.kind {
                    AskKind::ForParticipants => {
                        document
                            .apply_participants(&ask.quiz_id, user, resolved(&users))
                            .expect("participants");
                    }
                    AskKind::ForNewQuestion => {
                        let asked = document.get(&ask.quiz_id).expect("quiz").questions.len();
                        let text = if asked < 2 { format!("Q{asked}") } else { "end".to_owned() };
                        document.apply_new_question_or_end(&ask.quiz_id, &text).expect("reply");
                    }
                    AskKind::ForAnswer => {
                        let index = ask.question_index.expect("answer ask");
                        document.apply_answer(&ask.quiz_id, index, user, "yes").expect("answer");
                    }
                }
            }
        }

        assert_eq!(document.len(), 2);
        assert!(document.iter().all(|quiz| quiz.is_fully_answered()));
    }

    #[test]
    fn answering_without_outstanding_cell_is_rejected() {
        let mut document = QuizDocument::new();
        document.create_quiz("Sprint", "U1").expect("create");
        drain(&mut document);
        document.apply_participants("Sprint", "U1", resolved(&["alice"])).expect("participants");
        drain(&mut document);
        document.apply_new_question_or_end("Sprint", "Pet?").expect("question");
        drain(&mut document);
        document.apply_new_question_or_end("Sprint", "end").expect("end");
        let before = document.clone();

        let error = document.apply_answer("Sprint", 0, "alice", "cat").expect_err("not asked");

        assert!(matches!(error, DomainError::InvariantViolation(_)));
        assert_eq!(document, before);
    }

    #[test]
    fn only_the_creator_may_set_participants() {
        let mut document = QuizDocument::new();
        document.create_quiz("Sprint", "U1").expect("create");
        drain(&mut document);

        let error = document
            .apply_participants("Sprint", "U2", resolved(&["alice"]))
            .expect_err("not the creator");

        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn unknown_quiz_is_not_found() {
        let mut document = QuizDocument::new();
        let error = document
            .apply_prompt(&PromptTransition::AskParticipants { quiz_id: "Ghost".to_owned() })
            .expect_err("missing quiz");

        assert_eq!(error, DomainError::quiz_not_found("Ghost"));
    }

    #[test]
    fn participant_names_drop_at_sign_and_blank_tokens() {
        assert_eq!(
            parse_participant_names("  @alice bob\t@carol  "),
            vec!["alice".to_owned(), "bob".to_owned(), "carol".to_owned()]
        );
        assert!(parse_participant_names(" @ ").is_empty());
    }
}
