use std::sync::Arc;

use cquiz_core::config::AppConfig;
use cquiz_core::{Quiz, QuizDocument};
use cquiz_db::{connect_with_config, QuizStore, SqlKeyValueStore};

use crate::commands::{current_thread_runtime, load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("quizzes") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("quizzes") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(load_quizzes(&config));

    match result {
        Ok(quizzes) => CommandResult::success("quizzes", render(&quizzes)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("quizzes", error_class, message, exit_code)
        }
    }
}

async fn load_quizzes(config: &AppConfig) -> Result<QuizDocument, (&'static str, String, u8)> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    let store = QuizStore::new(
        Arc::new(SqlKeyValueStore::new(pool.clone())),
        config.store.document_key.clone(),
    );
    let snapshot = store.load_all().await.map_err(|error| ("store", error.to_string(), 5u8));
    pool.close().await;
    snapshot.map(|snapshot| snapshot.quizzes)
}

pub fn render(quizzes: &QuizDocument) -> String {
    if quizzes.is_empty() {
        return "no quizzes stored".to_owned();
    }

    let mut lines = vec![format!("{} quizzes:", quizzes.len())];
    lines.extend(quizzes.iter().map(render_quiz));
    lines.join("\n")
}

fn render_quiz(quiz: &Quiz) -> String {
    let (answered, expected) = quiz.answer_progress();
    format!(
        "- {} (creator: {}, phase: {}, participants: {}, questions: {}, answers: {answered}/{expected})",
        quiz.id,
        quiz.creator_id,
        quiz.phase().as_str(),
        quiz.participants.len(),
        quiz.questions.len(),
    )
}
