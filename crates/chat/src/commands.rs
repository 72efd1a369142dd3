use async_trait::async_trait;
use thiserror::Error;

pub const HELP_TEXT: &str = "Available Commands:

create [quizName]
\tCreates a new Quiz. quizName must be unique.

\texample: /cquiz create MyAwesomeQuiz

list
\tLists all quiz.

start [quizName] [channelName]
\tStarts a quiz on certain channel with the answers fetched so far

\texample: /cquiz start MyAwesomeQuiz Town-Square

help
\tDisplay usage.
";

pub const MISSING_QUIZ_NAME: &str = "You must provide a quiz name";
pub const QUIZ_NAME_HAS_SPACES: &str = "Quiz name must have no spaces";
pub const MISSING_START_ARGUMENTS: &str = "You must provide a quiz name and a channel name";
pub const TOO_MANY_START_ARGUMENTS: &str = "`start` only receives 2 arguments";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub team_id: String,
    pub user_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub trigger: String,
    pub verb: Option<String>,
    pub args: Vec<String>,
    pub channel_id: String,
    pub team_id: String,
    pub user_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuizCommand {
    Create { name: String },
    List,
    Start { quiz_name: String, channel_name: String },
    Help,
    /// Recognized verb with unusable arguments; carries the text shown to the user.
    Invalid { reason: &'static str },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseVisibility {
    Ephemeral,
    InChannel,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandResponse {
    pub visibility: ResponseVisibility,
    pub text: String,
}

impl CommandResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self { visibility: ResponseVisibility::Ephemeral, text: text.into() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

/// Splits a slash command payload into verb and arguments for `/{trigger}`.
pub fn normalize_quiz_command(
    payload: SlashCommandPayload,
    trigger: &str,
) -> Result<CommandEnvelope, CommandParseError> {
    if payload.command.strip_prefix('/') != Some(trigger) {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }

    let mut parts = payload.text.split_whitespace();
    let verb = parts.next().map(str::to_ascii_lowercase);
    let args = parts.map(str::to_owned).collect();

    Ok(CommandEnvelope {
        trigger: trigger.to_owned(),
        verb,
        args,
        channel_id: payload.channel_id,
        team_id: payload.team_id,
        user_id: payload.user_id,
        request_id: payload.request_id,
    })
}

pub fn classify_quiz_command(verb: Option<&str>, args: &[String]) -> QuizCommand {
    match verb {
        None | Some("list") => QuizCommand::List,
        Some("create" | "add") => match args {
            [] => QuizCommand::Invalid { reason: MISSING_QUIZ_NAME },
            [name] => QuizCommand::Create { name: name.clone() },
            _ => QuizCommand::Invalid { reason: QUIZ_NAME_HAS_SPACES },
        },
        Some("start") => match args {
            [] | [_] => QuizCommand::Invalid { reason: MISSING_START_ARGUMENTS },
            [quiz_name, channel_name] => QuizCommand::Start {
                quiz_name: quiz_name.clone(),
                channel_name: channel_name.strip_prefix('~').unwrap_or(channel_name).to_owned(),
            },
            _ => QuizCommand::Invalid { reason: TOO_MANY_START_ARGUMENTS },
        },
        Some(_) => QuizCommand::Help,
    }
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: QuizCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        envelope: CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError> {
        match classify_quiz_command(envelope.verb.as_deref(), &envelope.args) {
            QuizCommand::Create { name } => self.service.create_quiz(&name, &envelope).await,
            QuizCommand::List => self.service.list_quizzes(&envelope).await,
            QuizCommand::Start { quiz_name, channel_name } => {
                self.service.start_quiz(&quiz_name, &channel_name, &envelope).await
            }
            QuizCommand::Help => Ok(CommandResponse::ephemeral(HELP_TEXT)),
            QuizCommand::Invalid { reason } => Ok(CommandResponse::ephemeral(reason)),
        }
    }
}

#[async_trait]
pub trait QuizCommandService: Send + Sync {
    async fn create_quiz(
        &self,
        name: &str,
        envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError>;

    async fn list_quizzes(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError>;

    async fn start_quiz(
        &self,
        quiz_name: &str,
        channel_name: &str,
        envelope: &CommandEnvelope,
    ) -> Result<CommandResponse, CommandRouteError>;
}
