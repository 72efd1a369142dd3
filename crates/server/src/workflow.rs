use tracing::debug;

use cquiz_core::errors::{ApplicationError, DomainError};
use cquiz_core::QuizDocument;
use cquiz_db::QuizStore;

/// Load, mutate and compare-and-swap the quiz document.
///
/// A conflicting save reloads and re-applies `mutate` up to `max_retries` extra times. A
/// domain error aborts without writing.
pub async fn read_modify_write<T, F>(
    store: &QuizStore,
    max_retries: u32,
    mut mutate: F,
) -> Result<T, ApplicationError>
where
    F: FnMut(&mut QuizDocument) -> Result<T, DomainError>,
{
    let mut attempt = 0;
    loop {
        let mut snapshot = store.load_all().await?;
        let value = mutate(&mut snapshot.quizzes)?;

        match store.save_all(&snapshot.quizzes, &snapshot.version).await {
            Ok(_) => return Ok(value),
            Err(error) if error.is_conflict() && attempt < max_retries => {
                attempt += 1;
                debug!(
                    event_name = "store.conflict_retry",
                    attempt,
                    max_retries,
                    "quiz document changed underneath; retrying"
                );
            }
            Err(error) => return Err(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use cquiz_core::errors::{ApplicationError, DomainError};

    use super::read_modify_write;
    use crate::testing::contended_store;

    #[tokio::test]
    async fn conflict_is_reported_without_retries() {
        let (kv, store) = contended_store();
        kv.reject_writes(&[true]).await;

        let result = read_modify_write(&store, 0, |quizzes| {
            quizzes.create_quiz("Sprint", "U1").map(|_| ())
        })
        .await;

        assert_eq!(result, Err(ApplicationError::Conflict));
        assert!(store.load_all().await.expect("load").quizzes.is_empty());
    }

    #[tokio::test]
    async fn conflict_retries_reapply_the_mutation() {
        let (kv, store) = contended_store();
        kv.reject_writes(&[true, true]).await;
        let mut applied = 0;

        read_modify_write(&store, 2, |quizzes| {
            applied += 1;
            quizzes.create_quiz("Sprint", "U1").map(|_| ())
        })
        .await
        .expect("third attempt should land");

        assert_eq!(applied, 3);
        assert!(store.load_all().await.expect("load").quizzes.contains("Sprint"));
    }

    #[tokio::test]
    async fn domain_errors_skip_the_write() {
        let (_kv, store) = contended_store();
        read_modify_write(&store, 0, |quizzes| quizzes.create_quiz("Sprint", "U1").map(|_| ()))
            .await
            .expect("create");

        let result = read_modify_write(&store, 0, |quizzes| {
            quizzes.create_quiz("Sprint", "U2").map(|_| ())
        })
        .await;

        assert_eq!(
            result,
            Err(ApplicationError::Domain(DomainError::AlreadyExists {
                quiz_id: "Sprint".to_owned()
            }))
        );
    }
}
