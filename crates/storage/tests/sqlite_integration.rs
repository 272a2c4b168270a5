use chrono::Duration;
use cc_core::model::{Category, CategoryId, CompletionUpdate, Question, QuestionId, UserId};
use cc_core::time::fixed_now;
use storage::sqlite::SqliteRepository;
use storage::{CatalogWriter, CategoryRepository, CompletionRepository, QuestionRepository, StorageError};

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn category(id: u128, name: &str, sort_order: i32) -> Category {
    Category::new(CategoryId::from_u128(id), name, None, sort_order, fixed_now()).unwrap()
}

fn question(id: u128, category: u128, active: bool) -> Question {
    Question::new(
        QuestionId::from_u128(id),
        CategoryId::from_u128(category),
        format!("Prompt {id}"),
        active,
        fixed_now(),
        fixed_now(),
    )
    .unwrap()
}

async fn seed_catalog(repo: &SqliteRepository) {
    repo.upsert_category(&category(1, "Past", 20)).await.unwrap();
    repo.upsert_category(&category(2, "Future", 10)).await.unwrap();
    repo.upsert_question(&question(10, 1, true)).await.unwrap();
    repo.upsert_question(&question(11, 1, true)).await.unwrap();
    repo.upsert_question(&question(12, 1, false)).await.unwrap();
    repo.upsert_question(&question(20, 2, true)).await.unwrap();
}

#[tokio::test]
async fn sqlite_lists_categories_by_sort_order() {
    let repo = connect("memdb_categories").await;
    seed_catalog(&repo).await;

    let categories = repo.list_categories().await.unwrap();
    let names: Vec<_> = categories.iter().map(Category::name).collect();
    assert_eq!(names, ["Future", "Past"]);
}

#[tokio::test]
async fn sqlite_active_questions_join_category_name() {
    let repo = connect("memdb_active").await;
    seed_catalog(&repo).await;

    let found = repo
        .active_questions_in(&[CategoryId::from_u128(1)])
        .await
        .unwrap();
    let ids: Vec<_> = found.iter().map(|q| q.id()).collect();
    assert_eq!(ids, [QuestionId::from_u128(10), QuestionId::from_u128(11)]);
    assert!(found.iter().all(|q| q.category_name() == "Past"));

    let both = repo
        .active_questions_in(&[CategoryId::from_u128(1), CategoryId::from_u128(2)])
        .await
        .unwrap();
    assert_eq!(both.len(), 3);
}

#[tokio::test]
async fn sqlite_irregular_row_does_not_break_selection() {
    let repo = connect("memdb_irregular_row").await;
    seed_catalog(&repo).await;

    // Edited outside the app: clock skew left updated_at before created_at.
    let created = fixed_now() + Duration::hours(1);
    sqlx::query(
        "INSERT INTO questions (id, category_id, text, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(QuestionId::from_u128(13).to_string())
    .bind(CategoryId::from_u128(1).to_string())
    .bind("  What surprised you this week?  ")
    .bind(true)
    .bind(created)
    .bind(fixed_now())
    .execute(repo.pool())
    .await
    .unwrap();

    let found = repo
        .active_questions_in(&[CategoryId::from_u128(1)])
        .await
        .unwrap();
    let ids: Vec<_> = found.iter().map(|q| q.id()).collect();
    assert_eq!(
        ids,
        [
            QuestionId::from_u128(10),
            QuestionId::from_u128(11),
            QuestionId::from_u128(13)
        ]
    );
    assert_eq!(found[2].text(), "  What surprised you this week?  ");
    assert!(found[2].question().updated_at() < found[2].question().created_at());
}

#[tokio::test]
async fn sqlite_questions_by_ids_keeps_caller_order_and_skips_missing() {
    let repo = connect("memdb_by_ids").await;
    seed_catalog(&repo).await;

    let found = repo
        .questions_by_ids(&[
            QuestionId::from_u128(20),
            QuestionId::from_u128(999),
            QuestionId::from_u128(12),
        ])
        .await
        .unwrap();
    let ids: Vec<_> = found.iter().map(|q| q.id()).collect();
    assert_eq!(ids, [QuestionId::from_u128(20), QuestionId::from_u128(12)]);
    assert!(!found[1].is_active());
}

#[tokio::test]
async fn sqlite_completion_upsert_is_keyed_by_user_and_question() {
    let repo = connect("memdb_completions").await;
    seed_catalog(&repo).await;
    let user = UserId::from_u128(7);
    let other = UserId::from_u128(8);
    let qid = QuestionId::from_u128(10);

    for (completed, secs) in [(true, 0), (true, 5), (false, 10)] {
        repo.upsert_completion(CompletionUpdate {
            user_id: user,
            question_id: qid,
            completed,
            updated_at: fixed_now() + Duration::seconds(secs),
        })
        .await
        .unwrap();
    }
    repo.upsert_completion(CompletionUpdate {
        user_id: other,
        question_id: qid,
        completed: true,
        updated_at: fixed_now(),
    })
    .await
    .unwrap();

    let marks = repo.completions_for_user(user).await.unwrap();
    assert_eq!(marks.len(), 1);
    assert!(!marks[0].completed);
    assert_eq!(marks[0].updated_at, fixed_now() + Duration::seconds(10));

    let other_marks = repo.completions_for_user(other).await.unwrap();
    assert_eq!(other_marks.len(), 1);
    assert!(other_marks[0].completed);
}

#[tokio::test]
async fn sqlite_completion_for_missing_question_is_not_found() {
    let repo = connect("memdb_missing_question").await;
    seed_catalog(&repo).await;

    let err = repo
        .upsert_completion(CompletionUpdate {
            user_id: UserId::from_u128(1),
            question_id: QuestionId::from_u128(404),
            completed: true,
            updated_at: fixed_now(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_migrate_is_repeatable() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
    assert!(repo.list_categories().await.unwrap().is_empty());
}
