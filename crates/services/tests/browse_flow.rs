use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use rand::SeedableRng;
use rand::rngs::StdRng;

use cc_core::model::{Category, CategoryId, Question, QuestionId, SelectionSet, UserId};
use cc_core::time::fixed_now;
use services::{
    AppServices, CardDeck, CategoryPicker, Clock, IdentityError, IdentityProvider, RequestContext,
    ServiceError, Session, SessionGate, SignedOut, StaticGate,
};
use storage::remote::RemoteConfig;
use storage::{CatalogWriter, InMemoryRepository, Storage};

const CAT_A: u128 = 1;
const CAT_B: u128 = 2;
const CAT_C: u128 = 3;

fn user() -> UserId {
    UserId::from_u128(100)
}

fn qid(id: u128) -> QuestionId {
    QuestionId::from_u128(id)
}

fn ctx() -> RequestContext {
    RequestContext::for_path("/app")
}

fn selection(ids: &[u128]) -> SelectionSet {
    SelectionSet::new(ids.iter().map(|id| CategoryId::from_u128(*id))).unwrap()
}

async fn seeded_repo() -> InMemoryRepository {
    let repo = InMemoryRepository::new();
    for (id, name, order) in [(CAT_A, "Alpha", 10), (CAT_B, "Beta", 20), (CAT_C, "Gamma", 30)] {
        let category =
            Category::new(CategoryId::from_u128(id), name, None, order, fixed_now()).unwrap();
        repo.upsert_category(&category).await.unwrap();
    }
    // q1, q2 in A; q3 in B; q4 inactive in A; q5 in C.
    for (id, category, active) in [
        (1, CAT_A, true),
        (2, CAT_A, true),
        (3, CAT_B, true),
        (4, CAT_A, false),
        (5, CAT_C, true),
    ] {
        let question = Question::new(
            qid(id),
            CategoryId::from_u128(category),
            format!("Question {id}"),
            active,
            fixed_now(),
            fixed_now(),
        )
        .unwrap();
        repo.upsert_question(&question).await.unwrap();
    }
    repo
}

fn services_for(repo: &InMemoryRepository, clock: Clock) -> AppServices {
    AppServices::new(
        &Storage::from_memory(repo.clone()),
        Arc::new(StaticGate::new(user())),
        clock,
    )
}

fn ids(found: &[cc_core::model::QuestionWithCategory]) -> HashSet<QuestionId> {
    found.iter().map(|q| q.id()).collect()
}

#[tokio::test]
async fn deals_every_active_question_in_selection_once() {
    let repo = seeded_repo().await;
    let services = services_for(&repo, Clock::fixed(fixed_now()));

    let found = services
        .selection()
        .get_incomplete_questions(&ctx(), &selection(&[CAT_A, CAT_B]))
        .await
        .unwrap();

    assert_eq!(found.len(), 3);
    assert_eq!(ids(&found), HashSet::from([qid(1), qid(2), qid(3)]));
    let q3 = found.iter().find(|q| q.id() == qid(3)).unwrap();
    assert_eq!(q3.category_name(), "Beta");
    assert!(found.iter().all(|q| q.is_active()));
}

#[tokio::test]
async fn completed_question_is_not_dealt() {
    let repo = seeded_repo().await;
    let services = services_for(&repo, Clock::fixed(fixed_now()));
    services
        .completions()
        .set_question_completion(&ctx(), qid(2), true)
        .await
        .unwrap();

    let found = services
        .selection()
        .get_incomplete_questions(&ctx(), &selection(&[CAT_A, CAT_B]))
        .await
        .unwrap();
    assert_eq!(ids(&found), HashSet::from([qid(1), qid(3)]));
}

#[tokio::test]
async fn completion_marks_are_per_user() {
    let repo = seeded_repo().await;
    let other = AppServices::new(
        &Storage::from_memory(repo.clone()),
        Arc::new(StaticGate::new(UserId::from_u128(200))),
        Clock::fixed(fixed_now()),
    );
    other
        .completions()
        .set_question_completion(&ctx(), qid(1), true)
        .await
        .unwrap();

    let found = services_for(&repo, Clock::fixed(fixed_now()))
        .selection()
        .get_incomplete_questions(&ctx(), &selection(&[CAT_A]))
        .await
        .unwrap();
    assert_eq!(ids(&found), HashSet::from([qid(1), qid(2)]));
}

#[tokio::test]
async fn marking_complete_twice_keeps_one_mark() {
    let repo = seeded_repo().await;
    let tracker = services_for(&repo, Clock::fixed(fixed_now())).completions();

    tracker.set_question_completion(&ctx(), qid(1), true).await.unwrap();
    tracker.set_question_completion(&ctx(), qid(1), true).await.unwrap();

    assert_eq!(repo.completion_rows(user(), qid(1)), 1);
    let completed = tracker.list_completed_questions(&ctx()).await.unwrap();
    assert_eq!(ids(&completed), HashSet::from([qid(1)]));
}

#[tokio::test]
async fn reopening_a_question_deals_it_again() {
    let repo = seeded_repo().await;
    let services = services_for(&repo, Clock::fixed(fixed_now()));
    let tracker = services.completions();

    tracker.set_question_completion(&ctx(), qid(3), true).await.unwrap();
    tracker.set_question_completion(&ctx(), qid(3), false).await.unwrap();

    let found = services
        .selection()
        .get_incomplete_questions(&ctx(), &selection(&[CAT_B]))
        .await
        .unwrap();
    assert_eq!(ids(&found), HashSet::from([qid(3)]));
    assert!(tracker.list_completed_questions(&ctx()).await.unwrap().is_empty());
}

#[tokio::test]
async fn all_done_is_an_empty_result() {
    let repo = seeded_repo().await;
    let services = services_for(&repo, Clock::fixed(fixed_now()));
    services
        .completions()
        .set_question_completion(&ctx(), qid(5), true)
        .await
        .unwrap();

    let found = services
        .selection()
        .get_incomplete_questions(&ctx(), &selection(&[CAT_C]))
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn unauthenticated_calls_never_reach_the_store() {
    let repo = seeded_repo().await;
    let services = AppServices::new(
        &Storage::from_memory(repo.clone()),
        Arc::new(SignedOut),
        Clock::fixed(fixed_now()),
    );
    let before = repo.calls();

    let dealt = services
        .selection()
        .get_incomplete_questions(&ctx(), &selection(&[CAT_A]))
        .await;
    assert!(matches!(dealt, Err(ServiceError::Unauthenticated)));

    let marked = services
        .completions()
        .set_question_completion(&ctx(), qid(1), true)
        .await;
    assert!(matches!(marked, Err(ServiceError::Unauthenticated)));

    let listed = services.catalog().list_categories(&ctx()).await;
    assert!(matches!(listed, Err(ServiceError::Unauthenticated)));

    let completed = services.completions().list_completed_questions(&ctx()).await;
    assert!(matches!(completed, Err(ServiceError::Unauthenticated)));

    assert_eq!(repo.calls(), before);
}

#[tokio::test]
async fn store_failures_surface_as_upstream_errors() {
    let repo = seeded_repo().await;
    let services = services_for(&repo, Clock::fixed(fixed_now()));
    repo.set_offline(true);

    let err = services
        .selection()
        .get_incomplete_questions(&ctx(), &selection(&[CAT_A]))
        .await
        .unwrap_err();
    assert!(err.is_upstream());

    let err = services
        .completions()
        .set_question_completion(&ctx(), qid(1), true)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Upstream(_)));
}

#[tokio::test]
async fn categories_are_listed_in_sort_order() {
    let repo = seeded_repo().await;
    let categories = services_for(&repo, Clock::system())
        .catalog()
        .list_categories(&ctx())
        .await
        .unwrap();
    let names: Vec<_> = categories.iter().map(Category::name).collect();
    assert_eq!(names, ["Alpha", "Beta", "Gamma"]);
}

#[tokio::test]
async fn completed_list_is_most_recent_first() {
    let repo = seeded_repo().await;
    for (question, secs) in [(1, 0), (3, 30), (5, 10)] {
        services_for(&repo, Clock::fixed(fixed_now() + Duration::seconds(secs)))
            .completions()
            .set_question_completion(&ctx(), qid(question), true)
            .await
            .unwrap();
    }

    let completed = services_for(&repo, Clock::system())
        .completions()
        .list_completed_questions(&ctx())
        .await
        .unwrap();
    let order: Vec<_> = completed.iter().map(|q| q.id()).collect();
    assert_eq!(order, [qid(3), qid(5), qid(1)]);
}

#[tokio::test]
async fn shuffle_positions_are_roughly_uniform() {
    let repo = seeded_repo().await;
    let selection_service = services_for(&repo, Clock::system()).selection();
    let chosen = selection(&[CAT_A, CAT_B]);
    let mut rng = StdRng::seed_from_u64(0x5eed);

    const ROUNDS: usize = 3000;
    let mut first_position = [0_usize; 3];
    for _ in 0..ROUNDS {
        let dealt = selection_service
            .get_incomplete_questions_with_rng(&ctx(), &chosen, &mut rng)
            .await
            .unwrap();
        let position = dealt.iter().position(|q| q.id() == qid(1)).unwrap();
        first_position[position] += 1;
    }

    let expected = ROUNDS / 3;
    for count in first_position {
        assert!(
            count.abs_diff(expected) < 150,
            "position counts {first_position:?} far from {expected}"
        );
    }
}

#[tokio::test]
async fn picker_to_deck_flow_toggles_completion() {
    let repo = seeded_repo().await;
    let services = services_for(&repo, Clock::fixed(fixed_now()));

    let categories = services.catalog().list_categories(&ctx()).await.unwrap();
    let mut picker = CategoryPicker::new(categories);
    picker.toggle(CategoryId::from_u128(CAT_A));
    picker.toggle(CategoryId::from_u128(CAT_C));
    let chosen = picker.start().unwrap();

    let dealt = services
        .selection()
        .get_incomplete_questions_with_rng(&ctx(), &chosen, &mut StdRng::seed_from_u64(3))
        .await
        .unwrap();
    let mut deck = CardDeck::new(dealt);
    assert_eq!(deck.len(), 1);
    assert_eq!(deck.current().unwrap().question.id(), qid(3));

    let tracker = services.completions();
    assert!(deck.toggle_current(&tracker, &ctx()).await.unwrap());
    assert_eq!(deck.completed_count(), 1);
    assert_eq!(deck.len(), 1);

    let again = services
        .selection()
        .get_incomplete_questions(&ctx(), &chosen)
        .await
        .unwrap();
    assert!(again.is_empty());

    assert!(!deck.toggle_current(&tracker, &ctx()).await.unwrap());
    let reopened = services
        .selection()
        .get_incomplete_questions(&ctx(), &chosen)
        .await
        .unwrap();
    assert_eq!(ids(&reopened), HashSet::from([qid(3)]));
}

#[tokio::test]
async fn failed_toggle_leaves_deck_usable() {
    let repo = seeded_repo().await;
    let services = services_for(&repo, Clock::fixed(fixed_now()));
    let dealt = services
        .selection()
        .get_incomplete_questions(&ctx(), &selection(&[CAT_B]))
        .await
        .unwrap();
    let mut deck = CardDeck::new(dealt);

    repo.set_offline(true);
    let err = deck
        .toggle_current(&services.completions(), &ctx())
        .await
        .unwrap_err();
    assert!(err.is_upstream());
    assert!(!deck.is_busy());
    assert!(!deck.current().unwrap().completed);

    repo.set_offline(false);
    assert!(deck.toggle_current(&services.completions(), &ctx()).await.unwrap());
}

struct FakeIdentity;

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in(&self, _email: &str, password: &str) -> Result<Session, IdentityError> {
        if password.is_empty() {
            return Err(IdentityError::Rejected("missing password".into()));
        }
        Ok(Session {
            user_id: user(),
            access_token: "fake-token".into(),
            expires_at: None,
        })
    }

    async fn sign_out(&self, _session: &Session) -> Result<(), IdentityError> {
        Ok(())
    }
}

#[tokio::test]
async fn remote_services_follow_the_session_slot() {
    let config = RemoteConfig::new("http://127.0.0.1:9", "anon");
    let services = AppServices::remote_with_provider(
        config,
        Arc::new(FakeIdentity),
        "me@example.com",
        "secret",
        Clock::system(),
    )
    .await
    .unwrap();

    let session = services.gate().resolve_session(&ctx()).unwrap();
    assert_eq!(session.user_id, user());

    services.auth().unwrap().sign_out().await.unwrap();
    assert!(services.gate().resolve_session(&ctx()).is_none());

    let dealt = services
        .selection()
        .get_incomplete_questions(&ctx(), &selection(&[CAT_A]))
        .await;
    assert!(matches!(dealt, Err(ServiceError::Unauthenticated)));
}

#[tokio::test]
async fn rejected_remote_sign_in_fails_construction() {
    let config = RemoteConfig::new("http://127.0.0.1:9", "anon");
    let result = AppServices::remote_with_provider(
        config,
        Arc::new(FakeIdentity),
        "me@example.com",
        "",
        Clock::system(),
    )
    .await;
    assert!(result.is_err());
}
