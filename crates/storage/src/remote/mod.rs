//! PostgREST adapter for the hosted store.
//!
//! Every request carries the project's anon key plus the signed-in user's
//! access token; row-level security on the hosted tables scopes reads and
//! writes to that user.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use cc_core::model::{
    Category, CategoryId, CompletionMark, CompletionUpdate, QuestionId, QuestionWithCategory,
    UserId,
};

use crate::repository::{
    CategoryRepository, CompletionRepository, QuestionRepository, Storage, StorageError,
};

mod rows;

use rows::{CategoryRow, CompletionRow, CompletionUpsertRow, QuestionRow};

pub const DEFAULT_SCHEMA: &str = "connected_conversations";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: String,
    pub anon_key: String,
    pub schema: String,
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Read the hosted project settings from the environment.
    ///
    /// Returns `None` when `CC_SUPABASE_URL` or `CC_SUPABASE_ANON_KEY` is
    /// missing or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("CC_SUPABASE_URL").ok()?;
        let anon_key = env::var("CC_SUPABASE_ANON_KEY").ok()?;
        if base_url.trim().is_empty() || anon_key.trim().is_empty() {
            return None;
        }
        let schema = env::var("CC_SCHEMA").unwrap_or_else(|_| DEFAULT_SCHEMA.into());
        let timeout = env::var("CC_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Some(
            Self::new(base_url, anon_key)
                .with_schema(schema)
                .with_timeout(Duration::from_secs(timeout)),
        )
    }

    #[must_use]
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_owned(),
            anon_key: anon_key.into().trim().to_owned(),
            schema: DEFAULT_SCHEMA.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `{base}/rest/v1/{table}`
    #[must_use]
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    /// `{base}/auth/v1/{path}`
    #[must_use]
    pub fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteInitError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// PostgREST `in.(a,b,c)` filter value.
pub(crate) fn in_filter<T: std::fmt::Display>(ids: &[T]) -> String {
    let joined = ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({joined})")
}

#[derive(Clone)]
pub struct RemoteRepository {
    client: Client,
    config: Arc<RemoteConfig>,
    access_token: Arc<str>,
}

impl RemoteRepository {
    /// Build a repository that talks to the hosted store as the user who owns
    /// `access_token`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteInitError` if the HTTP client cannot be built.
    pub fn new(config: RemoteConfig, access_token: &str) -> Result<Self, RemoteInitError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config: Arc::new(config),
            access_token: Arc::from(access_token),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&*self.access_token)
    }

    fn read(&self, table: &str) -> RequestBuilder {
        let url = self.config.table_url(table);
        debug!(%url, "store read");
        self.authorized(self.client.get(url))
            .header("Accept-Profile", &self.config.schema)
    }

    fn write(&self, table: &str) -> RequestBuilder {
        let url = self.config.table_url(table);
        debug!(%url, "store write");
        self.authorized(self.client.post(url))
            .header("Content-Profile", &self.config.schema)
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Vec<T>, StorageError> {
        let response = send(request).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

async fn send(request: RequestBuilder) -> Result<Response, StorageError> {
    let response = request
        .send()
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Remote {
        status: status.as_u16(),
        message,
    })
}

const COMPLETIONS_TABLE: &str = "question_completions";
const COMPLETION_CONFLICT_TARGET: &str = "user_id,question_id";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=minimal";
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl RemoteRepository {
    fn categories_request(&self) -> RequestBuilder {
        self.read("categories")
            .query(&[("select", "*"), ("order", "sort_order.asc")])
    }

    fn active_questions_request(&self, categories: &[CategoryId]) -> RequestBuilder {
        self.read("questions").query(&[
            ("select", "*,categories(name)".to_owned()),
            ("category_id", in_filter(categories)),
            ("is_active", "eq.true".to_owned()),
        ])
    }

    fn questions_by_ids_request(&self, ids: &[QuestionId]) -> RequestBuilder {
        self.read("questions").query(&[
            ("select", "*,categories(name)".to_owned()),
            ("id", in_filter(ids)),
        ])
    }

    fn completions_request(&self, user: UserId) -> RequestBuilder {
        self.read(COMPLETIONS_TABLE).query(&[
            ("select", "*".to_owned()),
            ("user_id", format!("eq.{user}")),
            ("order", "updated_at.desc".to_owned()),
        ])
    }

    /// One row per `(user_id, question_id)`: PostgREST merges into the
    /// existing row on the unique key instead of inserting a second one.
    fn upsert_completion_request(&self, update: CompletionUpdate) -> RequestBuilder {
        self.write(COMPLETIONS_TABLE)
            .query(&[("on_conflict", COMPLETION_CONFLICT_TARGET)])
            .header("Prefer", MERGE_DUPLICATES)
            .json(&[CompletionUpsertRow::from(update)])
    }
}

/// A 409 carrying Postgres code 23503 means the question does not exist.
fn map_upsert_error(err: StorageError) -> StorageError {
    match err {
        StorageError::Remote { status: 409, message } if message.contains(FOREIGN_KEY_VIOLATION) => {
            StorageError::NotFound
        }
        other => other,
    }
}

#[async_trait]
impl CategoryRepository for RemoteRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let rows: Vec<CategoryRow> = self.fetch_rows(self.categories_request()).await?;
        Ok(rows.into_iter().map(CategoryRow::into_category).collect())
    }
}

#[async_trait]
impl QuestionRepository for RemoteRepository {
    async fn active_questions_in(
        &self,
        categories: &[CategoryId],
    ) -> Result<Vec<QuestionWithCategory>, StorageError> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<QuestionRow> = self
            .fetch_rows(self.active_questions_request(categories))
            .await?;
        Ok(rows.into_iter().map(QuestionRow::into_joined).collect())
    }

    async fn questions_by_ids(
        &self,
        ids: &[QuestionId],
    ) -> Result<Vec<QuestionWithCategory>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<QuestionRow> = self.fetch_rows(self.questions_by_ids_request(ids)).await?;
        let mut found: Vec<_> = rows.into_iter().map(QuestionRow::into_joined).collect();
        found.sort_by_key(|q| ids.iter().position(|id| *id == q.id()));
        Ok(found)
    }
}

#[async_trait]
impl CompletionRepository for RemoteRepository {
    async fn completions_for_user(&self, user: UserId) -> Result<Vec<CompletionMark>, StorageError> {
        let rows: Vec<CompletionRow> = self.fetch_rows(self.completions_request(user)).await?;
        Ok(rows.into_iter().map(CompletionMark::from).collect())
    }

    async fn upsert_completion(&self, update: CompletionUpdate) -> Result<(), StorageError> {
        send(self.upsert_completion_request(update))
            .await
            .map(|_| ())
            .map_err(map_upsert_error)
    }
}

impl Storage {
    /// Build a `Storage` backed by the hosted store, acting as the user who
    /// owns `access_token`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteInitError` if the HTTP client cannot be built.
    pub fn remote(config: RemoteConfig, access_token: &str) -> Result<Self, RemoteInitError> {
        let repo = RemoteRepository::new(config, access_token)?;
        let categories: Arc<dyn CategoryRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let completions: Arc<dyn CompletionRepository> = Arc::new(repo);
        Ok(Self {
            categories,
            questions,
            completions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_trims_trailing_slash() {
        let config = RemoteConfig::new("https://demo.supabase.co/ ", "anon");
        assert_eq!(
            config.table_url("questions"),
            "https://demo.supabase.co/rest/v1/questions"
        );
        assert_eq!(
            config.auth_url("/token"),
            "https://demo.supabase.co/auth/v1/token"
        );
        assert_eq!(config.schema, DEFAULT_SCHEMA);
    }

    #[test]
    fn in_filter_joins_ids() {
        let ids = [CategoryId::from_u128(1), CategoryId::from_u128(2)];
        assert_eq!(
            in_filter(&ids),
            "in.(00000000-0000-0000-0000-000000000001,00000000-0000-0000-0000-000000000002)"
        );
    }

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RemoteRepository>();
    }

    #[test]
    fn config_defaults_to_fifteen_second_timeout() {
        let config = RemoteConfig::new("https://demo.supabase.co", "anon");
        assert_eq!(config.timeout, Duration::from_secs(15));
        let slower = config.with_timeout(Duration::from_secs(40));
        assert_eq!(slower.timeout, Duration::from_secs(40));
    }

    fn repo() -> RemoteRepository {
        let config = RemoteConfig::new("https://demo.supabase.co", "anon-key");
        RemoteRepository::new(config, "user-token").unwrap()
    }

    fn query_of(request: &reqwest::Request) -> Vec<(String, String)> {
        request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn header<'a>(request: &'a reqwest::Request, name: &str) -> &'a str {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    #[test]
    fn active_questions_request_filters_by_category_and_flag() {
        let ids = [CategoryId::from_u128(1), CategoryId::from_u128(2)];
        let request = repo().active_questions_request(&ids[..]).build().unwrap();

        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().path(), "/rest/v1/questions");
        let query = query_of(&request);
        assert!(query.contains(&("select".into(), "*,categories(name)".into())));
        assert!(query.contains(&("category_id".into(), in_filter(&ids[..]))));
        assert!(query.contains(&("is_active".into(), "eq.true".into())));
        assert_eq!(header(&request, "Accept-Profile"), DEFAULT_SCHEMA);
        assert_eq!(header(&request, "apikey"), "anon-key");
        assert_eq!(header(&request, "authorization"), "Bearer user-token");
    }

    #[test]
    fn upsert_request_merges_on_user_and_question() {
        let update = CompletionUpdate {
            user_id: UserId::from_u128(7),
            question_id: QuestionId::from_u128(9),
            completed: true,
            updated_at: cc_core::time::fixed_now(),
        };
        let request = repo().upsert_completion_request(update).build().unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/rest/v1/question_completions");
        assert_eq!(
            query_of(&request),
            [("on_conflict".to_owned(), "user_id,question_id".to_owned())]
        );
        assert_eq!(
            header(&request, "Prefer"),
            "resolution=merge-duplicates,return=minimal"
        );
        assert_eq!(header(&request, "Content-Profile"), DEFAULT_SCHEMA);

        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let rows: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(rows.as_array().map(Vec::len), Some(1));
        assert_eq!(rows[0]["question_id"], QuestionId::from_u128(9).to_string());
        assert_eq!(rows[0]["completed"], true);
    }

    #[test]
    fn completions_request_is_scoped_to_user_newest_first() {
        let user = UserId::from_u128(7);
        let request = repo().completions_request(user).build().unwrap();
        let query = query_of(&request);
        assert!(query.contains(&("user_id".into(), format!("eq.{user}"))));
        assert!(query.contains(&("order".into(), "updated_at.desc".into())));
    }

    #[test]
    fn foreign_key_conflict_maps_to_not_found() {
        let dangling = StorageError::Remote {
            status: 409,
            message: r#"{"code":"23503","message":"violates foreign key constraint"}"#.into(),
        };
        assert!(matches!(map_upsert_error(dangling), StorageError::NotFound));

        let other_conflict = StorageError::Remote {
            status: 409,
            message: r#"{"code":"23505"}"#.into(),
        };
        assert!(matches!(
            map_upsert_error(other_conflict),
            StorageError::Remote { status: 409, .. }
        ));

        let server_error = StorageError::Remote {
            status: 500,
            message: "23503".into(),
        };
        assert!(matches!(
            map_upsert_error(server_error),
            StorageError::Remote { status: 500, .. }
        ));
    }
}
