use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{catch, catchers, delete, get, options, post, put, routes, Build, Request, Response, Rocket, State};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use common::{Config, FetchConfig, ServerConfig};

use crate::aggregator::Aggregator;
use crate::auth::{hash_password, verify_password, AuthRejection, AuthUser, TokenSigner};
use crate::categories::CategoryTable;
use crate::extract::ContentExtractor;
use crate::feeds::FeedFetcher;
use crate::llm::provider_from_config;
use crate::models::Article;
use crate::store::{PreferenceStore, SqliteStore, StoreError, StoredPreferences};
use crate::summarize::{SummarizeError, Summarizer};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    pub summarizer: Summarizer,
    pub store: SqliteStore,
    pub tokens: TokenSigner,
}

impl AppState {
    pub fn new(aggregator: Aggregator, summarizer: Summarizer, store: SqliteStore, tokens: TokenSigner) -> Self {
        Self {
            aggregator,
            summarizer,
            store,
            tokens,
        }
    }

    /// Wire the pipeline from configuration. One HTTP client is shared by the
    /// feed fetcher, the content extractor and the completion provider.
    pub fn from_config(config: &Config, pool: SqlitePool) -> Result<Self> {
        let client = http_client(&config.fetch)?;
        let timeout = Duration::from_secs(config.fetch.timeout_seconds());

        let provider = match provider_from_config(config.llm.as_ref(), client.clone()) {
            Ok(Some(provider)) => Some(provider),
            Ok(None) => {
                warn!("No LLM adapter configured; summaries will be unavailable");
                None
            }
            Err(e) => {
                error!("Failed to initialize LLM provider: {:#}", e);
                None
            }
        };

        let fetcher = FeedFetcher::new(client.clone(), timeout);
        let aggregator = Aggregator::new(fetcher, CategoryTable::google_news(), config.fetch.max_concurrency());
        let summarizer = Summarizer::new(ContentExtractor::new(client, timeout), provider);

        Ok(Self::new(
            aggregator,
            summarizer,
            SqliteStore::new(pool),
            TokenSigner::from_config(&config.auth),
        ))
    }
}

/// Build the process-wide outbound HTTP client.
///
/// No client-wide timeout: every caller sets its own per request, so the
/// completion backend can take longer than a feed fetch.
pub fn http_client(fetch: &FetchConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(fetch.user_agent())
        .build()
        .context("failed to build reqwest client")
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub detail: String,
}

type ApiError = (Status, Json<ErrorDetail>);
type ApiResult<T> = std::result::Result<T, ApiError>;

fn api_error(status: Status, detail: impl Into<String>) -> ApiError {
    (status, Json(ErrorDetail { detail: detail.into() }))
}

fn store_failure(e: StoreError) -> ApiError {
    error!("store error: {}", e);
    api_error(Status::InternalServerError, "Internal server error")
}

#[derive(Deserialize)]
struct SignupRequest {
    email: String,
    password: String,
    name: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub token: String,
}

#[derive(Deserialize)]
struct PreferencesUpdate {
    categories: Vec<String>,
}

#[derive(Deserialize)]
struct RssFeedAdd {
    feed_url: String,
}

#[derive(Deserialize)]
struct SummarizeRequest {
    article_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub summary: String,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

fn message(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message })
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

// ============================================================================
// Routes
// ============================================================================

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

#[get("/")]
async fn api_root() -> Json<MessageResponse> {
    message("AI News Digest API")
}

#[post("/auth/signup", data = "<body>")]
async fn signup(state: &State<AppState>, body: Json<SignupRequest>) -> ApiResult<Json<AuthResponse>> {
    let email = body.email.trim();
    if !looks_like_email(email) {
        return Err(api_error(Status::UnprocessableEntity, "Invalid email address"));
    }
    if body.password.is_empty() || body.name.trim().is_empty() {
        return Err(api_error(Status::UnprocessableEntity, "Name and password are required"));
    }

    let password_hash = hash_password(&body.password).map_err(|e| {
        error!("failed to hash password: {}", e);
        api_error(Status::InternalServerError, "Internal server error")
    })?;

    let user = match state.store.create_user(email, body.name.trim(), &password_hash).await {
        Ok(user) => user,
        Err(StoreError::EmailTaken) => {
            return Err(api_error(Status::BadRequest, "Email already registered"));
        }
        Err(e) => return Err(store_failure(e)),
    };

    state
        .store
        .get_or_create_preferences(&user.id)
        .await
        .map_err(store_failure)?;

    let token = state.tokens.issue(&user.id, &user.email).map_err(|e| {
        error!("failed to create jwt: {}", e);
        api_error(Status::InternalServerError, "Internal server error")
    })?;

    Ok(Json(AuthResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        token,
    }))
}

#[post("/auth/login", data = "<body>")]
async fn login(state: &State<AppState>, body: Json<LoginRequest>) -> ApiResult<Json<AuthResponse>> {
    let user = state
        .store
        .find_user_by_email(body.email.trim())
        .await
        .map_err(store_failure)?;

    let user = match user {
        Some(user) if verify_password(&body.password, &user.password_hash) => user,
        _ => return Err(api_error(Status::Unauthorized, "Invalid credentials")),
    };

    let token = state.tokens.issue(&user.id, &user.email).map_err(|e| {
        error!("failed to create jwt: {}", e);
        api_error(Status::InternalServerError, "Internal server error")
    })?;

    Ok(Json(AuthResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        token,
    }))
}

#[get("/preferences")]
async fn get_preferences(state: &State<AppState>, user: AuthUser) -> ApiResult<Json<StoredPreferences>> {
    state
        .store
        .get_or_create_preferences(&user.user_id)
        .await
        .map(Json)
        .map_err(store_failure)
}

#[put("/preferences", data = "<body>")]
async fn update_preferences(
    state: &State<AppState>,
    user: AuthUser,
    body: Json<PreferencesUpdate>,
) -> ApiResult<Json<MessageResponse>> {
    let body = body.into_inner();
    state
        .store
        .set_categories(&user.user_id, body.categories)
        .await
        .map_err(store_failure)?;
    Ok(message("Preferences updated"))
}

#[post("/rss-feeds", data = "<body>")]
async fn add_rss_feed(
    state: &State<AppState>,
    user: AuthUser,
    body: Json<RssFeedAdd>,
) -> ApiResult<Json<MessageResponse>> {
    let feed_url = body.feed_url.trim();
    if feed_url.is_empty() {
        return Err(api_error(Status::UnprocessableEntity, "feed_url is required"));
    }
    state
        .store
        .add_custom_feed(&user.user_id, feed_url)
        .await
        .map_err(store_failure)?;
    Ok(message("RSS feed added"))
}

#[delete("/rss-feeds?<feed_url>")]
async fn remove_rss_feed(
    state: &State<AppState>,
    user: AuthUser,
    feed_url: String,
) -> ApiResult<Json<MessageResponse>> {
    state
        .store
        .remove_custom_feed(&user.user_id, &feed_url)
        .await
        .map_err(store_failure)?;
    Ok(message("RSS feed removed"))
}

#[get("/news")]
async fn get_news(state: &State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Article>>> {
    let preferences = state.store.get(&user.user_id).await.map_err(store_failure)?;
    let articles = state.aggregator.aggregate(preferences.as_ref()).await;
    Ok(Json(articles))
}

#[get("/news/search?<query>")]
async fn search_news(state: &State<AppState>, _user: AuthUser, query: String) -> Json<Vec<Article>> {
    Json(state.aggregator.search(&query).await)
}

#[post("/news/summarize", data = "<body>")]
async fn summarize_article(
    state: &State<AppState>,
    user: AuthUser,
    body: Json<SummarizeRequest>,
) -> ApiResult<Json<SummarizeResponse>> {
    match state.summarizer.summarize(&user.user_id, &body.article_url).await {
        Ok(summary) => Ok(Json(SummarizeResponse { summary })),
        Err(SummarizeError::Extraction { .. }) => Err(api_error(
            Status::BadRequest,
            "Could not extract article content",
        )),
        Err(SummarizeError::Completion(_)) => Err(api_error(
            Status::InternalServerError,
            "Failed to summarize article",
        )),
    }
}

#[options("/<_..>")]
async fn preflight() -> Status {
    Status::NoContent
}

#[catch(400)]
fn bad_request() -> Json<ErrorDetail> {
    Json(ErrorDetail { detail: "Bad request".into() })
}

#[catch(401)]
fn unauthorized(req: &Request) -> Json<ErrorDetail> {
    let rejection = req.local_cache(AuthRejection::default);
    Json(ErrorDetail { detail: rejection.0.into() })
}

#[catch(404)]
fn not_found() -> Json<ErrorDetail> {
    Json(ErrorDetail { detail: "Not Found".into() })
}

#[catch(422)]
fn unprocessable() -> Json<ErrorDetail> {
    Json(ErrorDetail { detail: "Invalid request body".into() })
}

#[catch(500)]
fn internal_error() -> Json<ErrorDetail> {
    Json(ErrorDetail { detail: "Internal server error".into() })
}

// ============================================================================
// CORS
// ============================================================================

/// Adds CORS headers for the configured origins. `"*"` allows any origin.
pub struct Cors {
    origins: Vec<String>,
}

impl Cors {
    pub fn new(origins: Vec<String>) -> Self {
        Self { origins }
    }

    fn allowed_origin(&self, origin: Option<&str>) -> Option<String> {
        let wildcard = self.origins.iter().any(|o| o == "*");
        match origin {
            Some(origin) if wildcard || self.origins.iter().any(|o| o == origin) => Some(origin.to_string()),
            None if wildcard => Some("*".to_string()),
            _ => None,
        }
    }
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let Some(origin) = self.allowed_origin(req.headers().get_one("Origin")) else {
            return;
        };
        res.set_header(Header::new("Access-Control-Allow-Origin", origin));
        res.set_header(Header::new("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"));
        res.set_header(Header::new("Access-Control-Allow-Headers", "Authorization, Content-Type"));
        res.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
        res.set_header(Header::new("Vary", "Origin"));
    }
}

// ============================================================================
// Launch
// ============================================================================

/// Assemble the Rocket instance: managed state, routes under `/api`, catchers and CORS.
/// `[server] bind/port` from the configuration override Rocket's defaults.
pub fn build_rocket(state: AppState, server: &ServerConfig) -> Rocket<Build> {
    let mut fig = rocket::Config::figment();
    if let Some(bind) = &server.bind {
        fig = fig.merge(("address", bind.clone()));
    }
    if let Some(port) = server.port {
        fig = fig.merge(("port", port));
    }

    let origins = server
        .cors_origins
        .clone()
        .unwrap_or_else(|| vec!["*".to_string()]);

    rocket::custom(fig)
        .manage(state)
        .attach(Cors::new(origins))
        .mount("/", routes![health, preflight])
        .mount(
            "/api",
            routes![
                api_root,
                signup,
                login,
                get_preferences,
                update_preferences,
                add_rss_feed,
                remove_rss_feed,
                get_news,
                search_news,
                summarize_article,
            ],
        )
        .register("/", catchers![bad_request, unauthorized, not_found, unprocessable, internal_error])
}

/// Launch Rocket and block until it shuts down (SIGINT/SIGTERM etc.).
pub async fn launch(rocket: Rocket<Build>) -> Result<()> {
    info!("Starting Rocket HTTP server");
    rocket
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    info!("Rocket HTTP server has shut down");
    Ok(())
}

/// Build the application state from configuration and serve until shutdown.
/// Startup failures (state wiring, binding the port) are returned to the caller.
pub async fn serve(config: &Config, pool: SqlitePool) -> Result<()> {
    let state = AppState::from_config(config, pool)?;
    launch(build_rocket(state, &config.server)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("ada@example.com"));
        assert!(!looks_like_email("ada.example.com"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ada@localhost"));
    }

    #[test]
    fn cors_echoes_allowed_origins_only() {
        let open = Cors::new(vec!["*".into()]);
        assert_eq!(open.allowed_origin(Some("http://app.test")).as_deref(), Some("http://app.test"));
        assert_eq!(open.allowed_origin(None).as_deref(), Some("*"));

        let strict = Cors::new(vec!["http://app.test".into()]);
        assert_eq!(strict.allowed_origin(Some("http://app.test")).as_deref(), Some("http://app.test"));
        assert_eq!(strict.allowed_origin(Some("http://evil.test")), None);
        assert_eq!(strict.allowed_origin(None), None);
    }
}
