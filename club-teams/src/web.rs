use std::sync::Arc;

use actix_files::Files;
use actix_session::{storage::CookieSessionStore, Session, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::audit;
use crate::blobs::{BlobStore, FsBlobStore};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::service::{current_month, Actor, ClubService, NewPlayer};
use crate::store::Store;
use crate::teams::TeamTarget;

pub const ADMIN_HEADER: &str = "X-Admin-Password";
const SESSION_UID: &str = "uid";
const SESSION_ADMIN: &str = "is_admin";

pub struct AppState {
    pub service: ClubService,
    pub admin_password: String,
}

impl AppState {
    /// Opens the data file and upload directory named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(Store::open(&config.data_path)?);
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&config.upload_dir, "/uploads")?);
        Ok(Self {
            service: ClubService::new(
                store,
                blobs,
                config.team_size,
                config.strategy,
                config.balance_seed,
            ),
            admin_password: config.admin_password.clone(),
        })
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Deserialize)]
pub struct AttendanceRequest {
    absent: bool,
}

#[derive(Deserialize)]
pub struct MoveRequest {
    /// Missing or null sends the player to the bench.
    #[serde(default)]
    team_id: Option<u32>,
    #[serde(default)]
    expected_revision: Option<u64>,
}

#[derive(Deserialize)]
pub struct WinsRequest {
    delta: i32,
}

#[derive(Deserialize)]
pub struct PrizeRequest {
    name: String,
}

/// Resolves who is calling. The anonymous uid lives in the session cookie and
/// is created on first use. Admin comes from a prior login or the password
/// header.
fn actor(req: &HttpRequest, session: &Session, state: &AppState) -> Actor {
    // Reuse the session uid, or hand out a new one
    let uid = match session.get::<String>(SESSION_UID) {
        Ok(Some(uid)) => uid,
        _ => {
            let uid = Uuid::new_v4().to_string();
            if let Err(e) = session.insert(SESSION_UID, &uid) {
                tracing::warn!(error = %e, "Failed to store uid in session");
            }
            uid
        }
    };

    // Check password from header
    let header_admin = req
        .headers()
        .get(ADMIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|password| password == state.admin_password)
        .unwrap_or(false);
    let session_admin = session
        .get::<bool>(SESSION_ADMIN)
        .ok()
        .flatten()
        .unwrap_or(false);

    Actor {
        uid,
        is_admin: header_admin || session_admin,
    }
}

fn ok() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"success": true}))
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

// Admin login endpoint
async fn login(
    req: HttpRequest,
    body: web::Json<LoginRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);

    if body.password == state.admin_password {
        // Fresh session id on privilege change
        session.renew();
        session
            .insert(SESSION_ADMIN, true)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        audit::log_auth_event(&actor.uid, "login", true);
        Ok(ok())
    } else {
        audit::log_auth_event(&actor.uid, "login", false);
        Ok(HttpResponse::Unauthorized()
            .json(serde_json::json!({"success": false, "error": "Invalid password"})))
    }
}

async fn logout(req: HttpRequest, session: Session, state: web::Data<AppState>) -> HttpResponse {
    let actor = actor(&req, &session, &state);
    let _ = session.remove(SESSION_ADMIN);
    audit::log_auth_event(&actor.uid, "logout", true);
    ok()
}

async fn me(req: HttpRequest, session: Session, state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(actor(&req, &session, &state))
}

// Everything a page needs on first load
async fn get_state(state: web::Data<AppState>) -> HttpResponse {
    let service = &state.service;
    let snapshot = service.snapshot();
    HttpResponse::Ok().json(serde_json::json!({
        "month": current_month(),
        "revision": service.store().revision(),
        "roster": service.roster(),
        "teams": service.teams(),
        "prize": snapshot.prize,
        "photos": snapshot.photos,
    }))
}

async fn get_roster(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.service.roster())
}

async fn add_player(
    req: HttpRequest,
    body: web::Json<NewPlayer>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    let player = state.service.add_player(&actor, body.into_inner(), None)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "player": player})))
}

async fn delete_player(
    req: HttpRequest,
    path: web::Path<String>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    state.service.delete_player(&actor, &path)?;
    Ok(ok())
}

async fn set_player_photo(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    let player = state.service.set_player_photo(&actor, &path, &body)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "player": player})))
}

async fn set_attendance(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<AttendanceRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    state.service.set_absent(&actor, &path, body.absent)?;
    Ok(ok())
}

async fn get_teams(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.service.teams())
}

async fn generate_teams(
    req: HttpRequest,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    let balance = state.service.generate_teams(&actor)?;

    // Include the fresh board
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "num_teams": balance.num_teams(),
        "bench": balance.bench.len(),
        "skill_spread": balance.skill_spread(),
        "teams": state.service.teams(),
    })))
}

async fn clear_teams(
    req: HttpRequest,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    state.service.clear_assignments(&actor)?;
    Ok(ok())
}

async fn move_player(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<MoveRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    // A null team id means the bench
    let revision = state.service.move_player(
        &actor,
        &path,
        TeamTarget::from(body.team_id),
        body.expected_revision,
    )?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "revision": revision})))
}

async fn adjust_wins(
    req: HttpRequest,
    path: web::Path<u32>,
    body: web::Json<WinsRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    let wins = state.service.adjust_wins(&actor, path.into_inner(), body.delta)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "wins": wins})))
}

async fn reset_wins(
    req: HttpRequest,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    state.service.reset_wins(&actor)?;
    Ok(ok())
}

async fn save_prize(
    req: HttpRequest,
    body: web::Json<PrizeRequest>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    let prize = state.service.save_prize(&actor, Some(body.name.as_str()), None)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "prize": prize})))
}

async fn save_prize_photo(
    req: HttpRequest,
    body: web::Bytes,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    // Raw image bytes, must not be empty
    if body.is_empty() {
        return Err(AppError::Validation("Photo is empty".to_string()));
    }
    let prize = state.service.save_prize(&actor, None, Some(&body[..]))?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "prize": prize})))
}

async fn clear_prize(
    req: HttpRequest,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    state.service.clear_prize(&actor)?;
    Ok(ok())
}

async fn get_photos(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(&state.service.snapshot().photos)
}

// Gallery upload, open to everyone
async fn upload_photo(
    req: HttpRequest,
    body: web::Bytes,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    let photo = state.service.upload_photo(&actor, &body)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"success": true, "photo": photo})))
}

async fn delete_photo(
    req: HttpRequest,
    path: web::Path<String>,
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let actor = actor(&req, &session, &state);
    state.service.delete_photo(&actor, &path)?;
    Ok(ok())
}

fn sse_frame(event: &str, data: &str) -> web::Bytes {
    web::Bytes::from(format!("event: {}\ndata: {}\n\n", event, data))
}

/// Server-sent events: a `ready` frame, then one `change` frame per commit.
/// A client that falls behind gets `resync` and should refetch everything.
async fn events(state: web::Data<AppState>) -> HttpResponse {
    // Subscribe first, then read the revision
    let store = state.service.store();
    let rx = store.subscribe();
    let ready = sse_frame(
        "ready",
        &serde_json::json!({"revision": store.revision()}).to_string(),
    );

    let changes = stream::unfold(rx, |mut rx| async move {
        let frame = match rx.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(data) => sse_frame("change", &data),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode store event");
                    sse_frame("resync", "{}")
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped = skipped, "Event subscriber lagged");
                sse_frame("resync", "{}")
            }
            Err(RecvError::Closed) => return None,
        };
        Some((Ok::<_, actix_web::Error>(frame), rx))
    });

    let body = stream::once(async move { Ok::<_, actix_web::Error>(ready) }).chain(changes);

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(body)
}

/// Registers every API route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .service(
            web::scope("/api")
                .route("/login", web::post().to(login))
                .route("/logout", web::post().to(logout))
                .route("/me", web::get().to(me))
                .route("/state", web::get().to(get_state))
                .route("/roster", web::get().to(get_roster))
                .route("/players", web::post().to(add_player))
                .route("/players/{id}", web::delete().to(delete_player))
                .route("/players/{id}/photo", web::post().to(set_player_photo))
                .route("/attendance/{id}", web::put().to(set_attendance))
                .route("/teams", web::get().to(get_teams))
                .route("/teams/generate", web::post().to(generate_teams))
                .route("/teams/clear", web::post().to(clear_teams))
                .route("/assignments/{id}", web::put().to(move_player))
                .route("/wins", web::delete().to(reset_wins))
                .route("/wins/{team_id}", web::post().to(adjust_wins))
                .route("/prize", web::put().to(save_prize))
                .route("/prize", web::delete().to(clear_prize))
                .route("/prize/photo", web::post().to(save_prize_photo))
                .route("/photos", web::get().to(get_photos))
                .route("/photos", web::post().to(upload_photo))
                .route("/photos/{id}", web::delete().to(delete_photo))
                .route("/events", web::get().to(events)),
        );
}

/// Cookie-backed sessions holding the anonymous uid and the admin flag.
pub fn session_middleware(key: Key) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_name("club_session".to_string())
        .cookie_secure(false)
        .build()
}

pub async fn start_server(config: Config) -> Result<()> {
    let app_state = web::Data::new(AppState::from_config(&config)?);
    let key = match &config.session_key {
        Some(bytes) => Key::from(bytes.as_slice()),
        None => {
            tracing::warn!("SESSION_KEY is not set; sessions will not survive a restart");
            Key::generate()
        }
    };
    let upload_dir = config.upload_dir.clone();
    let static_dir = config.static_dir.clone();
    let serve_static = static_dir.is_dir();
    let max_upload_bytes = config.max_upload_bytes;

    tracing::info!(
        addr = %config.server_addr(),
        team_size = config.team_size,
        strategy = %config.strategy,
        "Starting web server"
    );

    // One app per worker, sharing state and session key
    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(app_state.clone())
            .app_data(web::PayloadConfig::new(max_upload_bytes))
            .wrap(session_middleware(key.clone()))
            .wrap(middleware::Logger::default())
            .configure(configure)
            .service(Files::new("/uploads", &upload_dir));

        // Front-end files, when a static directory is present
        if serve_static {
            app.service(Files::new("/", &static_dir).index_file("index.html"))
        } else {
            app
        }
    })
    .bind((config.host.as_str(), config.port))
    .map_err(|e| AppError::Internal(format!("Failed to bind {}: {}", config.server_addr(), e)))?;

    server
        .run()
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))
}
