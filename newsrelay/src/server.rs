use std::path::Path;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::fs::FileServer;
use rocket::http::{Header, Status};
use rocket::response::status::Custom;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde::{Deserialize, Serialize};

use common::Config;

use crate::bot::USAGE_HINT;
use crate::relay::NewsRelay;
use crate::store::NewsItem;

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub relay: NewsRelay,
    pub bot_enabled: bool,
}

impl AppState {
    pub fn new(relay: NewsRelay, bot_enabled: bool) -> Self {
        Self {
            started_at: Utc::now(),
            relay,
            bot_enabled,
        }
    }
}

/// Response structure for `/api/v1/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub uptime_seconds: i64,
    pub news_id: String,
    pub bot_enabled: bool,
}

/// Request body for `POST /api/v1/news`: the same free text the `/news` command takes.
#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub command: String,
}

/// Body returned when an update payload is rejected.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    pub usage: String,
}

/// Redirect root to the web app bundle
#[get("/")]
async fn index_redirect() -> Redirect {
    Redirect::to("/static/index.html")
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(StatusResponse {
        status: "ok".to_string(),
        uptime_seconds: uptime,
        news_id: state.relay.current().id.clone(),
        bot_enabled: state.bot_enabled,
    })
}

/// The current news item, as read by the web app.
#[get("/api/v1/news")]
async fn current_news(state: &State<AppState>) -> Json<NewsItem> {
    Json(NewsItem::clone(&state.relay.current()))
}

/// Update entry point over HTTP; mirrors the bot's `/news` command.
#[post("/api/v1/news", data = "<body>")]
async fn update_news(
    state: &State<AppState>,
    body: Json<UpdateRequest>,
) -> Result<Json<NewsItem>, Custom<Json<ApiError>>> {
    match state.relay.update(&body.command) {
        Ok(item) => Ok(Json(NewsItem::clone(&item))),
        Err(e) => {
            tracing::warn!(code = e.code(), "rejected news update over HTTP");
            Err(Custom(
                Status::UnprocessableEntity,
                Json(ApiError {
                    error: e.code().to_string(),
                    message: e.to_string(),
                    usage: USAGE_HINT.to_string(),
                }),
            ))
        }
    }
}

/// Assemble the Rocket instance. Split from `launch_rocket` so tests can drive it locally.
pub fn build_rocket(state: AppState, figment: Figment, static_dir: Option<&str>) -> Rocket<Build> {
    let mut rocket = rocket::custom(figment)
        .manage(state)
        .mount("/", routes![health, status, current_news, update_news])
        // the web app is usually served from another origin
        .attach(AdHoc::on_response("CORS", |_req, res| {
            Box::pin(async move {
                res.set_header(Header::new("Access-Control-Allow-Origin", "*"));
            })
        }));

    if let Some(dir) = static_dir {
        if Path::new(dir).is_dir() {
            rocket = rocket
                .mount("/", routes![index_redirect])
                .mount("/static", FileServer::from(dir));
        } else {
            tracing::warn!(static_dir = dir, "static directory not found; not serving web app files");
        }
    }
    rocket
}

/// Launch the HTTP server. `server.bind` / `server.port` from config override Rocket defaults.
///
/// This function blocks until the Rocket server shuts down (it awaits `rocket.launch().await`)
/// and returns an error if Rocket fails to start.
pub async fn launch_rocket(relay: NewsRelay, config: &Config, bot_enabled: bool) -> Result<()> {
    let mut fig = rocket::Config::figment();
    if let Some(bind) = &config.server.bind {
        fig = fig.merge(("address", bind.clone()));
    }
    if let Some(port) = config.server.port {
        fig = fig.merge(("port", port));
    }

    let state = AppState::new(relay, bot_enabled);
    let rocket = build_rocket(state, fig, config.server.static_dir.as_deref());

    tracing::info!("Starting Rocket HTTP server");
    rocket
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
