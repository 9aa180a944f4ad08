use actix_files as fs;
use actix_web::cookie::Cookie;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::game::{Status, Stone};
use crate::models::{AppState, ServerMessage, SessionId, SessionRecord};
use crate::store::SessionStore;

/// Cookie carrying the visitor's opaque identity.
pub const VISITOR_COOKIE: &str = "renju_visitor";

#[derive(Deserialize)]
struct VisitorQuery {
    visitor: Option<String>,
}

/// Identity supplied with a request: the visitor cookie, or a `visitor`
/// query parameter for clients that cannot set cookies.
pub fn visitor_id(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(VISITOR_COOKIE) {
        return Some(cookie.value().to_string());
    }
    web::Query::<VisitorQuery>::from_query(req.query_string())
        .ok()
        .and_then(|q| q.into_inner().visitor)
        .filter(|v| !v.is_empty())
}

/// Identity for this request, minting a new one when none was supplied.
fn visitor_or_new(req: &HttpRequest) -> (String, bool) {
    match visitor_id(req) {
        Some(id) => (id, false),
        None => (uuid::Uuid::new_v4().to_string(), true),
    }
}

fn with_visitor(mut builder: actix_web::HttpResponseBuilder, visitor: &str, minted: bool) -> actix_web::HttpResponseBuilder {
    if minted {
        builder.cookie(Cookie::build(VISITOR_COOKIE, visitor.to_string()).path("/").finish());
    }
    builder
}

/// Public view of a stored game.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GameSummary {
    pub id: SessionId,
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub status: Status,
}

impl From<&SessionRecord> for GameSummary {
    fn from(record: &SessionRecord) -> Self {
        GameSummary {
            id: record.id,
            player1: record.player1.clone(),
            player2: record.player2.clone(),
            status: record.status,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Created {
    pub id: SessionId,
}

/// Fetch the single row for `id`, mapping store outcomes to responses.
async fn load_one(store: &dyn SessionStore, id: SessionId) -> Result<SessionRecord, HttpResponse> {
    match store.load_session(id).await {
        Ok(mut rows) if rows.len() == 1 => Ok(rows.remove(0)),
        Ok(rows) if rows.is_empty() => Err(HttpResponse::NotFound().body("No game with such id")),
        Ok(rows) => {
            error!("multiple games with the same id {} ({} rows)", id, rows.len());
            Err(HttpResponse::InternalServerError().body("Server error"))
        }
        Err(e) => {
            error!("Failed to load game {}: {}", id, e);
            Err(HttpResponse::InternalServerError().body("Server error"))
        }
    }
}

/// HTTP handler for the index page
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Renju")
}

/// Create a game owned by the caller, with a random opening color.
pub async fn create_game(req: HttpRequest, app_state: web::Data<AppState>) -> HttpResponse {
    let (visitor, minted) = visitor_or_new(&req);
    let first = if rand::random::<bool>() {
        Stone::Black
    } else {
        Stone::White
    };

    match app_state.store.create_session(&visitor, first).await {
        Ok(id) => {
            info!("Visitor {} created game {} ({} opens)", visitor, id, first);
            with_visitor(HttpResponse::Created(), &visitor, minted).json(Created { id })
        }
        Err(e) => {
            error!("Failed to create game: {}", e);
            HttpResponse::InternalServerError().body("Server error")
        }
    }
}

/// Take the second seat of a game if it is free.
pub async fn join_game(
    req: HttpRequest,
    path: web::Path<SessionId>,
    app_state: web::Data<AppState>,
) -> HttpResponse {
    let id = path.into_inner();
    let (visitor, minted) = visitor_or_new(&req);

    let joined = match app_state.cache.join(id, &visitor).await {
        Ok(joined) => joined,
        Err(CacheError::SessionNotFound(_)) => {
            return HttpResponse::NotFound().body("No game with such id")
        }
        Err(e) => {
            error!("Failed to seat {} in game {}: {}", visitor, id, e);
            return HttpResponse::InternalServerError().body("Server error");
        }
    };

    if joined.changed {
        info!("Visitor {} joined game {}", visitor, id);
        // Anyone already watching learns about the new opponent.
        app_state
            .groups
            .broadcast(id, &ServerMessage::Update(joined.snapshot.clone()));
    }

    let summary = GameSummary {
        id,
        player1: joined.snapshot.player1,
        player2: joined.snapshot.player2,
        status: joined.snapshot.status,
    };
    with_visitor(HttpResponse::Ok(), &visitor, minted).json(summary)
}

/// Games listed for one visitor, newest first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Lobby {
    /// Games the visitor holds a seat in.
    pub mine: Vec<GameSummary>,
    /// Games with a seat still free.
    pub open: Vec<GameSummary>,
}

impl Lobby {
    pub fn build(records: &[SessionRecord], visitor: Option<&str>) -> Self {
        let mut summaries: Vec<GameSummary> = records.iter().map(GameSummary::from).collect();
        summaries.sort_by(|a, b| b.id.cmp(&a.id));

        let mine = match visitor {
            Some(visitor) => summaries
                .iter()
                .filter(|g| g.player1.as_deref() == Some(visitor) || g.player2.as_deref() == Some(visitor))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        let open = summaries
            .into_iter()
            .filter(|g| g.player1.is_none() || g.player2.is_none())
            .collect();
        Lobby { mine, open }
    }
}

/// The caller's games and the games waiting for an opponent.
pub async fn list_games(req: HttpRequest, app_state: web::Data<AppState>) -> HttpResponse {
    match app_state.store.list_sessions().await {
        Ok(records) => {
            let visitor = visitor_id(&req);
            HttpResponse::Ok().json(Lobby::build(&records, visitor.as_deref()))
        }
        Err(e) => {
            error!("Failed to list games: {}", e);
            HttpResponse::InternalServerError().body("Server error")
        }
    }
}

/// Stored summary of a game.
pub async fn get_game(path: web::Path<SessionId>, app_state: web::Data<AppState>) -> HttpResponse {
    match load_one(app_state.store.as_ref(), path.into_inner()).await {
        Ok(record) => HttpResponse::Ok().json(GameSummary::from(&record)),
        Err(response) => response,
    }
}

/// Configure the HTTP routes
pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: &str) {
    cfg.service(web::resource("/ws").route(web::get().to(crate::websocket::ws_index)))
        .service(
            web::resource("/games")
                .route(web::get().to(list_games))
                .route(web::post().to(create_game)),
        )
        .service(web::resource("/games/{id}").route(web::get().to(get_game)))
        .service(web::resource("/games/{id}/join").route(web::post().to(join_game)))
        .service(web::resource("/").route(web::get().to(index)))
        .service(fs::Files::new("/static", static_dir));
}
