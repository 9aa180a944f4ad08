use actix_web::{test, web, App};
use std::sync::Arc;
use std::time::Duration;

use renju::game::Status;
use renju::models::AppState;
use renju::routes::{configure_routes, Created, GameSummary, Lobby, VISITOR_COOKIE};
use renju::store::MemoryStore;

fn app_state() -> web::Data<AppState> {
    web::Data::new(AppState::new(
        Arc::new(MemoryStore::new()),
        Duration::from_secs(2),
    ))
}

#[actix_web::test]
async fn test_create_join_and_get() {
    let state = app_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, "./static")),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/games")
        .cookie(actix_web::cookie::Cookie::new(VISITOR_COOKIE, "alice"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created: Created = test::read_body_json(resp).await;

    // The creator opening the game page does not take the second seat.
    let req = test::TestRequest::post()
        .uri(&format!("/games/{}/join", created.id))
        .cookie(actix_web::cookie::Cookie::new(VISITOR_COOKIE, "alice"))
        .to_request();
    let summary: GameSummary = test::call_and_read_body_json(&app, req).await;
    assert_eq!(summary.status, Status::New);
    assert_eq!(summary.player2, None);

    let req = test::TestRequest::post()
        .uri(&format!("/games/{}/join?visitor=bob", created.id))
        .to_request();
    let summary: GameSummary = test::call_and_read_body_json(&app, req).await;
    assert_eq!(summary.status, Status::InProgress);
    assert_eq!(summary.player1.as_deref(), Some("alice"));
    assert_eq!(summary.player2.as_deref(), Some("bob"));

    // A third visitor is turned into a spectator, the seats stay.
    let req = test::TestRequest::post()
        .uri(&format!("/games/{}/join?visitor=carol", created.id))
        .to_request();
    let summary: GameSummary = test::call_and_read_body_json(&app, req).await;
    assert_eq!(summary.player2.as_deref(), Some("bob"));

    let req = test::TestRequest::get()
        .uri(&format!("/games/{}", created.id))
        .to_request();
    let summary: GameSummary = test::call_and_read_body_json(&app, req).await;
    assert_eq!(summary.id, created.id);
    assert_eq!(summary.status, Status::InProgress);
}

#[actix_web::test]
async fn test_new_visitor_gets_a_cookie() {
    let state = app_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, "./static")),
    )
    .await;

    let req = test::TestRequest::post().uri("/games").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == VISITOR_COOKIE)
        .expect("visitor cookie");
    assert!(!cookie.value().is_empty());
}

#[actix_web::test]
async fn test_unknown_game_is_404() {
    let state = app_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, "./static")),
    )
    .await;

    let req = test::TestRequest::get().uri("/games/12").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let req = test::TestRequest::post().uri("/games/12/join").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_lobby_lists_my_games_and_open_seats() {
    let state = app_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, "./static")),
    )
    .await;

    let mut ids = Vec::new();
    for creator in ["alice", "alice", "bob"] {
        let req = test::TestRequest::post()
            .uri(&format!("/games?visitor={}", creator))
            .to_request();
        let created: Created = test::call_and_read_body_json(&app, req).await;
        ids.push(created.id);
    }
    let req = test::TestRequest::post()
        .uri(&format!("/games/{}/join?visitor=bob", ids[0]))
        .to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get()
        .uri("/games")
        .cookie(actix_web::cookie::Cookie::new(VISITOR_COOKIE, "alice"))
        .to_request();
    let lobby: Lobby = test::call_and_read_body_json(&app, req).await;
    let mine: Vec<_> = lobby.mine.iter().map(|g| g.id).collect();
    let open: Vec<_> = lobby.open.iter().map(|g| g.id).collect();
    assert_eq!(mine, vec![ids[1], ids[0]]);
    assert_eq!(open, vec![ids[2], ids[1]]);
    assert_eq!(lobby.mine[1].player2.as_deref(), Some("bob"));

    // Without an identity only the open games are listed.
    let req = test::TestRequest::get().uri("/games").to_request();
    let lobby: Lobby = test::call_and_read_body_json(&app, req).await;
    assert!(lobby.mine.is_empty());
    assert_eq!(lobby.open.len(), 2);
}

#[actix_web::test]
async fn test_racing_joins_fill_the_seat_once() {
    let state = app_state();
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, "./static")),
    )
    .await;

    let req = test::TestRequest::post().uri("/games?visitor=alice").to_request();
    let created: Created = test::call_and_read_body_json(&app, req).await;

    let bob = test::TestRequest::post()
        .uri(&format!("/games/{}/join?visitor=bob", created.id))
        .to_request();
    let carol = test::TestRequest::post()
        .uri(&format!("/games/{}/join?visitor=carol", created.id))
        .to_request();
    let (bob, carol) = futures::join!(
        test::call_and_read_body_json::<_, _, GameSummary>(&app, bob),
        test::call_and_read_body_json::<_, _, GameSummary>(&app, carol),
    );

    // Both callers see the same winner.
    assert_eq!(bob.player2, carol.player2);
    assert!(matches!(bob.player2.as_deref(), Some("bob") | Some("carol")));
}
