//! Guarded with `#[cfg(test)]` from `lib.rs`

use std::thread;
use std::time::Duration;

use actix_http::Request;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::{header, StatusCode};
use actix_web::{test as actix_test, App};
use serde_json::{json, Value};

use crate::auth::TokenKeys;
use crate::menu::{AddDrink, Drink};
use crate::persistence::Storage;
use crate::services::Commandable;
use crate::RustBar;


use self::memory::{MemoryManager, MemoryStore};

const HOUR: Duration = Duration::from_secs(60 * 60);
// Cheapest cost bcrypt accepts.
const PASSWORD_COST: u32 = 4;

fn bar(store: &MemoryStore) -> RustBar<MemoryManager> {
    let tokens = TokenKeys::new(b"test-signing-key", HOUR);
    RustBar::new(store.pool(), tokens, PASSWORD_COST).expect("bar")
}

async fn call<S>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let resp = actix_test::call_service(app, req).await;
    let status = resp.status();
    let body = actix_test::read_body(resp).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("json body")
    };
    (status, json)
}

async fn register<S>(app: &S, login: &str) -> String
where
    S: Service<Request, Response = ServiceResponse, Error = actix_web::Error>,
{
    let req = actix_test::TestRequest::post()
        .uri("/register")
        .set_json(json!({"login": login, "password": "secret"}))
        .to_request();
    let (status, body) = call(app, req).await;
    assert_eq!(status, StatusCode::OK, "register {}: {}", login, body);
    body["token"].as_str().expect("token").to_string()
}

fn authed(req: actix_test::TestRequest, token: &str) -> Request {
    req.insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
        .to_request()
}

fn create(token: &str, name: &str, price: i64, ppm: f64) -> Request {
    authed(
        actix_test::TestRequest::post()
            .uri("/create")
            .set_json(json!({"name": name, "price": price, "ppm": ppm})),
        token,
    )
}

fn buy(token: &str, name: &str) -> Request {
    authed(
        actix_test::TestRequest::patch().uri(&format!("/buy?name={}", name)),
        token,
    )
}

fn me(token: &str) -> Request {
    authed(actix_test::TestRequest::get().uri("/me"), token)
}

fn list(token: &str) -> Request {
    authed(actix_test::TestRequest::get().uri("/list"), token)
}

#[actix_web::test]
async fn bob_drinks_himself_to_death() {
    env_logger::try_init().unwrap_or_default();
    let store = MemoryStore::default();
    let bar = bar(&store);
    let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;

    let moe = register(&app, "moe").await;
    let bob = register(&app, "bob").await;

    let (status, _) = call(&app, create(&moe, "beer", 100, 2.0)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, me(&bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["money"], 1000);

    let (status, body) = call(&app, buy(&bob, "beer")).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["login"], "bob");
    assert_eq!(body["money"], 900);
    assert_eq!(body["ppm"], 2.0);
    assert_eq!(body["is_alive"], true);

    let (status, body) = call(&app, buy(&bob, "beer")).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["money"], 800);

    let (status, body) = call(&app, buy(&bob, "beer")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "you drank yourself to death");

    let corpse = store.visitor("bob");
    assert_eq!(corpse.money, 700);
    assert_eq!(corpse.ppm, 6.0);
    assert!(!corpse.is_alive);

    let writes = store.writes();
    let (status, body) = call(&app, buy(&bob, "beer")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "you are dead");
    let (status, body) = call(&app, me(&bob)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "you are dead");
    assert_eq!(store.writes(), writes);
    assert_eq!(store.visitor("bob"), corpse);
}

#[actix_web::test]
async fn purchases_are_rejected_without_writing() {
    let store = MemoryStore::default();
    let bar = bar(&store);
    let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;
    let moe = register(&app, "moe").await;
    let bob = register(&app, "bob").await;
    call(&app, create(&moe, "champagne", 5000, 1.0)).await;
    let writes = store.writes();

    let (status, body) = call(&app, buy(&bob, "champagne")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "no money");

    let (status, body) = call(&app, buy(&bob, "mead")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "drink not found");

    let req = authed(actix_test::TestRequest::patch().uri("/buy"), &bob);
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(store.writes(), writes);
    assert_eq!(store.visitor("bob").money, 1000);
}

#[actix_web::test]
async fn roles_gate_the_endpoints() {
    let store = MemoryStore::default();
    let bar = bar(&store);
    let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;
    let moe = register(&app, "moe").await;
    let bob = register(&app, "bob").await;

    let (status, body) = call(&app, create(&bob, "moonshine", 10, 5.0)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "unauthorized");

    let (status, _) = call(&app, buy(&moe, "beer")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, me(&moe)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn wrong_role_is_refused_before_the_request_is_parsed() {
    let store = MemoryStore::default();
    let bar = bar(&store);
    let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;
    let moe = register(&app, "moe").await;
    let bob = register(&app, "bob").await;

    let req = authed(
        actix_test::TestRequest::post()
            .uri("/create")
            .set_json(json!({"name": 1})),
        &bob,
    );
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "unauthorized");

    let req = authed(actix_test::TestRequest::patch().uri("/buy"), &moe);
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "unauthorized");

    let req = authed(
        actix_test::TestRequest::post()
            .uri("/create")
            .set_json(json!({"name": 1})),
        &moe,
    );
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn the_dead_cannot_see_the_menu() {
    let store = MemoryStore::default();
    let bar = bar(&store);
    let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;
    let moe = register(&app, "moe").await;
    let bob = register(&app, "bob").await;
    call(&app, create(&moe, "beer", 100, 2.0)).await;
    store.update_visitor("bob", |v| v.is_alive = false);
    let corpse = store.visitor("bob");
    let writes = store.writes();

    let (status, body) = call(&app, list(&bob)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "you are dead");
    assert_eq!(store.writes(), writes);
    assert_eq!(store.visitor("bob"), corpse);
}

#[actix_web::test]
async fn bad_credentials_are_unauthenticated_with_an_empty_body() {
    let store = MemoryStore::default();
    let bar = bar(&store);
    let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;

    let (status, body) = call(&app, actix_test::TestRequest::get().uri("/me").to_request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, Value::Null);

    let (status, body) = call(&app, me("not.a.token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, Value::Null);

    let req = actix_test::TestRequest::get()
        .uri("/list")
        .insert_header((header::AUTHORIZATION, "Bearer"))
        .to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, Value::Null);
}

#[actix_web::test]
async fn list_depends_on_role() {
    let store = MemoryStore::default();
    let bar = bar(&store);
    let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;
    let moe = register(&app, "moe").await;
    let bob = register(&app, "bob").await;
    call(&app, create(&moe, "beer", 100, 2.0)).await;
    call(&app, create(&moe, "champagne", 5000, 1.0)).await;

    let (status, body) = call(&app, list(&moe)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().expect("array").len(), 2);

    let (status, body) = call(&app, list(&bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"name": "beer", "price": 100, "ppm": 2.0}]));
}

#[actix_web::test]
async fn create_returns_the_catalog_and_refuses_duplicates() {
    let store = MemoryStore::default();
    let bar = bar(&store);
    let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;
    let moe = register(&app, "moe").await;

    let (status, body) = call(&app, create(&moe, "beer", 100, 2.0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"beer": {"name": "beer", "price": 100, "ppm": 2.0}}));

    let (status, body) = call(&app, create(&moe, "beer", 1, 0.5)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "drink \"beer\" already exists");

    let (status, _) = call(&app, create(&moe, "", 1, 0.5)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = authed(
        actix_test::TestRequest::post()
            .uri("/create")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{\"name\": \"mead\""),
        &moe,
    );
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let drinks = store.clone().load_drinks().expect("drinks");
    assert_eq!(drinks, vec![Drink::new("beer", 100, 2.0)]);
}

#[actix_web::test]
async fn login_issues_tokens_for_known_users_only() {
    let store = MemoryStore::default();
    let bar = bar(&store);
    let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;
    register(&app, "bob").await;

    let req = actix_test::TestRequest::get()
        .uri("/login")
        .set_json(json!({"login": "bob", "password": "secret"}))
        .to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().expect("token").to_string();
    let (status, _) = call(&app, me(&token)).await;
    // bob registered first here, so he holds the barman account.
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = actix_test::TestRequest::get()
        .uri("/login")
        .set_json(json!({"login": "bob", "password": "wrong"}))
        .to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "user not found");

    let req = actix_test::TestRequest::get()
        .uri("/login")
        .set_json(json!({"login": "alice", "password": "secret"}))
        .to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn duplicate_registration_is_a_server_error() {
    let store = MemoryStore::default();
    let bar = bar(&store);
    let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;
    register(&app, "bob").await;

    let req = actix_test::TestRequest::post()
        .uri("/register")
        .set_json(json!({"login": "bob", "password": "other"}))
        .to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "server error");
}

#[actix_web::test]
async fn catalog_survives_a_restart() {
    let store = MemoryStore::default();
    {
        let bar = bar(&store);
        let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;
        let moe = register(&app, "moe").await;
        call(&app, create(&moe, "beer", 100, 2.0)).await;
    }

    let bar = bar(&store);
    let app = actix_test::init_service(App::new().configure(|cfg| bar.configure(cfg))).await;
    let bob = register(&app, "bob").await;
    let (status, body) = call(&app, buy(&bob, "beer")).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

#[test]
fn simultaneous_creations_of_one_name_admit_one() {
    let store = MemoryStore::default();
    let bar = bar(&store);

    let handles = (0..2)
        .map(|i| {
            let menu = bar.menu().clone();
            thread::spawn(move || menu.execute(AddDrink(Drink::new("mojito", 300 + i, 2.5))))
        })
        .collect::<Vec<_>>();
    let results = handles
        .into_iter()
        .map(|h| h.join().expect("join"))
        .collect::<Vec<_>>();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(crate::error::BarError::AlreadyExists(name)) if name == "mojito"
    )));
    assert_eq!(store.clone().load_drinks().expect("drinks").len(), 1);
}
