// src/main.rs - MoveIt247 operations backend
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{Compress, DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod auth_handlers;
mod config;
mod error;
mod handlers;
mod inventory;
mod inventory_handlers;
mod job_handlers;
mod jobs;
mod models;
mod monitoring;
mod notification_handlers;
mod notifications;
mod store;
mod tracking;
mod tracking_handlers;

use auth::{hash_password, user_key, Role, User};
use config::{load_config, Config};
use error::ApiError;
use monitoring::{Metrics, RequestLogger};
use store::{JsonFileStore, MemoryStore, State, StoreHandle};

pub struct AppState {
    pub store: StoreHandle,
    pub config: Config,
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (this calls load_env_file internally)
    let config = load_config()?;

    setup_logging(&config)?;

    if config.is_production() {
        config.validate_production()?;
    }
    config.print_startup_info();

    let store = build_store(&config).await?;
    create_default_admin_if_needed(&store, &config).await?;

    let app_state = Arc::new(AppState {
        store,
        config: config.clone(),
    });

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let metrics_arc = Arc::new(Metrics::new());
    let metrics = web::Data::from(metrics_arc.clone());
    let server_config = config.clone();

    let mut server = HttpServer::new(move || {
        let cors = setup_cors(&server_config.security.allowed_origins);
        let security_headers = setup_security_headers(&server_config.security);

        App::new()
            .wrap(cors)
            .wrap(security_headers)
            .wrap(Logger::default())
            .wrap(Compress::default())
            .wrap(RequestLogger::new(metrics_arc.clone()))
            .app_data(web::Data::new(app_state.clone()))
            .app_data(metrics.clone())
            .app_data(json_config(server_config.security.max_request_size))
            .configure(configure_routes)
    })
    .keep_alive(Duration::from_secs(config.server.keep_alive))
    .client_request_timeout(Duration::from_secs(config.server.client_timeout));

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)?
        .run()
        .await
        .context("Server failed to run")?;

    Ok(())
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/health")
            .route("", web::get().to(monitoring::health_check))
            .route("/live", web::get().to(monitoring::liveness_check))
            .route("/ready", web::get().to(monitoring::readiness_check)),
    )
    .route("/metrics", web::get().to(monitoring::metrics_endpoint))
    .service(
        web::scope("/api")
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(auth_handlers::login))
                    .route("/roles", web::get().to(auth_handlers::get_roles)),
            )
            .service(
                web::scope("/users")
                    .route("", web::get().to(auth_handlers::get_users))
                    .route("", web::post().to(auth_handlers::create_user)),
            )
            .service(
                web::scope("/inventory")
                    .route("", web::get().to(inventory_handlers::get_inventory))
                    .route("/materials", web::get().to(inventory_handlers::get_materials))
                    .route("/materials", web::put().to(inventory_handlers::replace_materials))
                    .route("/materials/low-stock", web::get().to(inventory_handlers::get_low_stock))
                    .route("/assign", web::post().to(inventory_handlers::assign_materials))
                    .route("/return", web::post().to(inventory_handlers::return_materials))
                    .route("/pending-collections", web::get().to(inventory_handlers::get_pending_collections))
                    .route("/collections/{id}/receive", web::post().to(inventory_handlers::receive_collection))
                    .route("/transactions", web::get().to(inventory_handlers::get_transactions))
                    .route("/transactions/export", web::get().to(inventory_handlers::export_transactions)),
            )
            .service(
                web::scope("/jobs")
                    .route("", web::get().to(job_handlers::get_jobs))
                    .route("", web::post().to(job_handlers::create_job_handler))
                    .route("/{id}", web::get().to(job_handlers::get_job))
                    .route("/{id}", web::put().to(job_handlers::update_job_handler))
                    .route("/{id}/complete", web::post().to(job_handlers::complete_job_handler))
                    .route("/{id}/approve", web::post().to(job_handlers::approve_job_handler)),
            )
            .service(
                web::scope("/notifications")
                    .route("", web::get().to(notification_handlers::get_notifications))
                    .route("", web::post().to(notification_handlers::create_notification))
                    .route("/{id}/read", web::post().to(notification_handlers::mark_notification_read)),
            )
            .service(
                web::scope("/tracking")
                    .route("", web::get().to(tracking_handlers::get_tracking))
                    .route("", web::post().to(tracking_handlers::update_location))
                    .route("/update", web::post().to(tracking_handlers::update_location)),
            ),
    );
}

// ==================== HELPER FUNCTIONS ====================

/// Malformed or oversized JSON bodies come back as the usual error envelope.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into())
}

pub fn setup_cors(allowed_origins: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT, header::USER_AGENT])
        .expose_headers(vec![header::CONTENT_LENGTH, header::CONTENT_DISPOSITION])
        .max_age(3600);

    if allowed_origins.iter().any(|o| o == "*") {
        // Production configs with a wildcard are rejected before startup.
        log::warn!("Using wildcard CORS (*) in development mode");
        cors = cors.allow_any_origin();
    } else {
        for origin in allowed_origins.iter().filter(|o| !o.is_empty()) {
            log::debug!("Adding CORS origin: {}", origin);
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}

fn setup_security_headers(config: &crate::config::SecurityConfig) -> DefaultHeaders {
    let mut headers = DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"));

    if config.require_https {
        headers = headers.add(("Strict-Transport-Security", "max-age=31536000; includeSubDomains"));
    }

    headers
}

async fn build_store(config: &Config) -> anyhow::Result<StoreHandle> {
    if config.storage.ephemeral {
        log::warn!("Ephemeral storage: all data is lost on shutdown");
        return Ok(StoreHandle::new(MemoryStore::new(State::seeded())));
    }

    let store = JsonFileStore::open(&config.storage.data_file, State::seeded(), config.storage.pretty)
        .await
        .with_context(|| format!("Failed to open data file {}", config.storage.data_file))?;
    log::info!("Using data file {}", store.path().display());

    Ok(StoreHandle::new(store))
}

async fn create_default_admin_if_needed(store: &StoreHandle, config: &Config) -> anyhow::Result<()> {
    let state = store.read().await?;
    if state.users.values().any(|u| u.role == Role::Admin) {
        return Ok(());
    }

    let username = config.auth.default_admin_username.clone();
    let (password, generated) = match env::var("DEFAULT_ADMIN_PASSWORD") {
        Ok(p) if !p.is_empty() => (p, false),
        _ => {
            let pwd: String = thread_rng().sample_iter(&Alphanumeric).take(16).map(char::from).collect();
            (pwd, true)
        }
    };
    let password_hash = hash_password(&password, config.auth.bcrypt_cost)?;

    store
        .transact(|state| {
            state.users.insert(
                user_key(&username),
                User {
                    username: username.clone(),
                    password_hash,
                    role: Role::Admin,
                    name: "Administrator".to_string(),
                    email: String::new(),
                    phone: String::new(),
                },
            );
            Ok(())
        })
        .await?;

    log::warn!("Default admin user created:");
    log::warn!("  Username: {}", username);
    if generated {
        log::warn!("  Password: {} (generated - CHANGE IMMEDIATELY!)", password);
    } else {
        log::warn!("  Password: taken from DEFAULT_ADMIN_PASSWORD");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    fn user(username: &str, role: Role, password: &str) -> User {
        User {
            username: username.to_string(),
            password_hash: hash_password(password, 4).unwrap(),
            role,
            name: format!("{} name", username),
            email: String::new(),
            phone: String::new(),
        }
    }

    fn test_state() -> Arc<AppState> {
        let mut state = State::seeded();
        for (name, role) in [
            ("admin", Role::Admin),
            ("ic", Role::InventoryController),
            ("sup", Role::Supervisor),
            ("tl", Role::TeamLeader),
        ] {
            state.users.insert(user_key(name), user(name, role, "password123"));
        }
        let m = &mut state.inventory.materials[0];
        m.put(10, models::Pool::New).unwrap();
        m.put(5, models::Pool::Old).unwrap();

        let mut config = Config::default();
        config.auth.bcrypt_cost = 4;
        config.storage.ephemeral = true;

        Arc::new(AppState {
            store: StoreHandle::new(MemoryStore::new(state)),
            config,
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .app_data(web::Data::new(Metrics::new()))
                    .app_data(json_config(64 * 1024))
                    .configure(configure_routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_health_endpoints() {
        let state = test_state();
        let app = app!(state);

        for path in ["/health", "/health/live", "/health/ready", "/metrics"] {
            let resp = test::call_service(&app, test::TestRequest::get().uri(path).to_request()).await;
            assert_eq!(resp.status(), StatusCode::OK, "{}", path);
        }
    }

    #[actix_web::test]
    async fn test_insufficient_stock_is_rejected_and_state_unchanged() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/inventory/assign")
            .set_json(json!({"username": "tl", "projectId": 4, "materials": [{"id": 1, "quantity": 20}]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("Insufficient stock for Medium Box"));

        let snapshot = state.store.read().await.unwrap();
        assert_eq!(snapshot.inventory.materials[0].quantity, 15);
        assert!(snapshot.inventory.transactions.is_empty());
    }

    #[actix_web::test]
    async fn test_unknown_user_and_forbidden_role() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::get()
            .uri("/api/inventory/transactions?username=ghost")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/inventory/return")
            .set_json(json!({"username": "sup", "materials": [{"id": 1, "quantity": 2}]}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_invalid_quantity_and_malformed_body() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/inventory/assign")
            .set_json(json!({"username": "admin", "projectId": "4", "materials": [{"id": 1, "quantity": "lots"}]}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/inventory/assign")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"username\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_job_completion_to_received_collection() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/jobs")
            .set_json(json!({
                "username": "sup",
                "projectName": "Marina Tower",
                "teamLeader": "tl",
                "packingMaterials": [{"id": 1, "quantity": 3, "materialType": "new"}]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["job"]["id"], "1");

        let req = test::TestRequest::post()
            .uri("/api/jobs/1/complete")
            .set_json(json!({"username": "tl", "rating": 5, "materialsCollected": true}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        let collection_id = body["data"]["pendingCollection"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["notified"], 1);

        let req = test::TestRequest::get()
            .uri("/api/inventory/pending-collections?username=ic&status=pending")
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let receive = || {
            test::TestRequest::post()
                .uri(&format!("/api/inventory/collections/{}/receive", collection_id))
                .set_json(json!({"username": "ic"}))
                .to_request()
        };
        assert_eq!(test::call_service(&app, receive()).await.status(), StatusCode::OK);
        assert_eq!(test::call_service(&app, receive()).await.status(), StatusCode::CONFLICT);

        let snapshot = state.store.read().await.unwrap();
        let m = &snapshot.inventory.materials[0];
        assert_eq!((m.quantity_new, m.quantity_old, m.quantity), (7, 8, 15));

        let req = test::TestRequest::get().uri("/api/notifications?username=ic").to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"][0]["type"], "inventory-collection");
    }

    #[actix_web::test]
    async fn test_job_approval_after_single_completion() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/jobs")
            .set_json(json!({"username": "sup", "teamLeader": "tl", "packingMaterials": [{"id": 1, "quantity": 2}]}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

        let approve = |username: &str| {
            test::TestRequest::post()
                .uri("/api/jobs/1/approve")
                .set_json(json!({"username": username}))
                .to_request()
        };
        assert_eq!(test::call_service(&app, approve("admin")).await.status(), StatusCode::CONFLICT);

        let complete = || {
            test::TestRequest::post()
                .uri("/api/jobs/1/complete")
                .set_json(json!({"username": "tl", "materialsCollected": "yes"}))
                .to_request()
        };
        assert_eq!(test::call_service(&app, complete()).await.status(), StatusCode::OK);
        assert_eq!(test::call_service(&app, complete()).await.status(), StatusCode::CONFLICT);

        assert_eq!(test::call_service(&app, approve("tl")).await.status(), StatusCode::FORBIDDEN);
        let resp = test::call_service(&app, approve("sup")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["status"], "completed");
        assert!(body["data"]["completedDate"].is_string());

        let snapshot = state.store.read().await.unwrap();
        assert_eq!(snapshot.inventory.pending_collections.len(), 1);
    }

    #[actix_web::test]
    async fn test_admin_notification_to_all_field_users() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/notifications")
            .set_json(json!({"username": "admin", "recipient": "all", "title": "Depot closed", "message": "Use the north gate"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["count"], 2);

        let req = test::TestRequest::get().uri("/api/notifications?username=tl").to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"][0]["title"], "Depot closed");
        assert_eq!(body["data"][0]["type"], "system");

        let req = test::TestRequest::post()
            .uri("/api/notifications")
            .set_json(json!({"username": "ic", "recipient": "tl", "title": "t", "message": "m"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::post()
            .uri("/api/notifications")
            .set_json(json!({"username": "admin", "recipient": "tl", "title": "", "message": "m"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_web::test]
    async fn test_location_updates_and_admin_tracking_view() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/tracking")
            .set_json(json!({"username": "tl", "latitude": -37.81, "longitude": 144.96}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/api/tracking/update")
            .set_json(json!({"username": "sup", "latitude": -37.8, "longitude": 144.9, "timestamp": "2026-03-01T09:30:00Z"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/api/tracking")
            .set_json(json!({"username": "tl", "latitude": 120.0, "longitude": 0.0}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let req = test::TestRequest::get().uri("/api/tracking?username=sup").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get().uri("/api/tracking?username=admin").to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        let rows = body["data"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        let sup = rows.iter().find(|r| r["username"] == "sup").unwrap();
        assert_eq!(sup["lastUpdate"], "2026-03-01T09:30:00Z");
        let tl = rows.iter().find(|r| r["username"] == "tl").unwrap();
        assert_eq!(tl["latitude"], -37.81);
    }

    #[actix_web::test]
    async fn test_transactions_pagination_and_export() {
        let state = test_state();
        let app = app!(state);

        for project in 1..=3 {
            let req = test::TestRequest::post()
                .uri("/api/inventory/assign")
                .set_json(json!({"username": "admin", "projectId": project, "materials": [{"id": 1, "quantity": 1}]}))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get()
            .uri("/api/inventory/transactions?username=ic&per_page=2&page=1")
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"]["total"], 3);
        assert_eq!(body["data"]["total_pages"], 2);
        assert_eq!(body["data"]["data"][0]["projectId"], "3");

        let req = test::TestRequest::get()
            .uri("/api/inventory/transactions/export?username=admin&project_id=2")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let csv = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.contains("Assigned to project #2 (new)"));
    }

    #[actix_web::test]
    async fn test_login_and_user_management() {
        let state = test_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"username": "IC", "password": "password123"}))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"]["role"], "inventoryController");
        assert!(body["data"].get("passwordHash").is_none());

        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"username": "ic", "password": "wrong"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        let new_user = json!({
            "requested_by": "admin",
            "username": "newstaff",
            "password": "longenough",
            "role": "staff",
            "name": "New Staff"
        });
        let req = test::TestRequest::post().uri("/api/users").set_json(&new_user).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
        let req = test::TestRequest::post().uri("/api/users").set_json(&new_user).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::get().uri("/api/users?username=tl").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_default_admin_is_seeded_once() {
        let store = StoreHandle::new(MemoryStore::new(State::seeded()));
        let mut config = Config::default();
        config.auth.bcrypt_cost = 4;

        create_default_admin_if_needed(&store, &config).await.unwrap();
        create_default_admin_if_needed(&store, &config).await.unwrap();

        let state = store.read().await.unwrap();
        assert_eq!(state.users.len(), 1);
        assert_eq!(state.users["admin"].role, Role::Admin);
    }
}
