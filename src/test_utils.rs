#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;

    use crate::auth::session::SESSION_COOKIE;
    use crate::config::{AppConfig, initialize_app_state};
    use crate::router::create_router;
    use crate::schemas::AppState;
    use crate::services::accounts::{self, NewAccount};
    use crate::services::participants::{self, ParticipantInput};
    use axum::Router;
    use axum_test::TestServer;
    use chrono::{Duration, Utc};
    use cookie::Cookie;
    use migration::{Migrator, MigratorTrait};
    use model::entities::{event, event_schedule, participant, user};
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    pub const TEST_PASSWORD: &str = "password123";

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    fn test_config() -> AppConfig {
        let vars = HashMap::from([
            ("DATABASE_URL".to_string(), "sqlite::memory:".to_string()),
            ("SESSION_SECRET".to_string(), "test-session-secret".to_string()),
        ]);
        AppConfig::from_source(Some(vars)).expect("Failed to build test configuration")
    }

    /// Create AppState for testing, with migrations applied
    pub async fn setup_test_app_state() -> AppState {
        let state = initialize_app_state(test_config())
            .await
            .expect("Failed to initialize test state");
        Migrator::up(&state.db, None)
            .await
            .expect("Failed to run migrations");
        state
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is determined by the RUST_LOG environment variable,
    /// defaulting to WARN if not set.
    pub fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> (Router, AppState) {
        let state = setup_test_app_state().await;
        (create_router(state.clone()), state)
    }

    /// Test server plus the state behind it, for seeding and inspection.
    pub async fn setup_test_server() -> (TestServer, AppState) {
        let (app, state) = setup_test_app().await;
        let server = TestServer::new(app).expect("Failed to create test server");
        (server, state)
    }

    pub async fn seed_user(
        db: &DatabaseConnection,
        username: &str,
        level: user::UserLevel,
        is_parent: bool,
    ) -> user::Model {
        accounts::create_account(
            db,
            NewAccount {
                username: username.to_string(),
                password: TEST_PASSWORD.to_string(),
                first_name: username.to_string(),
                last_name: "Tester".to_string(),
                level,
                is_parent,
                profile: None,
            },
        )
        .await
        .expect("Failed to seed user")
    }

    /// A participant named `first_name Tester`, linked to `username` when given.
    pub async fn seed_participant(
        db: &DatabaseConnection,
        first_name: &str,
        username: Option<&str>,
    ) -> participant::Model {
        let input = ParticipantInput {
            first_name: first_name.to_string(),
            last_name: "Tester".to_string(),
            email: Some(format!("{}@example.com", first_name.to_lowercase())),
            ..Default::default()
        };
        participants::create(db, input, username.map(str::to_string))
            .await
            .expect("Failed to seed participant")
    }

    /// An event with one schedule starting thirty days from now.
    pub async fn seed_schedule(db: &DatabaseConnection, event_name: &str) -> event_schedule::Model {
        let event = event::ActiveModel {
            name: Set(event_name.to_string()),
            event_type: Set(Some("Workshop".to_string())),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to seed event");

        let start = Utc::now().naive_utc() + Duration::days(30);
        event_schedule::ActiveModel {
            event_id: Set(event.id),
            location: Set("Main Library".to_string()),
            start_time: Set(start),
            end_time: Set(start + Duration::hours(2)),
            capacity: Set(Some(20)),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to seed schedule")
    }

    /// Log in through the form and return the signed session cookie.
    pub async fn login(server: &TestServer, username: &str) -> Cookie<'static> {
        let response = server
            .post("/login")
            .form(&[("username", username), ("password", TEST_PASSWORD)])
            .await;
        response.assert_status(axum::http::StatusCode::FOUND);
        response.cookie(SESSION_COOKIE)
    }
}
