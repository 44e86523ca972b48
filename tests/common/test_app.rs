use axum::{extract::Request, ServiceExt};
use crudbase::{build_app, AppState, Config, Database};
use reqwest::{redirect::Policy, Client};
use secrecy::SecretString;
use tokio::net::TcpListener;

/// HTTP test application wrapper
///
/// Manages the full application (router plus middleware) on a random port.
/// Each test gets its own server instance to allow parallel test execution.
pub struct TestApp {
    /// Server base URL (e.g., "http://127.0.0.1:54321")
    pub address: String,
    /// HTTP client for making requests
    pub client: Client,
}

impl TestApp {
    /// Serves the app on `db`, exposing `tables` through the record endpoints.
    pub async fn new(db: Database, tables: &[&str]) -> Self {
        let mut config = Config::default();
        config.server.exposed_tables = tables.join(",");

        let app = build_app(AppState::new(db, config));

        // Bind to random port (port 0 tells OS to assign available port)
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{port}");

        tokio::spawn(async move {
            axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
                .await
                .unwrap();
        });

        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { address, client }
    }

    /// Serves the app without a database; only routes that never query work.
    pub async fn without_database() -> Self {
        let db = Database::from_url(SecretString::from("postgres://localhost/unused".to_string()));
        Self::new(db, &[]).await
    }

    /// Get the full URL for an API endpoint
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}
