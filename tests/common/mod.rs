// tests/common/mod.rs

#![allow(dead_code)]

use std::sync::Arc;

use mocktest::{
    config::{Config, ExamPolicy},
    models::user::{NewUser, Role, UserStatus},
    routes,
    state::AppState,
    store::{DynStore, MemoryStore},
    utils::hash::hash_password,
};
use serde_json::{Value, json};

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub address: String,
    pub store: DynStore,
    pub client: reqwest::Client,
}

pub fn test_config(exam: ExamPolicy) -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        log_dir: "logs".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        admin_name: None,
        admin_email: None,
        admin_password: None,
        exam,
    }
}

/// Spawns the app on a random port with the default exam policy.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(ExamPolicy::default()).await
}

/// Spawns the app on a random port, backed by an in-memory store that
/// already holds an approved admin.
pub async fn spawn_app_with(exam: ExamPolicy) -> TestApp {
    let store: DynStore = Arc::new(MemoryStore::new());
    store
        .create_user(NewUser {
            name: "Admin".to_string(),
            email: ADMIN_EMAIL.to_string(),
            password: hash_password(ADMIN_PASSWORD).unwrap(),
            role: Role::Admin,
            status: UserStatus::Approved,
        })
        .await
        .unwrap();

    let app = routes::create_router(AppState::new(store.clone(), test_config(exam)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn token(&self, email: &str, password: &str) -> String {
        let response = self.login(email, password).await;
        assert_eq!(response.status().as_u16(), 200, "login failed for {}", email);
        let body: Value = response.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.token(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn register(&self, name: &str, email: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "name": name, "email": email, "password": PASSWORD }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Registers a fresh user, approves them through the admin API and
    /// returns their token.
    pub async fn approved_user(&self, name: &str) -> String {
        let email = format!("{}@example.com", uuid::Uuid::new_v4());
        let response = self.register(name, &email).await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        let id = body["user"]["id"].as_i64().unwrap();

        let admin = self.admin_token().await;
        let response = self
            .client
            .put(self.url(&format!("/api/admin/users/{}/approve", id)))
            .bearer_auth(&admin)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        self.token(&email, PASSWORD).await
    }

    /// Creates a test through the admin API and returns its id.
    pub async fn create_test(&self, admin: &str, body: Value) -> i64 {
        let response = self
            .client
            .post(self.url("/api/admin/tests"))
            .bearer_auth(admin)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let test: Value = response.json().await.unwrap();
        test["id"].as_i64().unwrap()
    }

    /// Published, already-open test with
    /// Q1 (2 marks, -0.5, answer A) and Q2 (1 mark, -1, answer B).
    /// Returns the test id and both question ids.
    pub async fn published_test(&self, admin: &str) -> (i64, Vec<i64>) {
        let test_id = self
            .create_test(
                admin,
                json!({
                    "title": "General Knowledge",
                    "description": "Warm-up",
                    "duration": 30,
                    "published": true,
                    "startTime": chrono::Utc::now() - chrono::Duration::minutes(1),
                }),
            )
            .await;

        let response = self
            .client
            .post(self.url(&format!("/api/admin/tests/{}/questions/bulk", test_id)))
            .bearer_auth(admin)
            .json(&json!({
                "questions": [
                    {
                        "text": "Capital of France?",
                        "options": [
                            { "text": "Paris", "isCorrect": true },
                            { "text": "Rome" },
                            { "text": "Oslo" }
                        ],
                        "marks": 2,
                        "negativeMarks": 0.5
                    },
                    {
                        "text": "2 + 2?",
                        "options": [
                            { "text": "3" },
                            { "text": "4", "isCorrect": true }
                        ],
                        "marks": 1,
                        "negativeMarks": 1
                    }
                ]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        let ids = body["questions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|q| q["id"].as_i64().unwrap())
            .collect();

        (test_id, ids)
    }

    pub async fn start(&self, token: &str, test_id: i64) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/attempts/start/{}", test_id)))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    pub async fn answer(
        &self,
        token: &str,
        attempt_id: i64,
        question_id: i64,
        option: Option<&str>,
    ) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/attempts/{}/answer", attempt_id)))
            .bearer_auth(token)
            .json(&json!({ "questionId": question_id, "selectedOptionId": option }))
            .send()
            .await
            .unwrap()
    }

    pub async fn submit(&self, token: &str, attempt_id: i64) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/attempts/{}/submit", attempt_id)))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}
