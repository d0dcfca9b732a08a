// tests/attempt_flow_tests.rs

mod common;

use chrono::{Duration, Utc};
use common::{spawn_app, spawn_app_with};
use mocktest::config::{ExamPolicy, LateSubmission, WindowPolicy};
use serde_json::{Value, json};

#[tokio::test]
async fn unknown_route_is_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/api/tests")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = app
        .client
        .get(app.url("/api/tests"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn pending_account_cannot_log_in() {
    let app = spawn_app().await;
    let email = format!("{}@example.com", uuid::Uuid::new_v4());

    let response = app.register("Pending Pat", &email).await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["status"], "pending");
    assert!(body["user"].get("password").is_none());

    let response = app.login(&email, common::PASSWORD).await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app.register("Pending Twin", &email).await;
    assert_eq!(response.status().as_u16(), 409);

    let response = app.login(&email, "wrong-password").await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn candidate_view_hides_the_answer_key() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (test_id, _) = app.published_test(&admin).await;
    let user = app.approved_user("Viewer").await;

    let response = app
        .client
        .get(app.url(&format!("/api/tests/{}", test_id)))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let raw = response.text().await.unwrap();
    assert!(!raw.contains("isCorrect"));
    let body: Value = serde_json::from_str(&raw).unwrap();
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["options"][0]["id"], "A");

    let listed: Value = app
        .client
        .get(app.url("/api/tests"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(
        listed
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["id"].as_i64() == Some(test_id))
    );
}

#[tokio::test]
async fn full_attempt_lifecycle() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (test_id, questions) = app.published_test(&admin).await;
    let user = app.approved_user("Runner").await;

    // start, then resume the same attempt
    let response = app.start(&user, test_id).await;
    assert_eq!(response.status().as_u16(), 201);
    let attempt: Value = response.json().await.unwrap();
    let attempt_id = attempt["id"].as_i64().unwrap();
    assert_eq!(attempt["status"], "in_progress");

    let response = app.start(&user, test_id).await;
    assert_eq!(response.status().as_u16(), 200);
    let resumed: Value = response.json().await.unwrap();
    assert_eq!(resumed["id"].as_i64(), Some(attempt_id));

    // Q1 wrong, then corrected; Q2 wrong
    let response = app.answer(&user, attempt_id, questions[0], Some("B")).await;
    assert_eq!(response.status().as_u16(), 200);
    let saved: Value = response.json().await.unwrap();
    assert_eq!(saved["correct"], false);

    let saved: Value = app
        .answer(&user, attempt_id, questions[0], Some("A"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(saved["correct"], true);

    app.answer(&user, attempt_id, questions[1], Some("A")).await;

    let resumed: Value = app.start(&user, test_id).await.json().await.unwrap();
    assert_eq!(resumed["answers"].as_array().unwrap().len(), 2);

    let response = app.submit(&user, attempt_id).await;
    assert_eq!(response.status().as_u16(), 200);
    let summary: Value = response.json().await.unwrap();
    assert_eq!(summary["totalMarks"], 1.0);
    assert_eq!(summary["totalPossibleMarks"], 3.0);
    assert_eq!(summary["percentage"], 33.33);
    assert_eq!(summary["correctCount"], 1);
    assert_eq!(summary["attemptedCount"], 2);
    assert_eq!(summary["accuracy"], 50.0);
    assert_eq!(summary["answers"][1]["correctOptionId"], "B");

    // terminal
    let response = app.submit(&user, attempt_id).await;
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ALREADY_SUBMITTED");

    let response = app.answer(&user, attempt_id, questions[1], Some("B")).await;
    assert_eq!(response.status().as_u16(), 409);

    // retakes are on by default
    let response = app.start(&user, test_id).await;
    assert_eq!(response.status().as_u16(), 201);
    let retake: Value = response.json().await.unwrap();
    assert_ne!(retake["id"].as_i64(), Some(attempt_id));
}

#[tokio::test]
async fn question_from_another_test_is_rejected() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (test_a, _) = app.published_test(&admin).await;
    let (_, other_questions) = app.published_test(&admin).await;
    let user = app.approved_user("Mixer").await;

    let attempt: Value = app.start(&user, test_a).await.json().await.unwrap();
    let attempt_id = attempt["id"].as_i64().unwrap();

    let response = app.answer(&user, attempt_id, other_questions[0], Some("A")).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn foreign_attempt_looks_missing() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (test_id, questions) = app.published_test(&admin).await;
    let owner = app.approved_user("Owner").await;
    let intruder = app.approved_user("Intruder").await;

    let attempt: Value = app.start(&owner, test_id).await.json().await.unwrap();
    let attempt_id = attempt["id"].as_i64().unwrap();

    let response = app.answer(&intruder, attempt_id, questions[0], Some("A")).await;
    assert_eq!(response.status().as_u16(), 404);
    let response = app.submit(&intruder, attempt_id).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn leaderboard_ranks_by_total() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let (test_id, questions) = app.published_test(&admin).await;

    // 3, 2 and -1.5 marks
    let plans: [(&str, Option<&str>, Option<&str>); 3] = [
        ("Low", Some("B"), Some("A")),
        ("Top", Some("A"), Some("B")),
        ("Mid", Some("A"), None),
    ];
    for (name, q1, q2) in plans {
        let user = app.approved_user(name).await;
        let attempt: Value = app.start(&user, test_id).await.json().await.unwrap();
        let attempt_id = attempt["id"].as_i64().unwrap();
        app.answer(&user, attempt_id, questions[0], q1).await;
        if q2.is_some() {
            app.answer(&user, attempt_id, questions[1], q2).await;
        }
        assert_eq!(app.submit(&user, attempt_id).await.status().as_u16(), 200);
    }

    // an unsubmitted attempt never shows up
    let idle = app.approved_user("Idle").await;
    app.start(&idle, test_id).await;

    let viewer = app.approved_user("Viewer").await;
    let board: Value = app
        .client
        .get(app.url(&format!("/api/attempts/leaderboard/{}", test_id)))
        .bearer_auth(&viewer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let entries = board.as_array().unwrap();
    let names: Vec<&str> = entries
        .iter()
        .map(|e| e["displayName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Top", "Mid", "Low"]);
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[0]["totalMarks"], 3.0);
    assert_eq!(entries[2]["totalMarks"], -1.5);

    let limited: Value = app
        .client
        .get(app.url(&format!("/api/attempts/leaderboard/{}?limit=1", test_id)))
        .bearer_auth(&viewer)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(limited.as_array().unwrap().len(), 1);

    let response = app
        .client
        .get(app.url("/api/attempts/leaderboard/999999"))
        .bearer_auth(&viewer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn strict_window_reports_when_the_test_opens() {
    let app = spawn_app_with(ExamPolicy {
        window: WindowPolicy::Strict,
        ..ExamPolicy::default()
    })
    .await;
    let admin = app.admin_token().await;
    let test_id = app
        .create_test(
            &admin,
            json!({
                "title": "Tomorrow",
                "duration": 60,
                "published": true,
                "startTime": Utc::now() + Duration::days(1),
            }),
        )
        .await;
    let user = app.approved_user("Early Bird").await;

    let availability: Value = app
        .client
        .get(app.url(&format!("/api/tests/{}/availability", test_id)))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(availability["allowed"], false);
    assert_eq!(availability["reason"], "NOT_STARTED");

    let response = app.start(&user, test_id).await;
    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_STARTED");
    assert!(body["at"].is_string());

    let listed: Value = app
        .client
        .get(app.url("/api/tests"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unpublished_test_is_forbidden() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let test_id = app
        .create_test(
            &admin,
            json!({
                "title": "Draft",
                "duration": 20,
                "startTime": Utc::now(),
            }),
        )
        .await;
    let user = app.approved_user("Curious").await;

    let response = app.start(&user, test_id).await;
    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "UNPUBLISHED");
}

#[tokio::test]
async fn retakes_can_be_disabled() {
    let app = spawn_app_with(ExamPolicy {
        allow_retakes: false,
        late_submission: LateSubmission::Flag,
        ..ExamPolicy::default()
    })
    .await;
    let admin = app.admin_token().await;
    let (test_id, _) = app.published_test(&admin).await;
    let user = app.approved_user("Once").await;

    let attempt: Value = app.start(&user, test_id).await.json().await.unwrap();
    let summary: Value = app
        .submit(&user, attempt["id"].as_i64().unwrap())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(summary["late"], false);

    let response = app.start(&user, test_id).await;
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "RETAKE_NOT_ALLOWED");
}
