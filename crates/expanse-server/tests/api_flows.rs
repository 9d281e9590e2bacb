// End-to-end tests against the real route table: each test boots the full
// router on an ephemeral port with a throwaway database and content store,
// then drives it over HTTP the way the frontend does.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use tempfile::TempDir;

use expanse_api::state::AppStateInner;
use expanse_api::store::ContentStore;
use expanse_db::Database;
use expanse_server::build_router;

const MAX_UPLOAD_BYTES: u64 = 1024 * 1024;
const PASSWORD: &str = "correct-horse-battery";

struct TestServer {
    base: String,
    client: reqwest::Client,
    _dir: TempDir,
}

async fn spawn_server() -> TestServer {
    spawn_server_with_time_limit(600).await
}

async fn spawn_server_with_time_limit(quiz_time_limit_secs: u64) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("test.db")).unwrap();
    let store = ContentStore::new(dir.path().join("content")).await.unwrap();

    let state = Arc::new(AppStateInner {
        db,
        store,
        jwt_secret: "integration-test-secret".to_string(),
        teacher_domains: vec!["uni.edu".to_string()],
        quiz_time_limit_secs,
        max_upload_bytes: MAX_UPLOAD_BYTES,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    TestServer {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Register a user and hand back (token, user_id). Emails under
    /// uni.edu come back as teachers, everything else as students.
    async fn register(&self, name: &str, email: &str) -> (String, String) {
        let resp = self
            .client
            .post(self.url("/auth/register"))
            .json(&json!({ "name": name, "email": email, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = resp.json().await.unwrap();
        let token = body["data"]["token"].as_str().unwrap().to_string();
        let user_id = body["data"]["user_id"].as_str().unwrap().to_string();
        (token, user_id)
    }

    async fn create_course(&self, token: &str, code: &str) -> i64 {
        let resp = self
            .client
            .post(self.url("/courses"))
            .bearer_auth(token)
            .json(&json!({
                "course_code": code,
                "course_name": "Distributed Systems",
                "course_description": "Consensus, replication, partial failure",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = resp.json().await.unwrap();
        body["data"]["course_id"].as_i64().unwrap()
    }

    /// Replace the course roster with the given provider account ids
    /// (the registration emails, for local accounts).
    async fn enroll(&self, token: &str, course_id: i64, accounts: &[&str]) {
        let resp = self
            .client
            .put(self.url(&format!("/courses/{course_id}/enrollment")))
            .bearer_auth(token)
            .json(&json!({ "user_id": accounts }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    async fn create_topic(&self, token: &str, course_id: i64, released: bool) -> i64 {
        let form = Form::new()
            .text("topic_name", "Week 1")
            .text("topic_description", "Logical clocks")
            .text("course_id", course_id.to_string())
            .text("topic_is_released", released.to_string());

        let resp = self
            .client
            .post(self.url("/topics"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = resp.json().await.unwrap();
        body["data"]["topic_id"].as_i64().unwrap()
    }

    async fn create_quiz(&self, token: &str, course_id: i64) -> i64 {
        let resp = self
            .client
            .post(self.url("/quiz/create-quiz"))
            .bearer_auth(token)
            .json(&sample_quiz(course_id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = resp.json().await.unwrap();
        body["data"]["quiz_id"].as_i64().unwrap()
    }

    async fn get_json(&self, path: &str, token: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }
}

fn sample_quiz(course_id: i64) -> Value {
    json!({
        "course_id": course_id,
        "quiz_description": "Clocks and consensus",
        "quiz_content": [
            {
                "ques_no": 1,
                "question": "Which clock only ever moves forward?",
                "options": { "A": "Wall clock", "B": "Lamport clock" },
                "answer": "B",
            },
            {
                "ques_no": 2,
                "question": "How many acceptors must a Paxos quorum include?",
                "options": { "A": "A majority", "B": "All of them" },
                "answer": "A",
            },
        ],
    })
}

// -- Auth --

#[tokio::test]
async fn health_endpoint_is_public() {
    let server = spawn_server().await;

    let resp = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn registration_assigns_roles_from_domain() {
    let server = spawn_server().await;

    let resp = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "name": "Prof", "email": "prof@uni.edu", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["data"]["role"], "teacher");
    assert!(body["timestamp"].is_string());

    let resp = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "name": "Ada", "email": "ada@example.edu", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "student");

    // Same email twice.
    let resp = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "name": "Ada2", "email": "ada@example.edu", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Email already registered");

    let resp = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "name": "Eve", "email": "eve@example.edu", "password": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Password must be at least 8 characters");

    let resp = server
        .client
        .post(server.url("/auth/register"))
        .json(&json!({ "name": "Eve", "email": "not-an-email", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Email address is not valid");
}

#[tokio::test]
async fn login_and_credential_failures() {
    let server = spawn_server().await;
    server.register("Ada", "ada@example.edu").await;

    let resp = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "ada@example.edu", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["data"]["name"], "Ada");
    assert_eq!(body["data"]["role"], "student");
    assert!(body["data"]["token"].as_str().unwrap().contains('.'));

    // Wrong password and unknown email read the same from outside.
    for (email, password) in [
        ("ada@example.edu", "wrong-password"),
        ("nobody@example.edu", PASSWORD),
    ] {
        let resp = server
            .client
            .post(server.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Invalid email or password");
    }
}

#[tokio::test]
async fn rejects_missing_and_garbage_tokens() {
    let server = spawn_server().await;

    let resp = server.client.get(server.url("/courses")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Invalid Authorization header format");

    let resp = server
        .client
        .get(server.url("/courses"))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Invalid or expired token");
}

// -- Courses & enrollment --

#[tokio::test]
async fn course_crud_with_role_enforcement() {
    let server = spawn_server().await;
    let (teacher, teacher_id) = server.register("Prof", "prof@uni.edu").await;
    let (student, _) = server.register("Ada", "ada@example.edu").await;

    // Students cannot create courses.
    let resp = server
        .client
        .post(server.url("/courses"))
        .bearer_auth(&student)
        .json(&json!({
            "course_code": "CS425",
            "course_name": "Distributed Systems",
            "course_description": "All of it",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Teacher role required");

    let resp = server
        .client
        .post(server.url("/courses"))
        .bearer_auth(&teacher)
        .json(&json!({
            "course_code": "CS425",
            "course_name": "Distributed Systems",
            "course_description": "All of it",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Course created successfully");
    assert_eq!(body["data"]["course_code"], "CS425");
    assert_eq!(body["data"]["created_by"], teacher_id.as_str());
    let course_id = body["data"]["course_id"].as_i64().unwrap();

    // Duplicate code.
    let resp = server
        .client
        .post(server.url("/courses"))
        .bearer_auth(&teacher)
        .json(&json!({
            "course_code": "CS425",
            "course_name": "Other",
            "course_description": "Other",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Course code already exists");

    // Blank fields.
    let resp = server
        .client
        .post(server.url("/courses"))
        .bearer_auth(&teacher)
        .json(&json!({ "course_code": " ", "course_name": "X", "course_description": "Y" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Course code, name and description are required");

    // Any authenticated user can browse.
    let (status, body) = server.get_json("/courses", &student).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Courses retrieved successfully");
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = server.get_json(&format!("/courses/{course_id}"), &student).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["course_name"], "Distributed Systems");

    let (status, body) = server.get_json("/courses/9999", &student).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Course Not Found");

    // Partial update touches only the provided fields.
    let resp = server
        .client
        .put(server.url(&format!("/courses/{course_id}")))
        .bearer_auth(&teacher)
        .json(&json!({ "course_name": "Distributed Systems II" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Course updated successfully");
    assert_eq!(body["data"]["course_name"], "Distributed Systems II");
    assert_eq!(body["data"]["course_code"], "CS425");

    let resp = server
        .client
        .put(server.url(&format!("/courses/{course_id}")))
        .bearer_auth(&teacher)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Nothing to update");

    let resp = server
        .client
        .put(server.url(&format!("/courses/{course_id}")))
        .bearer_auth(&teacher)
        .json(&json!({ "course_name": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "course_name must not be blank");

    let resp = server
        .client
        .delete(server.url(&format!("/courses/{course_id}")))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = server
        .client
        .delete(server.url(&format!("/courses/{course_id}")))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let (status, _) = server.get_json(&format!("/courses/{course_id}"), &teacher).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn enrollment_roster_is_replaced_atomically() {
    let server = spawn_server().await;
    let (teacher, _) = server.register("Prof", "prof@uni.edu").await;
    server.register("Ada", "ada@example.edu").await;
    server.register("Bob", "bob@example.edu").await;
    let course_id = server.create_course(&teacher, "CS425").await;

    let (status, body) = server
        .get_json(&format!("/courses/{course_id}/enrollment"), &teacher)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Enrolled users retrieved successfully");
    assert_eq!(body["data"]["users"].as_array().unwrap().len(), 0);

    server
        .enroll(&teacher, course_id, &["ada@example.edu", "bob@example.edu"])
        .await;
    let (_, body) = server
        .get_json(&format!("/courses/{course_id}/enrollment"), &teacher)
        .await;
    let users = body["data"]["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.contains(&json!("ada@example.edu")));
    assert!(users.contains(&json!("bob@example.edu")));

    // One unknown id fails the whole request and leaves the roster alone.
    let resp = server
        .client
        .put(server.url(&format!("/courses/{course_id}/enrollment")))
        .bearer_auth(&teacher)
        .json(&json!({ "user_id": ["ada@example.edu", "ghost@example.edu"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Unknown user ids");
    assert_eq!(body["details"]["unknown_ids"], json!(["ghost@example.edu"]));

    let (_, body) = server
        .get_json(&format!("/courses/{course_id}/enrollment"), &teacher)
        .await;
    assert_eq!(body["data"]["users"].as_array().unwrap().len(), 2);

    // The put replaces, not appends.
    server.enroll(&teacher, course_id, &["ada@example.edu"]).await;
    let (_, body) = server
        .get_json(&format!("/courses/{course_id}/enrollment"), &teacher)
        .await;
    assert_eq!(body["data"]["users"], json!(["ada@example.edu"]));

    let resp = server
        .client
        .put(server.url("/courses/9999/enrollment"))
        .bearer_auth(&teacher)
        .json(&json!({ "user_id": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// -- Topics & content --

#[tokio::test]
async fn topics_hide_unreleased_from_students() {
    let server = spawn_server().await;
    let (teacher, _) = server.register("Prof", "prof@uni.edu").await;
    let (student, _) = server.register("Ada", "ada@example.edu").await;
    let course_id = server.create_course(&teacher, "CS425").await;
    server.enroll(&teacher, course_id, &["ada@example.edu"]).await;

    // Create an unreleased topic with one attached file.
    let form = Form::new()
        .text("topic_name", "Week 1")
        .text("topic_description", "Logical clocks")
        .text("course_id", course_id.to_string())
        .text("topic_is_released", "false")
        .part(
            "files",
            Part::bytes(&b"%PDF-1.4 lecture notes"[..])
                .file_name("week1.pdf")
                .mime_str("application/pdf")
                .unwrap(),
        );
    let resp = server
        .client
        .post(server.url("/topics"))
        .bearer_auth(&teacher)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Topic created successfully");
    let topic_id = body["data"]["topic_id"].as_i64().unwrap();
    let contents = body["data"]["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0]["file_name"], "week1.pdf");
    assert_eq!(contents[0]["mime_type"], "application/pdf");
    assert_eq!(contents[0]["sha256"].as_str().unwrap().len(), 64);
    let content_id = contents[0]["content_id"].as_str().unwrap().to_string();

    // Unreleased: invisible to the enrolled student, visible to the teacher.
    let (status, body) = server
        .get_json(&format!("/courses/{course_id}/topics"), &student)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let (_, body) = server
        .get_json(&format!("/courses/{course_id}/topics"), &teacher)
        .await;
    let topics = body["data"].as_array().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["is_released"], false);
    assert_eq!(topics[0]["contents"].as_array().unwrap().len(), 1);

    // Release it.
    let resp = server
        .client
        .put(server.url(&format!("/topics/{topic_id}")))
        .bearer_auth(&teacher)
        .json(&json!({ "topic_is_released": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Topic updated successfully");
    assert_eq!(body["data"]["is_released"], true);

    let (_, body) = server
        .get_json(&format!("/courses/{course_id}/topics"), &student)
        .await;
    let topics = body["data"].as_array().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["topic_name"], "Week 1");

    // Topic creation without a name, and updates against missing topics.
    let form = Form::new()
        .text("topic_description", "No name")
        .text("course_id", course_id.to_string());
    let resp = server
        .client
        .post(server.url("/topics"))
        .bearer_auth(&teacher)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "topic_name is required");

    let resp = server
        .client
        .put(server.url("/topics/9999"))
        .bearer_auth(&teacher)
        .json(&json!({ "topic_is_released": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Topic Not Found");

    let resp = server
        .client
        .delete(server.url(&format!("/topics/{topic_id}")))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let (_, body) = server
        .get_json(&format!("/courses/{course_id}/topics"), &teacher)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    // The topic's content went with it.
    let (status, body) = server.get_json(&format!("/contents/{content_id}"), &teacher).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Content Not Found");
}

#[tokio::test]
async fn content_round_trips_through_upload_and_download() {
    let server = spawn_server().await;
    let (teacher, _) = server.register("Prof", "prof@uni.edu").await;
    let (ada, _) = server.register("Ada", "ada@example.edu").await;
    let (bob, _) = server.register("Bob", "bob@example.edu").await;
    let course_id = server.create_course(&teacher, "CS425").await;
    server.enroll(&teacher, course_id, &["ada@example.edu"]).await;
    let topic_id = server.create_topic(&teacher, course_id, true).await;

    let payload = b"every byte counts".to_vec();
    let form = Form::new()
        .text("course_id", course_id.to_string())
        .text("topic_id", topic_id.to_string())
        .part(
            "file",
            Part::bytes(payload.clone())
                .file_name("notes.txt")
                .mime_str("text/plain")
                .unwrap(),
        );
    let resp = server
        .client
        .post(server.url("/contents"))
        .bearer_auth(&teacher)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Content uploaded successfully");
    assert_eq!(body["data"]["size_bytes"], payload.len() as u64);
    let content_id = body["data"]["content_id"].as_str().unwrap().to_string();
    let sha256 = body["data"]["sha256"].as_str().unwrap().to_string();

    // Enrolled student gets the exact bytes back with download headers.
    let resp = server
        .client
        .get(server.url(&format!("/contents/{content_id}")))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "text/plain"
    );
    assert_eq!(
        resp.headers().get("etag").unwrap().to_str().unwrap(),
        format!("\"{sha256}\"")
    );
    assert_eq!(
        resp.headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap(),
        "attachment; filename=\"notes.txt\""
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), payload.as_slice());

    // Not enrolled, not a teacher: no download.
    let resp = server
        .client
        .get(server.url(&format!("/contents/{content_id}")))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "User not enrolled in course");

    // Garbage and unknown ids both read as missing content.
    for path in ["/contents/not-a-uuid", "/contents/00000000-0000-4000-8000-000000000000"] {
        let (status, body) = server.get_json(path, &ada).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Content Not Found");
    }

    // Uploading against a topic from another course is refused.
    let other_course = server.create_course(&teacher, "CS426").await;
    let other_topic = server.create_topic(&teacher, other_course, true).await;
    let form = Form::new()
        .text("course_id", course_id.to_string())
        .text("topic_id", other_topic.to_string())
        .part(
            "file",
            Part::bytes(&b"stray"[..])
                .file_name("stray.txt")
                .mime_str("text/plain")
                .unwrap(),
        );
    let resp = server
        .client
        .post(server.url("/contents"))
        .bearer_auth(&teacher)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Topic does not belong to the course");

    // Empty files are refused.
    let form = Form::new()
        .text("course_id", course_id.to_string())
        .text("topic_id", topic_id.to_string())
        .part(
            "file",
            Part::bytes(Vec::new())
                .file_name("empty.txt")
                .mime_str("text/plain")
                .unwrap(),
        );
    let resp = server
        .client
        .post(server.url("/contents"))
        .bearer_auth(&teacher)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "File empty.txt is empty");

    // Students cannot delete; teachers can, after which the id is gone.
    let resp = server
        .client
        .delete(server.url(&format!("/contents/{content_id}")))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = server
        .client
        .delete(server.url(&format!("/contents/{content_id}")))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let (status, _) = server.get_json(&format!("/contents/{content_id}"), &ada).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let server = spawn_server().await;
    let (teacher, _) = server.register("Prof", "prof@uni.edu").await;
    let course_id = server.create_course(&teacher, "CS425").await;
    let topic_id = server.create_topic(&teacher, course_id, true).await;

    let form = Form::new()
        .text("course_id", course_id.to_string())
        .text("topic_id", topic_id.to_string())
        .part(
            "file",
            Part::bytes(vec![0u8; MAX_UPLOAD_BYTES as usize + 1])
                .file_name("huge.bin")
                .mime_str("application/octet-stream")
                .unwrap(),
        );
    let resp = server
        .client
        .post(server.url("/contents"))
        .bearer_auth(&teacher)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Upload exceeds size limit");
}

// -- Discussion forum --

#[tokio::test]
async fn forum_posts_votes_and_comments() {
    let server = spawn_server().await;
    let (teacher, _) = server.register("Prof", "prof@uni.edu").await;
    let (ada, ada_id) = server.register("Ada", "ada@example.edu").await;
    let (bob, _) = server.register("Bob", "bob@example.edu").await;
    let (carol, _) = server.register("Carol", "carol@example.edu").await;
    let course_id = server.create_course(&teacher, "CS425").await;
    server
        .enroll(&teacher, course_id, &["ada@example.edu", "bob@example.edu"])
        .await;

    let discussions = format!("/courses/{course_id}/discussions");

    // Empty board reads as not found; outsiders are turned away earlier.
    let (status, body) = server.get_json(&discussions, &ada).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No Posts Found for the Course");

    let (status, body) = server.get_json(&discussions, &carol).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "User not enrolled in course");

    // Teachers see every course without enrolling.
    let (status, _) = server.get_json(&discussions, &teacher).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let resp = server
        .client
        .post(server.url(&discussions))
        .bearer_auth(&ada)
        .json(&json!({ "post_title": "Lab 2", "post_content": "When is it due?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Post created successfully");
    assert_eq!(body["data"]["created_by"], ada_id.as_str());
    assert_eq!(body["data"]["vote_score"], 0);
    assert_eq!(body["data"]["comment_count"], 0);
    let post_id = body["data"]["post_id"].as_i64().unwrap();

    let resp = server
        .client
        .post(server.url(&discussions))
        .bearer_auth(&ada)
        .json(&json!({ "post_title": " ", "post_content": "body" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Post title and content are required");

    // Only the author edits.
    let post_path = format!("{discussions}/{post_id}");
    let resp = server
        .client
        .put(server.url(&post_path))
        .bearer_auth(&bob)
        .json(&json!({ "post_content": "hijack" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Only the author can modify this");

    let resp = server
        .client
        .put(server.url(&post_path))
        .bearer_auth(&ada)
        .json(&json!({ "post_content": "Deadline moved to Friday." }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["post_content"], "Deadline moved to Friday.");
    assert_eq!(body["data"]["post_title"], "Lab 2");

    // Votes toggle and flip.
    let vote_path = format!("{post_path}/vote");
    let resp = server
        .client
        .put(server.url(&vote_path))
        .bearer_auth(&bob)
        .json(&json!({ "value": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "value must be 1 or -1");

    let resp = server
        .client
        .put(server.url(&vote_path))
        .bearer_auth(&bob)
        .json(&json!({ "value": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Vote recorded successfully");
    assert_eq!(body["data"]["vote_score"], 1);
    assert_eq!(body["data"]["your_vote"], 1);

    // Same direction again: toggled off.
    let resp = server
        .client
        .put(server.url(&vote_path))
        .bearer_auth(&bob)
        .json(&json!({ "value": 1 }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["vote_score"], 0);
    assert!(body["data"]["your_vote"].is_null());

    let resp = server
        .client
        .put(server.url(&vote_path))
        .bearer_auth(&bob)
        .json(&json!({ "value": -1 }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["vote_score"], -1);
    assert_eq!(body["data"]["your_vote"], -1);

    let resp = server
        .client
        .put(server.url(&format!("{discussions}/9999/vote")))
        .bearer_auth(&bob)
        .json(&json!({ "value": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Post Not Found");

    // Comments: empty list is a 200 with its own message.
    let comments_path = format!("{post_path}/comments");
    let (status, body) = server.get_json(&comments_path, &ada).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No Comments Found");
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let resp = server
        .client
        .post(server.url(&comments_path))
        .bearer_auth(&bob)
        .json(&json!({ "comment_content": "It is Friday", "reply_to": null }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Comment created successfully");
    let comment_id = body["data"]["comment_id"].as_i64().unwrap();

    let resp = server
        .client
        .post(server.url(&comments_path))
        .bearer_auth(&ada)
        .json(&json!({ "comment_content": "Thanks!", "reply_to": comment_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["reply_to"], comment_id);
    let reply_id = body["data"]["comment_id"].as_i64().unwrap();

    let resp = server
        .client
        .post(server.url(&comments_path))
        .bearer_auth(&ada)
        .json(&json!({ "comment_content": "Dangling", "reply_to": 9999 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "reply_to must reference a comment on the same post");

    let (status, body) = server.get_json(&comments_path, &ada).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Comments retrieved successfully");
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // The listing reflects the votes and comments so far.
    let (_, body) = server.get_json(&discussions, &ada).await;
    let posts = body["data"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["vote_score"], -1);
    assert_eq!(posts[0]["comment_count"], 2);

    // Comment editing is author-only too.
    let comment_path = format!("{discussions}/comments/{comment_id}");
    let resp = server
        .client
        .put(server.url(&comment_path))
        .bearer_auth(&ada)
        .json(&json!({ "comment_content": "Rewritten" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = server
        .client
        .put(server.url(&comment_path))
        .bearer_auth(&bob)
        .json(&json!({ "comment_content": "It is Thursday, actually" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Comment updated successfully");
    assert_eq!(body["data"]["comment_content"], "It is Thursday, actually");

    let resp = server
        .client
        .delete(server.url(&format!("{discussions}/comments/{reply_id}")))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Comment deleted successfully");

    let (_, body) = server.get_json(&comments_path, &ada).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Deleting the post leaves the board empty again.
    let resp = server
        .client
        .delete(server.url(&post_path))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Post deleted successfully");

    let (status, _) = server.get_json(&discussions, &ada).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Quizzes --

#[tokio::test]
async fn quiz_lifecycle_grades_and_redacts() {
    let server = spawn_server().await;
    let (teacher, _) = server.register("Prof", "prof@uni.edu").await;
    let (ada, _) = server.register("Ada", "ada@example.edu").await;
    let (carol, _) = server.register("Carol", "carol@example.edu").await;
    let course_id = server.create_course(&teacher, "CS425").await;
    server.enroll(&teacher, course_id, &["ada@example.edu"]).await;

    let quiz_id = server.create_quiz(&teacher, course_id).await;

    // Malformed quizzes never land.
    let resp = server
        .client
        .post(server.url("/quiz/create-quiz"))
        .bearer_auth(&teacher)
        .json(&json!({
            "course_id": course_id,
            "quiz_description": "Empty",
            "quiz_content": [],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "A quiz needs at least one question");

    let resp = server
        .client
        .post(server.url("/quiz/create-quiz"))
        .bearer_auth(&teacher)
        .json(&json!({
            "course_id": course_id,
            "quiz_description": "Bad answer",
            "quiz_content": [{
                "ques_no": 1,
                "question": "Pick one",
                "options": { "A": "Yes", "B": "No" },
                "answer": "Z",
            }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Question 1 answer is not one of its options");

    // Students get the quiz without answer keys; teachers with.
    let (status, body) = server
        .get_json(&format!("/quiz/get-quiz/{quiz_id}"), &ada)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Quiz retrieved successfully");
    assert_eq!(body["data"]["max_score"], 100.0);
    let questions = body["data"]["content"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert!(questions.iter().all(|q| q.get("answer").is_none()));

    let (_, body) = server
        .get_json(&format!("/quiz/get-quiz/{quiz_id}"), &teacher)
        .await;
    assert_eq!(body["data"]["content"][0]["answer"], "B");

    let (status, body) = server
        .get_json(&format!("/quiz/get-quiz/{quiz_id}"), &carol)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "User not enrolled in course");

    let (_, body) = server
        .get_json(&format!("/quiz/get-quiz-course/{course_id}"), &ada)
        .await;
    let quizzes = body["data"].as_array().unwrap();
    assert_eq!(quizzes.len(), 1);
    assert_eq!(quizzes[0]["question_count"], 2);

    // Teachers do not take quizzes.
    let resp = server
        .client
        .post(server.url(&format!("/quiz/start/{quiz_id}")))
        .bearer_auth(&teacher)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Only students can take quizzes");

    let resp = server
        .client
        .post(server.url(&format!("/quiz/start/{quiz_id}")))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Quiz started successfully");
    assert_eq!(body["data"]["time_limit_secs"], 600);
    let attempt_id = body["data"]["attempt_id"].as_i64().unwrap();
    let deadline = chrono::DateTime::parse_from_rfc3339(body["data"]["deadline"].as_str().unwrap())
        .unwrap();
    assert!(deadline > chrono::Utc::now());

    // Starting again resumes the running attempt with its original deadline.
    let resp = server
        .client
        .post(server.url(&format!("/quiz/start/{quiz_id}")))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Quiz already in progress");
    assert_eq!(body["data"]["attempt_id"], attempt_id);
    let resumed = chrono::DateTime::parse_from_rfc3339(body["data"]["deadline"].as_str().unwrap())
        .unwrap();
    assert_eq!(resumed, deadline);

    // One right, one wrong: half the marks.
    let resp = server
        .client
        .post(server.url("/quiz/submit-quiz"))
        .bearer_auth(&ada)
        .json(&json!({
            "quiz_id": quiz_id,
            "answers": [
                { "ques_no": 1, "answer": "B" },
                { "ques_no": 2, "answer": "B" },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Quiz submitted successfully");
    assert_eq!(body["data"]["score"], 50.0);
    assert_eq!(body["data"]["correct"], 1);
    assert_eq!(body["data"]["total"], 2);
    // The result reveals the answer keys.
    assert_eq!(body["data"]["content"][0]["answer"], "B");

    // No second submission, no restart.
    let resp = server
        .client
        .post(server.url("/quiz/submit-quiz"))
        .bearer_auth(&ada)
        .json(&json!({ "quiz_id": quiz_id, "answers": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Quiz already completed");

    let resp = server
        .client
        .post(server.url(&format!("/quiz/start/{quiz_id}")))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // Submitting a quiz that was never started.
    let quiz2 = server.create_quiz(&teacher, course_id).await;
    let resp = server
        .client
        .post(server.url("/quiz/submit-quiz"))
        .bearer_auth(&ada)
        .json(&json!({ "quiz_id": quiz2, "answers": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Quiz not started");

    let (status, body) = server.get_json("/quiz/get-score", &ada).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Scores retrieved successfully");
    let scores = body["data"].as_array().unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0]["quiz_id"], quiz_id);
    assert_eq!(scores[0]["score"], 50.0);
    assert_eq!(scores[0]["max_score"], 100.0);
    assert_eq!(scores[0]["status"], "submitted");
    assert!(scores[0]["submitted_at"].is_string());
}

#[tokio::test]
async fn quiz_deadline_is_enforced_server_side() {
    // A zero time limit makes every attempt overdue by the time it is
    // submitted.
    let server = spawn_server_with_time_limit(0).await;
    let (teacher, _) = server.register("Prof", "prof@uni.edu").await;
    let (ada, _) = server.register("Ada", "ada@example.edu").await;
    let course_id = server.create_course(&teacher, "CS425").await;
    server.enroll(&teacher, course_id, &["ada@example.edu"]).await;
    let quiz_id = server.create_quiz(&teacher, course_id).await;

    let resp = server
        .client
        .post(server.url(&format!("/quiz/start/{quiz_id}")))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = server
        .client
        .post(server.url("/quiz/submit-quiz"))
        .bearer_auth(&ada)
        .json(&json!({
            "quiz_id": quiz_id,
            "answers": [{ "ques_no": 1, "answer": "B" }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Quiz deadline has passed");

    // The attempt was expired with a zero score, and stays closed.
    let (_, body) = server.get_json("/quiz/get-score", &ada).await;
    let scores = body["data"].as_array().unwrap();
    assert_eq!(scores.len(), 1);
    assert_eq!(scores[0]["status"], "expired");
    assert_eq!(scores[0]["score"], 0.0);

    let resp = server
        .client
        .post(server.url(&format!("/quiz/start/{quiz_id}")))
        .bearer_auth(&ada)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Quiz already completed");
}

// -- User directory --

#[tokio::test]
async fn student_directory_is_teacher_only() {
    let server = spawn_server().await;
    let (teacher, _) = server.register("Prof", "prof@uni.edu").await;
    let (ada, _) = server.register("Ada", "ada@example.edu").await;
    server.register("Bob", "bob@example.edu").await;

    let (status, body) = server.get_json("/api/users", &teacher).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Users retrieved successfully");
    let users = body["data"].as_array().unwrap();
    // Students only, sorted by name, keyed by provider account id.
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["name"], "Ada");
    assert_eq!(users[0]["id"], "ada@example.edu");
    assert_eq!(users[1]["name"], "Bob");

    let (status, _) = server.get_json("/api/users", &ada).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Single-user lookup is open to any authenticated caller.
    let (status, body) = server.get_json("/api/users/bob@example.edu", &ada).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User retrieved successfully");
    assert_eq!(body["data"]["name"], "Bob");
    assert_eq!(body["data"]["role"], "student");

    let (status, body) = server.get_json("/api/users/ghost@example.edu", &ada).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User Not Found");
}
