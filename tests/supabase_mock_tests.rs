//! PostgREST store and GoTrue client against an in-process HTTP server bound to an
//! ephemeral localhost port. The server records every request and answers through a
//! per-test responder.

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use uuid::Uuid;

use studyhall::identity::{AuthProvider, Credentials, SupabaseAuth};
use studyhall::storage::{
    FlashcardDraft, NewStudySet, QuestionDrafts, QuizDraft, RestStore, Scope, StudySetStore,
};

const ANON_KEY: &str = "anon-key";
const SERVICE_KEY: &str = "service-key";
const SET_ID: &str = "0b8e2f3a-4c61-4f3e-9d2b-6a1f0e5c7d11";
const ALICE: Scope<'static> = Scope { user_id: "user-a", access_token: "caller-token" };

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Value,
}

impl Recorded {
    fn query(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }
}

type Responder = Arc<dyn Fn(&Recorded) -> (StatusCode, Value) + Send + Sync>;

#[derive(Clone)]
struct MockState {
    seen: Arc<Mutex<Vec<Recorded>>>,
    respond: Responder,
}

async fn record(
    State(st): State<MockState>,
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let rec = Recorded {
        method,
        path: uri.path().to_string(),
        query,
        headers,
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    let (status, reply) = (st.respond)(&rec);
    st.seen.lock().push(rec);
    if status == StatusCode::NO_CONTENT {
        status.into_response()
    } else {
        (status, Json(reply)).into_response()
    }
}

struct MockServer {
    url: String,
    seen: Arc<Mutex<Vec<Recorded>>>,
    handle: JoinHandle<()>,
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockServer {
    async fn start<F>(respond: F) -> Result<Self>
    where
        F: Fn(&Recorded) -> (StatusCode, Value) + Send + Sync + 'static,
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = MockState { seen: seen.clone(), respond: Arc::new(respond) };
        let app = Router::new().fallback(record).with_state(state);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("mock server error: {e:?}");
            }
        });
        Ok(Self { url: format!("http://{}", addr), seen, handle })
    }

    fn requests(&self) -> Vec<Recorded> {
        self.seen.lock().clone()
    }
}

fn set_row(title: &str) -> Value {
    json!({
        "id": SET_ID,
        "user_id": "user-a",
        "title": title,
        "description": null,
        "type": "flashcards",
        "quantity": 2,
        "created_at": "2026-03-01T10:00:00.123456+00:00"
    })
}

/// Answers inserts with the row echoed back, as `Prefer: return=representation` does.
fn echo_inserts(r: &Recorded) -> (StatusCode, Value) {
    match (r.method.as_str(), r.path.as_str()) {
        ("POST", "/rest/v1/study_sets") => (StatusCode::CREATED, json!([set_row("Capitals")])),
        ("POST", _) => {
            let mut row = r.body.clone();
            row["id"] = json!(Uuid::new_v4());
            (StatusCode::CREATED, json!([row]))
        }
        _ => (StatusCode::NOT_FOUND, json!({"message": "unexpected request"})),
    }
}

fn capitals() -> (NewStudySet, QuestionDrafts) {
    let set = NewStudySet { title: "Capitals".into(), description: String::new(), quantity: 2 };
    let questions = QuestionDrafts::Flashcards(vec![
        FlashcardDraft { question: "France?".into(), answer: "Paris".into() },
        FlashcardDraft { question: "Japan?".into(), answer: "Tokyo".into() },
    ]);
    (set, questions)
}

#[tokio::test]
async fn rest_save_inserts_set_then_questions_with_caller_token() -> Result<()> {
    let srv = MockServer::start(echo_inserts).await?;
    let store = RestStore::new(reqwest::Client::new(), &format!("{}/", srv.url), ANON_KEY, false);
    let (set, questions) = capitals();

    let id = store.save_set(ALICE, &set, &questions).await?;
    assert_eq!(id.to_string(), SET_ID);

    let reqs = srv.requests();
    assert_eq!(reqs.len(), 3);
    for r in &reqs {
        assert_eq!(r.method, Method::POST);
        assert_eq!(r.header("apikey"), Some(ANON_KEY));
        assert_eq!(r.header("authorization"), Some("Bearer caller-token"));
        assert_eq!(r.header("prefer"), Some("return=representation"));
    }
    assert_eq!(reqs[0].path, "/rest/v1/study_sets");
    assert_eq!(reqs[0].body["user_id"], "user-a");
    assert_eq!(reqs[0].body["type"], "flashcards");
    assert_eq!(reqs[0].body["quantity"], 2);
    for (i, r) in reqs[1..].iter().enumerate() {
        assert_eq!(r.path, "/rest/v1/flashcard_questions");
        assert_eq!(r.body["study_set_id"], SET_ID);
        assert_eq!(r.body["position"], i);
    }
    assert_eq!(reqs[2].body["answer"], "Tokyo");
    Ok(())
}

#[tokio::test]
async fn rest_service_role_key_replaces_caller_bearer() -> Result<()> {
    let srv = MockServer::start(echo_inserts).await?;
    let store = RestStore::new(reqwest::Client::new(), &srv.url, SERVICE_KEY, true);
    let set = NewStudySet { title: "Math".into(), description: "sums".into(), quantity: 1 };
    let questions = QuestionDrafts::Quiz(vec![QuizDraft {
        question: "2+2?".into(),
        correct_answer: "4".into(),
        wrong_answers: vec!["3".into(), "5".into()],
    }]);

    store.save_set(ALICE, &set, &questions).await?;

    let reqs = srv.requests();
    assert_eq!(reqs.len(), 2);
    assert!(reqs.iter().all(|r| r.header("authorization") == Some("Bearer service-key")));
    assert_eq!(reqs[0].body["type"], "quiz");
    assert_eq!(reqs[1].path, "/rest/v1/quiz_questions");
    assert_eq!(reqs[1].body["wrong_answers"], json!(["3", "5"]));
    Ok(())
}

#[tokio::test]
async fn rest_failed_question_insert_leaves_earlier_rows_in_place() -> Result<()> {
    let srv = MockServer::start(|r: &Recorded| {
        if r.path == "/rest/v1/flashcard_questions" && r.body["position"] == 1 {
            return (StatusCode::CONFLICT, json!({"message": "duplicate key value violates unique constraint"}));
        }
        echo_inserts(r)
    })
    .await?;
    let store = RestStore::new(reqwest::Client::new(), &srv.url, ANON_KEY, false);
    let (set, questions) = capitals();

    let err = store.save_set(ALICE, &set, &questions).await.unwrap_err();
    let msg = format!("{:#}", err);
    assert!(msg.contains("HTTP 409"), "{msg}");
    assert!(msg.contains("duplicate key value"), "{msg}");

    // set row and first question were written and nothing tried to undo them
    let reqs = srv.requests();
    assert_eq!(reqs.len(), 3);
    assert_eq!(reqs[0].path, "/rest/v1/study_sets");
    assert_eq!(reqs[1].body["position"], 0);
    assert!(reqs.iter().all(|r| r.method == Method::POST));
    Ok(())
}

#[tokio::test]
async fn rest_lookups_send_postgrest_filters() -> Result<()> {
    let srv = MockServer::start(|r: &Recorded| match (r.method.as_str(), r.path.as_str()) {
        ("GET", "/rest/v1/study_sets") => (StatusCode::OK, json!([set_row(r.query("title").unwrap_or("eq.").trim_start_matches("eq."))])),
        ("GET", "/rest/v1/flashcard_questions") => (StatusCode::OK, json!([])),
        ("DELETE", "/rest/v1/study_sets") => (StatusCode::OK, json!([set_row("Lab %41"), set_row("Lab %41")])),
        _ => (StatusCode::NOT_FOUND, json!({"message": "unexpected request"})),
    })
    .await?;
    let store = RestStore::new(reqwest::Client::new(), &srv.url, ANON_KEY, false);

    let row = store.find_set(ALICE, "Lab %41").await?;
    assert_eq!(row.map(|r| (r.title, r.description)), Some(("Lab %41".to_string(), String::new())));

    let set_id: Uuid = SET_ID.parse()?;
    assert!(!store.has_flashcards(ALICE, set_id).await?);
    assert_eq!(store.delete_sets(ALICE, "Lab %41").await?, 2);

    let reqs = srv.requests();
    assert_eq!(reqs.len(), 3);
    let find = &reqs[0];
    assert_eq!(find.query("user_id"), Some("eq.user-a"));
    assert_eq!(find.query("title"), Some("eq.Lab %41"));
    assert_eq!(find.query("order"), Some("created_at.asc"));
    assert_eq!(find.query("limit"), Some("1"));

    let probe = &reqs[1];
    assert_eq!(probe.query("study_set_id"), Some(format!("eq.{}", SET_ID).as_str()));
    assert_eq!(probe.query("limit"), Some("1"));

    let delete = &reqs[2];
    assert_eq!(delete.method, Method::DELETE);
    assert_eq!(delete.header("prefer"), Some("return=representation"));
    assert_eq!(delete.query("title"), Some("eq.Lab %41"));
    Ok(())
}

#[tokio::test]
async fn gotrue_login_uses_password_grant() -> Result<()> {
    let srv = MockServer::start(|r: &Recorded| {
        if r.body["password"] == "hunter2" {
            (StatusCode::OK, json!({
                "access_token": "at-1", "refresh_token": "rt-1", "token_type": "bearer",
                "user": {"id": "user-a", "email": "alice@example.test"}
            }))
        } else {
            (StatusCode::BAD_REQUEST, json!({"error": "invalid_grant", "error_description": "Invalid login credentials"}))
        }
    })
    .await?;
    let auth = SupabaseAuth::new(reqwest::Client::new(), &srv.url, ANON_KEY);

    let ok = auth.sign_in(&Credentials { email: "alice@example.test".into(), password: "hunter2".into() }).await?;
    assert_eq!(ok.session.map(|s| s.access_token), Some("at-1".to_string()));
    assert_eq!(ok.user.map(|u| u.user_id), Some("user-a".to_string()));

    let err = auth.sign_in(&Credentials { email: "alice@example.test".into(), password: "nope".into() }).await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid login credentials");

    let reqs = srv.requests();
    assert_eq!(reqs[0].method, Method::POST);
    assert_eq!(reqs[0].path, "/auth/v1/token");
    assert_eq!(reqs[0].query("grant_type"), Some("password"));
    assert_eq!(reqs[0].header("apikey"), Some(ANON_KEY));
    assert_eq!(reqs[0].body, json!({"email": "alice@example.test", "password": "hunter2"}));
    Ok(())
}

#[tokio::test]
async fn gotrue_signup_logout_and_user_lookup() -> Result<()> {
    let srv = MockServer::start(|r: &Recorded| match r.path.as_str() {
        "/auth/v1/signup" if r.body["email"] == "taken@example.test" => {
            (StatusCode::UNPROCESSABLE_ENTITY, json!({"code": 422, "msg": "User already registered"}))
        }
        "/auth/v1/signup" => (StatusCode::OK, json!({"id": "user-new", "email": r.body["email"]})),
        "/auth/v1/logout" => (StatusCode::NO_CONTENT, Value::Null),
        "/auth/v1/user" if r.header("authorization") == Some("Bearer good-token") => {
            (StatusCode::OK, json!({"id": "user-a", "email": "alice@example.test"}))
        }
        "/auth/v1/user" => (StatusCode::UNAUTHORIZED, json!({"message": "invalid JWT"})),
        _ => (StatusCode::NOT_FOUND, json!({})),
    })
    .await?;
    let auth = SupabaseAuth::new(reqwest::Client::new(), &srv.url, ANON_KEY);

    let created = auth.sign_up(&Credentials { email: "new@example.test".into(), password: "pw".into() }).await?;
    assert_eq!(created.user.map(|u| u.user_id), Some("user-new".to_string()));
    assert!(created.session.is_none());

    let taken = auth.sign_up(&Credentials { email: "taken@example.test".into(), password: "pw".into() }).await.unwrap_err();
    assert_eq!(taken.to_string(), "User already registered");

    auth.sign_out("good-token").await?;

    let who = auth.resolve_user("good-token").await?;
    assert_eq!(who.user_id, "user-a");
    let bad = auth.resolve_user("stale-token").await.unwrap_err();
    assert_eq!(bad.to_string(), "invalid JWT");

    let reqs = srv.requests();
    let logout = reqs.iter().find(|r| r.path == "/auth/v1/logout").map(|r| r.header("authorization").map(str::to_string));
    assert_eq!(logout, Some(Some("Bearer good-token".to_string())));
    assert!(reqs.iter().all(|r| r.header("apikey") == Some(ANON_KEY)));
    Ok(())
}
