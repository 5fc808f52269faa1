use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use plaza_common::{FeedState, MediaType};
use plaza_core::{ApiClient, ApiError, FeedKind, PostsApi, Session, SessionStore, StoriesApi};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn tracing_init() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_line_number(true)
        .with_target(false)
        .with_file(true)
        .try_init();
}

/// What the fake backend saw
#[derive(Default)]
struct Seen {
    auth: Vec<Option<String>>,
    queries: Vec<HashMap<String, String>>,
    bodies: Vec<Value>,
    paths: Vec<String>,
}

type Shared = Arc<Mutex<Seen>>;

fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn fake_backend(seen: Shared) -> Router {
    let explore = {
        let seen = seen.clone();
        move |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| {
            let seen = seen.clone();
            async move {
                let mut seen = seen.lock().unwrap();
                seen.auth.push(auth_header(&headers));
                seen.queries.push(query);
                Json(json!({
                    "posts": [
                        {"_id": "p1", "content": "hello", "likes_count": 2, "author_id": "u1"},
                        {"id": "p2", "_id": "ignored", "is_liked": true},
                        {"content": "no identity"}
                    ],
                    "has_more": true,
                    "next_skip": 3
                }))
            }
        }
    };

    let like = {
        let seen = seen.clone();
        move |Path(id): Path<String>| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().paths.push(format!("like:{id}"));
                Json(json!({"liked": true}))
            }
        }
    };

    let active = || async {
        Json(json!([
            {
                "author_id": "u1",
                "author_username": "rose",
                "author_displayName": "Rose",
                "stories": [
                    {"_id": "s1", "media_url": "https://cdn/s1.jpg", "media_type": "image",
                     "created_at": "2024-05-01T10:00:00.123456"},
                    {"_id": "s2", "author_id": "u2", "media_url": "https://cdn/s2.mp4",
                     "media_type": "video", "created_at": "2024-05-01T11:00:00Z"}
                ]
            },
            {"author_id": "u3", "stories": []}
        ]))
    };

    let viewers = |Path(_id): Path<String>| async {
        (
            StatusCode::FORBIDDEN,
            Json(json!({"detail": "Only the author can see viewers"})),
        )
    };

    let delete_story = {
        let seen = seen.clone();
        move |Path(id): Path<String>| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().paths.push(format!("delete:{id}"));
                Json(json!({"message": "Story deleted"}))
            }
        }
    };

    let messages = {
        let seen = seen.clone();
        move |Json(body): Json<Value>| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().bodies.push(body);
                (StatusCode::CREATED, Json(json!({"id": "m1"})))
            }
        }
    };

    Router::new()
        .route("/api/posts/explore", get(explore))
        .route("/api/posts/:id/like", post(like))
        .route("/api/stories/active", get(active))
        .route("/api/stories/:id/viewers", get(viewers))
        .route("/api/stories/:id", delete(delete_story))
        .route("/api/messages/", post(messages))
}

async fn serve(seen: Shared) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake backend");
    let addr = listener.local_addr().expect("local addr");
    let app = fake_backend(seen);
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve") });
    format!("http://{addr}/api")
}

#[tokio::test]
async fn test_feed_page_request_and_decoding() {
    tracing_init();
    let seen = Shared::default();
    let base = serve(seen.clone()).await;
    let client = ApiClient::new(&base, SessionStore::in_memory(Session::with_token("tok"))).unwrap();

    let mut state = FeedState::new(20);
    state.filters.media_type = MediaType::Image;
    let ticket = state.begin_load(true);
    let page = client.fetch_page(FeedKind::Explore, &ticket.query).await.unwrap();

    let ids: Vec<&str> = page.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
    assert_eq!(page.posts[0].likes_count, 2);
    assert_eq!(page.posts[0].author_id(), Some("u1"));
    assert!(page.posts[1].is_liked);
    assert!(page.has_more);
    assert_eq!(page.next_skip, Some(3));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.auth, vec![Some("Bearer tok".to_string())]);
    let query = &seen.queries[0];
    assert_eq!(query["skip"], "0");
    assert_eq!(query["limit"], "20");
    assert_eq!(query["sort_by"], "created_at");
    assert_eq!(query["media_type"], "image");
    assert_eq!(query["order"], "desc");
}

#[tokio::test]
async fn test_no_token_sends_no_auth() {
    tracing_init();
    let seen = Shared::default();
    let base = serve(seen.clone()).await;
    let client = ApiClient::new(&base, SessionStore::in_memory(Session::default())).unwrap();

    let ticket = FeedState::default().begin_load(true);
    client.fetch_page(FeedKind::Explore, &ticket.query).await.unwrap();
    assert_eq!(seen.lock().unwrap().auth, vec![None]);
}

#[tokio::test]
async fn test_toggle_like_and_delete() {
    tracing_init();
    let seen = Shared::default();
    let base = serve(seen.clone()).await;
    let client = ApiClient::new(&base, SessionStore::in_memory(Session::with_token("tok"))).unwrap();

    assert!(client.toggle_like("p1").await.unwrap());
    client.delete_story("s9").await.unwrap();
    assert_eq!(seen.lock().unwrap().paths, vec!["like:p1", "delete:s9"]);
}

#[tokio::test]
async fn test_active_stories_are_normalized() {
    tracing_init();
    let base = serve(Shared::default()).await;
    let client = ApiClient::new(&base, SessionStore::in_memory(Session::default())).unwrap();

    let roster = client.active_stories().await.unwrap();
    assert_eq!(roster.len(), 1);
    let rose = &roster[0];
    assert_eq!(rose.author_display_name, "Rose");
    assert_eq!(rose.stories.len(), 1);
    assert_eq!(rose.stories[0].id, "s1");
    assert_eq!(rose.stories[0].author_id, "u1");
    assert_eq!(
        rose.stories[0].created_at.to_rfc3339(),
        "2024-05-01T10:00:00.123456+00:00"
    );
}

#[tokio::test]
async fn test_error_status_carries_detail() {
    tracing_init();
    let base = serve(Shared::default()).await;
    let client = ApiClient::new(&base, SessionStore::in_memory(Session::default())).unwrap();

    let err = client.story_viewers("s1").await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    match err {
        ApiError::Status { detail, .. } => assert_eq!(detail, "Only the author can see viewers"),
        other => panic!("unexpected error: {other}"),
    }

    let err = client.post_stats().await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_reply_posts_message() {
    tracing_init();
    let seen = Shared::default();
    let base = serve(seen.clone()).await;
    let client = ApiClient::new(&base, SessionStore::in_memory(Session::with_token("tok"))).unwrap();

    client.reply_to_story("u1", "s1", "so good").await.unwrap();
    assert_eq!(
        seen.lock().unwrap().bodies,
        vec![json!({"recipient_id": "u1", "content": "so good", "story_id": "s1"})]
    );
}
