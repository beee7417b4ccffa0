//! End-to-end test against a live PostgreSQL database. Set
//! `TEST_DATABASE_URL` to run it; without that variable the test is a
//! no-op so the suite stays green on machines without a database.

use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, JsonValue) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 2 * 1024 * 1024).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
    (status, body)
}

fn json_request(
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<JsonValue>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

/// Year columns of one reshaped row: every key except `name`, sorted.
fn year_keys(row: &JsonValue) -> Vec<String> {
    let mut keys: Vec<String> = row
        .as_object()
        .expect("reshaped row is an object")
        .keys()
        .filter(|k| k.as_str() != "name")
        .cloned()
        .collect();
    keys.sort();
    keys
}

#[tokio::test]
async fn visitor_api_end_to_end() {
    dotenvy::dotenv().ok();
    let Ok(db_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping DB-backed test");
        return;
    };
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("DATABASE_URL", &db_url);
    env::set_var("SESSION_SECRET", "test_secret_key");
    env::set_var("CSV_IMPORT_ATOMIC", "false");
    visitor_tracking_backend::config::init_config().ok();

    let pool = visitor_tracking_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    let state = visitor_tracking_backend::AppState::new(pool.clone());
    let admin_name = format!("it_admin_{}", Uuid::new_v4().simple());
    let hash = visitor_tracking_backend::utils::crypto::hash_password("admin-pass").expect("hash");
    let admin = state
        .user_service
        .create(&admin_name, &hash, true)
        .await
        .expect("seed admin");
    let app = visitor_tracking_backend::api_router(state.clone());

    // login establishes the session cookie
    let login = json_request(
        "POST",
        "/api/login",
        None,
        Some(json!({ "username": admin_name, "password": "admin-pass" })),
    );
    let resp = app.clone().oneshot(login).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let admin_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    // rejected creation writes no row
    let count_before = visit_count(&pool).await;
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/visits",
            None,
            Some(json!({
                "category": "Media",
                "subcategory": "Pass",
                "officeLocation": "Geesthacht",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(visit_count(&pool).await, count_before);

    // authenticated creation stamps caller and current time
    let (status, visit) = send(
        &app,
        json_request(
            "POST",
            "/api/visits",
            Some(&admin_cookie),
            Some(json!({
                "category": "Media",
                "subcategory": "Pass",
                "officeLocation": "Geesthacht",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(visit["createdBy"], admin.id.to_string());
    let stamped = chrono::DateTime::parse_from_rfc3339(visit["timestamp"].as_str().unwrap())
        .expect("timestamp is RFC 3339")
        .with_timezone(&chrono::Utc);
    assert!(
        (chrono::Utc::now() - stamped).num_seconds().abs() < 300,
        "timestamp defaults to now"
    );

    let (status, body) = send(
        &app,
        json_request("GET", "/api/visits/today", Some(&admin_cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["count"].as_i64().unwrap() >= 1);

    // start from a clean table so the year-limiting data is exact
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/clear-database",
            Some(&admin_cookie),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["deleted"].as_u64().unwrap() >= 1);

    // CSV import: 7 distinct years plus one bad row, partial success
    let csv = "timestamp,category,subcategory,office_location\n\
               2018-06-15T10:00:00.000Z,Media,Pass,Geesthacht\n\
               2019-06-15T10:00:00.000Z,Media,Pass,Geesthacht\n\
               2020-06-15T10:00:00.000Z,Energie,Zählerstand,Geesthacht\n\
               2021-06-15T10:00:00.000Z,Energie,Zählerstand,Geesthacht\n\
               2022-06-15T10:00:00.000Z,Media,Störung,Geesthacht\n\
               2023-06-15T10:00:00.000Z,Allgemeines,Beratung,Geesthacht\n\
               2024-06-15T10:00:00.000Z,Media,Pass,Geesthacht\n\
               not-a-date,Media,Pass,Geesthacht\n";
    let boundary = "it-boundary-9f3c72";
    let mut upload = String::new();
    upload.push_str(&format!("--{boundary}\r\n"));
    upload.push_str("Content-Disposition: form-data; name=\"file\"; filename=\"visits.csv\"\r\n");
    upload.push_str("Content-Type: text/csv\r\n\r\n");
    upload.push_str(csv);
    upload.push_str(&format!("\r\n--{boundary}--\r\n"));
    let req = Request::builder()
        .method("POST")
        .uri("/api/admin/upload-csv")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header("cookie", &admin_cookie)
        .body(Body::from(upload))
        .unwrap();
    let (status, report) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["totalProcessed"], 8);
    assert_eq!(report["successCount"], 7);
    assert_eq!(report["failedCount"], 1);
    assert_eq!(report["failedRecords"][0]["row"], 8);
    assert_eq!(visit_count(&pool).await, 7, "valid rows persisted, no rollback");

    // stats: only the 5 most recent years survive, in every matrix
    let (status, stats) = send(
        &app,
        json_request("GET", "/api/stats", Some(&admin_cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let expected_years: Vec<String> = (2020..=2024).map(|y| y.to_string()).collect();
    for table in ["weekday", "timeInterval", "month", "subcategory"] {
        let rows = stats[table].as_array().expect("matrix");
        assert!(!rows.is_empty(), "{table} has data");
        for row in rows {
            assert_eq!(year_keys(row), expected_years, "{table} year columns");
        }
    }
    for row in stats["byLocation"]["Geesthacht"]["weekday"]
        .as_array()
        .expect("location matrix")
    {
        assert_eq!(year_keys(row), expected_years);
    }
    // conservation: one visit per surviving year
    let month_rows = stats["month"].as_array().unwrap();
    for year in &expected_years {
        let total: i64 = month_rows.iter().map(|r| r[year].as_i64().unwrap()).sum();
        assert_eq!(total, 1, "one visit recorded in {year}");
    }

    // unchanged store means identical results
    let (_, stats_again) = send(
        &app,
        json_request("GET", "/api/stats", Some(&admin_cookie), None),
    )
    .await;
    assert_eq!(stats, stats_again);

    // self-protection: demotion and deletion of the own account bounce
    let (status, _) = send(
        &app,
        json_request(
            "PATCH",
            &format!("/api/admin/users/{}", admin.id),
            Some(&admin_cookie),
            Some(json!({ "isAdmin": false })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, me) = send(
        &app,
        json_request("GET", "/api/user", Some(&admin_cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["isAdmin"], true, "role unchanged after rejected demotion");

    let (status, _) = send(
        &app,
        json_request(
            "DELETE",
            &format!("/api/admin/users/{}", admin.id),
            Some(&admin_cookie),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &app,
        json_request("GET", "/api/user", Some(&admin_cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "record still present after rejected self-delete");

    // a non-admin session reaches session routes but not admin ones
    let clerk_name = format!("it_clerk_{}", Uuid::new_v4().simple());
    let (status, clerk) = send(
        &app,
        json_request(
            "POST",
            "/api/admin/users",
            Some(&admin_cookie),
            Some(json!({ "username": clerk_name, "password": "pass1234", "isAdmin": false })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let clerk_id = clerk["id"].as_str().unwrap().to_string();

    let login = json_request(
        "POST",
        "/api/login",
        None,
        Some(json!({ "username": clerk_name, "password": "pass1234" })),
    );
    let resp = app.clone().oneshot(login).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let clerk_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let (status, _) = send(
        &app,
        json_request("GET", "/api/admin/users", Some(&clerk_cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // deleting the user invalidates their session on the next request
    let (status, _) = send(
        &app,
        json_request(
            "DELETE",
            &format!("/api/admin/users/{clerk_id}"),
            Some(&admin_cookie),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        json_request("GET", "/api/user", Some(&clerk_cookie), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

async fn visit_count(pool: &sqlx::PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM visits")
        .fetch_one(pool)
        .await
        .expect("count visits")
}
