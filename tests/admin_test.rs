//! Integration tests for the administrative CRUD surface: events, devices,
//! assignments, profiles, and role checks.

use lovesportsd::{config::ServerConfig, rest, AppContext};
use serde_json::{json, Value};
use std::sync::Arc;

async fn start_server() -> (String, Arc<AppContext>) {
    let data_dir = tempfile::tempdir().unwrap().keep();
    let config = Arc::new(ServerConfig::new(
        None,
        Some(data_dir),
        Some("warn".to_string()),
        None,
    ));
    let ctx = Arc::new(AppContext::new(config).await.unwrap());

    let router = rest::build_router(ctx.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    (format!("http://{addr}"), ctx)
}

async fn seed_admin(ctx: &AppContext) -> &'static str {
    ctx.storage.ensure_profile("admin-1").await.unwrap();
    ctx.storage.set_role("admin-1", "admin").await.unwrap();
    "admin-1"
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn admin_routes_reject_missing_and_non_admin_callers() {
    let (url, ctx) = start_server().await;
    seed_admin(&ctx).await;

    // No identity header.
    let resp = client()
        .post(format!("{url}/api/v1/events"))
        .json(&json!({ "name": "Mixer", "startsAtMs": 0, "endsAtMs": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "Unauthorized");

    // Plain user.
    let resp = client()
        .post(format!("{url}/api/v1/events"))
        .header("x-user-id", "someone")
        .json(&json!({ "name": "Mixer", "startsAtMs": 0, "endsAtMs": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "Forbidden");
}

#[tokio::test]
async fn event_crud_over_rest() {
    let (url, ctx) = start_server().await;
    let admin = seed_admin(&ctx).await;

    let resp = client()
        .post(format!("{url}/api/v1/events"))
        .header("x-user-id", admin)
        .json(&json!({ "name": "Mixer", "startsAtMs": 100, "endsAtMs": 200 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let event: Value = resp.json().await.unwrap();
    assert_eq!(event["status"], "preparing");
    let event_id = event["id"].as_str().unwrap().to_string();

    let resp = client()
        .put(format!("{url}/api/v1/events/{event_id}"))
        .header("x-user-id", admin)
        .json(&json!({ "name": "Renamed", "startsAtMs": 150, "endsAtMs": 250 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let event: Value = resp.json().await.unwrap();
    assert_eq!(event["name"], "Renamed");
    assert_eq!(event["startsAtMs"], 150);

    let resp = client()
        .get(format!("{url}/api/v1/events"))
        .header("x-user-id", admin)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["events"].as_array().unwrap().len(), 1);

    // Status transitions validate the enum.
    let resp = client()
        .post(format!("{url}/api/v1/events/{event_id}/status"))
        .header("x-user-id", admin)
        .json(&json!({ "status": "archived" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "InvalidInput");

    let resp = client()
        .post(format!("{url}/api/v1/events/{event_id}/status"))
        .header("x-user-id", admin)
        .json(&json!({ "status": "active" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let event: Value = resp.json().await.unwrap();
    assert_eq!(event["status"], "active");
}

#[tokio::test]
async fn device_registration_rejects_duplicates() {
    let (url, ctx) = start_server().await;
    let admin = seed_admin(&ctx).await;

    let resp = client()
        .post(format!("{url}/api/v1/devices"))
        .header("x-user-id", admin)
        .json(&json!({ "deviceId": "dev-1", "note": "red wristband" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client()
        .post(format!("{url}/api/v1/devices"))
        .header("x-user-id", admin)
        .json(&json!({ "deviceId": "dev-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "Conflict");

    let resp = client()
        .post(format!("{url}/api/v1/devices"))
        .header("x-user-id", admin)
        .json(&json!({ "deviceId": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Listing carries the (absent) current assignment.
    let resp = client()
        .get(format!("{url}/api/v1/devices"))
        .header("x-user-id", admin)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let devices = body["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["note"], "red wristband");
    assert_eq!(devices[0]["assignment"], Value::Null);
}

#[tokio::test]
async fn assignment_uniqueness_and_finished_event_guard() {
    let (url, ctx) = start_server().await;
    let admin = seed_admin(&ctx).await;
    for user in ["u1", "u2"] {
        ctx.storage.ensure_profile(user).await.unwrap();
    }
    for device in ["dev-1", "dev-2"] {
        ctx.storage.create_device(device, None).await.unwrap();
    }
    let event = ctx.storage.create_event("Mixer", 0, 1).await.unwrap();

    let assign = |participant: &str, device: &str| {
        let url = url.clone();
        let event_id = event.id.clone();
        let body = json!({ "participantId": participant, "deviceId": device });
        async move {
            client()
                .post(format!("{url}/api/v1/events/{event_id}/assignments"))
                .header("x-user-id", "admin-1")
                .json(&body)
                .send()
                .await
                .unwrap()
        }
    };

    assert_eq!(assign("u1", "dev-1").await.status(), 200);
    // Device already held by u1 for this event.
    assert_eq!(assign("u2", "dev-1").await.status(), 409);
    // u1 already holds a device for this event.
    assert_eq!(assign("u1", "dev-2").await.status(), 409);
    assert_eq!(assign("u2", "dev-2").await.status(), 200);

    let resp = client()
        .get(format!("{url}/api/v1/events/{}/assignments", event.id))
        .header("x-user-id", admin)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["assignments"].as_array().unwrap().len(), 2);

    // Unassign, then re-assign works.
    let resp = client()
        .delete(format!(
            "{url}/api/v1/events/{}/assignments/dev-2",
            event.id
        ))
        .header("x-user-id", admin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(assign("u2", "dev-2").await.status(), 200);

    // Finished events accept no assignments.
    ctx.storage.set_event_status(&event.id, "ended").await.unwrap();
    ctx.storage.delete_assignment(&event.id, "dev-2").await.unwrap();
    assert_eq!(assign("u2", "dev-2").await.status(), 409);
}

#[tokio::test]
async fn device_deletion_respects_live_assignments() {
    let (url, ctx) = start_server().await;
    seed_admin(&ctx).await;
    ctx.storage.ensure_profile("u1").await.unwrap();
    ctx.storage.create_device("dev-1", None).await.unwrap();
    let event = ctx.storage.create_event("Mixer", 0, 1).await.unwrap();
    ctx.storage
        .create_assignment(&event.id, "u1", "dev-1")
        .await
        .unwrap();

    let delete = || async {
        client()
            .delete(format!("{url}/api/v1/devices/dev-1"))
            .header("x-user-id", "admin-1")
            .send()
            .await
            .unwrap()
    };

    let resp = delete().await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["kind"], "DeviceInUse");

    ctx.storage.set_event_status(&event.id, "ended").await.unwrap();
    assert_eq!(delete().await.status(), 200);
    assert_eq!(delete().await.status(), 404);
    assert!(ctx.storage.get_device("dev-1").await.unwrap().is_none());
}

#[tokio::test]
async fn profile_update_and_role_toggle() {
    let (url, ctx) = start_server().await;
    let admin = seed_admin(&ctx).await;

    // First authenticated touch creates the profile row.
    let resp = client()
        .put(format!("{url}/api/v1/profile"))
        .header("x-user-id", "u1")
        .json(&json!({ "nickname": "Taro", "bio": "runner" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let profile: Value = resp.json().await.unwrap();
    assert_eq!(profile["nickname"], "Taro");
    assert_eq!(profile["role"], "user");

    // Admin promotes u1, then demotes again.
    let toggle = |target: &str| {
        let url = url.clone();
        let target = target.to_string();
        async move {
            client()
                .post(format!("{url}/api/v1/users/{target}/role"))
                .header("x-user-id", "admin-1")
                .send()
                .await
                .unwrap()
        }
    };
    let profile: Value = toggle("u1").await.json().await.unwrap();
    assert_eq!(profile["role"], "admin");
    let profile: Value = toggle("u1").await.json().await.unwrap();
    assert_eq!(profile["role"], "user");

    // Toggling one's own role is a silent no-op.
    let profile: Value = toggle(admin).await.json().await.unwrap();
    assert_eq!(profile["role"], "admin");

    let resp = client()
        .get(format!("{url}/api/v1/users"))
        .header("x-user-id", admin)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["users"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn participants_can_read_only_their_events() {
    let (url, ctx) = start_server().await;
    seed_admin(&ctx).await;
    ctx.storage.ensure_profile("u1").await.unwrap();
    ctx.storage.ensure_profile("u2").await.unwrap();
    ctx.storage.create_device("dev-1", None).await.unwrap();
    let event = ctx.storage.create_event("Mixer", 0, 1).await.unwrap();
    ctx.storage
        .create_assignment(&event.id, "u1", "dev-1")
        .await
        .unwrap();

    let get_event = |user: &str| {
        let url = url.clone();
        let event_id = event.id.clone();
        let user = user.to_string();
        async move {
            client()
                .get(format!("{url}/api/v1/events/{event_id}"))
                .header("x-user-id", &user)
                .send()
                .await
                .unwrap()
        }
    };

    assert_eq!(get_event("u1").await.status(), 200);
    assert_eq!(get_event("u2").await.status(), 404);
    assert_eq!(get_event("admin-1").await.status(), 200);

    // Event listing stays admin-only.
    let resp = client()
        .get(format!("{url}/api/v1/events"))
        .header("x-user-id", "u1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}
