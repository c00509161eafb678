mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use hawaii_home_central::auth::tokens;
use hawaii_home_central::database::models::{ShareSettings, ShareToken};
use hawaii_home_central::types::ToolKey;

use common::{Session, TestServer};

async fn seed_punch_list(server: &TestServer, owner: &Session) -> Result<()> {
    let (status, body) = server
        .put(
            "/api/tools/punch_list",
            owner,
            json!({
                "payload": {
                    "items": [{
                        "id": "door",
                        "title": "Rehang lanai door",
                        "assignee": "Kimo",
                        "notes": "Gate code 4411",
                        "internal": "never shared"
                    }]
                }
            }),
        )
        .await?;
    anyhow::ensure!(status == StatusCode::OK, "seed: {} {}", status, body);
    Ok(())
}

async fn public_get(server: &TestServer, token: &str) -> Result<(StatusCode, Value)> {
    server.call(Method::GET, &format!("/api/share/{}", token), None, None).await
}

#[tokio::test]
async fn share_links_expose_only_allowed_fields() -> Result<()> {
    let server = TestServer::start().await?;
    let kai = server.sign_in("kai@example.com").await?;
    seed_punch_list(&server, &kai).await?;

    let (status, body) = server
        .post("/api/tools/punch_list/shares", &kai, json!({ "settings": {} }))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);
    assert!(body["data"]["url"].as_str().unwrap().ends_with(&format!("/share/{}", token)));

    let (status, body) = public_get(&server, &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tool"], "punch_list");
    assert_eq!(body["data"]["project_name"], "My Home");
    let item = &body["data"]["payload"]["items"][0];
    assert_eq!(item["title"], "Rehang lanai door");
    assert!(item.get("notes").is_none());
    assert!(item.get("assignee").is_none());
    assert!(item.get("internal").is_none());

    let (_, body) = server
        .post(
            "/api/tools/punch_list/shares",
            &kai,
            json!({ "settings": { "include_notes": true, "include_assignees": true }, "expires_in_days": 7 }),
        )
        .await?;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    let (_, body) = public_get(&server, &token).await?;
    let item = &body["data"]["payload"]["items"][0];
    assert_eq!(item["notes"], "Gate code 4411");
    assert_eq!(item["assignee"], "Kimo");
    Ok(())
}

#[tokio::test]
async fn revoked_and_malformed_links_are_indistinguishable() -> Result<()> {
    let server = TestServer::start().await?;
    let kai = server.sign_in("kai@example.com").await?;
    seed_punch_list(&server, &kai).await?;

    let (_, body) = server
        .post("/api/tools/punch_list/shares", &kai, json!({ "settings": {} }))
        .await?;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = server.delete(&format!("/api/shares/{}", id), &kai).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (revoked_status, revoked) = public_get(&server, &token).await?;
    let (malformed_status, malformed) = public_get(&server, "not-a-token").await?;
    let (unknown_status, unknown) = public_get(&server, &"ab".repeat(32)).await?;
    assert_eq!(revoked_status, StatusCode::NOT_FOUND);
    assert_eq!(malformed_status, StatusCode::NOT_FOUND);
    assert_eq!(unknown_status, StatusCode::NOT_FOUND);
    assert_eq!(revoked, malformed);
    assert_eq!(revoked, unknown);
    Ok(())
}

#[tokio::test]
async fn listing_hides_tokens_and_counts_views() -> Result<()> {
    let server = TestServer::start().await?;
    let kai = server.sign_in("kai@example.com").await?;
    seed_punch_list(&server, &kai).await?;

    let (_, body) = server
        .post("/api/tools/punch_list/shares", &kai, json!({ "settings": {} }))
        .await?;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    public_get(&server, &token).await?;
    public_get(&server, &token).await?;

    let (status, body) = server.get("/api/tools/punch_list/shares", &kai).await?;
    assert_eq!(status, StatusCode::OK);
    let share = &body["data"][0];
    assert_eq!(share["active"], true);
    assert_eq!(share["view_count"], 2);
    assert_eq!(share["token_hint"], &token[..6]);
    assert!(share.get("token").is_none());
    assert!(share.get("token_hash").is_none());
    Ok(())
}

#[tokio::test]
async fn share_creation_rules() -> Result<()> {
    let server = TestServer::start_with(|c| c.share.max_active_per_tool = 2).await?;
    let kai = server.sign_in("kai@example.com").await?;
    let noe = server.sign_in("noe@example.com").await?;
    let project = server.current_project(&kai).await?;
    server.add_member(&kai, project, &noe, json!({ "punch_list": "VIEW" })).await?;
    let shares = "/api/tools/punch_list/shares";

    let (status, _) = server
        .post(shares, &kai, json!({ "project_id": project, "expires_in_days": 365 }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // VIEW members cannot share
    let (status, _) = server.post(shares, &noe, json!({ "project_id": project })).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for _ in 0..2 {
        let (status, _) = server.post(shares, &kai, json!({ "project_id": project })).await?;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = server.post(shares, &kai, json!({ "project_id": project })).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SHARE_LIMIT");
    Ok(())
}

#[tokio::test]
async fn only_owner_or_creator_may_revoke() -> Result<()> {
    let server = TestServer::start().await?;
    let kai = server.sign_in("kai@example.com").await?;
    let noe = server.sign_in("noe@example.com").await?;
    let outsider = server.sign_in("leilani@example.com").await?;
    let project = server.current_project(&kai).await?;
    server.add_member(&kai, project, &noe, json!({ "punch_list": "EDIT" })).await?;

    let (_, body) = server
        .post("/api/tools/punch_list/shares", &kai, json!({ "project_id": project }))
        .await?;
    let kai_share = format!("/api/shares/{}", body["data"]["id"].as_str().unwrap());

    let (status, _) = server.delete(&kai_share, &outsider).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server.delete(&kai_share, &noe).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = server
        .post("/api/tools/punch_list/shares", &noe, json!({ "project_id": project }))
        .await?;
    let noe_share = format!("/api/shares/{}", body["data"]["id"].as_str().unwrap());
    let (status, _) = server.delete(&noe_share, &kai).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn archiving_a_project_disables_its_links() -> Result<()> {
    let server = TestServer::start().await?;
    let kai = server.sign_in("kai@example.com").await?;
    let project = server.current_project(&kai).await?;

    let (_, body) = server
        .post("/api/tools/punch_list/shares", &kai, json!({ "project_id": project }))
        .await?;
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(public_get(&server, &token).await?.0, StatusCode::OK);

    server
        .patch(&format!("/api/projects/{}", project), &kai, json!({ "status": "ARCHIVED" }))
        .await?;
    assert_eq!(public_get(&server, &token).await?.0, StatusCode::NOT_FOUND);
    Ok(())
}

/// Writes a punch-list link that lapsed a day ago and returns its raw token
async fn insert_lapsed_share(server: &TestServer, owner: &Session, project: Uuid) -> Result<String> {
    let token = tokens::generate_token();
    let created_at = Utc::now() - Duration::days(8);
    server
        .store
        .insert_share(
            ShareToken {
                id: Uuid::new_v4(),
                token_hash: tokens::hash_token(&token),
                token_hint: tokens::token_hint(&token),
                project_id: project,
                tool_key: ToolKey::PunchList,
                settings: ShareSettings::default(),
                created_by: owner.user_id,
                created_at,
                expires_at: created_at + Duration::days(7),
                revoked_at: None,
                view_count: 0,
                last_viewed_at: None,
            },
            10,
        )
        .await?;
    Ok(token)
}

#[tokio::test]
async fn expired_links_are_gone_and_free_their_slot() -> Result<()> {
    let server = TestServer::start_with(|c| c.share.max_active_per_tool = 1).await?;
    let kai = server.sign_in("kai@example.com").await?;
    seed_punch_list(&server, &kai).await?;
    let project = server.current_project(&kai).await?;

    let lapsed = insert_lapsed_share(&server, &kai, project).await?;
    let (status, lapsed_body) = public_get(&server, &lapsed).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, unknown_body) = public_get(&server, &tokens::generate_token()).await?;
    assert_eq!(lapsed_body, unknown_body);

    let (_, body) = server.get("/api/tools/punch_list/shares", &kai).await?;
    assert_eq!(body["data"][0]["active"], false);

    // The lapsed link does not count against the cap of one
    let (status, body) = server
        .post("/api/tools/punch_list/shares", &kai, json!({ "project_id": project }))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let (status, body) = server
        .post("/api/tools/punch_list/shares", &kai, json!({ "project_id": project }))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "SHARE_LIMIT");
    Ok(())
}

#[tokio::test]
async fn concurrent_creates_stop_at_the_share_cap() -> Result<()> {
    let server = TestServer::start_with(|c| c.share.max_active_per_tool = 3).await?;
    let kai = server.sign_in("kai@example.com").await?;
    let project = server.current_project(&kai).await?;

    let creates = (0..12).map(|_| {
        server.post("/api/tools/punch_list/shares", &kai, json!({ "project_id": project }))
    });
    let mut created = 0;
    for result in futures::future::join_all(creates).await {
        let (status, body) = result?;
        match status {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => assert_eq!(body["code"], "SHARE_LIMIT"),
            other => panic!("unexpected status {} {}", other, body),
        }
    }
    assert_eq!(created, 3);

    let (_, body) = server.get("/api/tools/punch_list/shares", &kai).await?;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    Ok(())
}
