mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

use common::{TestServer, ADMIN_EMAIL};

#[tokio::test]
async fn back_office_requires_staff_and_admin_roles() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.sign_in(ADMIN_EMAIL).await?;
    let kai = server.sign_in("kai@example.com").await?;

    let (status, body) = server.get("/api/admin/content", &kai).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    server.set_role(&admin, &kai, "EDITOR").await?;
    let (status, _) = server.get("/api/admin/content", &kai).await?;
    assert_eq!(status, StatusCode::OK);

    // Editors are not admins
    let (status, _) = server.get("/api/admin/settings", &kai).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server.get("/api/admin/users", &admin).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server
        .put(&format!("/api/admin/users/{}/role", admin.user_id), &admin, json!({ "role": "USER" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn only_published_content_is_public() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.sign_in(ADMIN_EMAIL).await?;

    let (status, body) = server
        .post(
            "/api/admin/content",
            &admin,
            json!({
                "kind": "GUIDE",
                "title": "Permits on Oahu",
                "body": "Start with the DPP.",
                "tags": ["Permits", "Oahu"]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["slug"], "permits-on-oahu");
    assert_eq!(body["data"]["status"], "DRAFT");
    assert!(body["data"]["published_at"].is_null());
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = server
        .call(Method::GET, "/api/content/permits-on-oahu", None, None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = server
        .put(
            &format!("/api/admin/content/{}", id),
            &admin,
            json!({
                "kind": "GUIDE",
                "title": "Permits on Oahu",
                "body": "Start with the DPP.",
                "status": "PUBLISHED",
                "tags": ["Permits"]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["published_at"].is_string());

    let (status, body) = server
        .call(Method::GET, "/api/content?tag=permits&kind=guide", None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = server.call(Method::GET, "/api/tags", None, None).await?;
    assert!(body["data"].as_array().unwrap().iter().any(|t| t["slug"] == "oahu"));

    let (status, _) = server.delete(&format!("/api/admin/content/{}", id), &admin).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = server
        .call(Method::GET, "/api/content/permits-on-oahu", None, None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn collections_list_published_items_in_order() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.sign_in(ADMIN_EMAIL).await?;

    let mut ids = Vec::new();
    for title in ["Roofing 101", "Solar Basics"] {
        let (_, body) = server
            .post(
                "/api/admin/content",
                &admin,
                json!({ "kind": "ARTICLE", "title": title, "status": "PUBLISHED" }),
            )
            .await?;
        ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let (status, body) = server
        .post(
            "/api/admin/collections",
            &admin,
            json!({ "title": "Energy", "content_ids": [ids[1], ids[0]], "published": true }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let (status, body) = server.call(Method::GET, "/api/collections/energy", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items[0]["title"], "Solar Basics");
    assert_eq!(items[1]["title"], "Roofing 101");

    let (status, _) = server
        .post(
            "/api/admin/collections",
            &admin,
            json!({ "title": "Broken", "content_ids": [uuid::Uuid::new_v4()] }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn feedback_feeds_the_dashboard() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.sign_in(ADMIN_EMAIL).await?;
    let kai = server.sign_in("kai@example.com").await?;

    server
        .post(
            "/api/admin/content",
            &admin,
            json!({ "kind": "STORY", "title": "Our Kailua remodel", "status": "PUBLISHED" }),
        )
        .await?;

    let path = "/api/content/our-kailua-remodel/feedback";
    let (status, _) = server
        .call(Method::POST, path, None, Some(json!({ "helpful": true })))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = server
        .post(path, &kai, json!({ "helpful": false, "comment": "Needs costs" }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = server
        .call(Method::POST, path, None, Some(json!({ "helpful": true, "comment": "x".repeat(2001) })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.get("/api/admin/feedback", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    let row = &body["data"][0];
    assert_eq!(row["slug"], "our-kailua-remodel");
    assert_eq!(row["helpful"], 1);
    assert_eq!(row["not_helpful"], 1);
    assert_eq!(row["score"], 0.5);
    assert_eq!(row["recent_comments"][0]["comment"], "Needs costs");
    Ok(())
}

#[tokio::test]
async fn export_then_import_into_a_fresh_site() -> Result<()> {
    let source = TestServer::start().await?;
    let admin = source.sign_in(ADMIN_EMAIL).await?;
    source
        .post(
            "/api/admin/content",
            &admin,
            json!({ "kind": "GUIDE", "title": "Termite checks", "status": "PUBLISHED", "tags": ["Pests"] }),
        )
        .await?;

    let res = source
        .client
        .get(format!("{}/api/admin/export?format=yaml", source.base_url))
        .bearer_auth(&admin.token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let disposition = res.headers()["content-disposition"].to_str()?.to_string();
    assert!(disposition.contains("hhc-content-") && disposition.ends_with(".yaml\""));
    let bundle = res.text().await?;
    assert!(bundle.contains("termite-checks"));

    let target = TestServer::start().await?;
    let target_admin = target.sign_in(ADMIN_EMAIL).await?;
    let import = |body: String| {
        target
            .client
            .post(format!("{}/api/admin/import?format=yaml", target.base_url))
            .bearer_auth(&target_admin.token)
            .body(body)
            .send()
    };

    let report: serde_json::Value = import(bundle.clone()).await?.json().await?;
    assert_eq!(report["success"], true);
    assert!(report["data"]["created"].as_u64().unwrap() >= 1);
    assert_eq!(report["data"]["errors"], json!([]));

    // A second import changes nothing
    let report: serde_json::Value = import(bundle).await?.json().await?;
    assert_eq!(report["data"]["created"], 0);
    assert_eq!(report["data"]["updated"], 0);

    let (status, body) = target
        .call(Method::GET, "/api/content/termite-checks", None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tags"], json!(["pests"]));

    let res = import("version: 2\n".to_string()).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}
