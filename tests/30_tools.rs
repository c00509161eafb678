mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::{TestServer, ADMIN_EMAIL};

#[tokio::test]
async fn unwritten_tool_reads_as_empty_revision_zero() -> Result<()> {
    let server = TestServer::start().await?;
    let kai = server.sign_in("kai@example.com").await?;

    let (status, body) = server.get("/api/tools/punch_list", &kai).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["revision"], 0);
    assert_eq!(body["data"]["capability"], "OWNER");
    assert_eq!(body["data"]["payload"]["items"], json!([]));

    let (status, _) = server.get("/api/tools/sauna_planner", &kai).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn saved_payloads_are_coerced() -> Result<()> {
    let server = TestServer::start().await?;
    let kai = server.sign_in("kai@example.com").await?;

    let (status, body) = server
        .put(
            "/api/tools/punch_list",
            &kai,
            json!({
                "payload": {
                    "items": [
                        {
                            "id": "gate",
                            "title": "  Fix gate latch ",
                            "status": "DONE",
                            "photos": ["https://img.example/gate.jpg", "javascript:alert(1)"],
                            "secret": "dropped"
                        },
                        { "title": "" },
                        "not an object"
                    ]
                }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let items = body["data"]["payload"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Fix gate latch");
    assert_eq!(items[0]["status"], "done");
    assert_eq!(items[0]["photos"], json!(["https://img.example/gate.jpg"]));
    assert!(items[0].get("secret").is_none());
    assert_eq!(body["data"]["revision"], 1);

    let (_, body) = server.get("/api/tools/punch_list", &kai).await?;
    assert_eq!(body["data"]["revision"], 1);
    assert_eq!(body["data"]["payload"]["items"][0]["id"], "gate");
    Ok(())
}

#[tokio::test]
async fn stale_base_revision_is_a_conflict_with_server_state() -> Result<()> {
    let server = TestServer::start().await?;
    let kai = server.sign_in("kai@example.com").await?;
    let tool = "/api/tools/bid_checklist";

    let first = json!({ "bids": [{ "id": "b1", "contractor": "Aloha Roofing" }] });
    let (status, _) = server.put(tool, &kai, json!({ "payload": first, "base_revision": 0 })).await?;
    assert_eq!(status, StatusCode::OK);

    let stale = json!({ "bids": [{ "id": "b2", "contractor": "Mauka Electric" }] });
    let (status, body) = server.put(tool, &kai, json!({ "payload": stale, "base_revision": 0 })).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "REVISION_CONFLICT");
    assert_eq!(body["data"]["revision"], 1);
    assert_eq!(body["data"]["payload"]["bids"][0]["contractor"], "Aloha Roofing");

    // Without a base revision the last writer wins
    let (status, body) = server.put(tool, &kai, json!({ "payload": stale })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["revision"], 2);

    // A matching base revision moves the tool forward
    let current = json!({ "bids": [{ "id": "b3", "contractor": "Kona Plumbing" }] });
    let (status, body) = server.put(tool, &kai, json!({ "payload": current, "base_revision": 2 })).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["revision"], 3);
    assert_eq!(body["data"]["payload"]["bids"][0]["contractor"], "Kona Plumbing");
    Ok(())
}

#[tokio::test]
async fn concurrent_saves_on_one_revision_admit_a_single_winner() -> Result<()> {
    let server = TestServer::start().await?;
    let kai = server.sign_in("kai@example.com").await?;
    let project = server.current_project(&kai).await?;

    let saves = (0..5).map(|i| {
        server.put(
            "/api/tools/punch_list",
            &kai,
            json!({
                "project_id": project,
                "payload": { "items": [{ "title": format!("Item {}", i) }] },
                "base_revision": 0
            }),
        )
    });
    let results = futures::future::join_all(saves).await;

    let mut ok = 0;
    for result in results {
        let (status, _) = result?;
        match status {
            StatusCode::OK => ok += 1,
            StatusCode::CONFLICT => {}
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(ok, 1);
    Ok(())
}

#[tokio::test]
async fn tool_access_levels_are_enforced() -> Result<()> {
    let server = TestServer::start().await?;
    let kai = server.sign_in("kai@example.com").await?;
    let noe = server.sign_in("noe@example.com").await?;
    let project = server.current_project(&kai).await?;
    server
        .add_member(&kai, project, &noe, json!({ "punch_list": "VIEW", "mood_boards": "EDIT" }))
        .await?;

    let (status, body) = server
        .get(&format!("/api/tools/punch_list?project_id={}", project), &noe)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["capability"], "VIEW");

    let (status, _) = server
        .put("/api/tools/punch_list", &noe, json!({ "project_id": project, "payload": { "items": [] } }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .put("/api/tools/mood_boards", &noe, json!({ "project_id": project, "payload": { "boards": [] } }))
        .await?;
    assert_eq!(status, StatusCode::OK);

    // No grant at all hides the tool
    let (status, _) = server
        .get(&format!("/api/tools/bid_checklist?project_id={}", project), &noe)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn published_idea_packs_import_into_mood_boards() -> Result<()> {
    let server = TestServer::start().await?;
    let admin = server.sign_in(ADMIN_EMAIL).await?;
    let kai = server.sign_in("kai@example.com").await?;

    let (status, body) = server
        .post(
            "/api/admin/idea-packs",
            &admin,
            json!({
                "title": "Island Modern",
                "published": true,
                "ideas": [
                    { "name": "Koa accent wall", "images": ["https://img.example/koa.jpg"], "tags": ["wood"] },
                    { "name": "Lava rock planter" }
                ]
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let slug = body["data"]["slug"].as_str().unwrap().to_string();

    let (_, body) = server.call(reqwest::Method::GET, "/api/idea-packs", None, None).await?;
    assert!(body["data"].as_array().unwrap().iter().any(|p| p["slug"] == slug.as_str()));

    let (status, body) = server
        .post(&format!("/api/idea-packs/{}/import", slug), &kai, json!({}))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["imported"], 2);
    let board_id = body["data"]["board_id"].as_str().unwrap().to_string();
    let boards = body["data"]["payload"]["boards"].as_array().unwrap();
    assert_eq!(boards.len(), 1);
    assert_eq!(boards[0]["name"], "Island Modern");
    assert_eq!(boards[0]["ideas"].as_array().unwrap().len(), 2);

    // Importing again into the same board adds to it
    let (_, body) = server
        .post(&format!("/api/idea-packs/{}/import", slug), &kai, json!({ "board_id": board_id }))
        .await?;
    assert_eq!(body["data"]["payload"]["boards"].as_array().unwrap().len(), 1);

    let (status, _) = server
        .post("/api/idea-packs/no-such-pack/import", &kai, json!({}))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
