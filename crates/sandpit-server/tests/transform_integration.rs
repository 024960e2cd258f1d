//! `/qri` integration tests against a running server.

mod common;

use anyhow::Result;

const BODY_123: &str = "fn transform(ds, ctx) { ds.set_body([1, 2, 3]); }";

#[tokio::test]
async fn test_transform_returns_pretty_dataset() -> Result<()> {
    let server = common::TestServer::start().await?;

    let (status, body) = server.qri("", BODY_123).await?;
    assert_eq!(status, 200, "{body}");
    assert!(body.contains("\"body\": [1,2,3]"), "{body}");

    let doc: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(doc["qri"], "ds:0");
    assert_eq!(doc["name"], "test_dataset");
    assert_eq!(doc["structure"]["format"], "json");
    assert_eq!(doc["structure"]["entries"], 3);
    assert_eq!(doc["meta"]["qri"], "md:0");

    Ok(())
}

#[tokio::test]
async fn test_staged_transform_is_removed() -> Result<()> {
    let server = common::TestServer::start().await?;

    let (status, _) = server.qri("", BODY_123).await?;
    assert_eq!(status, 200);
    assert_eq!(server.staged_files()?, 0);

    let (status, _) = server.qri("", "fn transform(ds, ctx) { oops( }").await?;
    assert_eq!(status, 500);
    assert_eq!(server.staged_files()?, 0);

    Ok(())
}

#[tokio::test]
async fn test_same_name_can_be_reused() -> Result<()> {
    let server = common::TestServer::start().await?;

    for _ in 0..3 {
        let (status, body) = server.qri("", BODY_123).await?;
        assert_eq!(status, 200, "{body}");
    }

    Ok(())
}

#[tokio::test]
async fn test_config_and_secrets_reach_transform() -> Result<()> {
    let server = common::TestServer::start().await?;

    let script = r#"
        fn transform(ds, ctx) {
            ds.set_body([ctx.get_config("city"), ctx.get_secret("token") != ()]);
        }
    "#;
    let (status, body) = server
        .qri("config=city,Oslo&secrets=token,abc123", script)
        .await?;

    assert_eq!(status, 200, "{body}");
    assert!(!body.contains("abc123"), "secrets must not be serialized");
    let doc: serde_json::Value = serde_json::from_str(&body)?;
    assert_eq!(doc["body"], serde_json::json!(["Oslo", true]));
    assert_eq!(doc["transform"]["config"]["city"], "Oslo");

    Ok(())
}

#[tokio::test]
async fn test_odd_config_is_rejected() -> Result<()> {
    let server = common::TestServer::start().await?;

    let (status, body) = server.qri("config=key", BODY_123).await?;
    assert_eq!(status, 400);
    assert!(body.contains("config"), "{body}");

    Ok(())
}

#[tokio::test]
async fn test_transform_error_is_sanitized() -> Result<()> {
    let server = common::TestServer::start().await?;

    let script = "fn transform(ds, ctx) {\n  ds.set_body(missing_var);\n}";
    let (status, body) = server.qri("", script).await?;
    assert_eq!(status, 500);
    assert!(body.contains("line:2"), "{body}");
    assert!(
        !body.contains(&server.staging_dir.path().display().to_string()),
        "{body}"
    );

    Ok(())
}

#[tokio::test]
async fn test_concurrent_transforms_are_serialized() -> Result<()> {
    let server = common::TestServer::start().await?;

    let mut tasks = Vec::new();
    for i in 0..6 {
        let client = server.client.clone();
        let url = format!("{}/qri", server.base_url());
        tasks.push(tokio::spawn(async move {
            let script = format!("fn transform(ds, ctx) {{ ds.set_body([{i}]); }}");
            let resp = client.post(url).body(script).send().await?;
            let status = resp.status().as_u16();
            let doc: serde_json::Value = resp.json().await?;
            anyhow::Ok((status, doc))
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let (status, doc) = task.await??;
        assert_eq!(status, 200);
        assert_eq!(doc["body"], serde_json::json!([i]));
    }

    Ok(())
}
