use anyhow::Result;
use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use zwicky_engine::{
    Action, Component, EditTarget, ExpansionState, GatewayClient, IdeaKind, PromptBuilder,
    Session, Workbench, config::TokenBudgets,
};
use zwicky_gateway::{GatewayConfig, UpstreamFlavor, router};

async fn serve(app: Router) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn completion(text: &str) -> Json<Value> {
    Json(json!({ "choices": [{ "message": { "role": "assistant", "content": text } }] }))
}

/// Answers by token budget, the way the real model would by prompt.
async fn fake_model(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer test-key") {
        return (StatusCode::UNAUTHORIZED, "invalid key").into_response();
    }
    match body["max_tokens"].as_u64() {
        Some(1500) => completion(
            "```json\n[\n  {\"name\": \"Audience\", \"question\": \"Who is it for?\"},\n  {\"name\": \"Channel\", \"question\": \"Where does it happen?\"}\n]\n```",
        )
        .into_response(),
        Some(300) => completion("**Library podcast club**\n\nStudents record weekly episodes.")
            .into_response(),
        Some(1200) => completion("**How to execute:**\n1) Book a room").into_response(),
        Some(350) => completion("**Commuter audiobooks**\n\nShort reads for the train.")
            .into_response(),
        _ => (StatusCode::BAD_REQUEST, "unexpected budget").into_response(),
    }
}

async fn start_stack(credential: &str) -> Result<Workbench<GatewayClient>> {
    let upstream = serve(Router::new().route("/v1/chat/completions", post(fake_model))).await?;
    let gateway = serve(router(
        GatewayConfig::new(UpstreamFlavor::ChatCompletions)
            .with_credential(credential)
            .with_upstream_url(format!("{upstream}/v1/chat/completions")),
    ))
    .await?;

    Ok(Workbench::new(
        GatewayClient::new(format!("{gateway}/api/ai-gateway")),
        PromptBuilder::new("anthropic/claude-sonnet-4", TokenBudgets::default()),
        Session::seeded(42),
    ))
}

async fn add_item(bench: &mut Workbench<GatewayClient>, attribute_index: usize, text: &str) {
    let attribute = bench.session().grid.attributes()[attribute_index].id.clone();
    bench.dispatch(Action::AddItem(attribute)).await;
    let Some(EditTarget::Item { attribute, item }) = bench.session().grid.editing().cloned() else {
        panic!("new item should have edit focus");
    };
    bench
        .dispatch(Action::SetItemText {
            attribute: attribute.clone(),
            item: item.clone(),
            text: text.to_string(),
        })
        .await;
    bench
        .dispatch(Action::CommitItemEdit { attribute, item })
        .await;
}

#[tokio::test]
async fn test_full_session_through_gateway() -> Result<()> {
    let mut bench = start_stack("test-key").await?;

    bench
        .dispatch(Action::SetChallenge("Get teenagers reading".into()))
        .await;
    bench.dispatch(Action::RequestAttributes).await;
    assert_eq!(bench.session().error, None);
    let names: Vec<_> = bench
        .session()
        .grid
        .attributes()
        .iter()
        .map(|a| a.name.clone())
        .collect();
    assert_eq!(names, vec!["Audience", "Channel"]);

    add_item(&mut bench, 0, "Students").await;
    add_item(&mut bench, 1, "Podcast").await;

    bench.dispatch(Action::RequestIdea).await;
    let idea = bench.session().ideas.iter().next().unwrap().clone();
    assert_eq!(idea.title, "Library podcast club");
    assert_eq!(idea.summary, "Students record weekly episodes.");
    assert_eq!(
        idea.components,
        vec![
            Component::new("Audience", "Students"),
            Component::new("Channel", "Podcast"),
        ]
    );

    bench.dispatch(Action::ExpandIdea(idea.id.clone())).await;
    assert_eq!(
        bench.session().ideas.get(&idea.id).unwrap().expansion,
        ExpansionState::Expanded("**How to execute:**\n1) Book a room".into())
    );

    bench.dispatch(Action::RequestVariation(idea.id.clone())).await;
    let newest = bench.session().ideas.iter().next().unwrap();
    assert_eq!(newest.kind, IdeaKind::Variation);
    assert_eq!(newest.title, "Commuter audiobooks");
    assert_eq!(bench.session().ideas.len(), 2);
    assert_eq!(bench.session().error, None);

    let dir = tempfile::tempdir()?;
    let path = bench.export_into(dir.path()).await.unwrap();
    let exported: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(exported["challenge"], "Get teenagers reading");
    assert_eq!(exported["attributes"][1]["items"][0]["text"], "Podcast");

    assert!(bench.import_from(&path).await);
    assert!(bench.session().ideas.is_empty());
    assert_eq!(bench.session().grid.attributes().len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_upstream_rejection_reaches_error_slot() -> Result<()> {
    let mut bench = start_stack("wrong-key").await?;
    bench
        .dispatch(Action::SetChallenge("Get teenagers reading".into()))
        .await;

    bench.dispatch(Action::RequestAttributes).await;

    let session = bench.session();
    assert!(!session.busy.generating_attributes);
    assert!(session.grid.is_empty());
    assert_eq!(
        session.error.as_deref(),
        Some("Failed to generate attributes: API error: 401 (invalid key)")
    );
    Ok(())
}

#[tokio::test]
async fn test_gateway_without_credential() -> Result<()> {
    let gateway = serve(router(GatewayConfig::new(UpstreamFlavor::ChatCompletions))).await?;
    let mut bench = Workbench::new(
        GatewayClient::new(format!("{gateway}/api/ai-gateway")),
        PromptBuilder::new("m", TokenBudgets::default()),
        Session::seeded(1),
    );
    bench.dispatch(Action::SetChallenge("Anything".into())).await;

    bench.dispatch(Action::RequestAttributes).await;

    assert_eq!(
        bench.session().error.as_deref(),
        Some("Failed to generate attributes: API error: 500 (API key not configured)")
    );
    Ok(())
}
