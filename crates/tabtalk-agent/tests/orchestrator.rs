//! End-to-end orchestration tests against a scripted provider.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use tabtalk_agent::{Agent, AgentConfig};
use tabtalk_core::{Error, Result};
use tabtalk_llm::{
    ChatMessage, ChatRequest, ChatResponse, CompletionProvider, ToolCall,
};
use tabtalk_tools::{register_builtin_tools, RunContext, Tool, ToolRegistry};

enum Scripted {
    Reply(ChatResponse),
    Transport { status: u16, body: String },
}

/// Provider that replays a fixed script and records every request.
struct MockProvider {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Transcript the provider saw on its n-th call.
    fn transcript(&self, n: usize) -> Vec<ChatMessage> {
        self.requests.lock().unwrap()[n].messages.clone()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn complete(&self, _model: &str, request: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request);
        match self.script.lock().unwrap().pop_front() {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Transport { status, body }) => Err(Error::transport(status, body)),
            None => panic!("mock provider script exhausted"),
        }
    }
}

/// Provider that blocks forever; used for cancellation.
struct HangingProvider;

#[async_trait]
impl CompletionProvider for HangingProvider {
    async fn complete(&self, _model: &str, _request: ChatRequest) -> Result<ChatResponse> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

fn content_reply(content: &str) -> Scripted {
    Scripted::Reply(ChatResponse {
        message: ChatMessage::assistant(content),
        model: "mock".to_string(),
        finish_reason: Some("stop".to_string()),
        usage: None,
    })
}

fn tool_call_reply(calls: Vec<(&str, &str, Value)>) -> Scripted {
    Scripted::Reply(ChatResponse {
        message: ChatMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(
                calls
                    .into_iter()
                    .map(|(id, name, arguments)| ToolCall {
                        id: id.to_string(),
                        name: name.to_string(),
                        arguments,
                    })
                    .collect(),
            ),
            tool_call_id: None,
        },
        model: "mock".to_string(),
        finish_reason: Some("tool_calls".to_string()),
        usage: None,
    })
}

/// Registry with the builtin suite plus a seeded scratch database.
fn builtin_fixture(dir: &tempfile::TempDir) -> (Arc<ToolRegistry>, AgentConfig) {
    let db_path = dir.path().join("demo.db");
    let conn = rusqlite::Connection::open(&db_path).unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE app_uv (date TEXT PRIMARY KEY, uv INTEGER NOT NULL);
        INSERT INTO app_uv (date, uv) VALUES
            ('2024-01-01', 120),
            ('2024-01-02', 140),
            ('2024-01-03', 95);
        "#,
    )
    .unwrap();

    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry).unwrap();

    let config = AgentConfig {
        model: "mock".to_string(),
        temperature: 0.0,
        db_path,
        charts_dir: dir.path().join("charts"),
    };
    (Arc::new(registry), config)
}

/// Tool that counts its executions; for asserting executors never ran.
struct CountingTool {
    executions: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        "counting"
    }

    fn description(&self) -> &str {
        "Counts executions"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _args: Value, _ctx: &RunContext) -> anyhow::Result<String> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok("counted".to_string())
    }
}

// Scenario A: a tool-free decision is returned verbatim after exactly
// one completion call.
#[tokio::test]
async fn tool_free_response_takes_one_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, config) = builtin_fixture(&dir);
    let provider = Arc::new(MockProvider::new(vec![content_reply(
        "here are the tables: app_uv",
    )]));

    let agent = Agent::new(provider.clone(), registry, config);
    let answer = agent.run("list the tables").await.unwrap();

    assert_eq!(answer, "here are the tables: app_uv");
    assert_eq!(provider.request_count(), 1);
}

// Scenario B: one sql_query call; the tool result lands in the
// synthesis transcript and the second response becomes the answer.
#[tokio::test]
async fn sql_tool_round_feeds_synthesis() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, config) = builtin_fixture(&dir);
    let provider = Arc::new(MockProvider::new(vec![
        tool_call_reply(vec![(
            "call_1",
            "sql_query",
            json!({"sql": "SELECT * FROM app_uv ORDER BY date DESC LIMIT 3"}),
        )]),
        content_reply("The most recent 3 days are Jan 3 (95), Jan 2 (140) and Jan 1 (120)."),
    ]));

    let agent = Agent::new(provider.clone(), registry, config);
    let answer = agent
        .run("show me the most recent 3 rows of app_uv")
        .await
        .unwrap();

    assert!(answer.starts_with("The most recent 3 days"));
    assert_eq!(provider.request_count(), 2);

    // system + user + assistant-with-calls + tool result
    let transcript = provider.transcript(1);
    assert_eq!(transcript.len(), 4);
    assert_eq!(transcript[0].role, "system");
    assert_eq!(transcript[1].role, "user");
    assert_eq!(transcript[2].role, "assistant");

    let tool_msg = &transcript[3];
    assert_eq!(tool_msg.role, "tool");
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
    let rows: Vec<Value> = serde_json::from_str(tool_msg.content_str()).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["date"], json!("2024-01-03"));
}

// N tool calls produce N tool messages, same ids, same order.
#[tokio::test]
async fn tool_results_preserve_emitted_order() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, config) = builtin_fixture(&dir);
    let provider = Arc::new(MockProvider::new(vec![
        tool_call_reply(vec![
            (
                "call_a",
                "extract_table",
                json!({"sql": "SELECT * FROM app_uv", "name": "uv"}),
            ),
            ("call_b", "compute", json!({"expression": "sum(uv.uv)"})),
            ("call_c", "compute", json!({"expression": "count(uv)"})),
        ]),
        content_reply("Total UV is 355 over 3 days."),
    ]));

    let agent = Agent::new(provider.clone(), registry, config);
    agent.run("total uv and day count").await.unwrap();

    let transcript = provider.transcript(1);
    let tool_messages: Vec<&ChatMessage> =
        transcript.iter().filter(|m| m.role == "tool").collect();

    assert_eq!(tool_messages.len(), 3);
    assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("call_a"));
    assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some("call_b"));
    assert_eq!(tool_messages[2].tool_call_id.as_deref(), Some("call_c"));

    // Sequential execution let the later calls see the extracted table
    assert_eq!(tool_messages[0].content_str(), "Stored 3 rows as 'uv'");
    assert_eq!(tool_messages[1].content_str(), "355");
    assert_eq!(tool_messages[2].content_str(), "3");
}

// Scenario C: an unregistered tool name never raises; the run reaches
// synthesis with a "not registered" marker in the transcript.
#[tokio::test]
async fn unknown_tool_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, config) = builtin_fixture(&dir);
    let provider = Arc::new(MockProvider::new(vec![
        tool_call_reply(vec![("call_1", "nonexistent_tool", json!({"x": 1}))]),
        content_reply("I could not find that capability, sorry."),
    ]));

    let agent = Agent::new(provider.clone(), registry, config);
    let answer = agent.run("do the impossible").await.unwrap();

    assert!(!answer.is_empty());
    let transcript = provider.transcript(1);
    let tool_msg = transcript.iter().find(|m| m.role == "tool").unwrap();
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
    assert!(tool_msg.content_str().contains("not registered"));
}

// Arguments violating the declared schema are absorbed the same way.
#[tokio::test]
async fn invalid_arguments_are_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, config) = builtin_fixture(&dir);
    let provider = Arc::new(MockProvider::new(vec![
        tool_call_reply(vec![("call_1", "sql_query", json!({"sql": 42}))]),
        content_reply("The query arguments were invalid."),
    ]));

    let agent = Agent::new(provider.clone(), registry, config);
    let answer = agent.run("bad args").await.unwrap();

    assert!(!answer.is_empty());
    let transcript = provider.transcript(1);
    let tool_msg = transcript.iter().find(|m| m.role == "tool").unwrap();
    assert!(tool_msg
        .content_str()
        .contains("invalid arguments for tool 'sql_query'"));
}

// Scenario D: a transport failure on the decision pass aborts the run
// before any executor is invoked.
#[tokio::test]
async fn transport_failure_aborts_before_tools() {
    let dir = tempfile::tempdir().unwrap();
    let executions = Arc::new(AtomicUsize::new(0));

    let mut registry = ToolRegistry::new();
    registry
        .register(Arc::new(CountingTool {
            executions: executions.clone(),
        }))
        .unwrap();

    let provider = Arc::new(MockProvider::new(vec![Scripted::Transport {
        status: 500,
        body: "internal server error".to_string(),
    }]));

    let config = AgentConfig {
        model: "mock".to_string(),
        temperature: 0.0,
        db_path: dir.path().join("demo.db"),
        charts_dir: dir.path().join("charts"),
    };
    let agent = Agent::new(provider, Arc::new(registry), config);

    let err = agent.run("anything").await.unwrap_err();
    match err {
        Error::Transport { status, body } => {
            assert_eq!(status, 500);
            assert!(body.contains("internal server error"));
        }
        other => panic!("expected Transport error, got {:?}", other),
    }
    assert_eq!(executions.load(Ordering::SeqCst), 0);
}

// Idempotence: the same script and the same user message produce
// identical transcripts and answers.
#[tokio::test]
async fn runs_are_deterministic() {
    let script = || {
        vec![
            tool_call_reply(vec![(
                "call_1",
                "sql_query",
                json!({"sql": "SELECT COUNT(*) AS n FROM app_uv"}),
            )]),
            content_reply("There are 3 rows."),
        ]
    };

    let mut observed: Vec<(String, String)> = Vec::new();
    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let (registry, config) = builtin_fixture(&dir);
        let provider = Arc::new(MockProvider::new(script()));
        let agent = Agent::new(provider.clone(), registry, config);

        let answer = agent.run("how many rows?").await.unwrap();
        let transcript = serde_json::to_string(&provider.transcript(1)).unwrap();
        observed.push((answer, transcript));
    }

    assert_eq!(observed[0], observed[1]);
}

// Chart flow: extract then render writes a chart file under the run's
// chart directory and reports its path.
#[tokio::test]
async fn chart_round_writes_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, config) = builtin_fixture(&dir);
    let charts_dir = config.charts_dir.clone();
    let provider = Arc::new(MockProvider::new(vec![
        tool_call_reply(vec![
            (
                "call_a",
                "extract_table",
                json!({"sql": "SELECT date, uv FROM app_uv ORDER BY date", "name": "uv"}),
            ),
            (
                "call_b",
                "render_chart",
                json!({
                    "chart_type": "line",
                    "table": "uv",
                    "x_field": "date",
                    "y_field": "uv",
                    "title": "Daily UV"
                }),
            ),
        ]),
        content_reply("Done, see the chart."),
    ]));

    let agent = Agent::new(provider.clone(), registry, config);
    agent.run("plot uv over time").await.unwrap();

    let written: Vec<PathBuf> = std::fs::read_dir(&charts_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(written.len(), 1);

    let option: Value =
        serde_json::from_str(&std::fs::read_to_string(&written[0]).unwrap()).unwrap();
    assert_eq!(option["series"][0]["type"], "line");
    assert_eq!(option["xAxis"]["data"].as_array().unwrap().len(), 3);
}

// Cancellation fires Error::Cancelled out of a blocking completion.
#[tokio::test]
async fn cancellation_aborts_blocking_completion() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, config) = builtin_fixture(&dir);
    let agent = Agent::new(Arc::new(HangingProvider), registry, config);

    let token = CancellationToken::new();
    token.cancel();

    let err = agent
        .run_with_cancel("anything", token)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}
