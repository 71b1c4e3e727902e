//! JSON-lines bridge for render surfaces.
//!
//! One request per line (`{"command": ..., "params": {...}}`), one response
//! per line: `{"status":"success","data":...}` or
//! `{"status":"error","message":...}`.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::api::dto::{DropDto, GraphDto};
use crate::application::session_store::{lock, SessionStore, SharedSession};
use crate::application::SessionNotice;
use crate::domain::mutation::Relation;
use crate::ports::flowchart_exporter::FlowchartExporter;

const POLL_SLICE: Duration = Duration::from_millis(20);

#[derive(Debug, Deserialize)]
struct CommandReq {
    command: String,
    params: Option<Value>,
}

fn default_session() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize)]
struct SessionParams {
    #[serde(default = "default_session")]
    session: String,
}

#[derive(Debug, Deserialize)]
struct OpenParams {
    #[serde(default = "default_session")]
    session: String,
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditParams {
    #[serde(default = "default_session")]
    session: String,
    source: String,
}

#[derive(Debug, Deserialize)]
struct GraphParams {
    #[serde(default = "default_session")]
    session: String,
    #[serde(default)]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NodeParams {
    #[serde(default = "default_session")]
    session: String,
    node: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct DropParams {
    #[serde(default = "default_session")]
    session: String,
    target: Option<String>,
    payload: String,
    #[serde(default)]
    text: String,
    relation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollParams {
    #[serde(default = "default_session")]
    session: String,
    #[serde(default)]
    wait_ms: u64,
}

pub fn start_server(port: u16, store: Arc<SessionStore>) -> Result<()> {
    let address = format!("127.0.0.1:{}", port);
    let listener =
        TcpListener::bind(&address).with_context(|| format!("Failed to bind to {}", address))?;
    serve(listener, store)
}

/// Accept connections on an already bound listener, one thread each.
pub fn serve(listener: TcpListener, store: Arc<SessionStore>) -> Result<()> {
    info!(address = %listener.local_addr()?, "render bridge listening");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &store) {
                        warn!(error = %e, "connection error");
                    }
                });
            }
            Err(e) => error!(error = %e, "accept error"),
        }
    }

    Ok(())
}

fn handle_connection(mut stream: TcpStream, store: &SessionStore) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let shutdown = matches!(
            serde_json::from_str::<CommandReq>(trimmed),
            Ok(req) if req.command == "SHUTDOWN"
        );

        let response = match process_command(trimmed, store) {
            Ok(data) => json!({ "status": "success", "data": data }),
            Err(e) => json!({ "status": "error", "message": format!("{:#}", e) }),
        };

        let response_str = serde_json::to_string(&response)?;
        stream.write_all(response_str.as_bytes())?;
        stream.write_all(b"\n")?;

        if shutdown {
            info!("shutdown requested");
            std::process::exit(0);
        }
    }
    Ok(())
}

fn params<T: DeserializeOwned>(command: &str, params: Option<Value>) -> Result<T> {
    let value = params.unwrap_or_else(|| json!({}));
    serde_json::from_value(value).with_context(|| format!("Invalid params for {}", command))
}

fn process_command(json_str: &str, store: &SessionStore) -> Result<Value> {
    let req: CommandReq = serde_json::from_str(json_str).context("Invalid JSON format")?;
    let command = req.command.as_str();

    match command {
        "PING" => Ok(json!("PONG")),
        "OPEN" => handle_open(params(command, req.params)?, store),
        "EDIT" => {
            let p: EditParams = params(command, req.params)?;
            let shared = store.open(&p.session);
            let ticket = lock(&shared).edit_source(&p.source);
            Ok(json!({ "ticket": ticket }))
        }
        "REBUILD" => {
            let p: SessionParams = params(command, req.params)?;
            let shared = existing(store, &p.session)?;
            let mut session = lock(&shared);
            session.refresh();
            Ok(serde_json::to_value(GraphDto::from(session.rebuild_now()))?)
        }
        "GRAPH" => handle_graph(params(command, req.params)?, store),
        "CLICK" => {
            let p: NodeParams = params(command, req.params)?;
            let shared = existing(store, &p.session)?;
            let mut session = lock(&shared);
            session.refresh();
            let summary = session.single_click(&p.node)?;
            Ok(json!({ "summary": summary }))
        }
        "DOUBLE_CLICK" => {
            let p: NodeParams = params(command, req.params)?;
            let shared = existing(store, &p.session)?;
            let mut session = lock(&shared);
            session.refresh();
            let requested = session.double_click(&p.node, &p.text)?;
            Ok(json!({ "requested": requested }))
        }
        "DROP" => handle_drop(params(command, req.params)?, store),
        "REGENERATE" => {
            let p: SessionParams = params(command, req.params)?;
            let shared = existing(store, &p.session)?;
            lock(&shared).request_regeneration();
            Ok(json!("requested"))
        }
        "REPAIR" => {
            let p: SessionParams = params(command, req.params)?;
            let shared = existing(store, &p.session)?;
            lock(&shared).request_repair();
            Ok(json!("requested"))
        }
        "POLL" => {
            let p: PollParams = params(command, req.params)?;
            let shared = existing(store, &p.session)?;
            let notices = poll(&shared, Duration::from_millis(p.wait_ms));
            Ok(serde_json::to_value(notices)?)
        }
        "CLOSE" => {
            let p: SessionParams = params(command, req.params)?;
            Ok(json!({ "closed": store.close(&p.session) }))
        }
        "SHUTDOWN" => Ok(json!("Shutting down...")),
        _ => anyhow::bail!("Unknown command: {}", req.command),
    }
}

fn existing(store: &SessionStore, id: &str) -> Result<SharedSession> {
    store
        .get(id)
        .ok_or_else(|| anyhow::anyhow!("Unknown session: {}", id))
}

/// Pump the session until something arrives or `wait` runs out. The lock
/// is only held for each pump, so other clients keep going meanwhile.
fn poll(shared: &SharedSession, wait: Duration) -> Vec<SessionNotice> {
    let deadline = Instant::now() + wait;
    loop {
        let notices = lock(shared).pump();
        let now = Instant::now();
        if !notices.is_empty() || now >= deadline {
            return notices;
        }
        thread::sleep(POLL_SLICE.min(deadline - now));
    }
}

fn handle_open(p: OpenParams, store: &SessionStore) -> Result<Value> {
    let shared = store.open(&p.session);
    let mut session = lock(&shared);
    if let Some(source) = &p.source {
        session.load_source(source);
    }
    Ok(serde_json::to_value(GraphDto::from(session.graph()))?)
}

fn handle_graph(p: GraphParams, store: &SessionStore) -> Result<Value> {
    let shared = existing(store, &p.session)?;
    let mut session = lock(&shared);
    session.refresh();
    match p.format.as_deref() {
        Some("dot") => Ok(json!(FlowchartExporter::to_dot(session.graph()))),
        None | Some("json") => Ok(serde_json::to_value(GraphDto::from(session.graph()))?),
        Some(other) => anyhow::bail!("Unsupported graph format: {}", other),
    }
}

fn handle_drop(p: DropParams, store: &SessionStore) -> Result<Value> {
    let relation = match p.relation.as_deref() {
        None => None,
        Some(choice) => Some(
            Relation::from_choice(choice)
                .ok_or_else(|| anyhow::anyhow!("Unknown relation: {}", choice))?,
        ),
    };

    let shared = existing(store, &p.session)?;
    let mut session = lock(&shared);
    session.refresh();
    let outcome = session.drop_construct(p.target.as_deref(), &p.payload, &p.text, relation)?;

    let graph = session.graph();
    let reply = DropDto {
        outcome,
        focus: graph.index.graph_id_of(outcome.inserted).map(str::to_string),
        graph: GraphDto::from(graph),
    };
    Ok(serde_json::to_value(reply)?)
}
