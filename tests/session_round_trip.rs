use std::sync::{Arc, Mutex};
use std::time::Duration;

use scopeflow::application::{Session, SessionNotice};
use scopeflow::config::EngineConfig;
use scopeflow::domain::mutation::Relation;
use scopeflow::domain::node::NodeKind;
use scopeflow::error::GenerationError;
use scopeflow::ports::TextGenerator;
use tempfile::{tempdir, TempDir};

/// Scripted generator: answers in order, records every prompt.
struct Scripted {
    replies: Mutex<Vec<Result<String, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(replies: Vec<Result<String, GenerationError>>) -> Arc<Self> {
        Arc::new(Scripted {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

impl TextGenerator for Scripted {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Err(GenerationError::Unavailable("script exhausted".to_string()))
        } else {
            replies.remove(0)
        }
    }
}

fn session(generator: Arc<Scripted>) -> (Session, TempDir) {
    let dir = tempdir().unwrap();
    let config = EngineConfig {
        interchange_path: dir.path().join("ast.json"),
        debounce_ms: 60,
        ..EngineConfig::default()
    };
    (Session::new(config, generator), dir)
}

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_load_persists_interchange_document() {
    let (mut session, dir) = session(Scripted::new(vec![]));
    session.load_source("fn main() { let x = 1; }");

    let written = std::fs::read_to_string(dir.path().join("ast.json")).unwrap();
    assert!(written.contains("\"label\": \"x = 1\""));
    assert_eq!(session.graph().nodes.len(), session.root().count());
}

#[test]
fn test_edit_burst_collapses_into_one_rebuild() {
    let (mut session, _dir) = session(Scripted::new(vec![]));
    session.load_source("fn main() {}");

    session.edit_source("fn main() { let a");
    session.edit_source("fn main() { let a = 1;");
    session.edit_source("fn main() { let a = 1; }");
    // Nothing applied until the session is pumped.
    assert_eq!(session.root().children[0].children.len(), 0);

    let notices = session.pump_blocking(WAIT);
    assert_eq!(notices.len(), 1);
    assert!(matches!(notices[0], SessionNotice::Rebuilt { .. }));
    assert_eq!(session.root().children[0].children[0].label, "a = 1");

    std::thread::sleep(Duration::from_millis(200));
    assert!(session.pump().is_empty());
}

#[test]
fn test_refresh_applies_rebuild_and_keeps_notice_for_pump() {
    let (mut session, _dir) = session(Scripted::new(vec![]));
    session.load_source("fn main() {}");
    session.edit_source("fn main() { let a = 1; }");

    std::thread::sleep(Duration::from_millis(300));
    session.refresh();
    assert_eq!(session.root().children[0].children[0].label, "a = 1");

    let notices = session.pump_blocking(WAIT);
    assert_eq!(notices.len(), 1);
    assert!(matches!(notices[0], SessionNotice::Rebuilt { .. }));
    assert!(session.pump().is_empty());
}

#[test]
fn test_rebuild_now_cancels_pending_debounce() {
    let (mut session, _dir) = session(Scripted::new(vec![]));
    session.edit_source("fn main() { let a = 1; }");
    session.rebuild_now();
    assert_eq!(session.root().children[0].children.len(), 1);

    std::thread::sleep(Duration::from_millis(200));
    assert!(session.pump().is_empty());
}

#[test]
fn test_drop_then_regenerate_closes_the_loop() {
    let generator = Scripted::new(vec![Ok(
        "```rust\nfn main() {\n    if a > 10 {\n        println!(\"big\");\n    }\n}\n```".to_string(),
    )]);
    let (mut session, _dir) = session(generator.clone());
    session.load_source("fn main() {}");

    let main_gid = session.graph().nodes[1].id.clone();
    let outcome = session
        .drop_construct(Some(&main_gid), "type:If", "", None)
        .unwrap();
    assert_eq!(session.root().find(outcome.inserted).unwrap().kind, NodeKind::IfStatement);
    assert!(session.graph().index.graph_id_of(outcome.inserted).is_some());

    session.request_regeneration();
    let notices = session.pump_blocking(WAIT);
    match &notices[..] {
        [SessionNotice::SourceRegenerated { source }] => {
            assert!(source.starts_with("fn main()"));
            assert!(!source.contains("```"));
        }
        other => panic!("unexpected notices: {:?}", other),
    }
    assert_eq!(session.root().children[0].children[0].label, "if (a > 10)");

    let prompts = generator.prompts.lock().unwrap();
    assert!(prompts[0].contains("// TODO: If body"));
}

#[test]
fn test_generation_failure_leaves_tree_untouched() {
    let generator = Scripted::new(vec![Err(GenerationError::Timeout(60))]);
    let (mut session, _dir) = session(generator);
    session.load_source("fn main() { let a = 1; }");
    let before = session.root().clone();

    session.request_regeneration();
    let notices = session.pump_blocking(WAIT);
    assert!(matches!(
        notices.as_slice(),
        [SessionNotice::CollaboratorFailed { message }] if message.contains("timed out")
    ));
    assert_eq!(session.root(), &before);
}

#[test]
fn test_relabel_applies_by_identity_across_rebuilds() {
    let generator = Scripted::new(vec![Ok("let a = 42;".to_string())]);
    let (mut session, _dir) = session(generator);
    session.load_source("fn main() { let a = 1; }");

    let decl = session.root().children[0].children[0].id;
    let stale_gid = session.graph().index.graph_id_of(decl).unwrap().to_string();
    assert!(session.double_click(&stale_gid, "set a to 42").unwrap());

    // A graph rebuild from a mutation reassigns ids but keeps the node.
    session.drop_construct(None, "print", "", None).unwrap();
    assert!(session.resolve(&stale_gid).is_err());

    let notices = session.pump_blocking(WAIT);
    assert_eq!(
        notices,
        vec![SessionNotice::Relabeled {
            node_id: decl,
            label: "let a = 42;".to_string()
        }]
    );
    assert_eq!(session.root().find(decl).unwrap().label, "let a = 42;");
}

#[test]
fn test_relabel_for_vanished_node_is_dropped() {
    let generator = Scripted::new(vec![Ok("let b = 2;".to_string())]);
    let (mut session, _dir) = session(generator);
    session.load_source("fn main() { let a = 1; }");

    let decl = session.root().children[0].children[0].id;
    let gid = session.graph().index.graph_id_of(decl).unwrap().to_string();
    session.double_click(&gid, "b is two").unwrap();
    session.load_source("fn main() { let a = 1; }");

    let notices = session.pump_blocking(WAIT);
    assert_eq!(notices, vec![SessionNotice::NodeGone { node_id: decl }]);
}

#[test]
fn test_single_click_summarizes_and_suggests() {
    let generator = Scripted::new(vec![Ok("[Print variable: println!(\"{}\", a)]".to_string())]);
    let (mut session, _dir) = session(generator.clone());
    session.load_source("fn main() { let a = 1; }");

    let decl = session.root().children[0].children[0].id;
    let gid = session.graph().index.graph_id_of(decl).unwrap().to_string();
    let summary = session.single_click(&gid).unwrap();
    assert!(summary.contains("Variables in Scope: a"));

    let notices = session.pump_blocking(WAIT);
    assert!(matches!(
        notices.as_slice(),
        [SessionNotice::Suggestions { node_id, .. }] if *node_id == decl
    ));
    assert!(generator.prompts.lock().unwrap()[0].contains("action node"));
}

#[test]
fn test_double_click_without_change_does_nothing() {
    let (mut session, _dir) = session(Scripted::new(vec![]));
    session.load_source("fn main() { let a = 1; }");
    let gid = session.graph().nodes[2].id.clone();
    let label = session.graph().nodes[2].label.clone();
    assert!(!session.double_click(&gid, &label).unwrap());
    assert!(!session.double_click(&gid, "   ").unwrap());
}

#[test]
fn test_drop_chain_on_empty_canvas() {
    let (mut session, _dir) = session(Scripted::new(vec![]));
    session.load_source("");
    let outcome = session.drop_construct(None, "assign", "let total = 0;", None).unwrap();
    assert!(outcome.synthesized_container);

    let target = session
        .graph()
        .index
        .graph_id_of(outcome.inserted)
        .unwrap()
        .to_string();
    let after = session
        .drop_construct(Some(&target), "return", "total", Some(Relation::SequentialAfter))
        .unwrap();
    assert_eq!(after.parent, outcome.parent);
    assert_eq!(
        session.root().find(after.inserted).unwrap().label,
        "return total;"
    );
    assert!(session.drop_construct(Some("not-a-graph-id"), "if", "", None).is_err());
}
