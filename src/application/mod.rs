//! Document session: owns one source text, its tree and its graph.
//!
//! All tree and graph state lives on the thread that owns the `Session`.
//! Debounced rebuilds and collaborator calls finish on background threads
//! and only report back through the event channel; `pump` applies them.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::domain::flowgraph::FlowGraph;
use crate::domain::mutation::{
    DropTarget, MutationEngine, MutationOutcome, MutationRequest, NewNodeDescriptor, Relation,
};
use crate::domain::node::{Node, NodeId, NodeKind};
use crate::domain::prompts;
use crate::domain::synthesizer::Synthesizer;
use crate::error::{GenerationError, SessionError};
use crate::infrastructure::debounce::Debouncer;
use crate::infrastructure::interchange::InterchangeStore;
use crate::ports::TextGenerator;

pub mod round_trip;
pub mod session_store;

use round_trip::RoundTripCoordinator;

/// Results delivered to the session thread.
#[derive(Debug)]
enum SessionEvent {
    RebuildDue(u64),
    Regenerated(Result<String, GenerationError>),
    Repaired(Result<String, GenerationError>),
    Relabeled {
        node: NodeId,
        result: Result<String, GenerationError>,
    },
    Suggested {
        node: NodeId,
        result: Result<String, GenerationError>,
    },
}

/// What changed during a `pump`, for the editing surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionNotice {
    Rebuilt { nodes: usize },
    #[serde(rename_all = "camelCase")]
    SourceRegenerated { source: String },
    #[serde(rename_all = "camelCase")]
    SourceRepaired { source: String },
    #[serde(rename_all = "camelCase")]
    Relabeled { node_id: NodeId, label: String },
    #[serde(rename_all = "camelCase")]
    Suggestions { node_id: NodeId, text: String },
    /// A collaborator answered for a node that is no longer in the tree
    #[serde(rename_all = "camelCase")]
    NodeGone { node_id: NodeId },
    CollaboratorFailed { message: String },
}

pub struct Session {
    config: EngineConfig,
    source: String,
    root: Node,
    graph: FlowGraph,
    synthesizer: Synthesizer,
    mutations: MutationEngine,
    round_trip: Arc<RoundTripCoordinator>,
    debouncer: Debouncer,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    /// Notices applied by `refresh` and not yet handed out by `pump`
    pending: Vec<SessionNotice>,
}

impl Session {
    pub fn new(config: EngineConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let store = InterchangeStore::new(config.interchange_path.clone());
        let round_trip = Arc::new(RoundTripCoordinator::new(store, generator));
        let root = Node::new("Root", "File", NodeKind::CompilationUnit);
        let graph = FlowGraph::build(&root);
        let (events_tx, events_rx) = mpsc::channel();
        let debouncer = Debouncer::new(config.debounce());

        Session {
            config,
            source: String::new(),
            root,
            graph,
            synthesizer: Synthesizer::new(),
            mutations: MutationEngine::new(),
            round_trip,
            debouncer,
            events_tx,
            events_rx,
            pending: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn round_trip(&self) -> &RoundTripCoordinator {
        &self.round_trip
    }

    /// Replace the source and synthesize immediately.
    pub fn load_source(&mut self, source: &str) -> &FlowGraph {
        self.debouncer.cancel();
        self.source = source.to_string();
        self.resynthesize();
        &self.graph
    }

    /// Record an edit; the rebuild happens once edits go quiet for the
    /// debounce period and the session is pumped.
    pub fn edit_source(&mut self, source: &str) -> u64 {
        self.source = source.to_string();
        let tx = self.events_tx.clone();
        self.debouncer.schedule(move |ticket| {
            let _ = tx.send(SessionEvent::RebuildDue(ticket));
        })
    }

    /// Explicit edit-now: drop any pending debounce and rebuild.
    pub fn rebuild_now(&mut self) -> &FlowGraph {
        self.debouncer.cancel();
        self.resynthesize();
        &self.graph
    }

    fn resynthesize(&mut self) {
        self.root = self.synthesizer.synthesize(&self.source);
        self.round_trip.persist(&self.root);
        self.graph = FlowGraph::build(&self.root);
        info!(nodes = self.graph.nodes.len(), "resynthesized tree");
    }

    /// Apply finished background work without handing out its notices;
    /// they are kept for the next `pump`. Non-blocking.
    pub fn refresh(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            let mut notices = std::mem::take(&mut self.pending);
            self.apply_event(event, &mut notices);
            self.pending = notices;
        }
    }

    /// Drain finished background work, apply it and return everything that
    /// changed since the last pump. Non-blocking.
    pub fn pump(&mut self) -> Vec<SessionNotice> {
        self.refresh();
        std::mem::take(&mut self.pending)
    }

    /// Like `pump`, but waits up to `timeout` for the first event when
    /// nothing is pending.
    pub fn pump_blocking(&mut self, timeout: Duration) -> Vec<SessionNotice> {
        let mut notices = self.pump();
        if !notices.is_empty() {
            return notices;
        }
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => self.apply_event(event, &mut notices),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                return notices
            }
        }
        notices.extend(self.pump());
        notices
    }

    fn apply_event(&mut self, event: SessionEvent, notices: &mut Vec<SessionNotice>) {
        match event {
            SessionEvent::RebuildDue(ticket) => {
                if self.debouncer.is_current(ticket) {
                    self.resynthesize();
                    notices.push(SessionNotice::Rebuilt {
                        nodes: self.root.count(),
                    });
                } else {
                    debug!(ticket, "ignoring superseded rebuild");
                }
            }
            SessionEvent::Regenerated(Ok(source)) => {
                self.source = source.clone();
                self.rebuild_now();
                notices.push(SessionNotice::SourceRegenerated { source });
            }
            SessionEvent::Repaired(Ok(source)) => {
                self.source = source.clone();
                self.rebuild_now();
                notices.push(SessionNotice::SourceRepaired { source });
            }
            SessionEvent::Relabeled {
                node,
                result: Ok(label),
            } => match self.root.find_mut(node) {
                Some(target) => {
                    target.label = label.clone();
                    self.round_trip.persist(&self.root);
                    self.graph = FlowGraph::build(&self.root);
                    notices.push(SessionNotice::Relabeled {
                        node_id: node,
                        label,
                    });
                }
                None => {
                    debug!(%node, "relabel result for a node that is gone");
                    notices.push(SessionNotice::NodeGone { node_id: node });
                }
            },
            SessionEvent::Suggested {
                node,
                result: Ok(text),
            } => notices.push(SessionNotice::Suggestions {
                node_id: node,
                text,
            }),
            SessionEvent::Regenerated(Err(err))
            | SessionEvent::Repaired(Err(err))
            | SessionEvent::Relabeled { result: Err(err), .. }
            | SessionEvent::Suggested { result: Err(err), .. } => {
                warn!(error = %err, "text generation failed");
                notices.push(SessionNotice::CollaboratorFailed {
                    message: err.to_string(),
                });
            }
        }
    }

    /// Map a graph id from the current build back to node identity.
    pub fn resolve(&self, graph_id: &str) -> Result<NodeId, SessionError> {
        self.graph
            .index
            .node_for(graph_id)
            .ok_or_else(|| SessionError::StaleGraphId(graph_id.to_string()))
    }

    /// Context summary for the selected node. Kinds with a suggestion prompt
    /// also start a background suggestion request.
    pub fn single_click(&mut self, graph_id: &str) -> Result<String, SessionError> {
        let node_id = self.resolve(graph_id)?;
        let node = self
            .root
            .find(node_id)
            .ok_or_else(|| SessionError::StaleGraphId(graph_id.to_string()))?;

        let summary = prompts::context_summary(node);
        if let Some(prompt) = prompts::suggestions(node) {
            let round_trip = Arc::clone(&self.round_trip);
            self.spawn(move || SessionEvent::Suggested {
                node: node_id,
                result: round_trip.ask(&prompt),
            });
        }
        Ok(summary)
    }

    /// Ask the generator to turn `text` into a label for the node. Returns
    /// `false` when there is nothing to change.
    pub fn double_click(&mut self, graph_id: &str, text: &str) -> Result<bool, SessionError> {
        let node_id = self.resolve(graph_id)?;
        let current = self
            .root
            .find(node_id)
            .map(|n| n.label.as_str())
            .unwrap_or_default();
        if text.trim().is_empty() || text == current {
            return Ok(false);
        }

        let round_trip = Arc::clone(&self.round_trip);
        let text = text.to_string();
        self.spawn(move || SessionEvent::Relabeled {
            node: node_id,
            result: round_trip.relabel(&text),
        });
        Ok(true)
    }

    /// Splice a new construct into the tree and rebuild the graph.
    pub fn drop_construct(
        &mut self,
        target: Option<&str>,
        payload: &str,
        text: &str,
        relation: Option<Relation>,
    ) -> Result<MutationOutcome, SessionError> {
        let target = match target {
            None => DropTarget::Canvas,
            Some(graph_id) => DropTarget::Node(self.resolve(graph_id)?),
        };
        let request = MutationRequest {
            descriptor: NewNodeDescriptor::from_payload(payload, text),
            target,
            relation,
        };

        let outcome = self.mutations.apply(&mut self.root, &request)?;
        self.round_trip.persist(&self.root);
        self.graph = FlowGraph::build(&self.root);

        if self.config.regenerate_on_drop {
            self.request_regeneration();
        }
        Ok(outcome)
    }

    /// Regenerate source text from the interchange document in the background.
    pub fn request_regeneration(&self) {
        let round_trip = Arc::clone(&self.round_trip);
        self.spawn(move || SessionEvent::Regenerated(round_trip.regenerate()));
    }

    pub fn request_repair(&self) {
        let round_trip = Arc::clone(&self.round_trip);
        let source = self.source.clone();
        self.spawn(move || SessionEvent::Repaired(round_trip.repair(&source)));
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() -> SessionEvent + Send + 'static,
    {
        let tx = self.events_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(job());
        });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.debouncer.cancel();
    }
}
