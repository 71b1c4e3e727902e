//! Round-trip Coordinator
//!
//! Persists the current tree as the interchange document and asks the text
//! generator for source text. Generation failures come back as errors and
//! never touch the in-memory tree.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::node::Node;
use crate::domain::prompts;
use crate::error::GenerationError;
use crate::infrastructure::interchange::InterchangeStore;
use crate::infrastructure::text_generator::strip_code_fences;
use crate::ports::TextGenerator;

pub struct RoundTripCoordinator {
    store: InterchangeStore,
    generator: Arc<dyn TextGenerator>,
}

impl RoundTripCoordinator {
    pub fn new(store: InterchangeStore, generator: Arc<dyn TextGenerator>) -> Self {
        RoundTripCoordinator { store, generator }
    }

    /// Write the interchange document. Failures are logged and suppressed;
    /// the in-memory tree stays authoritative.
    pub fn persist(&self, root: &Node) -> bool {
        match self.store.write(root) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "could not persist interchange document");
                false
            }
        }
    }

    /// Regenerate source text from the persisted document, not the live tree.
    pub fn regenerate(&self) -> Result<String, GenerationError> {
        let document = self.store.read_document()?;
        let generated = self.generator.generate(&prompts::regenerate(&document))?;
        let source = strip_code_fences(&generated);
        info!(chars = source.len(), "regenerated source text");
        Ok(source)
    }

    /// A blank reply is an error, never an empty label.
    pub fn relabel(&self, user_text: &str) -> Result<String, GenerationError> {
        let reply = self.generator.generate(&prompts::relabel(user_text))?;
        let label = strip_code_fences(&reply);
        if label.is_empty() {
            return Err(GenerationError::Malformed("empty label".to_string()));
        }
        Ok(label)
    }

    pub fn repair(&self, source: &str) -> Result<String, GenerationError> {
        let fixed = self.generator.generate(&prompts::repair(source))?;
        Ok(strip_code_fences(&fixed))
    }

    /// Free-form request, used for suggestions.
    pub fn ask(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generator.generate(prompt).map(|text| text.trim().to_string())
    }
}
