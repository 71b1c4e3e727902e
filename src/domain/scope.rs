//! Lexical scope values threaded through synthesis.
//!
//! Every recursive call owns its `Scope`. Opening a block or entering a
//! branch takes an explicit copy, so branches never share a mutable list.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    variables: Vec<String>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy for a nested block or a branch.
    pub fn branch(&self) -> Scope {
        self.clone()
    }

    pub fn declare(&mut self, name: impl Into<String>) {
        self.variables.push(name.into());
    }

    pub fn declare_all<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.declare(name);
        }
    }

    /// Point-in-time copy stored on a node.
    pub fn snapshot(&self) -> Vec<String> {
        self.variables.clone()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_does_not_leak_into_parent() {
        let mut outer = Scope::new();
        outer.declare("a");

        let mut inner = outer.branch();
        inner.declare("b");

        assert!(inner.contains("a"));
        assert!(inner.contains("b"));
        assert!(!outer.contains("b"));
        assert_eq!(outer.snapshot(), vec!["a".to_string()]);
    }
}
