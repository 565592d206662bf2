use crate::lexicon::{Lexicon, LexiconRef};
use std::collections::HashMap;
use std::sync::Arc;

/// Compilation context.
///
/// Holds the named lexicons that `%name` references resolve against. Every
/// `compile_with` entry point takes one explicitly; `compile` uses an empty
/// registry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    lexicons: HashMap<String, Arc<dyn Lexicon>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_lexicon(mut self, name: impl Into<String>, lexicon: impl Lexicon + 'static) -> Self {
        self.register(name, Arc::new(lexicon));
        self
    }

    pub fn register(&mut self, name: impl Into<String>, lexicon: Arc<dyn Lexicon>) {
        self.lexicons.insert(name.into(), lexicon);
    }

    pub fn lexicon(&self, name: &str) -> Option<LexiconRef> {
        self.lexicons.get(name).map(|lex| LexiconRef::new(name, Arc::clone(lex)))
    }

    pub fn lexicon_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.lexicons.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Options that affect rule execution.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Annotation type that bounds matching (for example `"sentence"`). When
    /// set, triggers are matched inside each annotation of this type, so `^`
    /// anchors to its first token and matches never cross its boundary.
    pub scope: Option<String>,
}

impl Options {
    pub fn scoped(scope: impl Into<String>) -> Self {
        Options { scope: Some(scope.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WordList;

    #[test]
    fn registry_resolves_lexicons_by_name() {
        let registry = Registry::new().with_lexicon("vehicles", WordList::new(["car", "truck"]));
        let lex = registry.lexicon("vehicles").unwrap();
        assert_eq!(lex.name(), "vehicles");
        assert!(lex.contains("Car"));
        assert!(registry.lexicon("people").is_none());
        assert_eq!(registry.lexicon_names(), vec!["vehicles"]);
    }
}
