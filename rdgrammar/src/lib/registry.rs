use std::{collections::HashMap, sync::Arc};

use crate::{DefinitionError, Grammar, NotFoundError};

/// The set of grammars visible to each other by name, e.g. for `import` rules.
///
/// A registry is constructed once by the host and passed explicitly to whatever needs to load
/// or resolve grammars. It provides no internal synchronisation: concurrent registration needs
/// an external lock.
#[derive(Debug, Default)]
pub struct Registry {
    grammars: HashMap<String, Arc<Grammar>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Validate `grammar` and, if it is valid, make it visible under its name. A grammar
    /// previously registered under the same name is replaced. Returns a shared handle to the
    /// newly registered grammar.
    pub fn register(&mut self, grammar: Grammar) -> Result<Arc<Grammar>, DefinitionError> {
        grammar.validate()?;
        let grm = Arc::new(grammar);
        if self
            .grammars
            .insert(grm.name().to_owned(), Arc::clone(&grm))
            .is_some()
        {
            log::debug!("Replaced grammar '{}'", grm.name());
        } else {
            log::debug!(
                "Registered grammar '{}' with {} rules",
                grm.name(),
                grm.rules_len()
            );
        }
        Ok(grm)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Grammar>, NotFoundError> {
        self.grammars.get(name).cloned().ok_or_else(|| NotFoundError {
            name: name.to_owned(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.grammars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.grammars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }
}
