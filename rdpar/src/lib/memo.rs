use std::collections::HashMap;

use crate::{ast::Token, matchtree::Producer};

/// Which match outcomes a parse remembers, so that backtracking over the same input does not
/// repeat work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoPolicy {
    /// Remember nothing.
    Disabled,
    /// Remember the outcome of each token rule at each position it is tried. Composite rules are
    /// always re-evaluated.
    Terminals,
}

/// The per-parse cache of token outcomes, keyed by input position and token rule. A cached
/// `None` records that the token did not match.
pub(crate) struct Memo {
    policy: MemoPolicy,
    cache: HashMap<(usize, Producer), Option<Token>>,
}

impl Memo {
    pub(crate) fn new(policy: MemoPolicy) -> Self {
        Memo {
            policy,
            cache: HashMap::new(),
        }
    }

    pub(crate) fn get(&self, pos: usize, prod: Producer) -> Option<&Option<Token>> {
        match self.policy {
            MemoPolicy::Disabled => None,
            MemoPolicy::Terminals => self.cache.get(&(pos, prod)),
        }
    }

    pub(crate) fn store(&mut self, pos: usize, prod: Producer, outcome: Option<Token>) {
        if self.policy == MemoPolicy::Terminals {
            self.cache.insert((pos, prod), outcome);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod test {
    use rdgrammar::{RIdx, Span};

    use super::{Memo, MemoPolicy};
    use crate::{ast::Token, matchtree::Producer};

    #[test]
    fn policies() {
        let p = Producer {
            grm: 0,
            ridx: RIdx(3),
        };
        let t = Token::new("x", Span::new(0, 1), (1, 1), "X", false);

        let mut m = Memo::new(MemoPolicy::Disabled);
        m.store(0, p, Some(t.clone()));
        assert_eq!(m.get(0, p), None);
        assert_eq!(m.len(), 0);

        let mut m = Memo::new(MemoPolicy::Terminals);
        m.store(0, p, Some(t.clone()));
        m.store(1, p, None);
        assert_eq!(m.get(0, p), Some(&Some(t)));
        assert_eq!(m.get(1, p), Some(&None));
        assert_eq!(m.get(2, p), None);
    }
}
