use std::sync::Arc;

use probe_types::Deal;

use crate::strategy::RetrievalStrategy;

/// Priority-ordered list of registered strategies, per §9's note that
/// "strategies are registered at startup into a priority-ordered list."
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn RetrievalStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, strategy: Arc<dyn RetrievalStrategy>) {
        self.strategies.push(strategy);
    }

    /// All strategies that can run against `deal`, sorted by priority asc,
    /// per §4.4: "Ask C4 for all applicable strategies, sorted by priority
    /// asc."
    pub fn applicable_for(&self, deal: &Deal) -> Vec<Arc<dyn RetrievalStrategy>> {
        let mut applicable: Vec<Arc<dyn RetrievalStrategy>> = self
            .strategies
            .iter()
            .filter(|s| s.can_handle(deal))
            .cloned()
            .collect();
        applicable.sort_by_key(|s| s.priority());
        applicable
    }
}
