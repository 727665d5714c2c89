use std::sync::Arc;

use crate::history::HistoryService;
use crate::valuation::PortfolioService;

/// Shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub portfolio: Arc<PortfolioService>,
    pub history: Arc<HistoryService>,
}

impl From<(Arc<PortfolioService>, Arc<HistoryService>)> for AppState {
    fn from((portfolio, history): (Arc<PortfolioService>, Arc<HistoryService>)) -> Self {
        Self { portfolio, history }
    }
}
