//! Drives `admf_types::Portfolio` from FILL and BAR, publishing
//! PORTFOLIO_UPDATE after each (§4.6).

use std::cell::RefCell;
use std::rc::Rc;

use admf_types::errors::GbResult;
use admf_types::event::{Event, EventPayload, PortfolioUpdate};
use admf_types::portfolio::Portfolio;

pub type SharedPortfolio = Rc<RefCell<Portfolio>>;

pub struct PortfolioHandler {
    portfolio: SharedPortfolio,
}

impl PortfolioHandler {
    pub fn new(portfolio: SharedPortfolio) -> Self {
        Self { portfolio }
    }

    /// §4.6 FILL handling.
    pub fn on_fill(&mut self, event: &Event) -> GbResult<Vec<Event>> {
        let EventPayload::Fill(fill) = &event.payload else {
            return Ok(vec![]);
        };
        let mut portfolio = self.portfolio.borrow_mut();
        portfolio.apply_fill(fill);
        Ok(vec![Event::portfolio_update(self.snapshot(&portfolio, fill.timestamp))])
    }

    /// §4.6 BAR handling: mark-to-market, sampling the equity curve once per
    /// distinct bar timestamp.
    pub fn on_bar(&mut self, event: &Event) -> GbResult<Vec<Event>> {
        let EventPayload::Bar(bar) = &event.payload else {
            return Ok(vec![]);
        };
        let mut portfolio = self.portfolio.borrow_mut();
        portfolio.mark_to_market(&bar.symbol, bar.close, bar.timestamp);
        Ok(vec![Event::portfolio_update(self.snapshot(&portfolio, bar.timestamp))])
    }

    fn snapshot(&self, portfolio: &Portfolio, timestamp: chrono::DateTime<chrono::Utc>) -> PortfolioUpdate {
        PortfolioUpdate {
            timestamp,
            cash: portfolio.cash,
            equity: portfolio.equity(),
            positions: portfolio.positions.values().cloned().collect(),
            realized_pnl: portfolio.total_realized_pnl(),
        }
    }

    /// Mandatory before every run (§4.7).
    pub fn reset(&mut self) {
        self.portfolio.borrow_mut().reset();
    }
}
