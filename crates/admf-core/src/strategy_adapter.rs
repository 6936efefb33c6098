//! Bridges a `Strategy` trait object to the bus (§4.3).

use admf_types::event::{rule_id, time_bucket, Event, Signal};
use admf_types::errors::GbResult;
use admf_types::orders::Side;
use admf_types::strategy::{Direction, Strategy};

pub struct StrategyAdapter {
    strategy: Box<dyn Strategy>,
}

impl StrategyAdapter {
    pub fn new(strategy: Box<dyn Strategy>) -> Self {
        Self { strategy }
    }

    /// Invoked by the Bus on BAR. Returns a SIGNAL event only when the
    /// strategy has a non-zero opinion — a flat opinion never gets a
    /// rule_id, since `dir_label` is only defined for BUY/SELL (§4.3).
    pub fn on_bar(&mut self, event: &Event) -> GbResult<Vec<Event>> {
        let admf_types::event::EventPayload::Bar(bar) = &event.payload else {
            return Ok(vec![]);
        };

        let direction = self.strategy.on_bar(bar);
        let Some(side) = side_for(direction) else {
            return Ok(vec![]);
        };

        let bucket = time_bucket(bar.timestamp);
        let id = rule_id(self.strategy.name(), &bar.symbol, side, &bucket);

        let signal = Signal {
            symbol: bar.symbol.clone(),
            direction: direction.sign(),
            price: bar.close,
            timestamp: bar.timestamp,
            rule_id: id,
        };
        Ok(vec![Event::signal(signal)])
    }

    /// Mandatory before every run (§4.7).
    pub fn reset(&mut self) {
        self.strategy.reset();
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }
}

fn side_for(direction: Direction) -> Option<Side> {
    match direction {
        Direction::Buy => Some(Side::Buy),
        Direction::Sell => Some(Side::Sell),
        Direction::Flat => None,
    }
}
