//! What happens when a trader reaches the building it was routed to.

use crate::city::City;
use crate::context::Services;
use crate::event::{Event, TradeDirection};
use crate::id::TraderId;
use crate::resource::Resource;
use crate::storage::StorageError;
use crate::trade::{TradeTerms, TraderState};

/// Units moved during one visit, ascending resource order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeReport {
    pub sold: Vec<(Resource, u32)>,
    pub bought: Vec<(Resource, u32)>,
}

impl ExchangeReport {
    pub fn total_sold(&self) -> u32 {
        self.sold.iter().map(|&(_, n)| n).sum()
    }

    pub fn total_bought(&self) -> u32 {
        self.bought.iter().map(|&(_, n)| n).sum()
    }
}

impl City {
    /// Trade at the trader's destination, then queue it for re-routing.
    ///
    /// The trader first sells into the building (bounded by route quota,
    /// its remaining sell capacity and the building's receptible space),
    /// then buys out of it (bounded by quota, buy capacity and stock).
    /// Route counters grow by what was moved. A trader that is not
    /// travelling anywhere trades nothing.
    pub fn trader_arrived(
        &mut self,
        id: TraderId,
        services: &mut Services<'_>,
    ) -> Result<ExchangeReport, StorageError> {
        let trader = self.trader(id)?.clone();
        let TraderState::Travelling { destination, tile } = trader.state else {
            return Ok(ExchangeReport::default());
        };
        let mut terms = TradeTerms::for_trader(&trader, &*services.routes);
        let mut sell_capacity = trader.sell_capacity;
        let mut buy_capacity = trader.buy_capacity;
        let mut report = ExchangeReport::default();

        let permitted = self
            .view(destination)
            .map(|v| !v.building.has_plague && v.record.is_permitted(trader.kind.permission()))?;

        if permitted {
            for r in Resource::goods() {
                if sell_capacity == 0 {
                    break;
                }
                let room = self.view(destination)?.receptible_space(r);
                let wanted = terms.sells(r).min(sell_capacity).min(room);
                if wanted == 0 {
                    continue;
                }
                let sold = self.deposit_into(destination, r, wanted)?;
                if sold == 0 {
                    continue;
                }
                sell_capacity -= sold;
                terms.sell[r.index()] -= sold;
                if let Some(route) = trader.route {
                    services.routes.increase_traded(route, r, sold);
                }
                report.sold.push((r, sold));
            }

            for r in Resource::goods() {
                if buy_capacity == 0 {
                    break;
                }
                if services.economy.is_stockpiled(r) {
                    continue;
                }
                let on_hand = self.view(destination)?.amount(r);
                let wanted = terms.buys(r).min(buy_capacity).min(on_hand);
                if wanted == 0 {
                    continue;
                }
                let bought = self.withdraw_from(destination, r, wanted)?;
                if bought == 0 {
                    continue;
                }
                buy_capacity -= bought;
                terms.buy[r.index()] -= bought;
                if let Some(route) = trader.route {
                    services.routes.increase_traded(route, r, bought);
                }
                report.bought.push((r, bought));
            }
        }

        let tick = self.sim_state.tick;
        let moves = report
            .sold
            .iter()
            .map(|&(r, n)| (r, n, TradeDirection::SoldToCity))
            .chain(
                report
                    .bought
                    .iter()
                    .map(|&(r, n)| (r, n, TradeDirection::BoughtFromCity)),
            )
            .collect::<Vec<_>>();
        for (resource, amount, direction) in moves {
            self.emit(Event::TradeExchanged {
                trader: id,
                building: destination,
                resource,
                amount,
                direction,
                tick,
            });
        }

        let limit = self.config.trade.recently_visited_limit;
        let trader = self
            .traders
            .get_mut(id)
            .ok_or(StorageError::TraderNotFound)?;
        trader.position = tile;
        trader.sell_capacity = sell_capacity;
        trader.buy_capacity = buy_capacity;
        trader.record_visit(destination, limit);
        trader.state = TraderState::AwaitingDestination;
        Ok(report)
    }
}
