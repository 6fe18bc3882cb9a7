use crate::domain::errors::LedgerError;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// An open holding. A position exists in the ledger iff quantity > 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
}

impl Position {
    /// Zero sentinel returned for symbols with no open position.
    fn flat(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity: Decimal::ZERO,
            entry_price: Decimal::ZERO,
        }
    }
}

/// In-memory cash/position ledger with an append-only realized P&L history.
///
/// Lives for the process lifetime only. Every failed call leaves all state
/// unchanged: validation happens before any field is touched.
#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    cash: Decimal,
    positions: HashMap<String, Position>,
    realized: Vec<Decimal>,
}

impl Ledger {
    /// Creates a ledger with the given starting cash. Callers validate that
    /// the amount is non-negative (see `Config::from_env`).
    pub fn new(initial_cash: Decimal) -> Self {
        info!("Ledger initialized with cash {}", initial_cash);
        Self {
            cash: initial_cash,
            positions: HashMap::new(),
            realized: Vec::new(),
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// Current position for `symbol`; zero-quantity sentinel if absent.
    pub fn position(&self, symbol: &str) -> Position {
        self.positions
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Position::flat(symbol))
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    /// Buys `quantity` shares at `price`, debiting cash and merging into any
    /// existing position at the weighted-average entry price.
    pub fn buy(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<(), LedgerError> {
        if quantity <= Decimal::ZERO || price <= Decimal::ZERO {
            return Err(LedgerError::InvalidOrderParameters { quantity, price });
        }
        let cost = quantity * price;
        if cost > self.cash {
            return Err(LedgerError::InsufficientFunds {
                need: cost,
                available: self.cash,
            });
        }

        match self.positions.get_mut(symbol) {
            Some(position) => {
                let new_quantity = position.quantity + quantity;
                position.entry_price = (position.entry_price * position.quantity
                    + price * quantity)
                    / new_quantity;
                position.quantity = new_quantity;
            }
            None => {
                self.positions.insert(
                    symbol.to_string(),
                    Position {
                        symbol: symbol.to_string(),
                        quantity,
                        entry_price: price,
                    },
                );
            }
        }
        self.cash -= cost;
        info!(
            "Bought {} {} at {}, cost {}, cash left {}",
            quantity, symbol, price, cost, self.cash
        );
        Ok(())
    }

    /// Sells `quantity` shares at `price`, crediting cash and appending the
    /// realized P&L `(price - entry) * quantity`. The entry price is not
    /// affected by sells; the position is removed at exactly zero quantity.
    pub fn sell(
        &mut self,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<(), LedgerError> {
        if quantity <= Decimal::ZERO || price <= Decimal::ZERO {
            return Err(LedgerError::InvalidOrderParameters { quantity, price });
        }
        let held = self
            .positions
            .get(symbol)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO);
        if held < quantity {
            return Err(LedgerError::InsufficientShares {
                symbol: symbol.to_string(),
                requested: quantity,
                held,
            });
        }

        // held >= quantity > 0, so the position exists
        let position = self
            .positions
            .get_mut(symbol)
            .expect("position verified to exist by quantity check");
        let profit_loss = (price - position.entry_price) * quantity;
        position.quantity -= quantity;
        if position.quantity == Decimal::ZERO {
            self.positions.remove(symbol);
        }
        self.realized.push(profit_loss);
        self.cash += price * quantity;
        info!(
            "Sold {} {} at {}, P/L {}, cash {}",
            quantity, symbol, price, profit_loss, self.cash
        );
        Ok(())
    }

    /// Total realized P&L over the append-only history.
    pub fn report_realized(&self) -> Decimal {
        self.realized.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ledger() -> Ledger {
        Ledger::new(dec!(100000))
    }

    #[test]
    fn test_buy_opens_position_and_debits_cash() {
        let mut l = ledger();
        l.buy("AAPL", dec!(100), dec!(150)).unwrap();

        assert_eq!(l.cash(), dec!(85000));
        let pos = l.position("AAPL");
        assert_eq!(pos.quantity, dec!(100));
        assert_eq!(pos.entry_price, dec!(150));
    }

    #[test]
    fn test_buy_merges_at_weighted_average_entry() {
        let mut l = ledger();
        l.buy("AAPL", dec!(100), dec!(150)).unwrap();
        l.buy("AAPL", dec!(50), dec!(160)).unwrap();

        let pos = l.position("AAPL");
        assert_eq!(pos.quantity, dec!(150));
        // (150*100 + 160*50) / 150 = 23000/150
        let expected = dec!(23000) / dec!(150);
        assert_eq!(pos.entry_price, expected);
        assert_eq!(l.cash(), dec!(77000)); // 100000 - 15000 - 8000
    }

    #[test]
    fn test_buy_rejects_invalid_parameters() {
        let mut l = ledger();
        assert!(matches!(
            l.buy("AAPL", dec!(-10), dec!(150)),
            Err(LedgerError::InvalidOrderParameters { .. })
        ));
        assert!(matches!(
            l.buy("AAPL", dec!(10), dec!(0)),
            Err(LedgerError::InvalidOrderParameters { .. })
        ));
        assert_eq!(l.cash(), dec!(100000));
        assert!(!l.has_position("AAPL"));
    }

    #[test]
    fn test_buy_insufficient_funds_leaves_state_unchanged() {
        let mut l = ledger();
        let err = l.buy("AAPL", dec!(1000), dec!(150)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                need: dec!(150000),
                available: dec!(100000),
            }
        );
        assert_eq!(l.cash(), dec!(100000));
        assert!(!l.has_position("AAPL"));
    }

    #[test]
    fn test_round_trip_restores_cash_with_zero_realized() {
        let mut l = ledger();
        l.buy("AAPL", dec!(100), dec!(150)).unwrap();
        l.sell("AAPL", dec!(100), dec!(150)).unwrap();

        assert_eq!(l.cash(), dec!(100000));
        assert_eq!(l.report_realized(), dec!(0));
        assert!(!l.has_position("AAPL"));
    }

    #[test]
    fn test_partial_sell_keeps_entry_price() {
        let mut l = ledger();
        l.buy("AAPL", dec!(100), dec!(150)).unwrap();
        l.sell("AAPL", dec!(50), dec!(160)).unwrap();

        assert_eq!(l.cash(), dec!(93000)); // 85000 + 8000
        let pos = l.position("AAPL");
        assert_eq!(pos.quantity, dec!(50));
        assert_eq!(pos.entry_price, dec!(150));
        assert_eq!(l.report_realized(), dec!(500)); // (160-150) * 50
    }

    #[test]
    fn test_sell_more_than_held_is_rejected_without_mutation() {
        let mut l = ledger();
        l.buy("AAPL", dec!(100), dec!(150)).unwrap();
        let cash_before = l.cash();

        let err = l.sell("AAPL", dec!(150), dec!(160)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientShares { .. }));

        let pos = l.position("AAPL");
        assert_eq!(pos.quantity, dec!(100));
        assert_eq!(pos.entry_price, dec!(150));
        assert_eq!(l.cash(), cash_before);
        assert_eq!(l.report_realized(), dec!(0));
    }

    #[test]
    fn test_sell_without_position_is_insufficient_shares() {
        let mut l = ledger();
        let err = l.sell("TSLA", dec!(10), dec!(200)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientShares {
                symbol: "TSLA".to_string(),
                requested: dec!(10),
                held: dec!(0),
            }
        );
    }

    #[test]
    fn test_position_sentinel_for_unknown_symbol() {
        let l = ledger();
        let pos = l.position("NVDA");
        assert_eq!(pos.quantity, dec!(0));
        assert_eq!(pos.entry_price, dec!(0));
        assert!(!l.has_position("NVDA"));
    }

    #[test]
    fn test_realized_history_accumulates_across_trades() {
        let mut l = ledger();
        l.buy("AAPL", dec!(100), dec!(150)).unwrap();
        l.sell("AAPL", dec!(50), dec!(160)).unwrap(); // +500
        l.sell("AAPL", dec!(50), dec!(140)).unwrap(); // -500
        assert_eq!(l.report_realized(), dec!(0));
        assert!(!l.has_position("AAPL"));
    }
}
