use rust_decimal::Decimal;
use thiserror::Error;

/// Caller-visible ledger failures. Every variant aborts the specific call
/// without partial mutation of ledger state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid order parameters: quantity {quantity}, price {price}")]
    InvalidOrderParameters { quantity: Decimal, price: Decimal },

    #[error("insufficient funds: need ${need}, available ${available}")]
    InsufficientFunds { need: Decimal, available: Decimal },

    #[error("insufficient shares of {symbol}: requested {requested}, held {held}")]
    InsufficientShares {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },
}
