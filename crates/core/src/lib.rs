pub mod error;
pub mod traits;
pub mod types;

pub use error::{ExchangeError, Result, ValidationError};
pub use traits::ExchangeCapability;
pub use types::{
    Action, EventKey, Fill, LedgerEvent, OrderReceipt, OrderRequest, Outcome, Quote, Settlement,
    Side,
};
