//! Order intake: typed order requests, immutable order records, and the
//! validator that turns a request into a reconcilable intent.
//!
//! Nothing in this crate mutates stock.

pub mod record;
pub mod request;
pub mod validator;

pub use record::{LineOutcome, LineStatus, OrderRecord, OrderStatus, RejectReason};
pub use request::{LineItem, OrderRequest, OrderSource};
pub use validator::{IntentLine, OrderValidator, ValidatedIntent, MAX_REQUESTER_LEN};
