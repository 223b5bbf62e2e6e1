//! Order line types shared by draft and bill

mod types;

pub use types::{LineInput, LineKind, OrderLine, PaidItem};
