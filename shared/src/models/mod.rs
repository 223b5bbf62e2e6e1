//! Domain models
//!
//! Serde-derived entities shared between the service crate and any
//! embedding application.

mod company;
mod customer;
mod dining_table;
mod sale;
mod service_request;
mod stock;

pub use company::CompanyInfo;
pub use customer::Customer;
pub use dining_table::{DiningTable, TableStatus};
pub use sale::Sale;
pub use service_request::ServiceRequest;
pub use stock::{Recipe, RecipeComponent, StockEntry};
