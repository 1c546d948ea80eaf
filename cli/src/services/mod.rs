pub mod history_cache;
pub mod market_data;
pub mod portfolio;
pub mod stock_info;
pub mod yahoo;

pub use history_cache::*;
pub use market_data::*;
pub use portfolio::*;
pub use stock_info::*;
pub use yahoo::*;
