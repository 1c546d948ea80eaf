pub mod divergence;
pub mod portfolio;
pub mod risk;
pub mod sentiment;
pub mod settings;
pub mod stock_data;
pub mod stock_info;

pub use divergence::*;
pub use portfolio::*;
pub use risk::*;
pub use sentiment::*;
pub use settings::*;
pub use stock_data::*;
pub use stock_info::*;
