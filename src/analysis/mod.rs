pub mod risk_free_rate;
pub mod valuation;

pub use risk_free_rate::*;
pub use valuation::*;
