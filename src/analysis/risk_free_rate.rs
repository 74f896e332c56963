use tracing::{error, info};

use crate::api::MacroDataProvider;

/// Rate used whenever the provider cannot be reached
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.04;

/// FRED series: 10-Year Treasury constant maturity, percent
pub const TEN_YEAR_TREASURY_SERIES: &str = "DGS10";

/// Current risk-free rate as a fraction. Never fails.
pub async fn current_risk_free_rate(provider: &dyn MacroDataProvider) -> f64 {
    match provider.get_latest_observation(TEN_YEAR_TREASURY_SERIES).await {
        Ok(percent) if percent.is_finite() => {
            let rate = percent / 100.0;
            info!("📈 Risk-free rate ({}): {:.4}", TEN_YEAR_TREASURY_SERIES, rate);
            rate
        }
        Ok(percent) => {
            error!(
                "Error fetching risk-free rate from FRED: non-finite value {}",
                percent
            );
            DEFAULT_RISK_FREE_RATE
        }
        Err(e) => {
            error!("Error fetching risk-free rate from FRED: {}", e);
            DEFAULT_RISK_FREE_RATE
        }
    }
}
