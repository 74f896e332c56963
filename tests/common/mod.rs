//! Common test utilities and helpers

pub mod fixtures;

/// Test data utilities
pub mod test_data {
    use dcf_valuator::analysis::valuate;
    use dcf_valuator::models::{MetricsSnapshot, Ticker, ValuationRecord};

    /// Create a test snapshot
    pub fn create_test_snapshot(
        symbol: &str,
        free_cash_flow: Option<f64>,
        current_price: Option<f64>,
    ) -> MetricsSnapshot {
        MetricsSnapshot {
            ticker: Ticker::parse(symbol).expect("valid test ticker"),
            company_name: format!("{} Test Company", symbol),
            free_cash_flow,
            current_price,
            last_updated: "2024-06-03 09:30:00".to_string(),
        }
    }

    /// Create a valued test record with the status label
    pub fn create_test_record(symbol: &str, free_cash_flow: Option<f64>) -> ValuationRecord {
        valuate(create_test_snapshot(symbol, free_cash_flow, Some(150.0)), true)
    }
}

/// Logging utilities for tests
pub mod logging {
    use std::sync::Once;
    use tracing::{debug, info};

    static INIT: Once = Once::new();

    /// Initialize test logging
    pub fn init_test_logging() {
        INIT.call_once(|| {
            // Another test harness may already have installed a subscriber
            let _ = tracing_subscriber::fmt()
                .with_env_filter("dcf_valuator=debug,test=debug")
                .with_test_writer()
                .try_init();
        });
    }

    /// Log test step
    pub fn log_test_step(step: &str) {
        info!("🧪 Test Step: {}", step);
    }

    /// Log test data
    pub fn log_test_data<T: std::fmt::Debug>(label: &str, data: &T) {
        debug!("📊 {}: {:?}", label, data);
    }
}
