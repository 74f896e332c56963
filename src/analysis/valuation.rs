// Simplified DCF valuation
// Intrinsic value is a flat multiple of average free cash flow, not a discounted projection.

use tracing::warn;

use crate::models::{MetricsSnapshot, ValuationRecord, ValuationStatus, DCF_MULTIPLIER};

/// Placeholder intrinsic value: `free_cash_flow * 10`. `None` unless the result is finite.
pub fn dcf_intrinsic_value(free_cash_flow: Option<f64>) -> Option<f64> {
    free_cash_flow
        .map(|fcf| fcf * DCF_MULTIPLIER)
        .filter(|value| value.is_finite())
}

/// Compare intrinsic value to market price. Either side missing gives `Unknown`.
pub fn classify(intrinsic_value: Option<f64>, current_price: Option<f64>) -> ValuationStatus {
    match (intrinsic_value, current_price) {
        (Some(value), Some(price)) if value > price => ValuationStatus::Undervalued,
        (Some(_), Some(_)) => ValuationStatus::Overvalued,
        _ => ValuationStatus::Unknown,
    }
}

/// Turn a metrics snapshot into a persistable record
pub fn valuate(snapshot: MetricsSnapshot, include_status: bool) -> ValuationRecord {
    let dcf_intrinsic_value = dcf_intrinsic_value(snapshot.free_cash_flow);

    // Free cash flow and intrinsic value are either both recorded or both missing
    let free_cash_flow = match (snapshot.free_cash_flow, dcf_intrinsic_value) {
        (Some(fcf), None) => {
            warn!(
                "Free cash flow {} for {} is out of range; recording it as missing",
                fcf, snapshot.ticker
            );
            None
        }
        (fcf, _) => fcf,
    };

    let valuation_status =
        include_status.then(|| classify(dcf_intrinsic_value, snapshot.current_price));

    ValuationRecord {
        ticker: snapshot.ticker,
        company_name: snapshot.company_name,
        free_cash_flow,
        current_price: snapshot.current_price,
        dcf_intrinsic_value,
        valuation_status,
        last_updated: snapshot.last_updated,
    }
}
