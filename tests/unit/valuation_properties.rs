//! Valuation step properties

use pretty_assertions::assert_eq;
use test_log::test;

use crate::common::test_data::create_test_snapshot;
use dcf_valuator::analysis::valuate;
use dcf_valuator::models::ValuationStatus;

#[test]
fn test_intrinsic_value_tracks_free_cash_flow() {
    let samples = [
        Some(0.0),
        Some(1e-9),
        Some(-42.42),
        Some(123_456_789.987),
        Some(f64::MAX / 100.0),
        None,
    ];

    for fcf in samples {
        let record = valuate(create_test_snapshot("AAPL", fcf, Some(10.0)), true);
        assert_eq!(record.dcf_intrinsic_value(), fcf.map(|v| v * 10.0));
        assert_eq!(record.dcf_intrinsic_value().is_none(), record.free_cash_flow().is_none());
    }
}

#[test]
fn test_status_requires_both_operands() {
    let cases = [
        (Some(100.0), Some(500.0), ValuationStatus::Undervalued),
        (Some(10.0), Some(500.0), ValuationStatus::Overvalued),
        (None, Some(500.0), ValuationStatus::Unknown),
        (Some(10.0), None, ValuationStatus::Unknown),
        (None, None, ValuationStatus::Unknown),
    ];

    for (fcf, price, expected) in cases {
        let record = valuate(create_test_snapshot("AAPL", fcf, price), true);
        assert_eq!(record.valuation_status(), Some(expected), "fcf={:?} price={:?}", fcf, price);
    }
}
