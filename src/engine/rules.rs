use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::models::Side;

/// Signed profit of `price` against `entry`, as a percentage. Positive means
/// the trade direction was right: price above entry for longs, below for
/// shorts. A zero entry yields zero rather than a division error.
pub fn signed_profit_pct(price: Decimal, entry: Decimal, side: Side) -> Decimal {
    if entry.is_zero() {
        return Decimal::ZERO;
    }

    let pct = (price - entry) / entry * Decimal::ONE_HUNDRED;
    match side {
        Side::Long => pct,
        Side::Short => -pct,
    }
}

/// Whether `price` has reached `level` in the profitable direction. A touch
/// counts: the comparison is inclusive on both sides.
pub fn reached(price: Decimal, level: Decimal, side: Side) -> bool {
    match side {
        Side::Long => price >= level,
        Side::Short => price <= level,
    }
}

/// Whether `now` still falls within `days` of `since`, boundary included.
pub fn within_days(now: DateTime<Utc>, since: DateTime<Utc>, days: i64) -> bool {
    now <= since + Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_signed_profit_follows_side() {
        assert_eq!(signed_profit_pct(dec!(110), dec!(100), Side::Long), dec!(10));
        assert_eq!(signed_profit_pct(dec!(90), dec!(100), Side::Long), dec!(-10));
        assert_eq!(signed_profit_pct(dec!(90), dec!(100), Side::Short), dec!(10));
        assert_eq!(
            signed_profit_pct(dec!(110), dec!(100), Side::Short),
            dec!(-10)
        );
    }

    #[test]
    fn test_signed_profit_zero_entry_is_zero() {
        assert_eq!(signed_profit_pct(dec!(50), dec!(0), Side::Long), dec!(0));
    }

    #[test]
    fn test_reached_is_inclusive() {
        assert!(reached(dec!(105), dec!(105), Side::Long));
        assert!(reached(dec!(106), dec!(105), Side::Long));
        assert!(!reached(dec!(104.9), dec!(105), Side::Long));

        assert!(reached(dec!(95), dec!(95), Side::Short));
        assert!(reached(dec!(94), dec!(95), Side::Short));
        assert!(!reached(dec!(95.1), dec!(95), Side::Short));
    }

    #[test]
    fn test_within_days_includes_boundary() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert!(within_days(start + Duration::days(5), start, 5));
        assert!(!within_days(
            start + Duration::days(5) + Duration::seconds(1),
            start,
            5
        ));
    }
}
