use chrono::{DateTime, Utc};

use crate::services::billing_period::remaining_days;

/// Plans are priced per 30-day cycle for proration purposes.
pub const DAYS_PER_CYCLE: f64 = 30.0;

/// Differences below R$ 1,00 are not worth a separate charge; the upgrade
/// is applied seamlessly instead.
pub const UPGRADE_CHARGE_THRESHOLD: f64 = 1.00;

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Prorated cost of switching to a more expensive plan mid-cycle: the new
/// plan's daily rate minus the old plan's, over the days already paid for.
/// Zero when the period has already expired.
pub fn upgrade_charge(
    old_price: f64,
    new_price: f64,
    period_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    let days = match period_end {
        Some(end) => remaining_days(end, now),
        None => 0,
    } as f64;
    let credit = (old_price / DAYS_PER_CYCLE) * days;
    let debit = (new_price / DAYS_PER_CYCLE) * days;
    round_cents((debit - credit).max(0.0))
}

/// Converts unused days of the old plan into whole days of the new plan.
/// Floors the result: partial days are forfeited, never rounded up.
pub fn credit_extension_days(old_price: f64, new_price: f64, unused_days: i64) -> i64 {
    if old_price <= 0.0 || new_price <= 0.0 || unused_days <= 0 {
        return 0;
    }
    let credit = unused_days as f64 * (old_price / DAYS_PER_CYCLE);
    let new_daily_rate = new_price / DAYS_PER_CYCLE;
    (credit / new_daily_rate).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::plan::{PLAN_LIGHT_PRICE, PLAN_PRO_PRICE};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn fifteen_day_upgrade_crosses_the_threshold() {
        let charge = upgrade_charge(
            PLAN_LIGHT_PRICE,
            PLAN_PRO_PRICE,
            Some(now() + Duration::days(15)),
            now(),
        );
        // credit 9.95, debit 19.95
        assert_eq!(charge, 10.00);
        assert!(charge >= UPGRADE_CHARGE_THRESHOLD);
    }

    #[test]
    fn one_day_upgrade_is_negligible() {
        let charge = upgrade_charge(
            PLAN_LIGHT_PRICE,
            PLAN_PRO_PRICE,
            Some(now() + Duration::days(1)),
            now(),
        );
        assert_eq!(charge, 0.67);
        assert!(charge < UPGRADE_CHARGE_THRESHOLD);
    }

    #[test]
    fn expired_period_costs_nothing() {
        let charge = upgrade_charge(
            PLAN_LIGHT_PRICE,
            PLAN_PRO_PRICE,
            Some(now() - Duration::days(3)),
            now(),
        );
        assert_eq!(charge, 0.0);
        assert_eq!(upgrade_charge(PLAN_LIGHT_PRICE, PLAN_PRO_PRICE, None, now()), 0.0);
    }

    #[test]
    fn downgrade_never_produces_a_charge() {
        let charge = upgrade_charge(
            PLAN_PRO_PRICE,
            PLAN_LIGHT_PRICE,
            Some(now() + Duration::days(20)),
            now(),
        );
        assert_eq!(charge, 0.0);
    }

    #[test]
    fn credit_extension_floors_partial_days() {
        // 15 unused light days = R$ 9,95 credit = 7.48 pro days -> 7
        assert_eq!(
            credit_extension_days(PLAN_LIGHT_PRICE, PLAN_PRO_PRICE, 15),
            7
        );
        // 10 unused pro days = R$ 13,30 credit = 20.05 light days -> 20
        assert_eq!(
            credit_extension_days(PLAN_PRO_PRICE, PLAN_LIGHT_PRICE, 10),
            20
        );
    }

    #[test]
    fn credit_extension_handles_unpriced_and_expired_inputs() {
        assert_eq!(credit_extension_days(0.0, PLAN_PRO_PRICE, 10), 0);
        assert_eq!(credit_extension_days(PLAN_LIGHT_PRICE, 0.0, 10), 0);
        assert_eq!(credit_extension_days(PLAN_LIGHT_PRICE, PLAN_PRO_PRICE, 0), 0);
    }
}
