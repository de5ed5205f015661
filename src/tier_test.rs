use super::*;

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    created_at: Option<OffsetDateTime>,
    status: SubscriptionStatus,
}

impl TierAccount for Snapshot {
    fn created_at(&self) -> Option<OffsetDateTime> {
        self.created_at
    }

    fn subscription_status(&self) -> SubscriptionStatus {
        self.status
    }
}

fn account(created_at: Option<OffsetDateTime>, status: SubscriptionStatus) -> Snapshot {
    Snapshot { created_at, status }
}

const ALL_STATUSES: [SubscriptionStatus; 5] = [
    SubscriptionStatus::Active,
    SubscriptionStatus::Trialing,
    SubscriptionStatus::PastDue,
    SubscriptionStatus::Canceled,
    SubscriptionStatus::None,
];

// =============================================================================
// should_enforce_limits
// =============================================================================

#[test]
fn grandfathered_accounts_are_never_capped() {
    let created = datetime!(2024-06-01 12:00:00 UTC);
    for status in ALL_STATUSES {
        assert!(!should_enforce_limits(&account(Some(created), status)), "{status:?}");
    }
}

#[test]
fn new_paying_or_trialing_accounts_are_capped() {
    let created = datetime!(2026-01-15 08:30:00 UTC);
    assert!(should_enforce_limits(&account(Some(created), SubscriptionStatus::Active)));
    assert!(should_enforce_limits(&account(Some(created), SubscriptionStatus::Trialing)));
}

#[test]
fn new_unsubscribed_accounts_are_not_capped() {
    let created = datetime!(2026-01-15 08:30:00 UTC);
    for status in [SubscriptionStatus::Canceled, SubscriptionStatus::PastDue, SubscriptionStatus::None] {
        assert!(!should_enforce_limits(&account(Some(created), status)), "{status:?}");
    }
}

#[test]
fn missing_created_at_fails_open() {
    for status in ALL_STATUSES {
        assert!(!should_enforce_limits(&account(None, status)), "{status:?}");
    }
}

#[test]
fn effective_date_boundary_scenario() {
    let a = account(Some(datetime!(2025-12-23 23:59:59 UTC)), SubscriptionStatus::Active);
    let b = account(Some(datetime!(2025-12-24 00:00:01 UTC)), SubscriptionStatus::Trialing);
    let c = account(Some(datetime!(2025-12-24 00:00:01 UTC)), SubscriptionStatus::Canceled);
    assert!(!should_enforce_limits(&a));
    assert!(should_enforce_limits(&b));
    assert!(!should_enforce_limits(&c));
}

#[test]
fn created_exactly_at_effective_date_is_capped() {
    assert!(should_enforce_limits(&account(Some(EFFECTIVE_DATE), SubscriptionStatus::Active)));
}

#[test]
fn offset_timestamps_compare_by_instant() {
    // 2025-12-23 20:00 at -05:00 is 2025-12-24 01:00 UTC.
    let created = datetime!(2025-12-23 20:00:00 -5);
    assert!(should_enforce_limits(&account(Some(created), SubscriptionStatus::Active)));
}

// =============================================================================
// SubscriptionStatus
// =============================================================================

#[test]
fn subscription_status_parses_db_values() {
    assert_eq!(SubscriptionStatus::from_db(Some("active")), SubscriptionStatus::Active);
    assert_eq!(SubscriptionStatus::from_db(Some("trialing")), SubscriptionStatus::Trialing);
    assert_eq!(SubscriptionStatus::from_db(Some("past_due")), SubscriptionStatus::PastDue);
    assert_eq!(SubscriptionStatus::from_db(Some("canceled")), SubscriptionStatus::Canceled);
    assert_eq!(SubscriptionStatus::from_db(Some("cancelled")), SubscriptionStatus::Canceled);
}

#[test]
fn subscription_status_unknown_or_null_is_none() {
    assert_eq!(SubscriptionStatus::from_db(None), SubscriptionStatus::None);
    assert_eq!(SubscriptionStatus::from_db(Some("")), SubscriptionStatus::None);
    assert_eq!(SubscriptionStatus::from_db(Some("incomplete")), SubscriptionStatus::None);
}

#[test]
fn subscription_status_serialized_form_parses_back() {
    for status in ALL_STATUSES {
        let value = serde_json::to_value(status).unwrap();
        assert_eq!(SubscriptionStatus::from_db(value.as_str()), status);
    }
}

#[test]
fn subscription_status_serializes_snake_case() {
    let json = serde_json::to_string(&SubscriptionStatus::PastDue).unwrap();
    assert_eq!(json, "\"past_due\"");
}

// =============================================================================
// check_limit
// =============================================================================

#[test]
fn check_limit_rejects_at_cap_when_enforced() {
    let acct = account(Some(datetime!(2026-03-01 00:00:00 UTC)), SubscriptionStatus::Active);
    let err = check_limit(&acct, LimitedResource::Portfolios, u64::from(MAX_PORTFOLIOS)).unwrap_err();
    assert_eq!(err, LimitReached { resource: LimitedResource::Portfolios, limit: MAX_PORTFOLIOS });
    assert!(err.to_string().contains("portfolios limit reached"));
}

#[test]
fn check_limit_allows_below_cap() {
    let acct = account(Some(datetime!(2026-03-01 00:00:00 UTC)), SubscriptionStatus::Trialing);
    let below = u64::from(MAX_POSITIONS_PER_PORTFOLIO) - 1;
    assert!(check_limit(&acct, LimitedResource::Positions, below).is_ok());
}

#[test]
fn check_limit_ignores_count_when_not_enforced() {
    let acct = account(Some(datetime!(2026-03-01 00:00:00 UTC)), SubscriptionStatus::Canceled);
    assert!(check_limit(&acct, LimitedResource::WatchlistSymbols, 10_000).is_ok());
}

#[test]
fn limited_resource_exposes_constants() {
    assert_eq!(LimitedResource::Portfolios.limit(), MAX_PORTFOLIOS);
    assert_eq!(LimitedResource::Positions.limit(), MAX_POSITIONS_PER_PORTFOLIO);
    assert_eq!(LimitedResource::WatchlistSymbols.limit(), MAX_WATCHLIST_SYMBOLS);
}
