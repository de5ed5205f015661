use super::*;
use crate::clock::ManualClock;

fn throttle_with_clock() -> (Throttle, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (Throttle::new(clock.clone()), clock)
}

// =============================================================================
// check
// =============================================================================

#[test]
fn allows_up_to_limit_then_denies() {
    let (throttle, _clock) = throttle_with_clock();
    let config = ThrottleConfig::new(4, 60);

    for i in 0..4 {
        assert!(throttle.check("k", config).allowed, "request {i} should be allowed");
    }
    let denied = throttle.check("k", config);
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 0);
}

#[test]
fn login_scenario_counts_down_and_recovers() {
    let (throttle, clock) = throttle_with_clock();
    let config = ThrottleConfig::new(3, 60);
    let key = "login:1.2.3.4";

    let remaining: Vec<u32> = (0..3)
        .map(|_| {
            let d = throttle.check(key, config);
            assert!(d.allowed);
            d.remaining
        })
        .collect();
    assert_eq!(remaining, vec![2, 1, 0]);

    let fourth = throttle.check(key, config);
    assert!(!fourth.allowed);
    assert_eq!(fourth.remaining, 0);

    clock.advance(Duration::from_secs(61));
    let fifth = throttle.check(key, config);
    assert!(fifth.allowed);
    assert_eq!(fifth.remaining, 2);
    assert_eq!(fifth.reset_in_secs, 60);
}

#[test]
fn first_check_reports_full_window() {
    let (throttle, _clock) = throttle_with_clock();
    let d = throttle.check("k", ThrottleConfig::new(10, 45));
    assert_eq!(d, ThrottleDecision { allowed: true, remaining: 9, reset_in_secs: 45 });
}

#[test]
fn reset_in_secs_rounds_up_partial_seconds() {
    let (throttle, clock) = throttle_with_clock();
    let config = ThrottleConfig::new(5, 60);
    throttle.check("k", config);

    clock.advance(Duration::from_millis(10_200));
    let d = throttle.check("k", config);
    assert!(d.allowed);
    assert_eq!(d.reset_in_secs, 50);
}

#[test]
fn denied_attempts_do_not_extend_window() {
    let (throttle, clock) = throttle_with_clock();
    let config = ThrottleConfig::new(1, 60);
    assert!(throttle.check("k", config).allowed);

    clock.advance(Duration::from_secs(30));
    let denied = throttle.check("k", config);
    assert!(!denied.allowed);
    assert_eq!(denied.reset_in_secs, 30);

    clock.advance(Duration::from_secs(20));
    let denied = throttle.check("k", config);
    assert_eq!(denied.reset_in_secs, 10);

    clock.advance(Duration::from_secs(11));
    assert!(throttle.check("k", config).allowed);
}

#[test]
fn window_boundary_is_inclusive() {
    let (throttle, clock) = throttle_with_clock();
    let config = ThrottleConfig::new(1, 60);
    assert!(throttle.check("k", config).allowed);

    clock.advance(Duration::from_secs(60));
    let at_boundary = throttle.check("k", config);
    assert!(!at_boundary.allowed);
    assert_eq!(at_boundary.reset_in_secs, 0);

    clock.advance(Duration::from_millis(1));
    assert!(throttle.check("k", config).allowed);
}

#[test]
fn remaining_strictly_decreases_within_window() {
    let (throttle, _clock) = throttle_with_clock();
    let config = ThrottleConfig::API;
    let mut last = u32::MAX;
    for _ in 0..config.max_requests() {
        let d = throttle.check("api:10.0.0.1", config);
        assert!(d.allowed);
        assert_eq!(d.remaining + 1, last.min(config.max_requests()));
        last = d.remaining;
    }
    assert_eq!(last, 0);
    assert!(!throttle.check("api:10.0.0.1", config).allowed);
}

#[test]
fn distinct_keys_do_not_interfere() {
    let (throttle, _clock) = throttle_with_clock();
    let config = ThrottleConfig::REGISTRATION;

    for _ in 0..config.max_requests() {
        throttle.check("register:a", config);
    }
    assert!(!throttle.check("register:a", config).allowed);

    let other = throttle.check("register:b", config);
    assert!(other.allowed);
    assert_eq!(other.remaining, config.max_requests() - 1);
}

#[test]
fn recovery_ignores_prior_rejections() {
    let (throttle, clock) = throttle_with_clock();
    let config = ThrottleConfig::new(2, 10);
    for _ in 0..10 {
        throttle.check("k", config);
    }
    clock.advance(Duration::from_secs(11));
    let d = throttle.check("k", config);
    assert!(d.allowed);
    assert_eq!(d.remaining, 1);
}

#[test]
fn clones_share_state() {
    let (throttle, _clock) = throttle_with_clock();
    let other = throttle.clone();
    let config = ThrottleConfig::new(1, 60);
    assert!(throttle.check("k", config).allowed);
    assert!(!other.check("k", config).allowed);
}

#[test]
fn concurrent_checks_never_over_admit() {
    let (throttle, _clock) = throttle_with_clock();
    let config = ThrottleConfig::new(25, 60);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let throttle = throttle.clone();
            std::thread::spawn(move || (0..20).filter(|_| throttle.check("shared", config).allowed).count())
        })
        .collect();

    let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(admitted, 25);
}

// =============================================================================
// config
// =============================================================================

#[test]
fn presets_match_protected_operations() {
    assert_eq!(ThrottleConfig::LOGIN.max_requests(), 5);
    assert_eq!(ThrottleConfig::REGISTRATION.max_requests(), 3);
    assert_eq!(ThrottleConfig::PASSWORD_RESET.max_requests(), 3);
    assert_eq!(ThrottleConfig::API.max_requests(), 100);
    for preset in [
        ThrottleConfig::LOGIN,
        ThrottleConfig::REGISTRATION,
        ThrottleConfig::PASSWORD_RESET,
        ThrottleConfig::API,
    ] {
        assert_eq!(preset.window(), Duration::from_secs(60));
    }
}

#[test]
#[should_panic(expected = "max_requests must be positive")]
fn zero_max_requests_panics() {
    let _ = ThrottleConfig::new(0, 60);
}

#[test]
#[should_panic(expected = "window_secs must be positive")]
fn zero_window_panics() {
    let _ = ThrottleConfig::new(5, 0);
}

// =============================================================================
// sweep
// =============================================================================

#[test]
fn sweep_removes_only_expired_entries() {
    let (throttle, clock) = throttle_with_clock();
    throttle.check("short", ThrottleConfig::new(5, 10));
    throttle.check("long", ThrottleConfig::new(5, 120));
    assert_eq!(throttle.len(), 2);

    clock.advance(Duration::from_secs(11));
    assert_eq!(throttle.sweep(), 1);
    assert_eq!(throttle.len(), 1);

    let d = throttle.check("long", ThrottleConfig::new(5, 120));
    assert_eq!(d.remaining, 3, "live key keeps its count across a sweep");
}

#[test]
fn sweep_on_empty_map_is_noop() {
    let (throttle, _clock) = throttle_with_clock();
    assert_eq!(throttle.sweep(), 0);
    assert!(throttle.is_empty());
}

#[test]
fn expired_entry_is_treated_as_absent_before_sweep() {
    let (throttle, clock) = throttle_with_clock();
    let config = ThrottleConfig::new(1, 5);
    throttle.check("k", config);
    clock.advance(Duration::from_secs(6));
    assert_eq!(throttle.len(), 1);
    assert!(throttle.check("k", config).allowed);
    assert_eq!(throttle.sweep(), 0);
}

#[tokio::test(start_paused = true)]
async fn sweeper_task_evicts_expired_windows() {
    let (throttle, clock) = throttle_with_clock();
    throttle.check("reset-password:9.9.9.9", ThrottleConfig::PASSWORD_RESET);
    let sweeper = throttle.spawn_sweeper(Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS));

    clock.advance(Duration::from_secs(61));
    tokio::time::advance(Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS + 1)).await;
    for _ in 0..10 {
        if throttle.is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(throttle.is_empty());

    sweeper.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn sweeper_shutdown_stops_task() {
    let (throttle, clock) = throttle_with_clock();
    let sweeper = throttle.spawn_sweeper(Duration::from_secs(1));
    sweeper.shutdown().await;

    throttle.check("k", ThrottleConfig::new(1, 1));
    clock.advance(Duration::from_secs(5));
    tokio::time::advance(Duration::from_secs(10)).await;
    tokio::task::yield_now().await;
    assert_eq!(throttle.len(), 1, "no sweeps after shutdown");
}
