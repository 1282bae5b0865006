//! Integration tests for the health probe engine.
//!
//! Tests cover:
//! - Aggregation of mixed probe outcomes
//! - Result coverage and ordering when probes error, panic or hang
//! - Retry with exponential backoff under a paused clock
//! - Batch timeout and cancellation placeholders
//! - Admission decisions (continue-on-failure, critical services, failure rate)
//! - Circuit breakers persisting across passes

use ignite_core::config::{CircuitBreakerConfig, Environment, HealthCheckConfiguration};
use ignite_core::error::{IgniteError, Result};
use ignite_core::health::{
    FnProbe, HealthCheckResult, HealthProbe, HealthProbeEngine, HealthReportState, HealthStatus,
    HEALTH_CHECK_SYSTEM,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Helpers
// ============================================================================

fn engine(config: HealthCheckConfiguration) -> HealthProbeEngine {
    HealthProbeEngine::new(config, Environment::Development, HealthReportState::new())
}

fn no_retry() -> HealthCheckConfiguration {
    HealthCheckConfiguration {
        max_retries: 0,
        ..Default::default()
    }
}

/// A probe that sleeps for `latency` and then reports `status`.
fn timed_probe(name: &'static str, status: HealthStatus, latency: Duration) -> Arc<dyn HealthProbe> {
    Arc::new(FnProbe::new(name, move || async move {
        tokio::time::sleep(latency).await;
        Ok(HealthCheckResult::new(name, status))
    }))
}

fn failing_probe(name: &'static str) -> Arc<dyn HealthProbe> {
    Arc::new(FnProbe::new(name, move || async move {
        Err(IgniteError::probe_failed(name, "connection refused"))
    }))
}

fn explode() -> Result<HealthCheckResult> {
    panic!("probe exploded")
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_mixed_outcomes_are_unhealthy() {
    let engine = engine(no_retry());
    let probes = vec![
        timed_probe("DB", HealthStatus::Healthy, Duration::from_millis(50)),
        timed_probe("Cache", HealthStatus::Degraded, Duration::from_millis(20)),
        timed_probe("Auth", HealthStatus::Unhealthy, Duration::from_millis(10)),
    ];

    let report = engine.run_all(&probes).await;

    assert_eq!(report.overall_status, HealthStatus::Unhealthy);
    assert_eq!(report.results.len(), 3);
    assert_eq!(report.summary.healthy, 1);
    assert_eq!(report.summary.degraded, 1);
    assert_eq!(report.summary.unhealthy, 1);
}

#[tokio::test(start_paused = true)]
async fn test_all_healthy_is_healthy() {
    let engine = engine(no_retry());
    let probes = vec![
        timed_probe("a", HealthStatus::Healthy, Duration::from_millis(5)),
        timed_probe("b", HealthStatus::Healthy, Duration::from_millis(15)),
    ];

    let report = engine.run_all(&probes).await;
    assert_eq!(report.overall_status, HealthStatus::Healthy);
    assert!(report.failure_summary().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_single_degraded_is_degraded() {
    let engine = engine(no_retry());
    let probes = vec![
        timed_probe("a", HealthStatus::Healthy, Duration::from_millis(5)),
        timed_probe("b", HealthStatus::Degraded, Duration::from_millis(5)),
        timed_probe("c", HealthStatus::Healthy, Duration::from_millis(5)),
    ];

    let report = engine.run_all(&probes).await;
    assert_eq!(report.overall_status, HealthStatus::Degraded);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_counts_as_degraded_overall() {
    let engine = engine(no_retry());
    let probes = vec![
        timed_probe("a", HealthStatus::Healthy, Duration::from_millis(5)),
        timed_probe("b", HealthStatus::Unavailable, Duration::from_millis(5)),
    ];

    let report = engine.run_all(&probes).await;
    assert_eq!(report.overall_status, HealthStatus::Degraded);
    assert_eq!(report.get("b").unwrap().status, HealthStatus::Unavailable);
}

// ============================================================================
// Coverage and Ordering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_results_follow_registration_order() {
    let engine = engine(no_retry());
    let probes = vec![
        timed_probe("slowest", HealthStatus::Healthy, Duration::from_millis(300)),
        timed_probe("fast", HealthStatus::Healthy, Duration::from_millis(1)),
        timed_probe("middle", HealthStatus::Healthy, Duration::from_millis(100)),
    ];

    let report = engine.run_all(&probes).await;
    let names: Vec<_> = report.results.iter().map(|r| r.service_name.as_str()).collect();
    assert_eq!(names, vec!["slowest", "fast", "middle"]);
}

#[tokio::test(start_paused = true)]
async fn test_every_probe_reported_once_despite_failures() {
    let config = HealthCheckConfiguration {
        max_retries: 0,
        default_timeout: Duration::from_secs(2),
        continue_on_failure: true,
        ..Default::default()
    };
    let engine = engine(config);
    let probes: Vec<Arc<dyn HealthProbe>> = vec![
        timed_probe("ok", HealthStatus::Healthy, Duration::from_millis(5)),
        failing_probe("errors"),
        Arc::new(FnProbe::new("panics", || async { explode() })),
        timed_probe("hangs", HealthStatus::Healthy, Duration::from_secs(3600)),
    ];

    let report = engine.run_all(&probes).await;

    assert_eq!(report.results.len(), probes.len());
    for probe in &probes {
        let matching = report
            .results
            .iter()
            .filter(|r| r.service_name == probe.name())
            .count();
        assert_eq!(matching, 1, "probe {} reported {} times", probe.name(), matching);
    }

    assert_eq!(report.get("ok").unwrap().status, HealthStatus::Healthy);

    let errored = report.get("errors").unwrap();
    assert_eq!(errored.status, HealthStatus::Unhealthy);
    assert!(errored.error.as_deref().unwrap().contains("connection refused"));

    assert_eq!(report.get("panics").unwrap().status, HealthStatus::Unhealthy);

    let hung = report.get("hangs").unwrap();
    assert_eq!(hung.status, HealthStatus::Unhealthy);
    assert!(hung.timed_out);
    assert!(hung.description.contains("timed out"));

    assert!(report.get(HEALTH_CHECK_SYSTEM).is_none());
}

// ============================================================================
// Retry and Timeout
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_on_third_attempt() {
    let config = HealthCheckConfiguration {
        max_retries: 2,
        retry_delay: Duration::from_millis(100),
        ..Default::default()
    };
    let engine = engine(config);

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let probes: Vec<Arc<dyn HealthProbe>> = vec![Arc::new(FnProbe::new("flaky", move || {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(HealthCheckResult::unhealthy("flaky").with_error("not ready"))
            } else {
                Ok(HealthCheckResult::healthy("flaky"))
            }
        }
    }))];

    let start = Instant::now();
    let report = engine.run_all(&probes).await;
    let elapsed = start.elapsed();

    let result = report.get("flaky").unwrap();
    assert_eq!(result.status, HealthStatus::Healthy);
    assert_eq!(result.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // 100ms after the first attempt, 200ms after the second.
    assert!(elapsed >= Duration::from_millis(300), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(400), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_hung_probe_does_not_block_batch() {
    let config = HealthCheckConfiguration {
        max_retries: 0,
        default_timeout: Duration::from_secs(1),
        continue_on_failure: true,
        ..Default::default()
    };
    let engine = engine(config);

    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();
    let probes: Vec<Arc<dyn HealthProbe>> = vec![
        timed_probe("fast", HealthStatus::Healthy, Duration::from_millis(10)),
        Arc::new(
            FnProbe::new("stuck", move || {
                let flag = flag.clone();
                async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(HealthCheckResult::healthy("stuck"))
                }
            })
            .with_timeout(Duration::from_secs(60)),
        ),
    ];

    let start = Instant::now();
    let report = engine.run_all(&probes).await;
    let elapsed = start.elapsed();

    assert!(elapsed <= Duration::from_millis(1010), "elapsed {:?}", elapsed);
    assert!(report.get("stuck").unwrap().timed_out);
    assert_eq!(report.get("fast").unwrap().status, HealthStatus::Healthy);

    // The abandoned probe keeps running to completion in the background.
    assert!(!finished.load(Ordering::SeqCst));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_fills_placeholders() {
    let engine = engine(no_retry());
    let probes = vec![
        timed_probe("fast", HealthStatus::Healthy, Duration::from_millis(10)),
        timed_probe("slow", HealthStatus::Healthy, Duration::from_secs(20)),
    ];

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = engine.run_all_with_cancel(&probes, &cancel).await;
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.get("fast").unwrap().status, HealthStatus::Healthy);

    let slow = report.get("slow").unwrap();
    assert_eq!(slow.status, HealthStatus::Unhealthy);
    assert!(slow.description.contains("cancelled"));
    assert_eq!(slow.attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_skipped_services_not_scheduled() {
    let config = HealthCheckConfiguration {
        skip_services: ["Legacy".to_string()].into(),
        ..no_retry()
    };
    let engine = engine(config);

    let called = Arc::new(AtomicBool::new(false));
    let flag = called.clone();
    let probes: Vec<Arc<dyn HealthProbe>> = vec![
        timed_probe("DB", HealthStatus::Healthy, Duration::from_millis(5)),
        Arc::new(FnProbe::new("Legacy", move || {
            flag.store(true, Ordering::SeqCst);
            async { Ok(HealthCheckResult::unhealthy("Legacy")) }
        })),
    ];

    let report = engine.run_all(&probes).await;
    assert_eq!(report.results.len(), 1);
    assert!(report.get("Legacy").is_none());
    assert!(!called.load(Ordering::SeqCst));
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_continue_on_failure_admits_unhealthy() {
    let config = HealthCheckConfiguration {
        continue_on_failure: true,
        ..no_retry()
    };
    let engine = HealthProbeEngine::new(config, Environment::Production, HealthReportState::new());
    let probes = vec![timed_probe("X", HealthStatus::Unhealthy, Duration::from_millis(5))];

    let report = engine.run_all(&probes).await;
    assert_eq!(report.overall_status, HealthStatus::Unhealthy);
    assert!(engine.can_start(&report));
}

#[tokio::test(start_paused = true)]
async fn test_critical_failure_blocks_production() {
    let config = HealthCheckConfiguration {
        critical_services: ["Database".to_string()].into(),
        ..no_retry()
    };
    let probes = vec![
        timed_probe("Database", HealthStatus::Unhealthy, Duration::from_millis(5)),
        timed_probe("Cache", HealthStatus::Healthy, Duration::from_millis(5)),
        timed_probe("Search", HealthStatus::Healthy, Duration::from_millis(5)),
    ];

    let production =
        HealthProbeEngine::new(config.clone(), Environment::Production, HealthReportState::new());
    let report = production.run_all(&probes).await;
    assert!(!production.can_start(&report));

    let staging = HealthProbeEngine::new(config, Environment::Staging, HealthReportState::new());
    let report = staging.run_all(&probes).await;
    assert!(staging.can_start(&report));
}

#[tokio::test(start_paused = true)]
async fn test_failure_rate_blocks_start() {
    let engine = engine(no_retry());
    let probes = vec![
        timed_probe("a", HealthStatus::Unhealthy, Duration::from_millis(5)),
        timed_probe("b", HealthStatus::Unavailable, Duration::from_millis(5)),
        timed_probe("c", HealthStatus::Healthy, Duration::from_millis(5)),
    ];

    let report = engine.run_all(&probes).await;
    let decision = engine.admission(&report);
    assert!(!decision.allowed);
    assert!(decision.reason.contains("67%"));
}

// ============================================================================
// Publication and Circuit Breakers
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_report_published_to_shared_state() {
    let state = HealthReportState::new();
    let engine = HealthProbeEngine::new(no_retry(), Environment::Development, state.clone());
    let probes = vec![timed_probe("DB", HealthStatus::Healthy, Duration::from_millis(5))];

    assert!(state.current().is_none());
    let report = engine.run_all(&probes).await;

    let published = state.current().unwrap();
    assert_eq!(published.timestamp, report.timestamp);
    assert_eq!(published.results.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_skips_dead_service_on_later_passes() {
    let config = HealthCheckConfiguration {
        max_retries: 1,
        retry_delay: Duration::from_millis(10),
        continue_on_failure: true,
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_secs(30),
        },
        ..Default::default()
    };
    let engine = engine(config);

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let probes: Vec<Arc<dyn HealthProbe>> = vec![Arc::new(FnProbe::new("Billing", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Err(IgniteError::probe_failed("Billing", "503")) }
    }))];

    // Each pass spends its retries and counts once against the breaker.
    let first = engine.run_all(&probes).await;
    assert_eq!(first.get("Billing").unwrap().status, HealthStatus::Unhealthy);
    assert_eq!(first.get("Billing").unwrap().attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let second = engine.run_all(&probes).await;
    assert_eq!(second.get("Billing").unwrap().status, HealthStatus::Unhealthy);
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let third = engine.run_all(&probes).await;
    assert_eq!(third.get("Billing").unwrap().status, HealthStatus::Unavailable);
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    tokio::time::advance(Duration::from_secs(31)).await;
    let fourth = engine.run_all(&probes).await;
    assert_eq!(fourth.get("Billing").unwrap().status, HealthStatus::Unhealthy);
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn test_retry_succeeds_after_failed_pass() {
    let engine = engine(HealthCheckConfiguration {
        continue_on_failure: true,
        ..Default::default()
    });

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let probes: Vec<Arc<dyn HealthProbe>> = vec![Arc::new(FnProbe::new("Billing", move || {
        // Pass one fails three times; pass two fails twice then recovers.
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if n >= 6 {
                Ok(HealthCheckResult::healthy("Billing"))
            } else {
                Err(IgniteError::probe_failed("Billing", "503"))
            }
        }
    }))];

    let first = engine.run_all(&probes).await;
    assert_eq!(first.get("Billing").unwrap().status, HealthStatus::Unhealthy);
    assert_eq!(first.get("Billing").unwrap().attempts, 3);

    let second = engine.run_all(&probes).await;
    assert_eq!(second.get("Billing").unwrap().status, HealthStatus::Healthy);
    assert_eq!(second.get("Billing").unwrap().attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 6);
}
