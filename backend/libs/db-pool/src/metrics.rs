//! Pool gauges and acquire latency
//!
//! The service pings through [`acquire_with_metrics`] for its health check,
//! so acquire latency is split by outcome: a pool that times out under load
//! looks very different from one that fails fast because PostgreSQL is gone.

use prometheus::{register_histogram_vec, register_int_gauge_vec, HistogramVec, IntGaugeVec};
use sqlx::{pool::PoolConnection, PgPool, Postgres};
use std::time::Instant;

lazy_static::lazy_static! {
    static ref DB_POOL_CONNECTIONS: IntGaugeVec = register_int_gauge_vec!(
        "db_pool_connections",
        "Pool connections by state (idle, in_use, max)",
        &["service", "state"]
    ).expect("db pool gauges are registered once");

    static ref DB_POOL_ACQUIRE_DURATION: HistogramVec = register_histogram_vec!(
        "db_pool_acquire_duration_seconds",
        "Time spent waiting on the pool, by outcome",
        &["service", "outcome"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    ).expect("db pool histogram is registered once");
}

/// Connection counts read from a pool at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolSnapshot {
    pub size: u32,
    pub idle: usize,
    pub max: u32,
}

impl PoolSnapshot {
    pub fn of(pool: &PgPool) -> Self {
        Self {
            size: pool.size(),
            idle: pool.num_idle(),
            max: pool.options().get_max_connections(),
        }
    }

    /// `size` and `idle` are read separately, so idle can briefly exceed size
    pub fn in_use(&self) -> u32 {
        self.size.saturating_sub(self.idle as u32)
    }
}

pub(crate) fn update_pool_metrics(pool: &PgPool, service: &str) {
    record_snapshot(service, PoolSnapshot::of(pool));
}

fn record_snapshot(service: &str, snapshot: PoolSnapshot) {
    let gauges = [
        ("idle", snapshot.idle as i64),
        ("in_use", i64::from(snapshot.in_use())),
        ("max", i64::from(snapshot.max)),
    ];
    for (state, value) in gauges {
        DB_POOL_CONNECTIONS
            .with_label_values(&[service, state])
            .set(value);
    }
}

fn acquire_outcome<T>(result: &Result<T, sqlx::Error>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(sqlx::Error::PoolTimedOut) => "timeout",
        Err(sqlx::Error::PoolClosed) => "closed",
        Err(_) => "error",
    }
}

/// Acquire a connection, recording the wait under its outcome.
pub async fn acquire_with_metrics(
    pool: &PgPool,
    service: &str,
) -> Result<PoolConnection<Postgres>, sqlx::Error> {
    let start = Instant::now();
    let result = pool.acquire().await;

    DB_POOL_ACQUIRE_DURATION
        .with_label_values(&[service, acquire_outcome(&result)])
        .observe(start.elapsed().as_secs_f64());

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_use_never_underflows() {
        let snapshot = PoolSnapshot {
            size: 2,
            idle: 3,
            max: 10,
        };
        assert_eq!(snapshot.in_use(), 0);

        let snapshot = PoolSnapshot {
            size: 5,
            idle: 1,
            max: 10,
        };
        assert_eq!(snapshot.in_use(), 4);
    }

    #[test]
    fn test_snapshot_is_exported_per_state() {
        record_snapshot(
            "db-pool-gauge-test",
            PoolSnapshot {
                size: 4,
                idle: 1,
                max: 8,
            },
        );

        let gauge = |state: &str| {
            DB_POOL_CONNECTIONS
                .with_label_values(&["db-pool-gauge-test", state])
                .get()
        };
        assert_eq!(gauge("idle"), 1);
        assert_eq!(gauge("in_use"), 3);
        assert_eq!(gauge("max"), 8);
    }

    #[test]
    fn test_acquire_outcomes() {
        assert_eq!(acquire_outcome(&Ok::<(), sqlx::Error>(())), "ok");
        assert_eq!(acquire_outcome::<()>(&Err(sqlx::Error::PoolTimedOut)), "timeout");
        assert_eq!(acquire_outcome::<()>(&Err(sqlx::Error::PoolClosed)), "closed");
        assert_eq!(acquire_outcome::<()>(&Err(sqlx::Error::RowNotFound)), "error");
    }
}
