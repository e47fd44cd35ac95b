// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use log::debug;
use serde::Deserialize;
use std::future::Future;
use tokio::time::{Duration, sleep};

const MIN_FACTOR: u32 = 2;

/// Exponential backoff without jitter.
///
/// The first retry waits `min_delay_ms`, each following one multiplies the
/// previous delay by `factor`, capped at `max_delay_ms`. Polling gives up once
/// the computed delay reaches the cap, so the cap bounds the number of
/// attempts rather than the elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Backoff {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            min_delay_ms: 100,
            max_delay_ms: 5000,
            factor: 2,
        }
    }
}

impl Backoff {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms.max(1))
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay that follows `current`. A factor below 2 would never reach the cap.
    pub fn next_delay(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.factor.max(MIN_FACTOR))
            .min(self.max_delay())
    }
}

/// Run `probe` until it succeeds or the backoff ceiling is reached.
///
/// Returns the last probe error when giving up. No probe is attempted after
/// the first success.
pub async fn wait_ready<F, Fut, E>(backoff: &Backoff, mut probe: F) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut delay = backoff.min_delay();
    let mut attempt: u32 = 1;
    loop {
        let err = match probe().await {
            Ok(()) => {
                debug!("ready after {attempt} attempt(s)");
                return Ok(());
            }
            Err(e) => e,
        };
        if delay >= backoff.max_delay() {
            debug!("giving up after {attempt} attempt(s): {err}");
            return Err(err);
        }
        debug!("attempt {attempt} failed ({err}), retrying in {delay:?}");
        sleep(delay).await;
        delay = backoff.next_delay(delay);
        attempt += 1;
    }
}
