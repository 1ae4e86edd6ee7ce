use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::ProbeError;

/// Опрос с фиксированным интервалом до выполнения условия или дедлайна.
///
/// Broker не шлёт событий о GC, поэтому только polling. Без backoff:
/// интервал постоянный, дедлайн абсолютный. Ошибка самого опроса
/// (например `AdminUnavailable`) прерывает ожидание сразу.
#[derive(Debug, Clone, Copy)]
pub struct Waiter {
    timeout: Duration,
    poll_interval: Duration,
}

impl Waiter {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self { timeout, poll_interval }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ждать, пока `probe()` вернёт значение, для которого `done` истинно.
    ///
    /// Возвращает время ожидания. При таймауте `TimedOut` несёт последнее
    /// наблюдение. Сон между попытками не выходит за дедлайн, так что
    /// последняя проверка приходится на сам дедлайн.
    pub async fn until<T, F, Fut, D>(&self, what: &str, mut probe: F, done: D) -> Result<Duration, ProbeError>
    where
        T: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProbeError>>,
        D: Fn(&T) -> bool,
    {
        let start = Instant::now();
        let deadline = start.checked_add(self.timeout).ok_or_else(|| {
            ProbeError::Config(format!("timeout {:?} for {what} is out of range", self.timeout))
        })?;
        let mut attempts = 0u32;

        loop {
            let observed = probe().await?;
            attempts += 1;
            if done(&observed) {
                let elapsed = start.elapsed();
                tracing::debug!(what, attempts, elapsed_ms = elapsed.as_millis() as u64, "condition met");
                return Ok(elapsed);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ProbeError::TimedOut {
                    what: what.to_string(),
                    elapsed: now - start,
                    attempts,
                    last: observed.to_string(),
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// `until` для булевого предиката.
    pub async fn until_true<F, Fut>(&self, what: &str, probe: F) -> Result<Duration, ProbeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, ProbeError>>,
    {
        self.until(what, probe, |v| *v).await
    }
}
