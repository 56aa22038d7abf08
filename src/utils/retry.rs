//! Модуль повторов с экспоненциальной задержкой
//!
//! Политика повторов отделена от места вызова: любая операция, возвращающая
//! `Result`, может быть выполнена через [`retry`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Политика повторов
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Максимальное количество попыток (включая первую)
    pub max_attempts: u32,
    /// Задержка перед второй попыткой в миллисекундах
    pub base_delay_ms: u64,
    /// Множитель задержки для каждой следующей попытки
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Политика без повторов
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            multiplier: 1.0,
        }
    }

    /// Задержка после неудачной попытки `attempt` (нумерация с 1)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(millis.round() as u64)
    }
}

/// Выполнить операцию с повторами согласно политике.
///
/// Замыкание получает номер попытки (с 1). Возвращается результат первой
/// успешной попытки или ошибка последней.
pub fn retry<T, F>(policy: &BackoffPolicy, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt) {
            Ok(value) => {
                if attempt > 1 {
                    log::info!("{} succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                log::warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    label,
                    attempt,
                    max_attempts,
                    e,
                    delay
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                log::error!("{} failed after {} attempt(s): {}", label, attempt, e);
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DialogueVideoError;

    fn instant() -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: 3,
            base_delay_ms: 0,
            multiplier: 2.0,
        }
    }

    #[test]
    fn stops_after_max_attempts() {
        let mut calls = 0;
        let result: Result<()> = retry(&instant(), "always failing", |_| {
            calls += 1;
            Err(DialogueVideoError::Other("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn returns_first_success() {
        let mut calls = 0;
        let value = retry(&instant(), "flaky", |attempt| {
            calls += 1;
            if attempt < 2 {
                Err(DialogueVideoError::Other("not yet".to_string()))
            } else {
                Ok(attempt)
            }
        })
        .unwrap();
        assert_eq!(value, 2);
        assert_eq!(calls, 2);
    }

    #[test]
    fn delay_grows_geometrically() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(2000));
    }
}
