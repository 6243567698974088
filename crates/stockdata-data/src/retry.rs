//! 재시도/백오프 컨트롤러.
//!
//! 일시적 조회 실패를 지수 백오프로 재시도합니다. 대기 시각은 주입된
//! `Clock`을 통해 흐르므로 테스트에서 실제 시간을 기다리지 않고
//! 백오프 간격을 검증할 수 있습니다.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{DataError, Result};

/// 재시도 정책.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 첫 재시도 전 대기 시간
    pub base_delay: Duration,
    /// 시도마다 대기 시간에 곱해지는 배수
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// attempt번째 실패 후 대기 시간 (attempt는 0부터).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.mul_f64(self.multiplier.powi(attempt as i32))
    }
}

/// 대기 시간 주입용 시계.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// 실제 tokio 타이머를 사용하는 기본 시계.
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 재시도 결과.
///
/// 시도 소진은 호출자 쪽에서 "신규 데이터 없음"으로 강등하거나 티커 단위
/// 실패로 기록할 수 있도록 오류가 아닌 값으로 돌려준다.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Ok(T),
    Exhausted { attempts: u32, last_error: DataError },
}

/// 지수 백오프 재시도 래퍼.
///
/// 실패할 때마다 `base_delay * multiplier^attempt` 만큼 대기한 뒤 다시
/// 시도하며, 마지막 시도 실패 후에는 대기하지 않는다.
pub async fn retry_fetch<T, F, Fut>(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    label: &str,
    mut operation: F,
) -> RetryOutcome<T>
where
    T: Send,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<T>> + Send,
{
    let mut last_error: Option<DataError> = None;

    for attempt in 0..policy.max_attempts {
        match operation().await {
            Ok(value) => return RetryOutcome::Ok(value),
            Err(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = label,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    error = %e,
                    "조회 실패, 재시도 예정"
                );
                last_error = Some(e);
                if attempt + 1 < policy.max_attempts {
                    clock.sleep(delay).await;
                }
            }
        }
    }

    RetryOutcome::Exhausted {
        attempts: policy.max_attempts,
        last_error: last_error
            .unwrap_or_else(|| DataError::FetchError("시도 횟수가 0으로 설정됨".to_string())),
    }
}
