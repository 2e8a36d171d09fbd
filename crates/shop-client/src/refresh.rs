//! Refresh 단일화 코디네이터.
//!
//! 많은 호출이 동시에 만료 401을 받아도 프로세스당 refresh 요청은
//! 한 번만 나가야 합니다. 마커는 불리언이 아니라 진행 중인 작업
//! 자체(`Shared` future)를 보관하는 셀이며, 셀을 발견한 호출자는
//! 같은 future를 await하여 동일한 결과를 받습니다.
//!
//! 불변식:
//! - 클라이언트 프로세스당 동시에 진행 중인 refresh는 최대 하나
//! - "refresh 완료"와 "마커 해제" 사이의 윈도우에 도착한 호출자는
//!   완료된 future에 합류해 즉시 같은 결과를 받으므로, 중복 refresh가
//!   시작되지 않는다
//! - 시작된 refresh는 완료 또는 실패까지 실행된다 (취소 없음)

use std::future::Future;
use std::pin::Pin;

use futures::future::Shared;
use futures::FutureExt;
use tokio::sync::Mutex;

use crate::error::ClientError;

type RefreshFuture = Shared<Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send>>>;

/// 프로세스 전역 refresh 코디네이터.
///
/// 모듈 전역 변수 대신 명시적인 공유 셀로 소유권을 드러냅니다.
#[derive(Default)]
pub struct RefreshCoordinator {
    in_flight: Mutex<Option<RefreshFuture>>,
}

impl RefreshCoordinator {
    /// 새 코디네이터 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 진행 중인 refresh에 합류하거나 새 refresh를 시작합니다.
    ///
    /// 셀에 future가 있으면 그것을 await하고, 없으면 `start`로 만든
    /// future를 셀에 넣은 뒤 await합니다. 완료 후에는 셀이 여전히
    /// 자신의 future를 가리킬 때만 비웁니다 - 그 사이에 시작된 더
    /// 새로운 refresh를 지우지 않기 위한 포인터 비교입니다.
    pub async fn run<F, Fut>(&self, start: F) -> Result<(), ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ClientError>> + Send + 'static,
    {
        let fut = {
            let mut guard = self.in_flight.lock().await;
            match guard.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let fut: RefreshFuture = start().boxed().shared();
                    *guard = Some(fut.clone());
                    fut
                }
            }
        };

        let result = fut.clone().await;

        {
            let mut guard = self.in_flight.lock().await;
            if guard.as_ref().is_some_and(|current| current.ptr_eq(&fut)) {
                *guard = None;
            }
        }

        result
    }

    /// refresh가 진행 중인지 확인 (테스트/디버깅용).
    pub async fn is_in_flight(&self) -> bool {
        self.in_flight.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// 호출 횟수를 세는 refresh 작업.
    fn counted_refresh(
        counter: Arc<AtomicUsize>,
        result: Result<(), ClientError>,
    ) -> impl Future<Output = Result<(), ClientError>> + Send + 'static {
        async move {
            // 동시 호출들이 같은 refresh에 합류할 시간을 확보
            tokio::time::sleep(Duration::from_millis(50)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn test_concurrent_calls_collapse_into_one_refresh() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let coordinator = coordinator.clone();
                let counter = counter.clone();
                tokio::spawn(async move {
                    coordinator
                        .run(move || counted_refresh(counter, Ok(())))
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        // 10개의 동시 호출에 대해 refresh는 정확히 한 번
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_in_flight().await);
    }

    #[tokio::test]
    async fn test_sequential_calls_each_start_a_refresh() {
        let coordinator = RefreshCoordinator::new();
        let counter = Arc::new(AtomicUsize::new(0));

        coordinator
            .run({
                let counter = counter.clone();
                move || counted_refresh(counter, Ok(()))
            })
            .await
            .unwrap();

        coordinator
            .run({
                let counter = counter.clone();
                move || counted_refresh(counter, Ok(()))
            })
            .await
            .unwrap();

        // 순차 호출은 각각 새 refresh를 시작한다
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_propagates_to_all_waiters() {
        let coordinator = Arc::new(RefreshCoordinator::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let failure = ClientError::Unauthorized {
            code: "TOKEN_REVOKED".to_string(),
            message: "Invalid refresh token".to_string(),
        };

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let coordinator = coordinator.clone();
                let counter = counter.clone();
                let failure = failure.clone();
                tokio::spawn(async move {
                    coordinator
                        .run(move || counted_refresh(counter, Err(failure)))
                        .await
                })
            })
            .collect();

        for task in tasks {
            let result = task.await.unwrap();
            assert!(matches!(
                result,
                Err(ClientError::Unauthorized { ref code, .. }) if code == "TOKEN_REVOKED"
            ));
        }

        // 실패한 refresh도 한 번만 실행되고 전원에게 전파된다
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // 실패 후 마커는 해제되어 다음 refresh를 막지 않는다
        assert!(!coordinator.is_in_flight().await);
    }

    #[tokio::test]
    async fn test_marker_cleared_after_completion() {
        let coordinator = RefreshCoordinator::new();
        let counter = Arc::new(AtomicUsize::new(0));

        assert!(!coordinator.is_in_flight().await);

        coordinator
            .run({
                let counter = counter.clone();
                move || counted_refresh(counter, Ok(()))
            })
            .await
            .unwrap();

        assert!(!coordinator.is_in_flight().await);
    }
}
