//! 스트림 구독 — 리포트/알림 스트림을 여러 리스너에게 브로드캐스트합니다.
//!
//! 구독 태스크는 소스 큐를 읽어 등록된 리스너를 순서대로 호출합니다.
//! 리스너 하나가 패닉해도 나머지 리스너와 구독 루프는 계속 동작합니다.
//! 소스 큐가 닫히면 남은 엔트리를 끝까지 드레인한 뒤 종료하며, 이때
//! 리스너들을 되돌려주어 파이프라인 재시작에 재사용할 수 있게 합니다.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::ring::RingReceiver;

/// 스트림 엔트리를 소비하는 리스너 콜백
///
/// 구독 태스크에서만 호출되므로 내부 상태를 가변으로 가질 수 있습니다.
pub type Listener<T> = Box<dyn FnMut(&T) + Send + Sync>;

/// 스트림 구독 태스크 핸들
pub struct Subscription<T> {
    handle: JoinHandle<Vec<Listener<T>>>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    /// 구독 태스크를 스폰합니다.
    ///
    /// `stream_name`은 로그 식별용입니다.
    pub fn spawn(
        stream_name: &'static str,
        rx: RingReceiver<T>,
        listeners: Vec<Listener<T>>,
    ) -> Self {
        let handle = tokio::spawn(run(stream_name, rx, listeners));
        Self { handle }
    }

    /// 태스크가 이미 종료됐는지 확인합니다.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 스트림이 끝날 때까지 기다린 뒤 리스너들을 돌려받습니다.
    pub async fn join(self) -> Vec<Listener<T>> {
        match self.handle.await {
            Ok(listeners) => listeners,
            Err(err) => {
                error!(error = %err, "subscription task terminated abnormally");
                Vec::new()
            }
        }
    }
}

async fn run<T>(
    stream_name: &'static str,
    mut rx: RingReceiver<T>,
    mut listeners: Vec<Listener<T>>,
) -> Vec<Listener<T>> {
    while let Some(item) = rx.recv().await {
        for listener in &mut listeners {
            // 리스너 단위 패닉 격리
            if catch_unwind(AssertUnwindSafe(|| listener(&item))).is_err() {
                error!(
                    stream = stream_name,
                    "listener panicked, continuing with remaining listeners"
                );
            }
        }
    }
    debug!(stream = stream_name, "stream closed, subscription finished");
    listeners
}
