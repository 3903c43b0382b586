//! 로그 파일 워처 — 리더/파서/스토리지를 묶어 구동하는 장수명 태스크
//!
//! # 책임
//! - 새 라인이 없어질 때까지 읽고, 각 라인을 파싱해 스토리지에 반영
//! - EOF에서는 폴링 주기만큼, I/O 에러에서는 랜덤 백오프만큼 대기
//! - 취소 시그널에 즉시 반응하여 종료
//!
//! # 장애 격리
//! 파싱 실패는 로그만 남기고 다음 라인으로 진행합니다. 예상하지 못한
//! 패닉도 사이클 경계에서 잡아 같은 방식으로 처리하며, 나쁜 라인
//! 하나로 워처가 죽는 일은 없습니다.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::ReadError;
use crate::parser::W3cParser;
use crate::stat::CycleStorage;
use crate::tail::TailReader;

/// 로그 파일 워처 태스크 핸들
///
/// 리더/파서/스토리지의 소유권을 태스크로 가져가므로, 이들의 변경 API는
/// 워처 태스크에서만 호출됩니다 (단일 라이터 불변식).
pub struct LogWatcher {
    handle: JoinHandle<()>,
}

impl LogWatcher {
    /// 워처 태스크를 스폰합니다.
    pub fn spawn(
        token: CancellationToken,
        reader: TailReader,
        parser: W3cParser,
        storage: CycleStorage,
        poll_period: Duration,
    ) -> Self {
        let handle = tokio::spawn(run(token, reader, parser, storage, poll_period));
        Self { handle }
    }

    /// 태스크가 이미 종료됐는지 확인합니다.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 태스크 종료를 기다립니다.
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            error!(error = %err, "watcher task terminated abnormally");
        }
    }
}

async fn run(
    token: CancellationToken,
    mut reader: TailReader,
    mut parser: W3cParser,
    mut storage: CycleStorage,
    poll_period: Duration,
) {
    while !token.is_cancelled() {
        let cycle_result = catch_unwind(AssertUnwindSafe(|| {
            cycle(&token, &mut reader, &mut parser, &mut storage)
        }));

        match cycle_result {
            Ok(Ok(())) => wait(&token, poll_period).await,
            Ok(Err(err)) => {
                error!(error = %err, "file read failed, backing off");
                let multiplier = rand::rng().random_range(2..=9u32);
                wait(&token, poll_period * multiplier).await;
            }
            Err(_) => {
                // 파서/스토리지의 예기치 못한 패닉 — 라인 단위 실패처럼 취급
                error!("panic while processing log lines");
                wait(&token, poll_period).await;
            }
        }
    }
    reader.close();
}

/// EOF를 만날 때까지 라인을 읽어 파싱/저장합니다.
fn cycle(
    token: &CancellationToken,
    reader: &mut TailReader,
    parser: &mut W3cParser,
    storage: &mut CycleStorage,
) -> Result<(), ReadError> {
    while !token.is_cancelled() {
        let line = match reader.read_one_line() {
            Ok(line) => line,
            Err(ReadError::EndOfFile) => return Ok(()),
            Err(err) => return Err(err),
        };

        match parser.parse(line) {
            Ok(record) => storage.store(record),
            Err(err) => {
                // 다음 라인으로 즉시 진행합니다
                warn!(error = %err, "failed to parse line, skipping");
            }
        }
    }
    Ok(())
}

async fn wait(token: &CancellationToken, period: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(period) => {}
        _ = token.cancelled() => {}
    }
}
