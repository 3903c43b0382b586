//! Drop-oldest 유계 큐 — 링 버퍼와 링 채널
//!
//! [`EvictingRing`]은 고정 용량 링 큐입니다. 가득 찬 상태에서 push하면
//! 가장 오래된 엔트리를 먼저 제거한 뒤 넣습니다.
//!
//! [`ring_channel`]은 같은 정책의 태스크 간 채널입니다. 생산자는 절대
//! 블로킹되지 않으며(drop-oldest-then-enqueue), 소비자는 채널이 닫히면
//! 남은 엔트리를 끝까지 드레인한 뒤 `None`을 받습니다. 송신측이 드롭되면
//! 채널은 자동으로 닫힙니다.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

/// 고정 용량 drop-oldest 링 큐
///
/// 시간이 역행하는 입력을 받아도 가장 오래된 슬롯을 밀어내는 것으로
/// 우아하게 흡수합니다.
#[derive(Debug)]
pub struct EvictingRing<T> {
    ring: VecDeque<T>,
    capacity: usize,
}

impl<T> EvictingRing<T> {
    /// 지정한 용량의 빈 링을 생성합니다.
    pub fn new(capacity: usize) -> Self {
        // 용량 0은 모든 push가 no-op이 되므로 최소 1로 올립니다
        let capacity = capacity.max(1);
        Self {
            ring: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 가장 오래된 엔트리를 반환합니다.
    pub fn head(&self) -> Option<&T> {
        self.ring.front()
    }

    /// 가장 오래된 엔트리를 제거하고 반환합니다.
    pub fn remove_head(&mut self) -> Option<T> {
        self.ring.pop_front()
    }

    /// 엔트리를 꼬리에 추가합니다.
    ///
    /// 링이 가득 차 있으면 머리를 먼저 제거하고 그 엔트리를 반환합니다.
    pub fn push_tail(&mut self, value: T) -> Option<T> {
        let evicted = if self.ring.len() >= self.capacity {
            self.ring.pop_front()
        } else {
            None
        };
        self.ring.push_back(value);
        evicted
    }

    /// 현재 엔트리 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// 링이 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// 링의 최대 용량을 반환합니다.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 머리부터 꼬리 순서로 엔트리를 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.ring.iter()
    }
}

struct RingShared<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
}

impl<T> RingShared<T> {
    fn lock_queue(&self) -> MutexGuard<'_, VecDeque<T>> {
        // 큐를 잡은 채 패닉하는 경로가 없으므로 poison은 그대로 복구합니다
        match self.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// drop-oldest 링 채널을 생성합니다.
///
/// 단일 생산자 / 단일 소비자 용도이며, 생산자 측 [`RingSender::send`]는
/// 동기 호출입니다.
pub fn ring_channel<T>(capacity: usize) -> (RingSender<T>, RingReceiver<T>) {
    let shared = Arc::new(RingShared {
        queue: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        capacity: capacity.max(1),
        notify: Notify::new(),
        closed: AtomicBool::new(false),
    });
    (
        RingSender {
            shared: Arc::clone(&shared),
        },
        RingReceiver { shared },
    )
}

/// 링 채널의 송신측
///
/// 드롭되면 채널이 닫히고, 소비자는 남은 엔트리를 드레인한 뒤 `None`을
/// 받습니다.
pub struct RingSender<T> {
    shared: Arc<RingShared<T>>,
}

impl<T> RingSender<T> {
    /// 엔트리를 큐에 넣습니다.
    ///
    /// 큐가 가득 차 있으면 가장 오래된 엔트리를 제거한 뒤 넣고,
    /// 제거된 엔트리를 반환합니다. 호출자는 이를 소비되지 못한
    /// 이벤트로 로깅해야 합니다.
    pub fn send(&self, value: T) -> Option<T> {
        let evicted = {
            let mut queue = self.shared.lock_queue();
            let evicted = if queue.len() >= self.shared.capacity {
                queue.pop_front()
            } else {
                None
            };
            queue.push_back(value);
            evicted
        };
        self.shared.notify.notify_one();
        evicted
    }

    /// 채널을 닫습니다. 이미 닫혀 있으면 no-op입니다.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        // notify_one은 대기자가 없으면 퍼밋을 남겨두므로, 닫힘 플래그
        // 확인과 대기 등록 사이의 틈에서도 소비자를 깨울 수 있습니다
        self.shared.notify.notify_one();
    }
}

impl<T> Drop for RingSender<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// 링 채널의 수신측
pub struct RingReceiver<T> {
    shared: Arc<RingShared<T>>,
}

impl<T> RingReceiver<T> {
    /// 다음 엔트리를 기다려 받습니다.
    ///
    /// 채널이 닫힌 경우에도 남아있는 엔트리를 모두 드레인한 뒤에야
    /// `None`을 반환합니다.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            // notified를 pop 시도보다 먼저 만들어야 그 사이에 도착한
            // notify를 놓치지 않습니다
            let notified = self.shared.notify.notified();

            if let Some(value) = self.shared.lock_queue().pop_front() {
                return Some(value);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }

            notified.await;
        }
    }

    /// 대기 없이 다음 엔트리를 꺼냅니다.
    pub fn try_recv(&mut self) -> Option<T> {
        self.shared.lock_queue().pop_front()
    }

    /// 현재 큐에 쌓인 엔트리 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.shared.lock_queue().len()
    }

    /// 큐가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
