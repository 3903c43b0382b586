#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`tail`]: 로테이션을 감지하는 파일 tail 리더
//! - [`parser`]: W3C 라인 파서 (섹션 인터닝 + 분 단위 시각 캐시)
//! - [`stat`]: 사이클 집계 스토리지
//! - [`watcher`]: 리더/파서/스토리지를 구동하는 장수명 태스크
//! - [`alert`]: 슬라이딩 윈도우 알림 상태 머신
//! - [`subscribe`]: 리포트/알림 스트림 팬아웃
//! - [`ring`]: drop-oldest 링 버퍼와 링 채널
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입

pub mod alert;
pub mod config;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod ring;
pub mod stat;
pub mod subscribe;
pub mod tail;
pub mod watcher;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{MonitorPipeline, MonitorPipelineBuilder};

// 설정
pub use config::MonitorConfig;

// 에러
pub use error::{MonitorError, ParseError, ReadError};

// 구성 요소
pub use alert::TrafficState;
pub use parser::{SectionInterner, W3cParser};
pub use stat::CycleStorage;
pub use subscribe::{Listener, Subscription};
pub use tail::TailReader;
pub use watcher::LogWatcher;
