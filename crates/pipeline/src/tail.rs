//! 파일 tail 리더 — 증가하는 로그 파일에서 새 라인을 읽습니다.
//!
//! 핫 패스에서 라인당 할당이 거의 없도록 내부 버퍼의 슬라이스를 빌려주는
//! 방식으로 동작합니다.
//!
//! # 책임
//! - 대상 파일 열기/닫기, 현재 읽기 오프셋 추적
//! - 첫 open 시 파일 끝으로 seek (기동 이후 발생한 이벤트만 관측)
//! - 로테이션/트렁케이션 감지 후 새 파일의 처음부터 이어 읽기
//!
//! # 주의
//! - [`TailReader::read_one_line`]이 반환하는 슬라이스는 내부 버퍼에 대한
//!   뷰이며 다음 호출 전까지만 유효합니다. 보존이 필요한 부분은 복사하세요.
//! - 읽기 버퍼보다 긴 라인은 재사용되는 오버플로우 버퍼에 모아 통째로
//!   반환합니다.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use tracing::debug;

use crate::error::ReadError;

/// 읽기 버퍼의 하한 — 설정값이 이보다 작으면 여기로 클램프됩니다
const MIN_READ_BUF_SIZE: usize = 4 * 1024;

/// 반환할 라인의 위치
enum LineLoc {
    /// 읽기 버퍼 내의 구간
    Buf { start: usize, end: usize },
    /// 오버플로우 버퍼 전체
    Overflow,
}

/// 로그 파일 tail 리더
///
/// 파일은 첫 read 호출 시점에 lazy하게 열립니다. 파일이 아직 없으면
/// read가 I/O 에러를 반환하며, 워처가 백오프 후 재시도합니다.
pub struct TailReader {
    path: PathBuf,
    file: Option<File>,
    /// 첫 open 여부 — 첫 open에서만 파일 끝으로 seek합니다
    initialized: bool,
    /// 지금까지 반환한 라인 길이의 누적 (구분자 제외)
    current_offset: i64,
    /// 고정 크기 읽기 버퍼
    buf: Vec<u8>,
    /// 소비 위치 — `buf[pos..filled]`가 아직 반환하지 않은 바이트
    pos: usize,
    /// 버퍼 내 유효 바이트 수
    filled: usize,
    /// 버퍼보다 긴 라인을 모으는 재사용 버퍼
    overflow: Vec<u8>,
    /// 오버플로우에 미완성 라인이 남아있는지
    overflow_pending: bool,
}

impl TailReader {
    /// 새 리더를 생성합니다. 파일은 첫 read에서 열립니다.
    pub fn new(path: impl Into<PathBuf>, read_buf_size: usize) -> Self {
        let buf_size = read_buf_size.max(MIN_READ_BUF_SIZE);
        Self {
            path: path.into(),
            file: None,
            initialized: false,
            current_offset: 0,
            buf: vec![0; buf_size],
            pos: 0,
            filled: 0,
            overflow: Vec::new(),
            overflow_pending: false,
        }
    }

    /// 다음 한 라인을 읽어 반환합니다.
    ///
    /// 반환 슬라이스는 `\n`을 제외하며, 다음 `read_one_line` 호출 전까지만
    /// 유효합니다. 새 라인이 없으면 [`ReadError::EndOfFile`]을 반환합니다.
    pub fn read_one_line(&mut self) -> Result<&[u8], ReadError> {
        if !self.overflow_pending {
            self.overflow.clear();
        }
        // 로테이션 체크는 버퍼에 미반환 데이터가 없을 때만 수행합니다
        if self.pos >= self.filled {
            self.prepare_file_and_detect_rotation()?;
        }

        match self.next_line()? {
            LineLoc::Buf { start, end } => Ok(&self.buf[start..end]),
            LineLoc::Overflow => Ok(&self.overflow),
        }
    }

    /// 지금까지 반환한 라인 길이의 누적을 반환합니다 (구분자 제외).
    pub fn current_offset(&self) -> i64 {
        self.current_offset
    }

    /// 파일 디스크립터를 해제합니다. 여러 번 호출해도 안전합니다.
    pub fn close(&mut self) {
        self.file = None;
    }

    fn next_line(&mut self) -> Result<LineLoc, ReadError> {
        loop {
            // 미반환 바이트에서 라인 구분자를 찾습니다
            if self.pos < self.filled
                && let Some(i) = find_byte(&self.buf[self.pos..self.filled], b'\n')
            {
                let start = self.pos;
                let end = self.pos + i;
                self.pos = end + 1;
                self.current_offset += (end - start) as i64;

                if self.overflow_pending {
                    self.overflow.extend_from_slice(&self.buf[start..end]);
                    self.overflow_pending = false;
                    return Ok(LineLoc::Overflow);
                }
                return Ok(LineLoc::Buf { start, end });
            }

            // 구분자가 없으면 버퍼 공간을 확보한 뒤 더 읽습니다
            if self.filled >= self.buf.len() {
                if self.pos == 0 {
                    // 라인 하나가 버퍼 전체를 채움 — 오버플로우로 옮기고 계속
                    debug!(
                        overflow_len = self.overflow.len() + self.filled,
                        "line exceeds read buffer, using overflow"
                    );
                    self.overflow.extend_from_slice(&self.buf[..self.filled]);
                    self.current_offset += self.filled as i64;
                    self.overflow_pending = true;
                    self.filled = 0;
                } else {
                    // 소비한 앞부분을 버리고 남은 바이트를 앞으로 당깁니다
                    self.buf.copy_within(self.pos..self.filled, 0);
                    self.filled -= self.pos;
                    self.pos = 0;
                }
            } else if self.pos > 0 && self.pos == self.filled {
                self.pos = 0;
                self.filled = 0;
            }

            if self.refill()? == 0 {
                return Err(ReadError::EndOfFile);
            }
        }
    }

    fn refill(&mut self) -> Result<usize, ReadError> {
        if self.file.is_none() {
            self.prepare_file_and_detect_rotation()?;
        }
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Err(ReadError::Io(std::io::Error::other("file is not open"))),
        };
        let n = file.read(&mut self.buf[self.filled..])?;
        self.filled += n;
        Ok(n)
    }

    fn prepare_file_and_detect_rotation(&mut self) -> Result<(), ReadError> {
        self.open_if_needed()?;

        // 경로 기준 stat — rename 로테이션과 트렁케이션을 모두 잡습니다
        let size = file_size(std::fs::metadata(&self.path)?.len());
        if size >= self.current_offset {
            return Ok(());
        }

        debug!(
            path = %self.path.display(),
            size,
            offset = self.current_offset,
            "file rotated or truncated, reopening from start"
        );
        self.file = None;
        self.current_offset = 0;
        self.pos = 0;
        self.filled = 0;
        self.overflow.clear();
        self.overflow_pending = false;
        // 로테이션 후에는 끝으로 seek하지 않고 처음부터 읽습니다
        self.open_if_needed()
    }

    fn open_if_needed(&mut self) -> Result<(), ReadError> {
        if self.file.is_some() {
            return Ok(());
        }

        let mut file = File::open(&self.path)?;
        if !self.initialized {
            // 첫 open — 기동 이전의 내용은 건너뜁니다
            let size = file_size(file.metadata()?.len());
            file.seek(SeekFrom::Start(size as u64))?;
            self.current_offset = size;
            self.initialized = true;
            debug!(path = %self.path.display(), size, "opened file at end");
        } else {
            debug!(path = %self.path.display(), "reopened file");
        }
        self.file = Some(file);
        Ok(())
    }
}

fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

fn file_size(len: u64) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}
