//! 청크 분할과 조립
//!
//! - ChunkPlan: 송신측, 파일을 chunk_size 이하 조각으로 나누는 계획
//! - ChunkBuffer: 수신측, 부분 수신을 모아 한 청크로 조립

use std::ops::Range;

use bytes::{Bytes, BytesMut};

use crate::{Error, Result};

/// 파일 청크 분할 계획
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: usize,
}

impl ChunkPlan {
    /// chunk_size 가 0 이면 `InvalidConfig`
    pub fn new(file_size: u64, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size는 0보다 커야 함".into()));
        }
        Ok(Self {
            file_size,
            chunk_size,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 총 청크 수 (빈 파일은 0)
    pub fn chunk_count(&self) -> u64 {
        self.file_size.div_ceil(self.chunk_size as u64)
    }

    /// offset 위치에서 시작하는 청크 길이
    pub fn chunk_len_at(&self, offset: u64) -> usize {
        let remaining = self.file_size.saturating_sub(offset);
        remaining.min(self.chunk_size as u64) as usize
    }

    /// 파일 순서대로 각 청크의 바이트 범위
    pub fn ranges(&self) -> impl Iterator<Item = Range<u64>> {
        let Self {
            file_size,
            chunk_size,
        } = *self;
        (0..self.chunk_count()).map(move |idx| {
            let start = idx * chunk_size as u64;
            let end = (start + chunk_size as u64).min(file_size);
            start..end
        })
    }
}

/// 수신 중인 청크 버퍼
#[derive(Debug)]
pub struct ChunkBuffer {
    data: BytesMut,
    expected: usize,
}

impl ChunkBuffer {
    pub fn new(expected: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(expected),
            expected,
        }
    }

    /// 아직 받아야 할 바이트 수
    pub fn remaining(&self) -> usize {
        self.expected - self.data.len()
    }

    /// 부분 수신 데이터 추가
    ///
    /// 남은 길이를 넘는 부분은 잘라내고 실제로 추가한 길이를 반환
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let take = bytes.len().min(self.remaining());
        self.data.extend_from_slice(&bytes[..take]);
        take
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() == self.expected
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 완성된 청크 데이터 추출
    pub fn freeze(self) -> Bytes {
        self.data.freeze()
    }
}
