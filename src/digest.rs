//! 파일 무결성 다이제스트
//!
//! MD5 (16바이트) 기반. 전송 중 우발적 손상 검출용이며 변조 방지 용도가 아님.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;

use crate::{Error, Result};

/// 다이제스트 바이너리 길이
pub const DIGEST_LEN: usize = 16;

/// 다이제스트 16진수 문자열 길이
pub const DIGEST_HEX_LEN: usize = DIGEST_LEN * 2;

/// 파일 읽기 버퍼 크기
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// 파일 내용 다이제스트
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileDigest([u8; DIGEST_LEN]);

impl FileDigest {
    /// 바이트열 전체의 다이제스트 계산
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Md5::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// 디스크 파일 다이제스트 계산 (스트리밍)
    pub async fn of_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = tokio::fs::File::open(path).await.map_err(|source| Error::FileOpen {
            path: path.display().to_string(),
            source,
        })?;

        let mut hasher = Md5::new();
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(Self(hasher.finalize().into()))
    }

    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// 소문자 16진수 (32자)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// 16진수 문자열 파싱
    ///
    /// 정확히 32자의 16진수만 허용. 대소문자는 구분하지 않음.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != DIGEST_HEX_LEN {
            return Err(Error::MetadataParse {
                reason: format!("다이제스트 길이 {} (기대값 {})", s.len(), DIGEST_HEX_LEN),
            });
        }

        let mut out = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut out).map_err(|e| Error::MetadataParse {
            reason: format!("다이제스트 16진수 오류: {e}"),
        })?;
        Ok(Self(out))
    }
}

impl fmt::Display for FileDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for FileDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}
