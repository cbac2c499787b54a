//! 전송 메타데이터 패킷
//!
//! # Wire format
//!
//! ```text
//! "<file_name> <file_size> <digest_hex>\0"
//! ```
//!
//! ASCII 공백 구분 텍스트, NUL 종료. 수신측은 NUL 이 없어도 패킷 경계로 판단한다.

use crate::digest::{FileDigest, DIGEST_HEX_LEN};
use crate::{Error, Result, MAX_FILE_NAME_LEN, METADATA_CAPACITY};

/// 파일 전송 메타데이터
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMetadata {
    /// 파일 이름 (경로 구분자 없는 단일 이름, 최대 255바이트)
    pub file_name: String,

    /// 뒤따르는 파일 데이터 총 길이
    pub file_size: u64,

    /// 파일 전체 내용의 다이제스트
    pub digest: FileDigest,
}

impl TransferMetadata {
    pub fn new(file_name: impl Into<String>, file_size: u64, digest: FileDigest) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            digest,
        }
    }

    /// 파일 내용으로부터 메타데이터 생성
    pub fn for_contents(file_name: impl Into<String>, contents: &[u8]) -> Self {
        Self::new(
            file_name,
            contents.len() as u64,
            FileDigest::compute(contents),
        )
    }

    /// 패킷 바이트로 인코딩
    pub fn encode(&self) -> Result<Vec<u8>> {
        check_file_name(&self.file_name).map_err(|reason| Error::MetadataSend { reason })?;

        let text = format!(
            "{} {} {}",
            self.file_name,
            self.file_size,
            self.digest.to_hex()
        );

        let mut buf = Vec::with_capacity(text.len() + 1);
        buf.extend_from_slice(text.as_bytes());
        buf.push(0);

        if buf.len() > METADATA_CAPACITY {
            return Err(Error::MetadataSend {
                reason: format!("메타데이터 {} bytes (최대 {})", buf.len(), METADATA_CAPACITY),
            });
        }

        Ok(buf)
    }

    /// 패킷 바이트에서 디코딩
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let parse_err = |reason: String| Error::MetadataParse { reason };

        // NUL 이후는 무시
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        let text = std::str::from_utf8(&bytes[..end])
            .map_err(|e| parse_err(format!("UTF-8 아님: {e}")))?;

        let fields: Vec<&str> = text.split_ascii_whitespace().collect();
        let &[file_name, size_field, digest_field] = fields.as_slice() else {
            return Err(parse_err(format!("필드 수 {} (기대값 3)", fields.len())));
        };

        check_file_name(file_name).map_err(parse_err)?;

        if !size_field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(parse_err(format!("파일 크기가 숫자가 아님: {size_field:?}")));
        }
        let file_size: u64 = size_field
            .parse()
            .map_err(|e| parse_err(format!("파일 크기 오류 {size_field:?}: {e}")))?;

        if digest_field.len() != DIGEST_HEX_LEN {
            return Err(parse_err(format!(
                "다이제스트 길이 {} (기대값 {})",
                digest_field.len(),
                DIGEST_HEX_LEN
            )));
        }
        let digest = FileDigest::from_hex(digest_field)?;

        Ok(Self {
            file_name: file_name.to_string(),
            file_size,
            digest,
        })
    }
}

/// 와이어에 실을 수 있는 파일 이름인지 확인
fn check_file_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("빈 파일 이름".into());
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(format!(
            "파일 이름 {} bytes (최대 {})",
            name.len(),
            MAX_FILE_NAME_LEN
        ));
    }
    if name.bytes().any(|b| b.is_ascii_whitespace() || b == 0) {
        return Err(format!("파일 이름에 공백/NUL 포함: {name:?}"));
    }
    Ok(())
}
