//! 수신자 (서버측)
//!
//! - 메타데이터 패킷 수신 및 파싱
//! - 청크 수신, 부분 수신은 청크가 찰 때까지 반복
//! - 저장된 파일 다이제스트 재계산 후 비교

use std::path::{Component, Path, PathBuf};

use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

use crate::chunk::ChunkBuffer;
use crate::digest::FileDigest;
use crate::metadata::TransferMetadata;
use crate::session::{next_packet, Direction, TransferSession};
use crate::stats::TransferStats;
use crate::transport::Transport;
use crate::{Config, Error, Result};

/// 디스크 쓰기 버퍼 크기
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// 다이제스트 검증 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    DigestMismatch {
        expected: FileDigest,
        actual: FileDigest,
    },
}

/// 수신 완료된 파일 정보
#[derive(Debug, Clone)]
pub struct ReceivedFileInfo {
    /// 메타데이터상의 파일 이름
    pub file_name: String,

    /// 실제 저장 경로
    pub path: PathBuf,

    pub file_size: u64,

    pub verification: Verification,

    pub stats: TransferStats,
}

impl ReceivedFileInfo {
    pub fn is_verified(&self) -> bool {
        self.verification == Verification::Verified
    }

    /// 불일치면 `Error::DigestMismatch` 로 변환 (파일은 디스크에 남음)
    pub fn into_verified(self) -> Result<Self> {
        match self.verification {
            Verification::Verified => Ok(self),
            Verification::DigestMismatch { expected, actual } => Err(Error::DigestMismatch {
                expected: expected.to_hex(),
                actual: actual.to_hex(),
            }),
        }
    }
}

/// 파일 수신자
pub struct FileReceiver {
    config: Config,
}

impl FileReceiver {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 파일 하나 수신
    ///
    /// 중간 실패 시 부분적으로 쓰인 파일은 삭제하지 않는다.
    pub async fn receive_file<T: Transport>(&self, transport: &mut T) -> Result<ReceivedFileInfo> {
        self.config.validate()?;
        let poll = self.config.poll_interval;

        let packet = match next_packet(transport, self.config.metadata_capacity, poll).await {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                return Err(Error::MetadataReceive {
                    reason: "메타데이터 수신 전 연결 종료".into(),
                })
            }
            Err(e) => {
                return Err(Error::MetadataReceive {
                    reason: e.to_string(),
                })
            }
        };

        let metadata = TransferMetadata::decode(&packet)?;
        let path = destination_path(&self.config.output_dir, &metadata.file_name)?;

        info!(
            "수신 시작: {} ({} bytes, md5 {}) -> {}",
            metadata.file_name,
            metadata.file_size,
            metadata.digest,
            path.display()
        );

        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| Error::FileCreate {
                path: path.display().to_string(),
                source,
            })?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        let mut session = TransferSession::new(
            Direction::Receive,
            metadata.file_size,
            self.config.chunk_size,
        )?;
        let write_err = |source| Error::FileWrite {
            path: path.display().to_string(),
            source,
        };

        while !session.is_complete() {
            let offset = session.bytes_transferred();
            let mut buffer = ChunkBuffer::new(session.next_chunk_len());

            while !buffer.is_complete() {
                session.record_call();
                let failure = match next_packet(transport, buffer.remaining(), poll).await {
                    Ok(Some(packet)) => {
                        buffer.push(&packet);
                        continue;
                    }
                    Ok(None) => "연결 종료".to_string(),
                    Err(e) => e.to_string(),
                };

                // 받은 청크까지는 디스크에 남김
                if let Err(e) = writer.flush().await {
                    warn!("부분 파일 flush 실패: {}: {}", path.display(), e);
                }
                warn!(
                    "청크 수신 실패: offset={}, {} ({}/{} bytes 저장됨)",
                    offset + buffer.len() as u64,
                    failure,
                    session.bytes_transferred(),
                    session.file_size()
                );
                return Err(Error::ChunkReceive {
                    offset: offset + buffer.len() as u64,
                    reason: failure,
                });
            }

            let chunk = buffer.freeze();
            writer.write_all(&chunk).await.map_err(write_err)?;
            session.complete_chunk(chunk.len());

            debug!(
                "청크 수신: offset={}, {} bytes ({}/{})",
                offset,
                chunk.len(),
                session.bytes_transferred(),
                session.file_size()
            );
        }

        writer.shutdown().await.map_err(write_err)?;
        drop(writer);

        let stats = session.finish();
        let actual = FileDigest::of_file(&path).await?;

        let verification = if actual == metadata.digest {
            info!("MD5 검증 성공: {} | {}", metadata.file_name, stats.summary());
            Verification::Verified
        } else {
            warn!(
                "MD5 불일치: {} expected {}, got {}",
                metadata.file_name, metadata.digest, actual
            );
            Verification::DigestMismatch {
                expected: metadata.digest,
                actual,
            }
        };

        Ok(ReceivedFileInfo {
            file_name: metadata.file_name,
            path,
            file_size: metadata.file_size,
            verification,
            stats,
        })
    }
}

/// 수신 파일 이름을 저장 경로로 변환
///
/// 디렉터리 구분자, `.`/`..`, 드라이브 접두사가 있는 이름은 거부한다.
pub fn destination_path(output_dir: &Path, file_name: &str) -> Result<PathBuf> {
    let reject = |why: &str| Error::MetadataParse {
        reason: format!("허용되지 않는 파일 이름 ({why}): {file_name:?}"),
    };

    if file_name.is_empty() {
        return Err(reject("빈 이름"));
    }
    if file_name.contains(['/', '\\', '\0']) {
        return Err(reject("경로 구분자"));
    }
    if file_name.len() >= 2 && file_name.as_bytes()[1] == b':' {
        return Err(reject("드라이브 접두사"));
    }

    let mut components = Path::new(file_name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(output_dir.join(file_name)),
        _ => Err(reject("단일 파일 이름 아님")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;

    fn config_in(dir: &Path) -> Config {
        Config::default().with_output_dir(dir)
    }

    #[test]
    fn test_destination_allows_plain_names() {
        let dir = Path::new("/srv/in");
        assert_eq!(
            destination_path(dir, "game.exe").unwrap(),
            PathBuf::from("/srv/in/game.exe")
        );
        assert!(destination_path(dir, "archive.tar.gz").is_ok());
    }

    #[test]
    fn test_destination_rejects_traversal() {
        let dir = Path::new("/srv/in");
        for name in ["", ".", "..", "../secret", "a/b", "/etc/passwd", "C:evil", "a\\b"] {
            assert!(
                matches!(destination_path(dir, name), Err(Error::MetadataParse { .. })),
                "{name:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_receives_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let (mut tx, mut rx) = MemoryTransport::pair();
        let data: Vec<u8> = (0..600u32).map(|i| (i * 7) as u8).collect();

        let meta = TransferMetadata::for_contents("six.bin", &data);
        tx.send_packet(&meta.encode().unwrap()).await.unwrap();
        for chunk in data.chunks(256) {
            tx.send_packet(chunk).await.unwrap();
        }

        let info = FileReceiver::new(config_in(dir.path()))
            .receive_file(&mut rx)
            .await
            .unwrap();

        assert!(info.is_verified());
        assert_eq!(info.file_size, 600);
        assert_eq!(info.stats.total_chunks, 3);
        assert_eq!(std::fs::read(dir.path().join("six.bin")).unwrap(), data);
    }

    #[tokio::test]
    async fn test_empty_file_is_verified() {
        let dir = tempfile::tempdir().unwrap();
        let (mut tx, mut rx) = MemoryTransport::pair();

        let meta = TransferMetadata::for_contents("empty.txt", b"");
        tx.send_packet(&meta.encode().unwrap()).await.unwrap();

        let info = FileReceiver::new(config_in(dir.path()))
            .receive_file(&mut rx)
            .await
            .unwrap();

        assert_eq!(info.verification, Verification::Verified);
        assert_eq!(info.stats.total_chunks, 0);
        assert!(std::fs::read(dir.path().join("empty.txt")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_byte_reports_mismatch_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let (mut tx, mut rx) = MemoryTransport::pair();
        let data = vec![0x42u8; 300];

        let meta = TransferMetadata::for_contents("c.bin", &data);
        tx.send_packet(&meta.encode().unwrap()).await.unwrap();

        let mut corrupted = data.clone();
        corrupted[123] ^= 0xFF;
        for chunk in corrupted.chunks(256) {
            tx.send_packet(chunk).await.unwrap();
        }

        let info = FileReceiver::new(config_in(dir.path()))
            .receive_file(&mut rx)
            .await
            .unwrap();

        assert_eq!(
            info.verification,
            Verification::DigestMismatch {
                expected: FileDigest::compute(&data),
                actual: FileDigest::compute(&corrupted),
            }
        );
        assert!(dir.path().join("c.bin").exists());

        match info.into_verified() {
            Err(Error::DigestMismatch { expected, actual }) => {
                assert_eq!(expected, FileDigest::compute(&data).to_hex());
                assert_eq!(actual, FileDigest::compute(&corrupted).to_hex());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_metadata_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let (mut tx, mut rx) = MemoryTransport::pair();
        tx.send_packet(b"x.bin lots d41d8cd98f00b204e9800998ecf8427e\0")
            .await
            .unwrap();

        let result = FileReceiver::new(config_in(dir.path()))
            .receive_file(&mut rx)
            .await;

        assert!(matches!(result, Err(Error::MetadataParse { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_traversal_name_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let (mut tx, mut rx) = MemoryTransport::pair();
        tx.send_packet(b"../x.bin 0 d41d8cd98f00b204e9800998ecf8427e\0")
            .await
            .unwrap();

        let result = FileReceiver::new(config_in(dir.path()))
            .receive_file(&mut rx)
            .await;

        assert!(matches!(result, Err(Error::MetadataParse { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_link_drop_before_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = MemoryTransport::pair();
        drop(tx);

        let result = FileReceiver::new(config_in(dir.path()))
            .receive_file(&mut rx)
            .await;
        assert!(matches!(result, Err(Error::MetadataReceive { .. })));
    }

    #[tokio::test]
    async fn test_link_drop_mid_chunk_keeps_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let (mut tx, mut rx) = MemoryTransport::pair();
        let data = vec![9u8; 1000];

        let meta = TransferMetadata::for_contents("partial.bin", &data);
        tx.send_packet(&meta.encode().unwrap()).await.unwrap();
        tx.send_packet(&data[..256]).await.unwrap();
        tx.send_packet(&data[256..300]).await.unwrap();
        drop(tx);

        let result = FileReceiver::new(config_in(dir.path()))
            .receive_file(&mut rx)
            .await;

        assert!(matches!(result, Err(Error::ChunkReceive { offset: 300, .. })));
        let partial = std::fs::read(dir.path().join("partial.bin")).unwrap();
        assert_eq!(partial.len(), 256);
    }

    #[tokio::test]
    async fn test_zero_chunk_size_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let (mut tx, mut rx) = MemoryTransport::pair();
        let meta = TransferMetadata::for_contents("z.bin", &[1u8; 10]);
        tx.send_packet(&meta.encode().unwrap()).await.unwrap();

        let config = Config {
            chunk_size: 0,
            ..config_in(dir.path())
        };
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            FileReceiver::new(config).receive_file(&mut rx),
        )
        .await
        .expect("receive_file must not hang");

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert!(!dir.path().join("z.bin").exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_disk_write_failure_is_transfer_error() {
        // /dev/full: 모든 쓰기가 ENOSPC
        let dev = Path::new("/dev");
        if !dev.join("full").exists() {
            return;
        }

        let (mut tx, mut rx) = MemoryTransport::pair();
        let data = vec![3u8; 70_000];
        let meta = TransferMetadata::for_contents("full", &data);
        tx.send_packet(&meta.encode().unwrap()).await.unwrap();
        for chunk in data.chunks(256) {
            tx.send_packet(chunk).await.unwrap();
        }

        let result = FileReceiver::new(Config::default().with_output_dir(dev))
            .receive_file(&mut rx)
            .await;

        match result {
            Err(e @ Error::FileWrite { .. }) => assert!(e.is_transfer_error()),
            // 쓰기 권한이 없는 환경
            Err(Error::FileCreate { .. }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_failed_flush_keeps_chunk_error() {
        let dev = Path::new("/dev");
        if !dev.join("full").exists() {
            return;
        }

        let (mut tx, mut rx) = MemoryTransport::pair();
        let data = vec![5u8; 1000];
        let meta = TransferMetadata::for_contents("full", &data);
        tx.send_packet(&meta.encode().unwrap()).await.unwrap();
        tx.send_packet(&data[..256]).await.unwrap();
        drop(tx);

        let result = FileReceiver::new(Config::default().with_output_dir(dev))
            .receive_file(&mut rx)
            .await;

        // 부분 파일 flush 실패는 경고로만 남고 원래 에러가 보고됨
        match result {
            Err(Error::ChunkReceive { offset, .. }) => assert_eq!(offset, 256),
            Err(Error::FileCreate { .. }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
