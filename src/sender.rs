//! 송신자 (클라이언트측)
//!
//! - 파일 전체를 메모리로 읽고 다이제스트 계산
//! - 메타데이터 패킷 1개 전송
//! - chunk_size 이하 청크를 파일 순서대로 전송, 부분 전송은 끝까지 반복

use std::path::Path;

use tracing::{debug, info, warn};

use crate::metadata::TransferMetadata;
use crate::session::{Direction, TransferSession};
use crate::stats::TransferStats;
use crate::transport::Transport;
use crate::{Config, Error, Result};

/// 파일 송신자
pub struct FileSender {
    config: Config,
}

impl FileSender {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// 디스크 파일 전송
    ///
    /// 와이어에는 경로가 아닌 파일 이름만 실린다.
    pub async fn send_file<T: Transport>(
        &self,
        path: impl AsRef<Path>,
        transport: &mut T,
    ) -> Result<TransferStats> {
        let path = path.as_ref();

        let data = tokio::fs::read(path).await.map_err(|source| Error::FileOpen {
            path: path.display().to_string(),
            source,
        })?;

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::MetadataSend {
                reason: format!("파일 이름을 알 수 없음: {}", path.display()),
            })?;

        self.send_bytes(file_name, &data, transport).await
    }

    /// 메모리 데이터를 파일로 전송
    pub async fn send_bytes<T: Transport>(
        &self,
        file_name: &str,
        data: &[u8],
        transport: &mut T,
    ) -> Result<TransferStats> {
        self.config.validate()?;

        // 다이제스트는 첫 청크 전에 전체 데이터로 한 번만 계산
        let metadata = TransferMetadata::for_contents(file_name, data);
        let packet = metadata.encode()?;

        match transport.send_packet(&packet).await {
            Ok(n) if n == packet.len() => {}
            Ok(n) => {
                return Err(Error::MetadataSend {
                    reason: format!("{n}/{} bytes 만 전송됨", packet.len()),
                })
            }
            Err(e) => {
                return Err(Error::MetadataSend {
                    reason: e.to_string(),
                })
            }
        }

        info!(
            "전송 시작: {} ({} bytes, md5 {})",
            metadata.file_name, metadata.file_size, metadata.digest
        );

        let mut session =
            TransferSession::new(Direction::Send, data.len() as u64, self.config.chunk_size)?;
        let plan = *session.plan();
        let interval = self.config.chunk_interval();

        for range in plan.ranges() {
            let start = range.start;
            let chunk = &data[range.start as usize..range.end as usize];
            let mut sent = 0usize;

            while sent < chunk.len() {
                session.record_call();
                let offset = start + sent as u64;

                let n = match transport.send_packet(&chunk[sent..]).await {
                    Ok(n) if n > 0 => n,
                    Ok(_) => {
                        warn!("청크 전송 실패: offset={}, 0 bytes", offset);
                        return Err(Error::ChunkSend {
                            offset,
                            reason: "트랜스포트가 0 바이트를 받아들임".into(),
                        });
                    }
                    Err(e) => {
                        warn!("청크 전송 실패: offset={}, {}", offset, e);
                        return Err(Error::ChunkSend {
                            offset,
                            reason: e.to_string(),
                        });
                    }
                };

                sent += n.min(chunk.len() - sent);
            }

            session.complete_chunk(chunk.len());
            debug!(
                "청크 전송: offset={}, {} bytes ({}/{})",
                start,
                chunk.len(),
                session.bytes_transferred(),
                session.file_size()
            );

            if let Some(interval) = interval {
                tokio::time::sleep(interval).await;
            }
        }

        let stats = session.finish();
        info!("전송 완료: {} | {}", metadata.file_name, stats.summary());
        Ok(stats)
    }
}
