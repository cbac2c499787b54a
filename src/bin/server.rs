//! RFT 서버 (수신자)
//!
//! 연결을 기다렸다가 파일 한 개를 받아 MD5 를 검증하고,
//! 상대가 끊기면 다시 대기한다.
//!
//! 사용법:
//!   cargo run --release --bin rft-server -- [OPTIONS]
//!
//! 예시:
//!   cargo run --release --bin rft-server -- --output-dir received --once

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rft::{Config, Connection, Driver, Verification, SERVER_PORT};

#[derive(Parser, Debug)]
#[command(name = "rft-server", about = "RFT 파일 수신 서버")]
struct Args {
    /// 바인드 주소
    #[arg(short, long, default_value_t = SocketAddr::from(([0, 0, 0, 0], SERVER_PORT)))]
    bind: SocketAddr,

    /// 수신 파일 저장 디렉터리
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// 파일 한 개 수신 후 종료
    #[arg(long)]
    once: bool,

    /// 불안정한 네트워크용 설정 사용
    #[arg(long)]
    unstable: bool,

    /// 디버그 로그 출력
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let base = if args.unstable {
        Config::unstable_network()
    } else {
        Config::default()
    };
    let config = base.with_output_dir(&args.output_dir);
    config.validate()?;
    tokio::fs::create_dir_all(&config.output_dir).await?;

    let mut connection = Connection::bind(args.bind, &config).await?;
    connection.listen();
    info!("RFT 서버 시작: {}", connection.local_addr()?);

    let mut driver = Driver::new(connection, config);

    loop {
        driver.wait_connected(None).await?;

        let outcome = driver.receive_file().await;
        info!("연결 통계: {}", driver.transport().stats().summary());

        let verified = match outcome {
            Ok(info) => match &info.verification {
                Verification::Verified => {
                    info!(
                        "수신 성공: {} ({} bytes) | {}",
                        info.path.display(),
                        info.file_size,
                        info.stats.summary()
                    );
                    true
                }
                Verification::DigestMismatch { expected, actual } => {
                    error!(
                        "MD5 불일치: {} expected {}, got {}",
                        info.path.display(),
                        expected,
                        actual
                    );
                    false
                }
            },
            Err(e) => {
                warn!("수신 실패: {}", e);
                false
            }
        };

        if args.once {
            return Ok(if verified {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }

        driver.wait_disconnected().await?;
        info!("다음 연결 대기");
    }
}
