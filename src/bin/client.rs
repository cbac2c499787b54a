//! RFT 클라이언트 (송신자)
//!
//! 서버에 연결해 파일 한 개를 보내고, 서버가 꼬리 패킷을 받을 시간 동안
//! 연결을 유지한 뒤 종료한다.
//!
//! 사용법:
//!   cargo run --release --bin rft-client -- [OPTIONS] <FILE>
//!
//! 예시:
//!   cargo run --release --bin rft-client -- --server 192.168.0.10:30000 data.bin

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rft::{Config, Connection, Driver, CLIENT_PORT, SERVER_PORT};

#[derive(Parser, Debug)]
#[command(name = "rft-client", about = "RFT 파일 송신 클라이언트")]
struct Args {
    /// 보낼 파일
    file: PathBuf,

    /// 서버 주소
    #[arg(short, long, default_value_t = SocketAddr::from(([127, 0, 0, 1], SERVER_PORT)))]
    server: SocketAddr,

    /// 바인드 주소
    #[arg(short, long, default_value_t = SocketAddr::from(([0, 0, 0, 0], CLIENT_PORT)))]
    bind: SocketAddr,

    /// 전송 후 연결 유지 시간 (초)
    #[arg(long, default_value_t = 2.0)]
    linger: f64,

    /// 불안정한 네트워크용 설정 사용
    #[arg(long)]
    unstable: bool,

    /// 디버그 로그 출력
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = if args.unstable {
        Config::unstable_network()
    } else {
        Config::default()
    };
    config.validate()?;

    let mut connection = Connection::bind(args.bind, &config).await?;
    info!("RFT 클라이언트 시작: {}", connection.local_addr()?);
    connection.connect(args.server);

    let mut driver = Driver::new(connection, config);
    driver.wait_connected(None).await?;

    let stats = match driver.send_file(&args.file).await {
        Ok(stats) => stats,
        Err(e) => {
            warn!("전송 실패: {}", e);
            return Err(e.into());
        }
    };
    info!("{}", stats.summary());

    driver.linger(Duration::from_secs_f64(args.linger.max(0.0))).await?;
    info!("연결 통계: {}", driver.transport().stats().summary());

    Ok(())
}
