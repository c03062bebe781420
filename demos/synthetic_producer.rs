//! Synthetic scanout producer
//!
//! Run with: cargo run --example synthetic_producer [INGEST_ADDR] [SCANOUT_ID]
//!
//! Connects to a running `relay_server` and publishes a fake 60 fps stream
//! with a keyframe every 60 frames. Payloads are filler bytes sized like a
//! typical desktop capture (large keyframes, small inter frames).

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use scanout_fanout::server::{HandshakeStatus, Hello};
use scanout_fanout::{Frame, FrameCodec};

const FPS: u64 = 60;
const GOP_LENGTH: u64 = 60;
const KEYFRAME_SIZE: usize = 48 * 1024;
const DELTA_SIZE: usize = 4 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let addr: SocketAddr = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("127.0.0.1:7350")
        .parse()?;
    let scanout_id = args.get(2).cloned().unwrap_or_else(|| "display-0".into());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("synthetic_producer=info".parse()?),
        )
        .init();

    let mut stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;

    Hello::producer(scanout_id.as_str()).write_to(&mut stream).await?;
    let status = HandshakeStatus::read_from(&mut stream).await?;
    if status != HandshakeStatus::Accepted {
        return Err(format!("Relay refused scanout '{}': {:?}", scanout_id, status).into());
    }

    tracing::info!(addr = %addr, scanout = %scanout_id, "Publishing");

    let keyframe_payload = Bytes::from(vec![0xAB; KEYFRAME_SIZE]);
    let delta_payload = Bytes::from(vec![0x11; DELTA_SIZE]);

    let codec = FrameCodec::new();
    let frame_interval = Duration::from_micros(1_000_000 / FPS);
    let mut ticker = tokio::time::interval(frame_interval);
    let started = Instant::now();

    for sequence in 1u64.. {
        ticker.tick().await;

        let timestamp = started.elapsed().as_micros() as u64;
        let frame = if (sequence - 1) % GOP_LENGTH == 0 {
            Frame::keyframe(sequence, timestamp, keyframe_payload.clone())
        } else {
            Frame::delta(sequence, timestamp, delta_payload.clone())
        };

        stream.write_all(&codec.encode(&frame)?).await?;

        if sequence % (FPS * 10) == 0 {
            tracing::info!(frames = sequence, "Still publishing");
        }
    }

    Ok(())
}
