//! Iris bridge service: byte stream in, cooked frames out over TCP

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use color_eyre::{eyre::WrapErr, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use iris::ingest::{ByteRing, RingProducer};
use iris::sink::TcpSink;
use iris::{Command, Config, Engine, Mode, Stats};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "iris=info".into()),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Iris launching...");

    let config = Config::load(std::env::args().nth(1).as_deref())?;
    let mode = Mode::from_name(&config.pipeline.initial_profile)?;
    info!(?mode, input = %config.input.path, listen = %config.output.listen, "configured");

    let stats = Arc::new(Stats::new());
    let (producer, consumer) =
        ByteRing::with_capacity(config.pipeline.ring_capacity, stats.clone())?;

    let (cmd_tx, cmd_rx) = flume::bounded::<Command>(8);
    let (rsp_tx, rsp_rx) = flume::bounded::<String>(8);
    let (conn_tx, conn_rx) = flume::bounded::<std::net::TcpStream>(4);

    let mut engine = Engine::new(
        mode.profile(),
        consumer,
        TcpSink::new(conn_rx),
        stats.clone(),
        cmd_rx,
        rsp_tx,
        config.pipeline.parse_budget,
    )?;
    let profile_watch = engine.profile_watch();

    // Byte-stream reader feeding the ring
    let input_path = config.input.path.clone();
    tokio::spawn(async move {
        if let Err(e) = run_reader(&input_path, producer).await {
            error!(error = %e, "input reader stopped");
        }
    });

    // Viewer listener handing connections to the engine-side sink
    let listen_addr = config.output.listen.clone();
    tokio::spawn(async move {
        if let Err(e) = run_listener(&listen_addr, conn_tx).await {
            error!(error = %e, "viewer listener stopped");
        }
    });

    // Control channel: one command byte per stdin line
    let ctl_tx = cmd_tx.clone();
    tokio::spawn(async move {
        run_control(ctl_tx).await;
    });

    // Status responses back to the operator
    tokio::spawn(async move {
        while let Ok(line) = rsp_rx.recv_async().await {
            println!("{line}");
        }
    });

    // Periodic throughput log
    if config.pipeline.status_interval_secs > 0 {
        let stats = stats.clone();
        let interval = Duration::from_secs(config.pipeline.status_interval_secs);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let snap = stats.snapshot();
                let profile = **profile_watch.load();
                info!(
                    mode = profile.name,
                    frames_sent = snap.frames_sent,
                    frames_dropped = snap.frames_dropped,
                    crc_errors = snap.crc_errors,
                    bytes_sent = snap.bytes_sent,
                    "throughput"
                );
            }
        });
    }

    // Ctrl-C maps to the update-mode command, stopping the engine
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cmd_tx.send_async(Command::Boot).await;
        }
    });

    // The engine owns its cooperative loop on a dedicated thread
    tokio::task::spawn_blocking(move || engine.run())
        .await
        .wrap_err("engine thread panicked")?;

    info!("Iris shutting down");
    Ok(())
}

/// Pump the byte-stream source into the ring until EOF or error.
async fn run_reader(path: &str, mut producer: RingProducer) -> Result<()> {
    let mut source: Box<dyn AsyncRead + Unpin + Send> = if path == "-" {
        Box::new(tokio::io::stdin())
    } else {
        Box::new(
            tokio::fs::File::open(path)
                .await
                .wrap_err_with(|| format!("opening input {path}"))?,
        )
    };

    let mut buf = BytesMut::with_capacity(8192);
    loop {
        buf.clear();
        let n = source.read_buf(&mut buf).await?;
        if n == 0 {
            warn!("input stream reached EOF");
            return Ok(());
        }
        producer.push(&buf);
    }
}

/// Accept viewer connections and hand them to the sink, newest wins.
async fn run_listener(
    addr: &str,
    conn_tx: flume::Sender<std::net::TcpStream>,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding viewer listener on {addr}"))?;
    info!(%addr, "viewer listener ready");
    loop {
        let (stream, peer) = listener.accept().await?;
        info!(%peer, "viewer connected");
        stream.set_nodelay(true)?;
        let stream = stream.into_std()?;
        stream.set_nonblocking(true)?;
        if conn_tx.send_async(stream).await.is_err() {
            return Ok(());
        }
    }
}

/// Decode one command byte per stdin line.
async fn run_control(cmd_tx: flume::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Some(&byte) = line.as_bytes().first() else {
            continue;
        };
        match Command::from_byte(byte) {
            Some(cmd) => {
                if cmd_tx.send_async(cmd).await.is_err() {
                    return;
                }
            }
            None => warn!(input = %line, "unknown command"),
        }
    }
}
