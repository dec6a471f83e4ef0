use std::{path::Path, process::Stdio, time::Duration};

use anyhow::{Context, Result};
use stats_mesh::server::USAGE;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, UnixStream},
    process::Command,
    time::{sleep, timeout},
};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);
const IO_TIMEOUT: Duration = Duration::from_secs(3);

const PEER_A: &str = "# pxname,svname,status,qcur,qtime,slim,\napp,web1,UP,3,10,200,\n\n";
const PEER_B: &str = "# pxname,svname,status,qcur,qtime,slim,\napp,web1,DOWN,7,20,200,\n\n";
const MERGED: &str = "# pxname,svname,status,qcur,qtime,slim,\napp,web1,UP,10,15,200,\n\n";

#[tokio::test]
async fn binary_serves_merged_snapshot_over_unix_socket() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("stats-mesh");

    let peer_a = fake_peer(PEER_A).await?;
    let peer_b = fake_peer(PEER_B).await?;

    let dir = tempfile::tempdir().context("create temp dir")?;
    let socket = dir.path().join("merged.sock");

    let mut child = Command::new(binary)
        .arg(&socket)
        .arg(&peer_a)
        .arg(&peer_b)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .context("spawn stats-mesh")?;

    wait_for_socket(&socket).await?;

    let snapshot = timeout(IO_TIMEOUT, query(&socket, "show stat\n")).await??;
    assert_eq!(snapshot, MERGED);

    let usage = timeout(IO_TIMEOUT, query(&socket, "bogus\n")).await??;
    assert_eq!(usage, USAGE);

    let _ = child.kill().await;
    let _ = child.wait().await;

    Ok(())
}

#[tokio::test]
async fn binary_exits_nonzero_when_peers_disagree() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("stats-mesh");

    let peer_a = fake_peer(PEER_A).await?;
    let extra_row =
        "# pxname,svname,status,qcur,qtime,slim,\napp,web1,UP,3,10,200,\napp,web2,UP,1,5,200,\n\n";
    let peer_b = fake_peer(extra_row).await?;

    let dir = tempfile::tempdir().context("create temp dir")?;
    let socket = dir.path().join("merged.sock");

    let mut child = Command::new(binary)
        .arg(&socket)
        .arg(&peer_a)
        .arg(&peer_b)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .context("spawn stats-mesh")?;

    let status = timeout(STARTUP_TIMEOUT, child.wait())
        .await
        .context("process should exit during startup")??;
    assert!(!status.success());
    assert!(!socket.exists());

    Ok(())
}

#[tokio::test]
async fn binary_rejects_missing_peer_arguments() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("stats-mesh");

    let status = Command::new(binary)
        .arg("/tmp/unused.sock")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .context("run stats-mesh without peers")?;
    assert!(!status.success());

    Ok(())
}

/// The binary creates the listen socket only after the merge succeeded, so
/// a successful connect doubles as the startup barrier.
async fn wait_for_socket(path: &Path) -> Result<()> {
    timeout(STARTUP_TIMEOUT, async {
        loop {
            if UnixStream::connect(path).await.is_ok() {
                return;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .context("stats endpoint did not come up")?;
    Ok(())
}

async fn query(path: &Path, command: &str) -> Result<String> {
    let mut stream = UnixStream::connect(path).await?;
    stream.write_all(command.as_bytes()).await?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response)
}

/// Minimal stand-in for a load balancer's stats socket: answers `show stat`
/// with a canned table, then closes.
async fn fake_peer(body: &'static str) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let (read_half, mut write_half) = stream.into_split();
                let mut reader = BufReader::new(read_half);
                let mut line = String::new();
                let _ = reader.read_line(&mut line).await;
                if line.trim_end() == "show stat" {
                    let _ = write_half.write_all(body.as_bytes()).await;
                }
                let _ = write_half.shutdown().await;
            });
        }
    });

    Ok(addr.to_string())
}
