//! Transcribes a file of pre-encoded Opus packets.
//!
//! The input file holds length-prefixed packets: a little-endian u16
//! length followed by that many bytes, repeated. Credentials come from
//! the default credential file; seed it once with a registered
//! `device_id` and `token`.
//!
//! Usage: `cargo run --example transcribe -- audio.opuspkts`

use std::sync::Arc;

use anyhow::{bail, Context};
use doubao_asr::{AsrConfig, DoubaoAsr, FileCredentialStore};

fn read_packets(path: &str) -> anyhow::Result<Vec<Vec<u8>>> {
    let data = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    let mut packets = Vec::new();
    let mut rest = &data[..];

    while rest.len() >= 2 {
        let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
        rest = &rest[2..];
        if rest.len() < len {
            bail!("truncated packet in {path}");
        }
        packets.push(rest[..len].to_vec());
        rest = &rest[len..];
    }

    Ok(packets)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .context("usage: transcribe <packet file>")?;
    let chunks = read_packets(&path)?;
    if chunks.is_empty() {
        bail!("no packets in {path}");
    }
    println!("streaming {} packets", chunks.len());

    let store = FileCredentialStore::default_path()?;
    let client = DoubaoAsr::new(AsrConfig::default()).with_store(Arc::new(store));

    let transcript = client
        .transcribe_with_interim(chunks, |partial| {
            println!("... {partial}");
        })
        .await?;

    println!("final: {transcript}");
    Ok(())
}
