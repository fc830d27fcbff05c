//! CMP Party CLI
//!
//! Runs every party of a session in-process over the memory relay:
//! - Distributed Key Generation (DKG)
//! - Key Refresh
//! - Signing nonce commitments

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use cmp_core::keygen::{run_keygen, KeygenOutput};
use cmp_core::math::encode_point;
use cmp_core::mpc::MemoryRelay;
use cmp_core::sign::{run_signing, SigningOutput};
use cmp_core::{Mode, PartyId, SecurityParams, SessionContext, DEFAULT_PARTIES, DEFAULT_THRESHOLD};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, Level};

/// CMP Party - local session simulator
#[derive(Parser)]
#[command(name = "cmp-party")]
#[command(about = "Threshold ECDSA round state machine simulator")]
#[command(version)]
struct Cli {
    /// Number of parties
    #[arg(short = 'n', long, env = "CMP_PARTIES", default_value_t = DEFAULT_PARTIES)]
    parties: usize,

    /// Threshold t; any t+1 parties can act together
    #[arg(short, long, env = "CMP_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    threshold: usize,

    /// Paillier prime size in bits
    #[arg(long, env = "CMP_PRIME_BITS", default_value_t = 1024)]
    prime_bits: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full session with every party in this process
    Simulate {
        #[command(subcommand)]
        protocol: Protocol,
    },
}

#[derive(Subcommand, Clone)]
enum Protocol {
    /// Distributed key generation
    Keygen,

    /// Key refresh
    Refresh,

    /// Signing nonce commitments
    Sign {
        /// Message digest to sign (32 bytes, hex encoded)
        #[arg(short, long)]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Commands::Simulate { ref protocol } = cli.command;
    let summary = match protocol {
        Protocol::Keygen => simulate_keygen(&cli, Mode::KeyGen).await?,
        Protocol::Refresh => simulate_keygen(&cli, Mode::Refresh).await?,
        Protocol::Sign { message } => simulate_sign(&cli, parse_digest(message)?).await?,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn parse_digest(message: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(message).context("message digest must be hex encoded")?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| anyhow!("message digest must be 32 bytes, got {}", bytes.len()))
}

/// One context per simulated party, all sharing a fresh session ID
fn session_contexts(cli: &Cli, mode: Mode) -> Result<Vec<Arc<SessionContext>>> {
    if cli.parties == 0 {
        bail!("a session needs at least one party");
    }
    let session_id = SessionContext::random_session_id();
    let parties = (1..=cli.parties)
        .map(|i| PartyId::new(format!("party-{}", i)))
        .collect::<cmp_core::Result<Vec<_>>>()?;
    let params = SecurityParams::with_prime_bits(cli.prime_bits);

    info!(
        session_id = %hex::encode(session_id),
        n_parties = cli.parties,
        threshold = cli.threshold,
        mode = ?mode,
        "Starting simulated session"
    );

    parties
        .iter()
        .map(|id| {
            SessionContext::new(
                session_id,
                id.clone(),
                parties.clone(),
                cli.threshold,
                mode,
                params,
            )
            .map(Arc::new)
            .map_err(Into::into)
        })
        .collect()
}

async fn simulate_keygen(cli: &Cli, mode: Mode) -> Result<Value> {
    let contexts = session_contexts(cli, mode)?;
    let session_id = *contexts[0].session_id();
    let relay = Arc::new(MemoryRelay::new());

    let handles: Vec<_> = contexts
        .into_iter()
        .map(|ctx| {
            let relay = relay.clone();
            tokio::spawn(async move { run_keygen(ctx, relay.as_ref()).await })
        })
        .collect();

    let mut outputs: Vec<KeygenOutput> = Vec::new();
    for handle in handles {
        outputs.push(handle.await??);
    }

    if outputs
        .iter()
        .any(|o| o.public_key != outputs[0].public_key || o.rid != outputs[0].rid)
    {
        bail!("parties disagree on the session result");
    }

    let parties: Vec<Value> = outputs[0]
        .parties
        .keys()
        .map(|id| {
            json!({
                "party": id.as_str(),
                "public_share": hex::encode(encode_point(&outputs[0].public_share(id))),
            })
        })
        .collect();

    info!(public_key = %hex::encode(outputs[0].public_key_bytes()), "Session complete");

    Ok(json!({
        "session_id": hex::encode(session_id),
        "mode": format!("{:?}", mode),
        "public_key": hex::encode(outputs[0].public_key_bytes()),
        "rid": hex::encode(outputs[0].rid),
        "parties": parties,
    }))
}

async fn simulate_sign(cli: &Cli, digest: [u8; 32]) -> Result<Value> {
    let contexts = session_contexts(cli, Mode::Sign)?;
    let session_id = *contexts[0].session_id();
    let relay = Arc::new(MemoryRelay::new());

    let handles: Vec<_> = contexts
        .into_iter()
        .map(|ctx| {
            let relay = relay.clone();
            tokio::spawn(async move { run_signing(ctx, digest, relay.as_ref()).await })
        })
        .collect();

    let mut outputs: Vec<SigningOutput> = Vec::new();
    for handle in handles {
        outputs.push(handle.await??);
    }

    if outputs
        .iter()
        .any(|o| o.group_commitment != outputs[0].group_commitment)
    {
        bail!("parties disagree on the group commitment");
    }

    let parties: Vec<Value> = outputs[0]
        .binding_factors
        .iter()
        .map(|(id, rho)| {
            json!({
                "party": id.as_str(),
                "binding_factor": hex::encode(rho.to_bytes()),
            })
        })
        .collect();

    Ok(json!({
        "session_id": hex::encode(session_id),
        "mode": "Sign",
        "message_hash": hex::encode(digest),
        "group_commitment": hex::encode(outputs[0].group_commitment_bytes()),
        "parties": parties,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_parties_is_rejected() {
        let cli = Cli::parse_from(["cmp-party", "-n", "0", "simulate", "keygen"]);
        assert!(session_contexts(&cli, Mode::KeyGen).is_err());
    }

    #[test]
    fn test_session_contexts() {
        let cli = Cli::parse_from(["cmp-party", "-n", "3", "-t", "1", "simulate", "keygen"]);
        let contexts = session_contexts(&cli, Mode::KeyGen).unwrap();
        assert_eq!(contexts.len(), 3);
        assert_eq!(contexts[0].session_id(), contexts[2].session_id());
        assert_eq!(contexts[1].self_id().as_str(), "party-2");
    }

    #[test]
    fn test_parse_digest() {
        assert_eq!(parse_digest(&"ab".repeat(32)).unwrap(), [0xab; 32]);
        assert!(parse_digest("abcd").is_err());
        assert!(parse_digest("zz").is_err());
    }
}
