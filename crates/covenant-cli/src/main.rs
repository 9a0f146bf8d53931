//! Mandate inspection and verification from the command line.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use covenant_core::{issuer_key_for, mandate_id, token, verify_sd_jwt_kb, KeySet};

#[derive(Parser)]
#[command(name = "covenant", version, about = "Inspect and verify mandates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a mandate without verifying it.
    ///
    /// Prints headers and claims of both the issuer token and, when
    /// present, the key binding token. Output is informational only.
    Inspect {
        /// The mandate (`issuer~kb`) or a bare issuer token.
        mandate: String,
    },
    /// Verify a mandate against a published issuer key set.
    Verify {
        /// The full `issuer~kb` mandate.
        mandate: String,
        /// Path to a JSON key set (`{"keys": [...]}`).
        #[arg(long, env = "COVENANT_KEYS")]
        keys: PathBuf,
        /// Expected audience; omitted means accept any.
        #[arg(long)]
        audience: Option<String>,
    },
    /// Print the ledger identity of a mandate.
    MandateId {
        /// The mandate (`issuer~kb`) or a bare issuer token.
        mandate: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Inspect { mandate } => inspect(&mandate),
        Command::Verify { mandate, keys, audience } => verify(&mandate, &keys, audience.as_deref()),
        Command::MandateId { mandate } => {
            let issuer_token = mandate.split('~').next().unwrap_or(&mandate);
            println!("{}", mandate_id(issuer_token));
            Ok(())
        }
    }
}

fn inspect(mandate: &str) -> Result<()> {
    let (issuer_token, kb_token) = match mandate.split_once('~') {
        Some((issuer, kb)) => (issuer, Some(kb)),
        None => (mandate, None),
    };

    let (header, claims) =
        token::decode_unverified(issuer_token).context("undecodable issuer token")?;
    println!("issuer header: {}", serde_json::to_string_pretty(&header)?);
    println!("issuer claims: {}", serde_json::to_string_pretty(&claims)?);

    if let Some(kb_token) = kb_token {
        let (header, claims) =
            token::decode_unverified(kb_token).context("undecodable key binding token")?;
        println!("key binding header: {}", serde_json::to_string_pretty(&header)?);
        println!("key binding claims: {}", serde_json::to_string_pretty(&claims)?);
    } else {
        println!("key binding: none");
    }
    println!("mandate_id: {}", mandate_id(issuer_token));
    Ok(())
}

fn verify(mandate: &str, keys_path: &PathBuf, audience: Option<&str>) -> Result<()> {
    let raw = fs::read_to_string(keys_path)
        .with_context(|| format!("reading key set {}", keys_path.display()))?;
    let keys: KeySet = serde_json::from_str(&raw)
        .with_context(|| format!("parsing key set {}", keys_path.display()))?;
    if keys.keys.is_empty() {
        bail!("key set {} contains no keys", keys_path.display());
    }

    let issuer_key = issuer_key_for(&keys, mandate)?;
    let verified = verify_sd_jwt_kb(mandate, &issuer_key, audience, Utc::now())?;

    println!("verified: true");
    println!("mandate_id: {}", verified.mandate_id);
    println!("audience: {}", verified.kb_claims.aud);
    if let Some(amount) = verified.kb_claims.amount {
        println!("bound amount: {amount}");
    }
    if let Some(use_index) = verified.kb_claims.use_index {
        println!("use index: {use_index}");
    }
    println!("claims: {}", serde_json::to_string_pretty(&verified.claims)?);
    Ok(())
}
