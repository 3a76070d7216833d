// Copyright 2025 Contributors to the Veraison project.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use nitrotoken::evidence::Evidence;
use nitrotoken::freshness::{FreshnessToken, NonceAuthority};
use nitrotoken::store::{ICrlStore, MemoCrlStore, TrustAnchor};
use nitrotoken::verify::{parse_time, AttestationVerifier, VerificationResult, VerifierConfig};
use std::error::Error;
use std::fs;
use std::time::{Duration, SystemTime};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
enum NitroTokenCli {
    Nonce(NonceArgs),
    Inspect(InspectArgs),
    Verify(VerifyArgs),
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Issue a freshness token to hand to the enclave, printed as JSON")]
struct NonceArgs {
    /// token lifetime, in seconds
    #[arg(short, long, default_value_t = 60)]
    lifetime: u64,

    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Decode the supplied attestation document and print its payload \
    as JSON, without verifying it")]
struct InspectArgs {
    #[arg(short, long, default_value = "document.b64")]
    evidence: String,
}

#[derive(Debug, clap::Args)]
#[command(author, version, long_about = None,
    about = "Verify the supplied attestation document against a pinned root \
    and the freshness token it was requested with")]
struct VerifyArgs {
    #[arg(short, long, default_value = "document.b64")]
    evidence: String,

    /// PEM root certificate (default: AWS Nitro Enclaves Root-G1)
    #[arg(short, long)]
    root: Option<String>,

    #[arg(short, long, default_value = "token.json")]
    token: String,

    #[arg(short, long)]
    config: Option<String>,

    /// JSON object mapping CRL URLs to base64 DER CRLs (default: fetch over HTTP)
    #[arg(long)]
    crls: Option<String>,

    /// RFC 3339 reference time for certificate validity (default: now)
    #[arg(long, conflicts_with = "document_time")]
    time: Option<String>,

    /// Use the document's own timestamp as reference time
    #[arg(long)]
    document_time: bool,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match NitroTokenCli::parse() {
        NitroTokenCli::Nonce(args) => match nonce(&args) {
            Ok(j) => println!("{j}"),
            Err(e) => eprintln!("token issuance failed: {e}"),
        },

        NitroTokenCli::Inspect(args) => match inspect(&args) {
            Ok(j) => println!("{j}"),
            Err(e) => eprintln!("decoding failed: {e}"),
        },

        NitroTokenCli::Verify(args) => match verify(&args) {
            Ok(res) => {
                for w in res.warnings.iter() {
                    eprintln!("warning: {w}");
                }
                match res.to_json_pretty() {
                    Ok(j) => println!("{j}"),
                    Err(e) => eprintln!("rendering result failed: {e}"),
                }
                eprintln!("verification successful");
            }
            Err(e) => eprintln!("verification failed: {e}"),
        },
    }
}

fn load_config(path: &Option<String>) -> Result<VerifierConfig, Box<dyn Error>> {
    match path {
        Some(p) => Ok(VerifierConfig::from_json(&fs::read_to_string(p)?)?),
        None => Ok(VerifierConfig::default()),
    }
}

fn nonce(args: &NonceArgs) -> Result<String, Box<dyn Error>> {
    let cfg = load_config(&args.config)?;

    let na = NonceAuthority::new().with_value_len(cfg.token_value_len)?;

    let t = na.issue(Duration::from_secs(args.lifetime))?;

    Ok(serde_json::to_string_pretty(&t)?)
}

fn inspect(args: &InspectArgs) -> Result<String, Box<dyn Error>> {
    let text = fs::read_to_string(&args.evidence)?;

    let e = Evidence::decode_base64(&text, VerifierConfig::default().max_document_size)?;

    Ok(serde_json::to_string_pretty(&e.document)?)
}

fn verify(args: &VerifyArgs) -> Result<VerificationResult, Box<dyn Error>> {
    let cfg = load_config(&args.config)?;

    let root = match &args.root {
        Some(p) => TrustAnchor::from_pem(&fs::read_to_string(p)?)?,
        None => TrustAnchor::aws_nitro_root_g1()?,
    };

    let token: FreshnessToken = serde_json::from_str(&fs::read_to_string(&args.token)?)?;

    let text = fs::read_to_string(&args.evidence)?;

    let now = SystemTime::now();

    let reference_time = if args.document_time {
        Evidence::decode_base64(&text, cfg.max_document_size)?
            .document
            .produced_at()
    } else if let Some(t) = &args.time {
        parse_time(t)?
    } else {
        now
    };

    match &args.crls {
        Some(p) => {
            let crls = MemoCrlStore::new();
            crls.load_json(&fs::read_to_string(p)?)?;
            run(root, crls, cfg, &text, reference_time, &token, now)
        }
        None => {
            let crls = cfg.http_crl_store()?;
            run(root, crls, cfg, &text, reference_time, &token, now)
        }
    }
}

fn run<S: ICrlStore>(
    root: TrustAnchor,
    crls: S,
    cfg: VerifierConfig,
    text: &str,
    reference_time: SystemTime,
    token: &FreshnessToken,
    now: SystemTime,
) -> Result<VerificationResult, Box<dyn Error>> {
    let v = AttestationVerifier::new(root, crls, cfg)?;

    Ok(v.verify(text, reference_time, token, now)?)
}
