use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use uinvault_crypto::{ChecksumAlgorithm, Charset};
use uinvault_domain::UinMode;
use uinvault_service::{GenerateOptions, SectorTokenOptions, UinVaultService};

use crate::cli::{Cli, Command};
use crate::startup::build_service;

pub async fn run(cli: Cli) -> Result<()> {
    let config = uinvault_config::load_from_path(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let service = build_service(&config).await?;

    match cli.command {
        Command::Serve { bind, port } => serve(service, &bind, port).await,
        Command::Generate { mode, length, charset, checksum } => {
            let mode = parse_mode(&mode)?;
            let options = GenerateOptions {
                length,
                charset: charset.map(|c| Charset::parse(&c)).transpose()?,
                exclude_ambiguous: None,
                checksum: checksum.map(|c| parse_checksum(&c)).transpose()?.flatten(),
                structured: None,
                sector_token: None,
            };
            let result = service.generate(mode, &options).await?;
            print_json(&serde_json::json!({
                "value": result.value,
                "base": result.base,
                "checksum": result.checksum,
                "provenance": result.provenance,
            }))
        }
        Command::Validate { value, checksum } => {
            let algorithm = parse_checksum(&checksum)?.context("validate requires a concrete checksum algorithm")?;
            let result = service.validate(&value, algorithm);
            print_json(&serde_json::json!({ "valid": result.valid, "length": result.length }))
        }
        Command::OsiaGenerate { transaction_id } => {
            let uin = service.osia_generate(&transaction_id, Default::default()).await?;
            print_json(&serde_json::json!({ "uin": uin }))
        }
        Command::PreGenerate { count, mode, scope } => {
            let mode = parse_mode(&mode)?;
            let summary = service.pre_generate(count, mode, &scope, &GenerateOptions::default()).await?;
            print_json(&serde_json::json!({
                "inserted": summary.inserted.len(),
                "failed": summary.failures.len(),
            }))
        }
        Command::BatchGenerate { count, mode } => {
            let mode = parse_mode(&mode)?;
            let batch = service.batch_generate(count, mode, &GenerateOptions::default()).await?;
            let values: Vec<&str> = batch.iter().map(|g| g.value.as_str()).collect();
            print_json(&serde_json::json!(values))
        }
        Command::DeriveSectorToken { foundational_uin, sector, length, deterministic } => {
            let opts = SectorTokenOptions { foundational_uin, sector, token_length: length, deterministic, salt_len: 16 };
            let (token, metadata) = service.derive_sector_token(&opts).await?;
            print_json(&serde_json::json!({ "token": token, "metadata": metadata }))
        }
        Command::VerifySectorToken { candidate, foundational_uin, sector, metadata } => {
            let metadata = serde_json::from_str(&metadata).context("parsing --metadata as SectorTokenMetadata JSON")?;
            let valid = service.verify_sector_token(&candidate, &foundational_uin, &sector, &metadata).await?;
            print_json(&serde_json::json!({ "valid": valid }))
        }
        Command::Claim { scope, client_id, actor } => {
            let claimed = service.claim(scope.as_deref(), &client_id, &actor).await?;
            print_json(&serde_json::json!({ "claimed": claimed }))
        }
        Command::Assign { uin, assigned_to_ref, actor } => {
            let record = service.assign(&uin, &assigned_to_ref, &actor).await?;
            print_json(&record)
        }
        Command::Release { uin, actor } => {
            let record = service.release(&uin, &actor).await?;
            print_json(&record)
        }
        Command::Retire { uin, reason, actor } => {
            let record = service.retire(&uin, &reason, &actor).await?;
            print_json(&record)
        }
        Command::Revoke { uin, reason, actor } => {
            let record = service.revoke(&uin, &reason, &actor).await?;
            print_json(&record)
        }
        Command::CleanupStale { threshold_seconds, actor } => {
            let released = service.cleanup_stale(Duration::from_secs(threshold_seconds), &actor).await?;
            print_json(&released)
        }
        Command::Lookup { uin } => {
            let record = service.lookup(&uin).await?.context("uin not found")?;
            print_json(&record)
        }
        Command::Audit { uin } => {
            let entries = service.audit(&uin).await?;
            print_json(&entries)
        }
        Command::PoolStats { scope } => {
            let stats = service.pool_stats(scope.as_deref()).await?;
            let mut out = serde_json::Map::with_capacity(stats.len());
            for (status, count) in stats {
                out.insert(status.to_string(), serde_json::json!(count));
            }
            print_json(&serde_json::Value::Object(out))
        }
    }
}

async fn serve(service: UinVaultService, bind: &str, port: u16) -> Result<()> {
    let app = uinvault_api::build_app(Arc::new(service));
    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "uinvault api listening");
    axum::serve(listener, app).await.context("serving http")?;
    Ok(())
}

fn parse_mode(s: &str) -> Result<UinMode> {
    match s {
        "foundational" => Ok(UinMode::Foundational),
        "random" => Ok(UinMode::Random),
        "structured" => Ok(UinMode::Structured),
        "sector_token" => Ok(UinMode::SectorToken),
        other => anyhow::bail!("unknown mode '{other}'"),
    }
}

fn parse_checksum(s: &str) -> Result<Option<ChecksumAlgorithm>> {
    match s {
        "none" => Ok(None),
        "iso7064" => Ok(Some(ChecksumAlgorithm::Iso7064)),
        "iso7064mod97" => Ok(Some(ChecksumAlgorithm::Iso7064Mod97)),
        other => {
            if let Some(modulus) = other.strip_prefix("mod_n:") {
                let n: u32 = modulus.parse().with_context(|| format!("invalid modulus in '{other}'"))?;
                Ok(Some(ChecksumAlgorithm::ModN(n)))
            } else {
                anyhow::bail!("unknown checksum algorithm '{other}'")
            }
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
