use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "uinvault", about = "OSIA-compliant UIN lifecycle engine", version)]
pub struct Cli {
    /// Path to the service configuration file.
    #[arg(long, env = "UINVAULT_CONFIG", default_value = "uinvault.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP API server.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },

    /// Generate a single UIN without persisting it.
    Generate {
        #[arg(long, default_value = "foundational")]
        mode: String,
        #[arg(long)]
        length: Option<usize>,
        #[arg(long)]
        charset: Option<String>,
        #[arg(long)]
        checksum: Option<String>,
    },

    /// Validate a UIN's checksum.
    Validate {
        value: String,
        #[arg(long, default_value = "iso7064")]
        checksum: String,
    },

    /// Run the OSIA-profile generate operation: foundational, length 19,
    /// ISO 7064 checksum, persisted at AVAILABLE.
    OsiaGenerate {
        transaction_id: String,
    },

    /// Bulk pre-generate and persist UINs at AVAILABLE.
    PreGenerate {
        count: usize,
        #[arg(long, default_value = "foundational")]
        mode: String,
        #[arg(long)]
        scope: String,
    },

    /// Generate multiple UINs without persisting them.
    BatchGenerate {
        count: usize,
        #[arg(long, default_value = "foundational")]
        mode: String,
    },

    /// Derive a sector-specific token from a foundational UIN.
    DeriveSectorToken {
        foundational_uin: String,
        sector: String,
        #[arg(long, default_value_t = 16)]
        length: usize,
        #[arg(long)]
        deterministic: bool,
    },

    /// Verify a candidate sector token against previously derived metadata.
    VerifySectorToken {
        candidate: String,
        foundational_uin: String,
        sector: String,
        /// JSON-encoded `SectorTokenMetadata`, as printed by `derive-sector-token`.
        #[arg(long)]
        metadata: String,
    },

    /// Claim the next available UIN from the pool.
    Claim {
        #[arg(long)]
        scope: Option<String>,
        client_id: String,
        actor: String,
    },

    /// Assign a preassigned UIN to a subject reference.
    Assign {
        uin: String,
        assigned_to_ref: String,
        actor: String,
    },

    /// Release a preassigned UIN back to the pool.
    Release {
        uin: String,
        actor: String,
    },

    /// Retire a UIN permanently.
    Retire {
        uin: String,
        reason: String,
        actor: String,
    },

    /// Revoke a UIN permanently.
    Revoke {
        uin: String,
        reason: String,
        actor: String,
    },

    /// Release stale claims older than the given threshold.
    CleanupStale {
        #[arg(long)]
        threshold_seconds: u64,
        #[arg(long, default_value = "system")]
        actor: String,
    },

    /// Look up a UIN's current record.
    Lookup {
        uin: String,
    },

    /// Show the audit trail for a UIN.
    Audit {
        uin: String,
    },

    /// Show pool counts by status.
    PoolStats {
        #[arg(long)]
        scope: Option<String>,
    },
}
