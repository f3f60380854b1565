//! CLI command definitions

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::aws::{S3ObjectStore, SsmParameterSource};
use crate::config::BackupConfig;
use crate::error::{BackupError, BackupResult};
use crate::pipeline::BackupPipeline;
use crate::services::keyring::Keyring;
use crate::services::storage::object_key;

#[derive(Parser)]
#[command(name = "parameterstore-backup")]
#[command(about = "Export, encrypt and upload an AWS Parameter Store snapshot")]
pub struct Cli {
    /// Path to a JSON config file (default: $XDG_CONFIG_HOME/parameterstore-backup/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Run a backup now
    ///
    /// Imports the recipient key, reads every parameter with its decrypted
    /// value, encrypts the JSON-lines snapshot and writes it to every
    /// configured bucket under parameterstore-backup-<YYYYMMDD>.gpg.
    ///
    /// Example usage:
    ///   parameterstore-backup run --key-file backup.pub.asc --pin <sha256>
    ///   parameterstore-backup run --config /etc/backup.json --dry-run
    Run {
        /// Armored OpenPGP file with the recipient public key(s)
        #[arg(long)]
        key_file: Option<PathBuf>,

        /// Fingerprint (or unambiguous prefix) of the key to encrypt to
        #[arg(long)]
        recipient: Option<String>,

        /// Required SHA-256 fingerprint of the recipient key
        #[arg(long)]
        pin: Option<String>,

        /// Region of the parameter store
        #[arg(long)]
        region: Option<String>,

        /// AWS profile to load credentials from
        #[arg(long)]
        profile: Option<String>,

        /// Encrypt but do not upload
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the fingerprint of every key in an armored OpenPGP file
    ///
    /// The printed value is what `--pin` and `pinned_fingerprint` expect.
    Fingerprint {
        /// Armored OpenPGP file with public key(s)
        #[arg(long)]
        key_file: PathBuf,
    },

    /// Print the object key a backup would be written to
    ObjectKey {
        /// Date as YYYYMMDD (default: today, UTC)
        #[arg(long)]
        date: Option<String>,
    },

    /// Serve AWS Lambda invocations, one backup per event
    ///
    /// Runs inside the Lambda runtime (a custom runtime whose bootstrap
    /// calls this command). The event may carry {"dry_run": true}.
    Lambda,
}

/// Parse arguments, execute the command and map the outcome to an exit code
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.json;

    match execute(cli) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            if json {
                println!("{}", serde_json::json!({ "error": e.to_string() }));
            } else {
                eprintln!("Error: {}", e);
            }
            // 2: nothing left the process, 1: failed mid-run
            if e.is_local() { ExitCode::from(2) } else { ExitCode::FAILURE }
        }
    }
}

fn execute(cli: Cli) -> BackupResult<String> {
    match cli.command {
        Commands::Run {
            key_file,
            recipient,
            pin,
            region,
            profile,
            dry_run,
        } => {
            let mut config = BackupConfig::load(cli.config.as_deref())?;
            if let Some(key_file) = key_file {
                config.key_file = key_file;
            }
            if recipient.is_some() {
                config.recipient = recipient;
            }
            if pin.is_some() {
                config.pinned_fingerprint = pin;
            }
            if let Some(region) = region {
                config.source_region = region;
            }
            if profile.is_some() {
                config.aws_profile = profile;
            }
            config.dry_run |= dry_run;
            config.validate()?;

            let report = runtime()?.block_on(run_backup(config))?;

            if cli.json {
                Ok(serde_json::to_string_pretty(&report)?)
            } else {
                let mut out = format!(
                    "Backed up {} parameters ({} skipped) to {}",
                    report.parameters, report.skipped, report.object_key
                );
                for target in &report.uploaded {
                    out.push_str(&format!("\n  s3://{} ({})", target.bucket, target.region));
                }
                if report.dry_run {
                    out.push_str("\n  dry run, nothing uploaded");
                }
                Ok(out)
            }
        }
        Commands::Fingerprint { key_file } => {
            let mut keyring = Keyring::new();
            let result = keyring.import_file(&key_file)?;

            if cli.json {
                Ok(serde_json::to_string_pretty(&serde_json::json!({
                    "imported": result.imported,
                    "fingerprints": result.fingerprints,
                }))?)
            } else {
                Ok(keyring
                    .keys()
                    .iter()
                    .map(|k| {
                        format!(
                            "{}  {} ({} subkey(s))",
                            k.fingerprint(),
                            k.algorithm(),
                            k.subkey_count()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }
        Commands::ObjectKey { date } => {
            let stamp = match date {
                Some(date) => parse_stamp(&date)?,
                None => crate::services::storage::date_stamp(Utc::now()),
            };
            let config = BackupConfig::load(cli.config.as_deref())?;
            let key = object_key(&config.key_prefix, &stamp);

            if cli.json {
                Ok(serde_json::json!({ "object_key": key }).to_string())
            } else {
                Ok(key)
            }
        }
        Commands::Lambda => {
            let config = BackupConfig::load(cli.config.as_deref())?;
            runtime()?
                .block_on(crate::lambda::serve(config))
                .map_err(|e| BackupError::Provider(format!("Lambda runtime failed: {}", e)))?;
            Ok(String::new())
        }
    }
}

fn runtime() -> BackupResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

async fn run_backup(config: BackupConfig) -> BackupResult<crate::pipeline::BackupReport> {
    let profile = config.aws_profile.clone();
    let source = SsmParameterSource::connect(&config.source_region, profile.as_deref()).await;
    let sink = S3ObjectStore::connect(&config.targets, profile.as_deref()).await;

    BackupPipeline::new(config, source, sink).run(Utc::now()).await
}

fn parse_stamp(date: &str) -> BackupResult<String> {
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .map(|d| d.format("%Y%m%d").to_string())
        .map_err(|e| BackupError::Configuration(format!("invalid date '{}': {}", date, e)))
}
