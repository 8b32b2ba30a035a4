use std::path::PathBuf;

use clap::Parser;

use crate::db;
use crate::migrate;

#[derive(Parser)]
#[command(name = "mixxport")]
enum Cli {
    /// Migrate a Mixxx library into a fresh Rekordbox master.db
    Migrate(MigrateArgs),
    /// Rebuild Rekordbox cues from Serato Markers2 tags in the track files
    ImportSerato(ImportSeratoArgs),
}

#[derive(clap::Args)]
struct MigrateArgs {
    /// Path to the Mixxx mixxxdb.sqlite
    #[arg(long)]
    source: String,
    /// Path to the Rekordbox master.db to create
    #[arg(long)]
    target: String,
    /// SQLCipher key for the target (falls back to MIXXPORT_REKORDBOX_KEY,
    /// then to the well-known Rekordbox 6 key)
    #[arg(long)]
    key: Option<String>,
    /// Directory holding the target schema DDL
    #[arg(long, default_value = "schema")]
    schema_dir: PathBuf,
    /// Skip applying the schema (target already initialized)
    #[arg(long)]
    no_init: bool,
    /// Rewrite track paths starting with this prefix
    #[arg(long, requires = "to_prefix")]
    from_prefix: Option<String>,
    /// Replacement for --from-prefix
    #[arg(long, requires = "from_prefix")]
    to_prefix: Option<String>,
    /// Print the migration report as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct ImportSeratoArgs {
    /// Path to the Rekordbox master.db
    #[arg(long)]
    target: String,
    /// SQLCipher key for the target
    #[arg(long)]
    key: Option<String>,
    /// Add recovered cues alongside existing ones instead of replacing them
    #[arg(long)]
    keep_existing: bool,
    /// Print the import report as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn resolve_key(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var(db::KEY_ENV_VAR).ok())
        .unwrap_or_else(|| db::REKORDBOX_DB_KEY.to_string())
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse() {
        Cli::Migrate(args) => {
            let opts = migrate::MigrateOptions {
                source: args.source,
                target: args.target,
                key: resolve_key(args.key),
                schema_dir: args.schema_dir,
                init: !args.no_init,
                from_prefix: args.from_prefix,
                to_prefix: args.to_prefix,
            };
            let report = migrate::run_migration(&opts)?;
            for warning in &report.warnings {
                eprintln!("[migrate] warning: {warning}");
            }
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Cli::ImportSerato(args) => {
            let opts = migrate::SeratoImportOptions {
                target: args.target,
                key: resolve_key(args.key),
                keep_existing: args.keep_existing,
            };
            let report = migrate::run_serato_import(&opts)?;
            for warning in &report.warnings {
                eprintln!("[serato] warning: {warning}");
            }
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_flag_wins_over_default() {
        assert_eq!(resolve_key(Some("abc".to_string())), "abc");
    }

    #[test]
    fn key_defaults_to_well_known_value() {
        // Only meaningful when the env override is unset, as in CI.
        if std::env::var(db::KEY_ENV_VAR).is_err() {
            assert_eq!(resolve_key(None), db::REKORDBOX_DB_KEY);
        }
    }
}
