// CLI tool for re-encrypting secrets after key rotation.
// Run with: cargo run --bin reencrypt-secrets -- --help

use anyhow::{Context, Result};
use assistant_storage::{EncryptionService, ENCRYPTED_COLUMNS};
use sqlx::PgPool;
use std::env;

#[derive(Debug)]
struct Args {
    dry_run: bool,
    batch_size: i64,
    table: Option<String>,
}

impl Args {
    fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().collect();
        let mut dry_run = false;
        let mut batch_size = 100i64;
        let mut table = None;
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--dry-run" | "-n" => dry_run = true,
                "--batch-size" | "-b" => {
                    i += 1;
                    batch_size = args.get(i).context("--batch-size requires a value")?.parse().context("invalid batch size")?;
                }
                "--table" | "-t" => {
                    i += 1;
                    table = Some(args.get(i).context("--table requires a value")?.to_string());
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                arg => {
                    eprintln!("unknown argument: {arg}");
                    print_help();
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        Ok(Self { dry_run, batch_size, table })
    }
}

fn print_help() {
    eprintln!(
        r#"
reencrypt-secrets - re-encrypt database secrets after key rotation

USAGE:
    reencrypt-secrets [OPTIONS]

OPTIONS:
    -n, --dry-run           show what would be changed without making changes
    -b, --batch-size <N>    process N records at a time (default: 100)
    -t, --table <NAME>      only process the given table (default: all)
    -h, --help              show this help message

ENVIRONMENT:
    DATABASE_URL                        PostgreSQL connection string (required)
    CREDENTIALS_ENCRYPTION_KEY          current encryption key (required)
    CREDENTIALS_ENCRYPTION_KEY_PREVIOUS previous encryption key, for rotation

EXAMPLES:
    reencrypt-secrets --dry-run
    reencrypt-secrets
    reencrypt-secrets --table connectors --batch-size 50
"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("reencrypt_secrets=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse()?;

    if let Ok(path) = dotenvy::dotenv() {
        tracing::info!("loaded .env from {:?}", path);
    }

    let encryption = EncryptionService::from_env()
        .context("failed to initialize encryption service, ensure CREDENTIALS_ENCRYPTION_KEY is set")?;
    tracing::info!("encryption service initialized, primary key: {}", encryption.primary_key_id());

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let pool = PgPool::connect(&database_url).await.context("failed to connect to database")?;
    tracing::info!("connected to database");

    let tables = get_encrypted_tables(&args.table);
    if tables.is_empty() {
        tracing::info!("no matching encrypted tables found");
        return Ok(());
    }

    let mut total_processed = 0u64;
    let mut total_reencrypted = 0u64;

    for table_info in tables {
        tracing::info!("processing table: {}", table_info.name);
        let (processed, reencrypted) = process_table(&pool, &encryption, &table_info, args.batch_size, args.dry_run).await?;
        total_processed += processed;
        total_reencrypted += reencrypted;
    }

    if args.dry_run {
        tracing::info!("dry run: would re-encrypt {} of {} records", total_reencrypted, total_processed);
    } else {
        tracing::info!("re-encrypted {} of {} records", total_reencrypted, total_processed);
    }

    Ok(())
}

struct EncryptedTable {
    name: &'static str,
    id_column: &'static str,
    column: &'static str,
}

/// Reads the table list from `assistant_storage::ENCRYPTED_COLUMNS`, the same
/// registry `assistant_storage`'s own tests check against the migrations.
fn get_encrypted_tables(filter: &Option<String>) -> Vec<EncryptedTable> {
    let all_tables: Vec<EncryptedTable> =
        ENCRYPTED_COLUMNS.iter().map(|ec| EncryptedTable { name: ec.table, id_column: ec.id_column, column: ec.column }).collect();

    match filter {
        Some(name) => all_tables.into_iter().filter(|t| t.name == name).collect(),
        None => all_tables,
    }
}

async fn process_table(
    pool: &PgPool,
    encryption: &EncryptionService,
    table: &EncryptedTable,
    batch_size: i64,
    dry_run: bool,
) -> Result<(u64, u64)> {
    let mut processed = 0u64;
    let mut reencrypted = 0u64;
    let mut offset = 0i64;

    loop {
        let query = format!(
            "SELECT {}, {} FROM {} ORDER BY {} LIMIT {} OFFSET {}",
            table.id_column, table.column, table.name, table.id_column, batch_size, offset
        );

        let rows: Vec<(uuid::Uuid, Option<Vec<u8>>)> = sqlx::query_as(&query).fetch_all(pool).await.context("failed to fetch records")?;
        if rows.is_empty() {
            break;
        }

        for (id, encrypted_data) in &rows {
            processed += 1;
            let Some(data) = encrypted_data else { continue };

            match encryption.is_current_key(data) {
                Ok(true) => {}
                Ok(false) => {
                    let key_id = EncryptionService::get_key_id(data).unwrap_or_default();
                    if dry_run {
                        tracing::info!("would re-encrypt {}.{} (id={id}, current_key={key_id})", table.name, table.column);
                    } else {
                        match encryption.reencrypt(data) {
                            Ok(Some(new_data)) => {
                                let update_query = format!("UPDATE {} SET {} = $1 WHERE {} = $2", table.name, table.column, table.id_column);
                                sqlx::query(&update_query).bind(&new_data).bind(id).execute(pool).await.context("failed to update record")?;
                                tracing::info!(
                                    "re-encrypted {}.{} (id={id}, {key_id} -> {})",
                                    table.name,
                                    table.column,
                                    encryption.primary_key_id()
                                );
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::error!("failed to re-encrypt {}.{} (id={id}): {e}", table.name, table.column);
                                continue;
                            }
                        }
                    }
                    reencrypted += 1;
                }
                Err(e) => tracing::warn!("failed to check key for {}.{} (id={id}): {e}", table.name, table.column),
            }
        }

        offset += batch_size;
        if processed % 1000 == 0 {
            tracing::info!("progress: {processed} processed, {reencrypted} need re-encryption");
        }
    }

    Ok((processed, reencrypted))
}
