use anyhow::{anyhow, bail, Result};
use std::sync::Arc;

use crate::cli::Commands;
use etl_core::Settings;
use etl_db::{with_connection, ScopedConnection};
use etl_executor::{FlowParams, FlowResult, PipelineOrchestrator};
use etl_log::StructuredLogger;
use etl_storage::{ObjectLocation, S3Store};

pub async fn execute(
    command: Commands,
    settings: &Settings,
    logger: Arc<StructuredLogger>,
) -> Result<()> {
    match command {
        Commands::Run {
            source_bucket,
            source_file,
            target_bucket,
            target_file,
            json,
        } => {
            if let Err(e) = logger.initialize().await {
                tracing::warn!("Audit log not initialized: {}", e);
            }

            let params = FlowParams::new(
                ObjectLocation::new(source_bucket, source_file),
                ObjectLocation::new(target_bucket, target_file),
            );
            let store = Arc::new(S3Store::new(settings.object_store.clone()));
            let result = PipelineOrchestrator::new(store, logger).run(&params).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result, &params);
            }

            if !result.success {
                bail!("Flow {} failed", result.run_id);
            }
        }

        Commands::InitLog => {
            let path = logger.initialize().await?;
            println!("{}", path.display());
        }

        Commands::DbCheck => {
            let conn = ScopedConnection::postgres(&settings.database, logger);
            let value = with_connection::<Result<Option<i64>>, _>(conn, |conn| {
                Box::pin(async move {
                    if !conn.is_connected() {
                        let cause = conn
                            .last_error()
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "not connected".to_string());
                        bail!("Database unavailable: {}", cause);
                    }

                    let id = conn.id().unwrap_or_default();
                    let mut cursor = conn
                        .cursor()
                        .ok_or_else(|| anyhow!("Database unavailable: not connected"))?;
                    let value = cursor.fetch_i64("SELECT 1").await?;
                    tracing::info!("Health query succeeded on connection {}", id);
                    Ok(value)
                })
            })
            .await?;

            println!("✓ Database reachable (SELECT 1 -> {:?})", value);
        }
    }

    Ok(())
}

fn print_result(result: &FlowResult, params: &FlowParams) {
    if result.success {
        println!("✓ Flow {} v{} succeeded", result.flow, result.version);
    } else {
        println!("✗ Flow {} v{} failed", result.flow, result.version);
    }
    println!("  Run: {}", result.run_id);
    println!("  Source: {}", params.source);
    println!("  Target: {}", params.target);
    if let Some(rows) = result.rows_extracted {
        println!("  Rows extracted: {}", rows);
    }
    if let Some(rows) = result.rows_written {
        println!("  Rows written: {}", rows);
    }
    if let Some(phase) = result.failed_phase {
        println!("  Failed phase: {}", phase);
    }
    if let Some(error) = &result.error {
        println!("  Error: {}", error);
    }
}
