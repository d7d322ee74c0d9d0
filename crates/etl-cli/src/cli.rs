use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "etl")]
#[command(about = "ETL template - extract, transform and load Parquet datasets", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the ETL flow against the configured object store
    Run {
        /// Bucket holding the source dataset
        #[arg(long, default_value = "raw-data")]
        source_bucket: String,

        /// Key of the source dataset
        #[arg(long, default_value = "sample/data.parquet")]
        source_file: String,

        /// Bucket receiving the processed dataset
        #[arg(long, default_value = "processed-data")]
        target_bucket: String,

        /// Key of the processed dataset
        #[arg(long, default_value = "output/processed_data.parquet")]
        target_file: String,

        /// Print the flow result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create today's audit log partition and print its path
    InitLog,

    /// Open a database connection and run a health query
    DbCheck,
}
