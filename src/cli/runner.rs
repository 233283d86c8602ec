//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::PipelineConfig;
use crate::engine::{Pipeline, RunReport};
use crate::error::{Error, Result};
use crate::scheduler::Scheduler;
use crate::schema::yellow_trip_schema;
use crate::stages::{external_definition, materialization};
use crate::types::{parse_period_list, WarehouseBackend};
use crate::warehouse;
use serde_json::{json, Value};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run { warehouse, periods } => {
                let config = self.load_config(*warehouse, periods.as_deref())?;
                self.run_once(config).await
            }
            Commands::Schedule {
                max_runs,
                warehouse,
            } => {
                let config = self.load_config(*warehouse, None)?;
                self.schedule(config, *max_runs).await
            }
            Commands::Plan { warehouse } => {
                let config = self.load_config(*warehouse, None)?;
                self.plan(&config)
            }
            Commands::Inspect { warehouse } => {
                let config = self.load_config(*warehouse, None)?;
                self.inspect(&config).await
            }
        }
    }

    /// Load configuration and apply command-line overrides
    fn load_config(
        &self,
        backend: Option<WarehouseBackend>,
        periods: Option<&str>,
    ) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::load(self.cli.config.as_deref())?;
        if let Some(backend) = backend {
            config.warehouse.backend = backend;
        }
        if let Some(periods) = periods {
            config.periods = parse_period_list(periods)?;
        }
        config.validate()?;
        Ok(config)
    }

    async fn run_once(&self, config: PipelineConfig) -> Result<()> {
        let pipeline = Pipeline::from_config(config)?;
        let mut report = pipeline.run().await;
        self.output_report(&report);

        match report.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn schedule(&self, config: PipelineConfig, max_runs: Option<u32>) -> Result<()> {
        let schedule = config.schedule.clone();
        let pipeline = Pipeline::from_config(config)?;
        let scheduler = Scheduler::new(pipeline, &schedule).with_max_runs(max_runs);

        let outcome = scheduler.run(|report| self.output_report(report)).await;
        self.output_message(&json!({
            "runs": outcome.runs,
            "failures": outcome.failures,
        }));
        Ok(())
    }

    fn plan(&self, config: &PipelineConfig) -> Result<()> {
        let scratch = &config.scratch_dir;
        let periods: Vec<Value> = config
            .periods
            .iter()
            .map(|p| {
                json!({
                    "period": p,
                    "source_url": config.source_url(p),
                    "raw_path": config.raw_path(scratch, p),
                    "processed_path": config.processed_path(scratch, p),
                    "staged_key": config.staged_key(p),
                    "staged_uri": config.staged_uri(p),
                })
            })
            .collect();

        let job = materialization(config);
        let sql = match config.warehouse.backend {
            WarehouseBackend::BigQuery => job.to_bigquery_sql(),
            WarehouseBackend::DuckDb => job.to_duckdb_sql(),
        };

        self.output_message(&json!({
            "backend": config.warehouse.backend,
            "staging_url": config.staging_url(),
            "periods": periods,
            "external_table": external_definition(config),
            "optimized_table": config.optimized_table().to_string(),
            "schema": yellow_trip_schema().to_bigquery_json(),
            "sql": sql,
        }));
        Ok(())
    }

    async fn inspect(&self, config: &PipelineConfig) -> Result<()> {
        let warehouse = warehouse::from_config(config)?;
        let mut tables = Vec::new();
        for table in [config.external_table(), config.optimized_table()] {
            let info = warehouse.table_info(&table).await?;
            tables.push(json!({
                "table": table.to_string(),
                "exists": info.is_some(),
                "info": info,
            }));
        }
        self.output_message(&json!({
            "backend": warehouse.name(),
            "tables": tables,
        }));
        Ok(())
    }

    fn output_report(&self, report: &RunReport) {
        self.output_message(&report.to_json());
    }

    /// Output a message in the configured format
    fn output_message(&self, msg: &Value) {
        let rendered = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(msg),
            OutputFormat::Pretty => serde_json::to_string_pretty(msg),
        };
        match rendered {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("{}", Error::from(e)),
        }
    }
}
