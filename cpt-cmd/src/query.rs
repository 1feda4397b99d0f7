use crate::{
    config::PipelineConfig,
    pipeline::{Pipeline, PointReport},
};
use anyhow::Context;
use chrono::Local;
use clap::{Args, ValueEnum};
use cpt_core::{
    gateway::{fixture::FixtureGateway, http::HttpGateway, DataGateway},
    params::{QueryParameters, Scenario},
    retrieval::PartialPolicy,
};
use cpt_data::export;
use log::info;
use std::{fs::File, path::PathBuf, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PartialFlag {
    /// Keep the models that answered and report the rest
    Tolerant,
    /// Fail the query when any model fails
    Strict,
}

impl From<PartialFlag> for PartialPolicy {
    fn from(flag: PartialFlag) -> Self {
        match flag {
            PartialFlag::Tolerant => PartialPolicy::Tolerant,
            PartialFlag::Strict => PartialPolicy::Strict,
        }
    }
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// First year of the table
    #[arg(long, default_value_t = 2010, value_parser = clap::value_parser!(i32).range(2010..=2020))]
    pub start_year: i32,

    /// Last year of the table
    #[arg(long, default_value_t = 2050, value_parser = clap::value_parser!(i32).range(2021..=2050))]
    pub end_year: i32,

    /// Emissions scenario: ssp126, ssp245, ssp370 or ssp585
    #[arg(long, default_value = "ssp585")]
    pub scenario: Scenario,

    /// Output path for the monthly table CSV
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Pipeline config JSON; missing keys take their defaults
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Base URL of the data gateway (overrides the config file)
    #[arg(long, conflicts_with = "fixture")]
    pub gateway_url: Option<String>,

    /// Answer queries from a recorded fixture instead of the gateway
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// What to do when some models fail (overrides the config file)
    #[arg(long, value_enum)]
    pub partial: Option<PartialFlag>,
}

impl QueryArgs {
    /// The config file, if any, with command line overrides applied.
    pub fn resolve_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_path(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(url) = &self.gateway_url {
            config.gateway.base_url = Some(url.clone());
        }
        if let Some(partial) = self.partial {
            config.partial_policy = partial.into();
        }
        Ok(config)
    }

    fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "point_temperature_{}.csv",
                Local::now().format("%Y%m%d")
            ))
        })
    }

    fn gateway(&self, config: &PipelineConfig) -> anyhow::Result<Arc<dyn DataGateway>> {
        if let Some(path) = &self.fixture {
            info!("Answering queries from fixture {}", path.display());
            let fixture = FixtureGateway::from_path(path)
                .with_context(|| format!("Failed to load fixture {}", path.display()))?;
            return Ok(Arc::new(fixture));
        }
        let Some(base_url) = &config.gateway.base_url else {
            anyhow::bail!(
                "No data gateway configured. Pass --gateway-url, --fixture or set gateway.base_url."
            );
        };
        info!("Querying gateway at {}", base_url);
        let gateway = HttpGateway::new(
            base_url,
            config.gateway_timeout(),
            &config.gateway.user_agent,
        )?;
        Ok(Arc::new(gateway))
    }
}

fn metric(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.1} °C", v))
}

/// The summary block printed after a query.
pub fn render_summary(report: &PointReport) -> String {
    let summary = &report.summary;
    let mut lines = vec![
        format!("Historical mean:  {}", metric(summary.historical_mean)),
        format!("Projected mean:   {}", metric(summary.ensemble_mean)),
        format!("Models:           {}", summary.model_count),
        format!("Ensemble spread:  {}", metric(summary.ensemble_spread)),
    ];
    if !report.dropped.is_empty() {
        lines.push(format!("Dropped models:   {}", report.dropped.len()));
        lines.extend(
            report
                .dropped
                .iter()
                .map(|dropped| format!("  {}: {}", dropped.model_id, dropped.reason)),
        );
    }
    lines.join("\n")
}

/// Run one point query, print its summary and write the monthly table.
pub async fn run_query(args: &QueryArgs) -> anyhow::Result<()> {
    let params = QueryParameters::new(
        args.lat,
        args.lon,
        args.start_year,
        args.end_year,
        args.scenario,
    )?;
    let config = args.resolve_config()?;
    let gateway = args.gateway(&config)?;
    let pipeline = Pipeline::new(gateway, &config);

    info!(
        "Querying ({}, {}) for {}-{} under {}",
        params.latitude(),
        params.longitude(),
        params.start_year(),
        params.end_year(),
        params.scenario()
    );
    let report = pipeline.run(&params).await?;
    println!("{}", render_summary(&report));

    let output = args.output_path();
    let file = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    export::write_csv(&report.table, file)?;
    info!(
        "Query complete. {} months written to {}",
        report.table.len(),
        output.display()
    );
    Ok(())
}
