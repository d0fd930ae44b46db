mod report;
mod runner;

pub use report::{report_comparison, report_summary, write_outputs};
pub use runner::{build_loader, run_zfs};

use crate::config::{Args, Config};
use crate::io::setup_output;
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct ZfsApplication {
    args: Args,
    config: Config,
}

impl ZfsApplication {
    pub fn from_cli() -> Result<Self> {
        let args = Args::parse();
        let config = load_config(&args)?;
        Ok(Self { args, config })
    }

    pub fn new(args: Args, config: Config) -> Self {
        Self { args, config }
    }

    pub fn run(self) -> Result<()> {
        setup_output(self.args.output.as_ref());
        info!("Configuration loaded from: {}", self.args.config_file);
        self.execute()
    }

    /// Everything `run` does except installing the log subscriber.
    pub fn execute(&self) -> Result<()> {
        let loader = build_loader(&self.config, &self.args)?;
        let options = self.config.zfs_options(&self.args);
        let nprocs = self.config.nprocs(&self.args);

        let result = run_zfs(&loader, &options, nprocs)?;
        report_summary(&result);

        let path = PathBuf::from(self.config.output_path(&self.args));
        let npy = self.config.output.write_npy.unwrap_or(true);
        let report = write_outputs(&result, &path, npy)?;

        if let Some(reference) = &self.args.compare {
            let tolerance = self.config.compare_tolerance(&self.args);
            report_comparison(&report, Path::new(reference), tolerance)?;
        }
        Ok(())
    }
}

pub fn load_config(args: &Args) -> Result<Config> {
    let config_content = fs::read_to_string(&args.config_file)
        .wrap_err_with(|| format!("Unable to read configuration file: {}", args.config_file))?;

    let config = serde_yml::from_str::<Config>(&config_content)
        .wrap_err("Failed to parse configuration file")?
        .with_defaults();

    Ok(config)
}
