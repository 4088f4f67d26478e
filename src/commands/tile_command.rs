//! Tiling and pyramid build command

use std::path::PathBuf;

use clap::ArgMatches;
use log::{error, info};

use crate::commands::command_traits::Command;
use crate::config::{ConfigFile, FailurePolicy, GdalSettings, TilerConfig};
use crate::errors::{TilerError, TilerResult};
use crate::operators::GdalOperators;
use crate::tiling::{PyramidBuilder, TileRect};
use crate::utils::logger::Logger;

/// Window tiled when none is given on the command line
pub const DEFAULT_WINDOW: TileRect = TileRect {
    start_column: 0,
    start_row: 0,
    width: 32,
    height: 32,
};

/// Command that crops a source mosaic and builds its pyramid
pub struct TileCommand<'a> {
    source: PathBuf,
    output: PathBuf,
    /// Level-0 rectangle, `None` for the whole grid
    window: Option<TileRect>,
    config: TilerConfig,
    gdal: GdalSettings,
    /// Logger recording the outcome of the build
    run_log: &'a Logger,
}

impl<'a> TileCommand<'a> {
    /// Create a new tile command
    ///
    /// # Arguments
    /// * `args` - CLI argument matches from clap
    /// * `run_log` - Logger recording the outcome of the build
    ///
    /// # Returns
    /// A new TileCommand instance or an error for invalid arguments
    pub fn new(args: &ArgMatches, run_log: &'a Logger) -> TilerResult<Self> {
        let source = args
            .get_one::<String>("source")
            .ok_or_else(|| TilerError::GenericError("Missing source raster".to_string()))?;
        let output = args
            .get_one::<String>("output")
            .ok_or_else(|| TilerError::GenericError("Missing output folder".to_string()))?;

        let file = match args.get_one::<String>("config") {
            Some(path) => ConfigFile::load(&PathBuf::from(path))?,
            None => ConfigFile::empty(),
        };
        let config = Self::build_config(args, &file)?;

        let mut gdal = GdalSettings::from_file(&file)?;
        gdal.block_size = config.block_size();

        let window = if args.get_flag("full-grid") {
            None
        } else {
            Some(Self::parse_window(args)?)
        };

        Ok(TileCommand {
            source: PathBuf::from(source),
            output: PathBuf::from(output),
            window,
            config,
            gdal,
            run_log,
        })
    }

    /// Defaults, then the configuration file, then command-line flags
    fn build_config(args: &ArgMatches, file: &ConfigFile) -> TilerResult<TilerConfig> {
        let mut builder = TilerConfig::builder().apply_file(file)?;

        if let Some(&levels) = args.get_one::<u32>("levels") {
            builder = builder.levels(levels);
        }
        if let Some(&tile_size) = args.get_one::<u32>("tile-size") {
            builder = builder.tile_size(tile_size);
        }
        if let Some(&workers) = args.get_one::<usize>("workers") {
            builder = builder.workers(workers);
        }
        if let Some(&digits) = args.get_one::<usize>("digits") {
            builder = builder.digits(digits);
        }
        if args.get_flag("delete-original") {
            builder = builder.delete_original(true);
        }
        if args.get_flag("abort-on-failure") {
            builder = builder.failure_policy(FailurePolicy::Abort);
        }
        if args.get_flag("no-skip-existing") {
            builder = builder.skip_existing(false);
        }

        builder.build()
    }

    /// The four window arguments, or the default window when none are given
    fn parse_window(args: &ArgMatches) -> TilerResult<TileRect> {
        let values: Vec<u32> = match args.get_many::<u32>("window") {
            Some(values) => values.copied().collect(),
            None => return Ok(DEFAULT_WINDOW),
        };

        match values.as_slice() {
            &[start_column, start_row, width, height] => Ok(TileRect::new(start_column, start_row, width, height)),
            _ => Err(TilerError::InvalidConfig(format!(
                "expected startColumn startRow widthInTiles heightInTiles, got {} values",
                values.len()
            ))),
        }
    }
}

impl<'a> Command for TileCommand<'a> {
    fn execute(&self) -> TilerResult<()> {
        info!(
            "Tiling {} into {} ({} pixel tiles, {} levels, {} workers)",
            self.source.display(),
            self.output.display(),
            self.config.tile_size(),
            self.config.levels(),
            self.config.workers()
        );

        let operators = GdalOperators::new(self.gdal.clone());
        let builder = PyramidBuilder::new(&operators, self.config.clone())
            .with_run_log(self.run_log)
            .with_progress(true);
        let report = builder.build(&self.source, &self.output, self.window)?;

        println!("{}", report);
        if report.is_success() {
            Ok(())
        } else {
            for failure in report.failures() {
                error!("{}: {}", failure.label, failure.error);
            }
            Err(TilerError::GenericError(format!(
                "{} tiles or blocks failed",
                report.failure_count()
            )))
        }
    }
}
