use crate::config::AppConfig;
use crate::error::AppError;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 80;

/// Copies everything the logger emits to stderr and to the run log.
struct TeeWriter {
    file: File,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

pub fn log_file_name(timestamp: &chrono::DateTime<chrono::Local>) -> String {
    format!("image_processing_{}.txt", timestamp.format("%Y%m%d_%H%M%S"))
}

fn open_run_log(folder: &Path) -> Result<(PathBuf, File), AppError> {
    fs::create_dir_all(folder)?;
    let now = chrono::Local::now();
    let path = folder.join(log_file_name(&now));
    let mut file = File::create(&path)?;
    writeln!(
        file,
        "Image Processing Log - {}",
        now.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(file, "{}\n", "=".repeat(RULE_WIDTH))?;
    file.flush()?;
    Ok((path, file))
}

/// Installs the global logger. Returns the run log path when file logging is on.
pub fn init(config: &AppConfig) -> Result<Option<PathBuf>, AppError> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info));

    let run_log = if config.log_to_file {
        let (path, file) = open_run_log(Path::new(&config.log_folder))?;
        builder
            .write_style(env_logger::WriteStyle::Never)
            .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })));
        Some(path)
    } else {
        None
    };

    builder
        .try_init()
        .map_err(|e| AppError::Generic(format!("logger already initialised: {}", e)))?;

    if let Some(path) = &run_log {
        log::info!("Logging to: {}", path.display());
    }
    Ok(run_log)
}

/// Writes the closing rule to the run log.
pub fn finish(run_log: Option<&Path>) {
    if let Some(path) = run_log {
        log::info!(
            "Processing ended at: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        log::info!("{}", "=".repeat(RULE_WIDTH));
        log::logger().flush();
        eprintln!("Log saved to: {}", path.display());
    }
}
