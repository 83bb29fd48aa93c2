//! Streams every simulated step of a run into a CSV file.
//!
//! Files are named `simulation-NNN.csv` in the configured directory; the
//! number increments until an unused name is found, so concurrent runs
//! never clobber each other. Event markers are written as `# Event`
//! comment lines between data rows.

use crate::conditions::SimulationConditions;
use crate::config::Config;
use crate::error::{SimResult, SimulationError};
use crate::extension::SimulationExtension;
use crate::flight_data::FlightDataType;
use crate::flight_event::{FlightEvent, FlightEventKind};
use crate::listener::SimulationListener;
use crate::status::SimulationStatus;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

const DEFAULT_DIRECTORY: &str = ".";
/// Give up probing for a free file name after this many attempts.
const MAX_FILE_NUMBER: u32 = 1000;

pub struct CsvSave {
    config: Config,
}

impl CsvSave {
    pub fn new() -> Self {
        Self { config: Config::new() }
    }
}

impl Default for CsvSave {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationExtension for CsvSave {
    fn id(&self) -> &'static str {
        "csv-save"
    }

    fn name(&self) -> &'static str {
        "CSV flight data export"
    }

    fn description(&self) -> &'static str {
        "Writes every simulated step to simulation-NNN.csv in the configured directory"
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    fn initialize(&self, conditions: &mut SimulationConditions) -> SimResult<()> {
        let directory = self.config.get_text("directory", DEFAULT_DIRECTORY).to_string();
        conditions.listeners_mut().add(Box::new(CsvSaveListener::new(directory)));
        Ok(())
    }
}

/// One-run CSV sink. The output stream lives from `start_simulation` to
/// `end_simulation`; `end_simulation` always closes it, aborted run or
/// not.
pub struct CsvSaveListener {
    directory: PathBuf,
    writer: Option<BufWriter<std::fs::File>>,
    /// Channel order fixed when the header is written.
    header: Vec<FlightDataType>,
    /// Set after an I/O failure; the listener goes quiet instead of
    /// failing the run.
    disabled: bool,
}

impl CsvSaveListener {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            writer: None,
            header: Vec::new(),
            disabled: false,
        }
    }

    /// Open the first `simulation-NNN.csv` that does not exist yet.
    fn open_output(&self) -> std::io::Result<(PathBuf, std::fs::File)> {
        for number in 0..MAX_FILE_NUMBER {
            let path = self.directory.join(format!("simulation-{number:03}.csv"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(std::io::Error::other("no free simulation-NNN.csv file name"))
    }

    fn disable_on_error(&mut self, error: std::io::Error) {
        log::error!("CSV export failed, disabling for the rest of the run: {error}");
        self.writer = None;
        self.disabled = true;
    }

    fn write_header(&mut self, status: &SimulationStatus) -> std::io::Result<()> {
        self.header = status.flight_data().types().cloned().collect();
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        let columns: Vec<String> = self
            .header
            .iter()
            .map(|t| {
                if t.unit().is_empty() {
                    t.name().to_string()
                } else {
                    format!("{} ({})", t.name(), t.unit())
                }
            })
            .collect();
        writeln!(writer, "# {}", columns.join(", "))
    }

    fn write_row(&mut self, status: &SimulationStatus) -> std::io::Result<()> {
        let branch = status.flight_data();
        let row: Vec<String> =
            self.header.iter().map(|t| format!("{:.6}", branch.get_last(t))).collect();
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        writeln!(writer, "{}", row.join(","))
    }
}

impl SimulationListener for CsvSaveListener {
    fn name(&self) -> &'static str {
        "CsvSaveListener"
    }

    fn start_simulation(&mut self, _status: &mut SimulationStatus) -> SimResult<()> {
        if self.writer.is_some() {
            // A listener instance serves one run; a live stream here
            // means the instance was reused.
            log::warn!("CSV output stream already open at simulation start, dropping it");
            self.writer = None;
        }
        let (path, file) = self.open_output().map_err(SimulationError::Io)?;
        log::info!("writing flight data to {}", path.display());
        let mut writer = BufWriter::new(file);
        writeln!(writer, "# Flight data export, {}", chrono::Local::now().to_rfc2822())
            .map_err(SimulationError::Io)?;
        self.writer = Some(writer);
        self.header.clear();
        Ok(())
    }

    fn post_step(&mut self, status: &mut SimulationStatus) -> SimResult<()> {
        if self.disabled || self.writer.is_none() {
            return Ok(());
        }
        if self.header.is_empty() {
            if let Err(e) = self.write_header(status) {
                self.disable_on_error(e);
                return Ok(());
            }
        }
        if let Err(e) = self.write_row(status) {
            self.disable_on_error(e);
        }
        Ok(())
    }

    fn handle_flight_event(
        &mut self,
        _status: &mut SimulationStatus,
        event: &FlightEvent,
    ) -> SimResult<bool> {
        // Altitude events are scheduling markers, not flight milestones.
        if event.kind == FlightEventKind::Altitude {
            return Ok(true);
        }
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writeln!(writer, "# Event {event}") {
                self.disable_on_error(e);
            }
        }
        Ok(true)
    }

    fn end_simulation(&mut self, _status: &mut SimulationStatus, error: Option<&SimulationError>) {
        if let Some(mut writer) = self.writer.take() {
            if let Some(error) = error {
                let _ = writeln!(writer, "# Simulation ended with error: {error}");
            }
            if let Err(e) = writer.flush() {
                log::error!("flushing CSV output failed: {e}");
            }
        }
    }
}
