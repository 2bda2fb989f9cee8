//! Run identity and on-disk naming conventions
//!
//! A simulation run is identified by its name, its start instant and its
//! length in whole hours. Every directory and file name derived from that
//! identity is produced and parsed here, so the export pipeline and the
//! repair walk always agree on the encoding.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::errors::{Fa2CfError, Result};

/// Timestamp format used inside merged/store file names, e.g. `2009-06-01T00`
pub const HOUR_STAMP_FORMAT: &str = "%Y-%m-%dT%H";

/// Format a timestamp for use in file names (whole-hour resolution)
pub fn hour_stamp(t: &NaiveDateTime) -> String {
    t.format(HOUR_STAMP_FORMAT).to_string()
}

/// Parse an `rstart` string in the `YYYYMMDDHH` encoding used on the command
/// line and inside run-directory names.
pub fn parse_rstart(s: &str) -> Result<NaiveDateTime> {
    if s.len() != 10 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Fa2CfError::Configuration(format!(
            "rstart '{}' does not match YYYYMMDDHH",
            s
        )));
    }
    let date = NaiveDate::parse_from_str(&s[..8], "%Y%m%d")
        .map_err(|e| Fa2CfError::Configuration(format!("rstart '{}': {}", s, e)))?;
    let hour: u32 = s[8..]
        .parse()
        .map_err(|_| Fa2CfError::Configuration(format!("rstart '{}' has an invalid hour", s)))?;
    date.and_hms_opt(hour, 0, 0)
        .ok_or_else(|| Fa2CfError::Configuration(format!("rstart '{}' has an invalid hour", s)))
}

/// Identity of one simulation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDescriptor {
    /// Experiment name, e.g. `noTEB`. May itself contain underscores.
    pub run_name: String,
    /// First model instant of the run (the analysis time)
    pub run_start: NaiveDateTime,
    /// Run length in whole hours
    pub run_length_hours: i64,
}

impl RunDescriptor {
    pub fn new(run_name: impl Into<String>, run_start: NaiveDateTime, run_length_hours: i64) -> Self {
        RunDescriptor {
            run_name: run_name.into(),
            run_start,
            run_length_hours,
        }
    }

    /// Build a descriptor from the three positional CLI arguments
    pub fn from_cli(run_name: &str, rstart: &str, run_length_hours: i64) -> Result<Self> {
        Ok(RunDescriptor::new(run_name, parse_rstart(rstart)?, run_length_hours))
    }

    /// The run start in the `YYYYMMDDHH` command-line encoding
    pub fn rstart_string(&self) -> String {
        self.run_start.format("%Y%m%d%H").to_string()
    }

    /// Last exported instant, `run_start + run_length_hours`
    pub fn end_time(&self) -> NaiveDateTime {
        self.run_start + Duration::hours(self.run_length_hours)
    }

    /// Name of the per-run scratch directory: `run_<name>_<rstart>_<nhours>`
    pub fn dir_name(&self) -> String {
        format!(
            "run_{}_{}_{}",
            self.run_name,
            self.rstart_string(),
            self.run_length_hours
        )
    }

    /// Base of every intermediate and merged file name: `<name>_<rstart>_<nhours>`
    pub fn store_base(&self) -> String {
        format!(
            "{}_{}_{}",
            self.run_name,
            self.rstart_string(),
            self.run_length_hours
        )
    }

    /// Recover a descriptor from a `run_<name>_<rstart>_<nhours>` directory
    /// name. Fields are split from the right so run names containing `_`
    /// round-trip unchanged.
    pub fn parse_dir_name(dir: &str) -> Result<Self> {
        let invalid = || Fa2CfError::RunDirParse { dir: dir.to_string() };
        let rest = dir.strip_prefix("run_").ok_or_else(invalid)?;
        let mut fields = rest.rsplitn(3, '_');
        let nhours = fields.next().ok_or_else(invalid)?;
        let rstart = fields.next().ok_or_else(invalid)?;
        let name = fields.next().ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }
        let run_length_hours: i64 = nhours.parse().map_err(|_| invalid())?;
        let run_start = parse_rstart(rstart).map_err(|_| invalid())?;
        Ok(RunDescriptor::new(name, run_start, run_length_hours))
    }

    /// File name of the merged series for one variable, e.g.
    /// `urban_2009053100_744_tas_2009-05-31T01_2009-07-01T00_3600.nc`.
    /// The window runs from the first exported step to the run end and the
    /// cadence is recorded in seconds.
    pub fn merged_file_name(&self, var_name: &str, output_cadence_seconds: i64) -> String {
        let tstart = self.run_start + Duration::seconds(output_cadence_seconds);
        let tstop = self.end_time();
        format!(
            "{}_{}_{}_{}_{}.nc",
            self.store_base(),
            var_name,
            hour_stamp(&tstart),
            hour_stamp(&tstop),
            output_cadence_seconds
        )
    }
}
