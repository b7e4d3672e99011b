//! Mines `powerSource.parquet` out of a simulation run's output directory
//! and appends the clipped, schema-filtered rows to the durable aggregate
//! file, tracking a watermark so overlapping runs never duplicate rows.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use polars::prelude::*;

use crate::error::ProcessorError;
use crate::model::AggregateRow;

pub struct ResultProcessor {
    aggregate_path: PathBuf,
    last_processed_time: Mutex<Option<DateTime<Utc>>>,
}

impl ResultProcessor {
    /// Recovers `last_processed_time` from the max timestamp of an
    /// existing aggregate file, if one is already present from a prior
    /// process lifetime.
    pub fn new(aggregate_path: PathBuf) -> Result<Self, ProcessorError> {
        let last_processed_time = recover_watermark(&aggregate_path)?;
        Ok(Self {
            aggregate_path,
            last_processed_time: Mutex::new(last_processed_time),
        })
    }

    pub fn last_processed_time(&self) -> Option<DateTime<Utc>> {
        *self.last_processed_time.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Returns the number of rows appended. Zero means the clipped set was
    /// empty and nothing was written.
    pub fn process(
        &self,
        run_number: i64,
        output_dir: &Path,
        simulated_end_time: DateTime<Utc>,
        cached: bool,
    ) -> Result<usize, ProcessorError> {
        let power_source_path = find_power_source(output_dir)?;
        let raw_rows = read_power_source_rows(&power_source_path)?;

        let last_processed = self.last_processed_time();
        let new_rows: Vec<AggregateRow> = raw_rows
            .into_iter()
            .filter(|r| {
                let after_watermark = last_processed.map(|lp| r.timestamp > lp).unwrap_or(true);
                after_watermark && r.timestamp <= simulated_end_time
            })
            .map(|r| AggregateRow {
                timestamp: r.timestamp,
                run_number,
                power_draw: r.power_draw,
                energy_usage: r.energy_usage,
                carbon_intensity: r.carbon_intensity,
                carbon_emission: r.carbon_emission,
                cached,
            })
            .collect();

        if new_rows.is_empty() {
            return Ok(0);
        }

        let mut existing = read_aggregate_rows(&self.aggregate_path)?;
        let appended = new_rows.len();
        let max_ts = new_rows.iter().map(|r| r.timestamp).max().expect("non-empty");
        existing.extend(new_rows);
        write_aggregate_rows(&self.aggregate_path, &existing)?;

        *self.last_processed_time.lock().unwrap_or_else(|p| p.into_inner()) = Some(max_ts);
        Ok(appended)
    }
}

struct RawPowerRow {
    timestamp: DateTime<Utc>,
    power_draw: f64,
    energy_usage: f64,
    carbon_intensity: f64,
    carbon_emission: f64,
}

fn recover_watermark(path: &Path) -> Result<Option<DateTime<Utc>>, ProcessorError> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(read_aggregate_rows(path)?.into_iter().map(|r| r.timestamp).max())
}

fn find_power_source(output_dir: &Path) -> Result<PathBuf, ProcessorError> {
    let mut matches = Vec::new();
    collect_power_source(output_dir, &mut matches)?;
    matches.sort();
    if matches.len() > 1 {
        log::warn!(
            "found {} powerSource.parquet files under {}; using the first",
            matches.len(),
            output_dir.display()
        );
    }
    matches
        .into_iter()
        .next()
        .ok_or_else(|| ProcessorError::MissingOutput(output_dir.to_path_buf()))
}

fn collect_power_source(dir: &Path, matches: &mut Vec<PathBuf>) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_power_source(&path, matches)?;
        } else if path.file_name().and_then(|n| n.to_str()) == Some("powerSource.parquet") {
            matches.push(path);
        }
    }
    Ok(())
}

fn read_power_source_rows(path: &Path) -> Result<Vec<RawPowerRow>, ProcessorError> {
    let df = ParquetReader::new(fs::File::open(path)?).finish()?;
    let height = df.height();

    let Ok(timestamp_absolute) = df.column("timestamp_absolute").and_then(|s| s.i64()) else {
        log::warn!("powerSource.parquet at {} is missing timestamp_absolute; skipping", path.display());
        return Ok(Vec::new());
    };
    let power_draw = optional_f64_column(&df, "power_draw");
    let energy_usage = optional_f64_column(&df, "energy_usage");
    let carbon_intensity = optional_f64_column(&df, "carbon_intensity");
    let carbon_emission = optional_f64_column(&df, "carbon_emission");

    let mut rows = Vec::with_capacity(height);
    for i in 0..height {
        let Some(ms) = timestamp_absolute.get(i) else { continue };
        let Some(timestamp) = Utc.timestamp_millis_opt(ms).single() else { continue };
        rows.push(RawPowerRow {
            timestamp,
            power_draw: column_value(&power_draw, i),
            energy_usage: column_value(&energy_usage, i),
            carbon_intensity: column_value(&carbon_intensity, i),
            carbon_emission: column_value(&carbon_emission, i),
        });
    }
    Ok(rows)
}

fn optional_f64_column(df: &DataFrame, name: &str) -> Option<Float64Chunked> {
    match df.column(name).and_then(|s| s.f64().cloned()) {
        Ok(ca) => Some(ca),
        Err(_) => {
            log::warn!("powerSource.parquet missing or wrong-typed column '{name}'; defaulting to 0.0");
            None
        }
    }
}

fn column_value(column: &Option<Float64Chunked>, index: usize) -> f64 {
    column.as_ref().and_then(|c| c.get(index)).unwrap_or(0.0)
}

fn read_aggregate_rows(path: &Path) -> Result<Vec<AggregateRow>, ProcessorError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let df = ParquetReader::new(fs::File::open(path)?).finish()?;
    let height = df.height();
    let timestamp = df.column("timestamp")?.i64()?;
    let run_number = df.column("run_number")?.i64()?;
    let power_draw = df.column("power_draw")?.f64()?;
    let energy_usage = df.column("energy_usage")?.f64()?;
    let carbon_intensity = df.column("carbon_intensity")?.f64()?;
    let carbon_emission = df.column("carbon_emission")?.f64()?;
    let cached = df.column("cached")?.bool()?;

    let mut rows = Vec::with_capacity(height);
    for i in 0..height {
        let ts_ms = timestamp.get(i).unwrap_or_default();
        rows.push(AggregateRow {
            timestamp: Utc.timestamp_millis_opt(ts_ms).single().unwrap_or_else(Utc::now),
            run_number: run_number.get(i).unwrap_or_default(),
            power_draw: power_draw.get(i).unwrap_or_default(),
            energy_usage: energy_usage.get(i).unwrap_or_default(),
            carbon_intensity: carbon_intensity.get(i).unwrap_or_default(),
            carbon_emission: carbon_emission.get(i).unwrap_or_default(),
            cached: cached.get(i).unwrap_or_default(),
        });
    }
    Ok(rows)
}

fn write_aggregate_rows(path: &Path, rows: &[AggregateRow]) -> Result<(), ProcessorError> {
    let timestamp: Vec<i64> = rows.iter().map(|r| r.timestamp.timestamp_millis()).collect();
    let run_number: Vec<i64> = rows.iter().map(|r| r.run_number).collect();
    let power_draw: Vec<f64> = rows.iter().map(|r| r.power_draw).collect();
    let energy_usage: Vec<f64> = rows.iter().map(|r| r.energy_usage).collect();
    let carbon_intensity: Vec<f64> = rows.iter().map(|r| r.carbon_intensity).collect();
    let carbon_emission: Vec<f64> = rows.iter().map(|r| r.carbon_emission).collect();
    let cached: Vec<bool> = rows.iter().map(|r| r.cached).collect();

    let mut df = df![
        "timestamp" => timestamp,
        "run_number" => run_number,
        "power_draw" => power_draw,
        "energy_usage" => energy_usage,
        "carbon_intensity" => carbon_intensity,
        "carbon_emission" => carbon_emission,
        "cached" => cached,
    ]?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    ParquetWriter::new(file).finish(&mut df)?;
    Ok(())
}
