use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::Writer;

use crate::study::StudyResult;
use crate::sweep::SweepRecord;
use crate::QueueError;

/// Rendering of a metric that is undefined for an unstable system
pub const NO_VALUE: &str = "NA";

const TABLE_HEADERS: [&str; 10] = [
    "parameter",
    "value",
    "servers",
    "service_rate",
    "lambda",
    "P0",
    "W",
    "P_w",
    "state",
    "rho",
];

pub fn create_timestamped_output_dir(output_root: &Path) -> Result<PathBuf, QueueError> {
    fs::create_dir_all(output_root)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut output_dir = output_root.join(&timestamp);
    let mut counter = 1_u32;

    while output_dir.exists() {
        output_dir = output_root.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn fmt_f64(value: f64) -> String {
    format!("{value:.10}")
}

fn fmt_option_f64(value: Option<f64>) -> String {
    value.map(fmt_f64).unwrap_or_else(|| NO_VALUE.to_string())
}

fn record_fields(record: &SweepRecord) -> [String; 11] {
    [
        record.axis.name().to_string(),
        record.value.to_string(),
        record.server_count.to_string(),
        fmt_f64(record.service_rate),
        fmt_f64(record.arrival_rate_per_server),
        fmt_f64(record.aggregate_arrival_rate),
        record.stability.label().to_string(),
        fmt_f64(record.idle_probability),
        fmt_option_f64(record.expected_wait),
        fmt_option_f64(record.wait_probability),
        fmt_option_f64(record.utilization),
    ]
}

pub fn write_sweep_csv(path: &Path, records: &[SweepRecord]) -> Result<(), QueueError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "parameter",
        "value",
        "server_count",
        "service_rate",
        "arrival_rate_per_server",
        "aggregate_arrival_rate",
        "stability",
        "idle_probability",
        "expected_wait",
        "wait_probability",
        "utilization",
    ])?;

    for record in records {
        writer.write_record(record_fields(record))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_summary_json(path: &Path, study: &StudyResult) -> Result<(), QueueError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, study)?;
    Ok(())
}

/// Render records as an aligned plain-text table in sweep order.
pub fn render_table(records: &[SweepRecord]) -> String {
    let rows: Vec<[String; 10]> = records
        .iter()
        .map(|record| {
            [
                record.axis.name().to_string(),
                record.value.to_string(),
                record.server_count.to_string(),
                format!("{:.1}", record.service_rate),
                format!("{:.1}", record.aggregate_arrival_rate),
                format!("{:.6e}", record.idle_probability),
                record
                    .expected_wait
                    .map(|w| format!("{w:.6}"))
                    .unwrap_or_else(|| NO_VALUE.to_string()),
                record
                    .wait_probability
                    .map(|pw| format!("{pw:.6}"))
                    .unwrap_or_else(|| NO_VALUE.to_string()),
                record.stability.description().to_string(),
                record
                    .utilization
                    .map(|rho| format!("{rho:.6}"))
                    .unwrap_or_else(|| NO_VALUE.to_string()),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(|header| header.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut table = String::new();
    push_row(&mut table, &TABLE_HEADERS.map(str::to_string), &widths);
    for row in &rows {
        push_row(&mut table, row, &widths);
    }
    table
}

fn push_row(table: &mut String, cells: &[String; 10], widths: &[usize; 10]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, &width)| format!("{cell:>width$}"))
        .collect();
    table.push_str(line.join("  ").trim_end());
    table.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QueueConfiguration;
    use crate::sweep::{SweepRange, SweepRunner};

    fn records() -> Vec<SweepRecord> {
        let config =
            QueueConfiguration::derived(10, 250.0, 250.0).with_aggregate_arrival_rate(2500.0);
        SweepRunner::new(config)
            .unwrap()
            .sweep_service_rate(&SweepRange::inclusive(250, 270, 10))
            .unwrap()
    }

    #[test]
    fn csv_marks_missing_metrics_as_na() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.csv");
        write_sweep_csv(&path, &records()).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[6], "stability");

        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 3);

        assert_eq!(&rows[0][1], "250");
        assert_eq!(&rows[0][6], "unstable");
        assert_eq!(&rows[0][7], "0.0000000000");
        assert_eq!(&rows[0][8], NO_VALUE);
        assert_eq!(&rows[0][9], NO_VALUE);
        assert_eq!(&rows[0][10], NO_VALUE);

        assert_eq!(&rows[1][6], "stable");
        assert_ne!(&rows[1][8], NO_VALUE);
        assert!(rows[1][10].parse::<f64>().unwrap() < 1.0);
    }

    #[test]
    fn table_keeps_sweep_order() {
        let table = render_table(&records());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("P_w"));
        assert!(lines[1].contains("El sistema es inestable"));
        assert!(lines[1].contains(NO_VALUE));
        assert!(lines[2].contains("El sistema es estable"));
        assert!(lines[2].contains("260"));
        assert!(lines[3].contains("270"));
    }

    #[test]
    fn output_dirs_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let first = create_timestamped_output_dir(root.path()).unwrap();
        let second = create_timestamped_output_dir(root.path()).unwrap();
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
    }
}
