//! CSV metrics log: one row per flushed point.
//!
//! Columns are elapsed seconds since the session started, average jitter in
//! milliseconds and average packet loss in percent, all with two decimals.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::metrics::AveragedPoint;

pub const METRICS_LOG_HEADER: &str = "Time,Jitter,PacketLoss";

const COLUMNS: [&str; 3] = ["Time", "Jitter", "PacketLoss"];

/// Writer for the metrics CSV.
///
/// Every row is flushed as it is written, so a failing sink is reported on
/// the point that hit it.
pub struct MetricsLog<W: Write> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl MetricsLog<File> {
    /// Create (or truncate) the log file and write the header.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::new(File::create(path)?)
    }
}

impl<W: Write> MetricsLog<W> {
    pub fn new(writer: W) -> io::Result<Self> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(COLUMNS).map_err(into_io_error)?;
        writer.flush()?;
        Ok(Self { writer, rows: 0 })
    }

    pub fn write_point(&mut self, point: &AveragedPoint, elapsed_ms: u64) -> io::Result<()> {
        self.writer
            .write_record([
                format!("{:.2}", elapsed_ms as f64 / 1000.0),
                format!("{:.2}", point.avg_jitter_ms),
                format!("{:.2}", point.avg_loss_percent),
            ])
            .map_err(into_io_error)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|err| err.into_error())
    }
}

/// One parsed log row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    #[serde(rename = "Time")]
    pub time_s: f64,
    #[serde(rename = "Jitter")]
    pub jitter_ms: f64,
    #[serde(rename = "PacketLoss")]
    pub packet_loss: f64,
}

/// Read a metrics log. The header row is required.
///
/// Integer loss counts from older logs parse as well.
pub fn read_metrics_log<P: AsRef<Path>>(path: P) -> io::Result<Vec<LogRow>> {
    parse_rows(File::open(path)?)
}

fn parse_rows<R: Read>(reader: R) -> io::Result<Vec<LogRow>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize::<LogRow>()
        .map(|row| row.map_err(into_io_error))
        .collect()
}

fn into_io_error(err: csv::Error) -> io::Error {
    if err.is_io_error() {
        io::Error::from(err)
    } else {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

/// Minimum, mean and maximum of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl ColumnStats {
    fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for value in values {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }
        (count > 0).then(|| Self {
            min,
            avg: sum / count as f64,
            max,
        })
    }
}

/// Offline summary of a metrics log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogSummary {
    pub rows: usize,
    pub duration_s: f64,
    pub jitter_ms: ColumnStats,
    pub packet_loss: ColumnStats,
}

impl LogSummary {
    /// `None` for an empty log.
    pub fn from_rows(rows: &[LogRow]) -> Option<Self> {
        let jitter_ms = ColumnStats::from_values(rows.iter().map(|r| r.jitter_ms))?;
        let packet_loss = ColumnStats::from_values(rows.iter().map(|r| r.packet_loss))?;
        let time = ColumnStats::from_values(rows.iter().map(|r| r.time_s))?;
        Some(Self {
            rows: rows.len(),
            duration_s: time.max - time.min,
            jitter_ms,
            packet_loss,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(jitter: f64, loss: f64) -> AveragedPoint {
        AveragedPoint {
            avg_jitter_ms: jitter,
            avg_loss_percent: loss,
            quality_score: 4.0,
            sequence_index: 0,
            sample_count: 1,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let mut log = MetricsLog::new(Vec::new()).unwrap();
        log.write_point(&point(12.3456, 1.5), 1_000).unwrap();
        log.write_point(&point(0.0, 0.0), 2_500).unwrap();
        assert_eq!(log.rows(), 2);

        let text = String::from_utf8(log.into_inner().unwrap()).unwrap();
        assert_eq!(text, "Time,Jitter,PacketLoss\n1.00,12.35,1.50\n2.50,0.00,0.00\n");
    }

    #[test]
    fn reads_back_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.log");
        {
            let mut log = MetricsLog::create(&path).unwrap();
            log.write_point(&point(10.0, 2.0), 1_000).unwrap();
            log.write_point(&point(30.0, 4.0), 3_000).unwrap();
            log.flush().unwrap();
        }

        let rows = read_metrics_log(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].jitter_ms, 30.0);

        let summary = LogSummary::from_rows(&rows).unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.duration_s, 2.0);
        assert_eq!(summary.jitter_ms.avg, 20.0);
        assert_eq!(summary.packet_loss.min, 2.0);
        assert_eq!(summary.packet_loss.max, 4.0);
    }

    #[test]
    fn accepts_integer_loss_counts() {
        let rows = parse_rows("Time,Jitter,PacketLoss\n0.52,1.25,3\n\n".as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![LogRow {
                time_s: 0.52,
                jitter_ms: 1.25,
                packet_loss: 3.0
            }]
        );
    }

    #[test]
    fn reads_quoted_fields() {
        let rows = parse_rows("Time,Jitter,PacketLoss\n\"1.00\",\"12.50\",\"0\"\n".as_bytes()).unwrap();
        assert_eq!(
            rows,
            vec![LogRow {
                time_s: 1.0,
                jitter_ms: 12.5,
                packet_loss: 0.0
            }]
        );
    }

    #[test]
    fn rejects_malformed_rows() {
        let err = parse_rows("Time,Jitter,PacketLoss\n1.0,abc,2\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let err = parse_rows("Time,Jitter,PacketLoss\n1.0,2.0\n".as_bytes()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(parse_rows("Elapsed,Jitter\n1.0,2.0\n".as_bytes()).is_err());
    }

    #[test]
    fn empty_log_has_no_summary() {
        assert!(LogSummary::from_rows(&[]).is_none());
    }
}
