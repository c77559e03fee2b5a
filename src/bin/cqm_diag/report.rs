use anyhow::{Context, Result};
use call_quality_meter::metrics::{AveragedPoint, QualityRating, Readout};
use call_quality_meter::report::LogSummary;
use call_quality_meter::session::RunSummary;
use call_quality_meter::telemetry::{MetricEvent, TelemetrySnapshot};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub source: &'static str,
    pub elapsed_ms: u64,
    pub samples: u64,
    pub points: u64,
    pub delivered: u64,
    pub dropped: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<Readout>,
    pub series: Vec<AveragedPoint>,
    pub collector_total: u64,
    pub collector_dropped: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error_messages: Vec<String>,
}

impl RunReport {
    pub fn new(source: &'static str, summary: &RunSummary, telemetry: &TelemetrySnapshot) -> Self {
        let latest = summary
            .points
            .last()
            .map(|point| Readout::from_point(point, summary.stats.delivery_percent));
        let error_messages = telemetry
            .recent
            .iter()
            .filter_map(|event| match event {
                MetricEvent::Error { code, context } => Some(format!("{code}: {context}")),
                _ => None,
            })
            .collect();

        Self {
            source,
            elapsed_ms: summary.elapsed_ms,
            samples: summary.stats.samples,
            points: summary.stats.points,
            delivered: summary.stats.delivered,
            dropped: summary.stats.dropped,
            delivery_percent: summary.stats.delivery_percent,
            latest,
            series: summary.points.clone(),
            collector_total: telemetry.total_events,
            collector_dropped: telemetry.dropped_events,
            error_messages,
        }
    }

    pub fn print_json(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing run report")?;
        println!("{json}");
        Ok(())
    }

    pub fn print_table(&self) {
        println!("Source                   : {}", self.source);
        println!("Elapsed                  : {} ms", self.elapsed_ms);
        println!(
            "Samples / points         : {} / {}",
            self.samples, self.points
        );
        match self.delivery_percent {
            Some(percent) => println!(
                "Chunks delivered/dropped : {} / {} ({:.1}%)",
                self.delivered, self.dropped, percent
            ),
            None => println!("Chunks delivered/dropped : n/a"),
        }
        println!(
            "Telemetry events         : {} (dropped {})",
            self.collector_total, self.collector_dropped
        );

        if let Some(latest) = &self.latest {
            println!(
                "Latest                   : jitter {}, loss {}, MOS {} ({})",
                latest.jitter, latest.packet_loss, latest.quality, latest.rating
            );
        } else {
            println!("Latest                   : n/a");
        }

        if !self.series.is_empty() {
            println!();
            println!("{:>5} {:>12} {:>10} {:>6}  {}", "#", "jitter ms", "loss %", "MOS", "rating");
            for point in &self.series {
                println!(
                    "{:>5} {:>12.2} {:>10.2} {:>6.2}  {}",
                    point.sequence_index + 1,
                    point.avg_jitter_ms,
                    point.avg_loss_percent,
                    point.quality_score,
                    QualityRating::from_mos(point.quality_score).label()
                );
            }
        }

        if !self.error_messages.is_empty() {
            println!("Errors                   :");
            for msg in &self.error_messages {
                println!("  - {msg}");
            }
        }
    }
}

pub fn print_summary_json(summary: &LogSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("serializing log summary")?;
    println!("{json}");
    Ok(())
}

pub fn print_summary_table(summary: &LogSummary) {
    println!("Rows                     : {}", summary.rows);
    println!("Duration                 : {:.2} s", summary.duration_s);
    println!(
        "Jitter min/avg/max (ms)  : {:.2} / {:.2} / {:.2}",
        summary.jitter_ms.min, summary.jitter_ms.avg, summary.jitter_ms.max
    );
    println!(
        "Loss min/avg/max (%)     : {:.2} / {:.2} / {:.2}",
        summary.packet_loss.min, summary.packet_loss.avg, summary.packet_loss.max
    );
}
