use crate::runner::SeedResult;
use refinery_core::{Grade, Metrics, ScenarioId};
use serde::Serialize;
use std::collections::BTreeMap;

type Extractor = (&'static str, Box<dyn Fn(&Metrics) -> f64>);

#[derive(Debug, Serialize)]
pub struct ScenarioSummary {
    pub scenario: ScenarioId,
    pub seed_count: usize,
    /// Final grade counts, keyed by letter.
    pub grades: BTreeMap<String, usize>,
    pub metrics: Vec<MetricSummary>,
}

impl ScenarioSummary {
    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

fn extractors() -> Vec<Extractor> {
    vec![
        ("score", Box::new(|m| m.score)),
        ("cumulative_profit", Box::new(|m| m.cumulative_profit)),
        ("cumulative_penalty", Box::new(|m| m.cumulative_penalty)),
        ("incidents_total", Box::new(|m| f64::from(m.incidents_total))),
        ("shipment_reliability", Box::new(|m| m.shipment_reliability)),
        ("reliability", Box::new(|m| m.reliability)),
        ("carbon", Box::new(|m| m.carbon)),
        ("storage_max_ratio", Box::new(|m| m.storage_max_ratio)),
        (
            "directive_reliability",
            Box::new(|m| m.directive_reliability),
        ),
    ]
}

/// Group sweep results by scenario, in catalog order.
pub fn compute_summary(results: &[SeedResult]) -> Vec<ScenarioSummary> {
    let extractors = extractors();
    ScenarioId::ALL
        .into_iter()
        .filter_map(|scenario| {
            let finals: Vec<&Metrics> = results
                .iter()
                .filter(|r| r.scenario == scenario)
                .map(|r| &r.final_metrics)
                .collect();
            if finals.is_empty() {
                return None;
            }
            let mut grades = BTreeMap::new();
            for metrics in &finals {
                *grades.entry(metrics.grade.clone()).or_insert(0) += 1;
            }
            let metrics = extractors
                .iter()
                .map(|(name, extract)| {
                    let values: Vec<f64> = finals.iter().map(|&m| extract(m)).collect();
                    compute_metric_summary(name, &values)
                })
                .collect();
            Some(ScenarioSummary {
                scenario,
                seed_count: finals.len(),
                grades,
                metrics,
            })
        })
        .collect()
}

fn compute_metric_summary(name: &str, values: &[f64]) -> MetricSummary {
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    let stddev = variance.sqrt();

    MetricSummary {
        name: name.to_string(),
        mean,
        min,
        max,
        stddev,
    }
}

fn mean(summary: &ScenarioSummary, name: &str) -> f64 {
    summary.metric(name).map_or(0.0, |m| m.mean)
}

fn grade_spread(grades: &BTreeMap<String, usize>) -> String {
    grades
        .iter()
        .map(|(grade, count)| format!("{grade}x{count}"))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn print_summary(hours: u64, summaries: &[ScenarioSummary]) {
    let seeds = summaries.first().map_or(0, |s| s.seed_count);
    println!("\n=== Sweep ({seeds} seeds, {hours} h each) ===\n");
    println!(
        "{:<22} {:>7} {:>5} {:>12} {:>9} {:>9}  {}",
        "Scenario", "Score", "Grade", "Profit", "Incidents", "Ship rel", "Grades"
    );
    println!("{}", "-".repeat(90));
    for summary in summaries {
        let score = mean(summary, "score");
        println!(
            "{:<22} {:>7.1} {:>5} {:>12.0} {:>9.1} {:>9.2}  {}",
            summary.scenario.as_str(),
            score,
            Grade::from_score(score).as_str(),
            mean(summary, "cumulative_profit"),
            mean(summary, "incidents_total"),
            mean(summary, "shipment_reliability"),
            grade_spread(&summary.grades),
        );
    }
}
