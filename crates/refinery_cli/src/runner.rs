use anyhow::{Context, Result};
use refinery_core::{CommandEnvelope, Constants, Engine, Metrics, ScenarioId};
use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Real seconds passed to `Engine::update` per frame when driving by hours.
const FRAME_SECONDS: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
pub enum Span {
    /// Fixed number of one-minute ticks.
    Ticks(u64),
    /// Simulated hours, driven through the real-time clock one frame at a time.
    /// The last frame may run a few minutes past the end.
    Hours(u64),
}

pub struct RunOptions {
    pub seed: u64,
    pub span: Span,
    pub scenario: Option<ScenarioId>,
    pub constants: Constants,
    pub state: Option<PathBuf>,
    pub save: Option<PathBuf>,
    pub commands: Option<PathBuf>,
    /// Simulated minutes between status lines; 0 disables them.
    pub print_every: u64,
    pub metrics_every: u64,
    /// Where `run_info.json` and `metrics.csv` go. `None` skips metrics output.
    pub run_dir: Option<PathBuf>,
}

/// Fires once each time the clock crosses a multiple of `interval`.
struct Every {
    interval: u64,
    last: u64,
}

impl Every {
    fn new(interval: u64, minute: u64) -> Self {
        let interval = interval.max(1);
        Self {
            interval,
            last: minute / interval,
        }
    }

    fn due(&mut self, minute: u64) -> bool {
        let bucket = minute / self.interval;
        if bucket > self.last {
            self.last = bucket;
            true
        } else {
            false
        }
    }
}

/// Scripted operator commands, applied once the clock reaches their minute.
#[derive(Debug, Default)]
pub struct CommandScript {
    pending: VecDeque<CommandEnvelope>,
}

impl CommandScript {
    pub fn new(mut commands: Vec<CommandEnvelope>) -> Self {
        commands.sort_by_key(|c| c.at_minute);
        Self {
            pending: commands.into(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading command script: {}", path.display()))?;
        let commands: Vec<CommandEnvelope> = serde_json::from_str(&json)
            .with_context(|| format!("parsing command script: {}", path.display()))?;
        Ok(Self::new(commands))
    }

    /// Execute every command due at or before the current minute. Returns how many ran.
    pub fn apply_due(&mut self, engine: &mut Engine) -> usize {
        let minute = engine.clock().minute;
        let mut applied = 0;
        while self.pending.front().is_some_and(|c| c.at_minute <= minute) {
            let Some(envelope) = self.pending.pop_front() else {
                break;
            };
            if let Err(err) = engine.execute(&envelope.command) {
                tracing::warn!(minute, command = ?envelope.command, "scripted command rejected: {err}");
            }
            applied += 1;
        }
        applied
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

pub struct MetricsSink {
    writer: csv::Writer<File>,
    every: Every,
    last_minute: Option<u64>,
}

impl MetricsSink {
    pub fn create(dir: &Path, every: u64, start_minute: u64) -> Result<Self> {
        let path = dir.join("metrics.csv");
        let writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        Ok(Self {
            writer,
            every: Every::new(every, start_minute),
            last_minute: None,
        })
    }

    fn observe(&mut self, metrics: &Metrics) -> Result<()> {
        if self.every.due(metrics.minute) {
            self.write(metrics)?;
        }
        Ok(())
    }

    fn write(&mut self, metrics: &Metrics) -> Result<()> {
        self.writer
            .serialize(metrics)
            .context("writing metrics row")?;
        self.last_minute = Some(metrics.minute);
        Ok(())
    }

    /// Always captures the final state, then flushes.
    pub fn finish(mut self, final_metrics: &Metrics) -> Result<()> {
        if self.last_minute != Some(final_metrics.minute) {
            self.write(final_metrics)?;
        }
        self.writer.flush().context("flushing metrics")?;
        Ok(())
    }
}

pub fn write_run_info(dir: &Path, run_id: &str, options: &RunOptions) -> Result<()> {
    let (ticks, hours) = match options.span {
        Span::Ticks(ticks) => (Some(ticks), None),
        Span::Hours(hours) => (None, Some(hours)),
    };
    let info = serde_json::json!({
        "run_id": run_id,
        "seed": options.seed,
        "start_time": chrono::Utc::now().to_rfc3339(),
        "scenario": options.scenario.map(ScenarioId::as_str),
        "metrics_every": options.metrics_every,
        "runner": "refinery_cli",
        "constants": options.constants,
        "args": {
            "ticks": ticks,
            "hours": hours,
            "print_every": options.print_every,
            "state": options.state,
            "commands": options.commands,
        }
    });
    let path = dir.join("run_info.json");
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &info)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn load_state(engine: &mut Engine, path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading state file: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&json)
        .with_context(|| format!("parsing state file: {}", path.display()))?;
    engine
        .load_snapshot(&value)
        .with_context(|| format!("loading state file: {}", path.display()))?;
    Ok(())
}

pub fn save_state(engine: &Engine, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &engine.create_snapshot())
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Advance the engine over `span`, applying scripted commands before each step.
pub fn drive(
    engine: &mut Engine,
    span: Span,
    script: &mut CommandScript,
    mut sink: Option<&mut MetricsSink>,
    print_every: u64,
) -> Result<()> {
    let start = engine.clock().minute;
    let mut printer = (print_every > 0).then(|| Every::new(print_every, start));
    let end = match span {
        Span::Ticks(ticks) => start + ticks,
        Span::Hours(hours) => {
            if !engine.clock().running {
                engine.toggle_running();
            }
            start + hours * 60
        }
    };

    while engine.clock().minute < end {
        script.apply_due(engine);
        match span {
            Span::Ticks(_) => engine.advance_ticks(1),
            Span::Hours(_) => {
                engine.update(FRAME_SECONDS);
            }
        }

        let minute = engine.clock().minute;
        if printer.as_mut().is_some_and(|p| p.due(minute)) {
            print_status(&engine.metrics());
        }
        if let Some(sink) = sink.as_deref_mut() {
            sink.observe(&engine.metrics())?;
        }
    }
    Ok(())
}

/// Execute a single `run`: build the plant, drive it, and write whatever outputs were asked for.
pub fn run_plant(options: &RunOptions) -> Result<Metrics> {
    let mut engine = Engine::with_constants(options.seed, options.constants.clone());
    if let Some(path) = &options.state {
        load_state(&mut engine, path)?;
        println!("Using state file: {}", path.display());
    }
    if let Some(scenario) = options.scenario {
        engine.apply_scenario(scenario);
    }
    let mut script = match &options.commands {
        Some(path) => CommandScript::load(path)?,
        None => CommandScript::default(),
    };

    let mut sink = match &options.run_dir {
        Some(dir) => {
            let run_id = dir
                .file_name()
                .map_or_else(|| "run".to_string(), |n| n.to_string_lossy().into_owned());
            write_run_info(dir, &run_id, options)?;
            Some(MetricsSink::create(dir, options.metrics_every, engine.clock().minute)?)
        }
        None => None,
    };

    println!(
        "Starting simulation: seed={} scenario={} minute={}",
        options.seed,
        engine.state().scenario,
        engine.clock().minute,
    );
    println!("{}", "-".repeat(80));

    drive(
        &mut engine,
        options.span,
        &mut script,
        sink.as_mut(),
        options.print_every,
    )?;

    let final_metrics = engine.metrics();
    println!("{}", "-".repeat(80));
    println!("Done. Final state at minute {}:", final_metrics.minute);
    print_status(&final_metrics);
    if script.remaining() > 0 {
        tracing::warn!(
            remaining = script.remaining(),
            "run ended before every scripted command was due"
        );
    }

    if let Some(sink) = sink {
        sink.finish(&final_metrics)?;
        println!("Metrics written to metrics.csv.");
    }
    if let Some(path) = &options.save {
        save_state(&engine, path)?;
        println!("State saved to {}", path.display());
    }
    Ok(final_metrics)
}

pub fn print_status(metrics: &Metrics) {
    println!(
        "[day={day} {hour:02}:00]  crude={crude:6.1}  gas={gas:5.1} diesel={diesel:5.1} \
         jet={jet:5.1}  rel={rel:.2}  storage={storage:3.0}%  \
         profit/day={profit:>9.0}  score={score:5.1} {grade}",
        day = metrics.day,
        hour = metrics.hour,
        crude = metrics.crude_throughput,
        gas = metrics.gasoline,
        diesel = metrics.diesel,
        jet = metrics.jet,
        rel = metrics.reliability,
        storage = metrics.storage_max_ratio * 100.0,
        profit = metrics.profit_per_day,
        score = metrics.score,
        grade = metrics.grade,
    );
}

/// Final metrics of one (scenario, seed) pair in a sweep.
#[derive(Debug, Clone)]
pub struct SeedResult {
    pub scenario: ScenarioId,
    pub seed: u64,
    pub final_metrics: Metrics,
}

pub fn run_seed(constants: &Constants, scenario: ScenarioId, seed: u64, hours: u64) -> SeedResult {
    let mut engine = Engine::with_constants(seed, constants.clone());
    engine.apply_scenario(scenario);
    engine.advance_ticks(hours * 60);
    SeedResult {
        scenario,
        seed,
        final_metrics: engine.metrics(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refinery_core::{Command, Param, UnitId};
    use tempfile::TempDir;

    fn options(span: Span, run_dir: Option<PathBuf>) -> RunOptions {
        RunOptions {
            seed: 42,
            span,
            scenario: Some(ScenarioId::SummerPeak),
            constants: Constants::default(),
            state: None,
            save: None,
            commands: None,
            print_every: 0,
            metrics_every: 60,
            run_dir,
        }
    }

    #[test]
    fn test_run_plant_produces_output() {
        let temp_dir = TempDir::new().unwrap();
        let run_dir = temp_dir.path().join("run_42");
        std::fs::create_dir_all(&run_dir).unwrap();
        let mut opts = options(Span::Ticks(150), Some(run_dir.clone()));
        opts.save = Some(temp_dir.path().join("state.json"));

        let metrics = run_plant(&opts).unwrap();
        assert_eq!(metrics.minute, 150);
        assert_eq!(metrics.scenario, "summer_peak");

        let info: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("run_info.json")).unwrap())
                .unwrap();
        assert_eq!(info["seed"], 42);
        assert_eq!(info["run_id"], "run_42");
        assert_eq!(info["args"]["ticks"], 150);

        // Rows at minutes 60, 120 and the final 150.
        let mut reader = csv::Reader::from_path(run_dir.join("metrics.csv")).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert!(headers.iter().any(|h| h == "score"));
        let minute_col = headers.iter().position(|h| h == "minute").unwrap();
        let minutes: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[minute_col].to_string())
            .collect();
        assert_eq!(minutes, ["60", "120", "150"]);

        let saved = std::fs::read_to_string(temp_dir.path().join("state.json")).unwrap();
        let saved: serde_json::Value = serde_json::from_str(&saved).unwrap();
        assert_eq!(saved["minute"], 150);
    }

    #[test]
    fn test_saved_state_resumes() {
        let temp_dir = TempDir::new().unwrap();
        let state = temp_dir.path().join("state.json");
        let mut first = options(Span::Ticks(120), None);
        first.save = Some(state.clone());
        run_plant(&first).unwrap();

        let mut second = options(Span::Ticks(60), None);
        second.scenario = None;
        second.state = Some(state);
        let metrics = run_plant(&second).unwrap();
        assert_eq!(metrics.minute, 180);
        assert_eq!(metrics.scenario, "summer_peak");
    }

    #[test]
    fn test_hours_span_runs_through_the_clock() {
        let metrics = run_plant(&options(Span::Hours(2), None)).unwrap();
        assert!(metrics.minute >= 120);
        assert!(metrics.minute < 130);
    }

    #[test]
    fn test_script_applies_commands_when_due() {
        let mut engine = Engine::new(3);
        let mut script = CommandScript::new(vec![
            CommandEnvelope {
                at_minute: 30,
                command: Command::SetUnitThrottle {
                    unit: UnitId::Fcc,
                    throttle: 0.5,
                },
            },
            CommandEnvelope {
                at_minute: 0,
                command: Command::SetParam {
                    param: Param::CrudeIntake,
                    value: 180.0,
                },
            },
        ]);

        drive(&mut engine, Span::Ticks(10), &mut script, None, 0).unwrap();
        assert!((engine.params().crude_intake - 180.0).abs() < f64::EPSILON);
        assert_eq!(script.remaining(), 1);

        drive(&mut engine, Span::Ticks(30), &mut script, None, 0).unwrap();
        assert_eq!(script.remaining(), 0);
        let throttle = engine.state().overrides.get(&UnitId::Fcc).and_then(|o| o.throttle);
        assert!(throttle.is_some_and(|t| (t - 0.5).abs() < f64::EPSILON));
    }

    #[test]
    fn test_run_seed_determinism() {
        let constants = Constants::default();
        let a = run_seed(&constants, ScenarioId::Hurricane, 9, 6);
        let b = run_seed(&constants, ScenarioId::Hurricane, 9, 6);
        assert_eq!(a.final_metrics, b.final_metrics);
        assert_eq!(a.final_metrics.minute, 360);
        assert_eq!(a.final_metrics.scenario, "hurricane");
    }
}
