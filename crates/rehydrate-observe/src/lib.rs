use anyhow::Result;
use chrono::Utc;
use rehydrate_core::{AppConfig, HydrationReport, TelemetryConfig, runtime_dir};
use reqwest::blocking::Client;
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Diagnostics sink for hydration runs: a log file under the runtime dir,
/// stderr warnings, and optional HTTP telemetry.
pub struct Observer {
    log_path: PathBuf,
    telemetry: Option<TelemetrySink>,
    verbose: bool,
}

struct TelemetrySink {
    endpoint: String,
    client: Client,
}

impl Observer {
    pub fn new(workspace: &Path, telemetry_cfg: &TelemetryConfig) -> Result<Self> {
        let dir = runtime_dir(workspace);
        fs::create_dir_all(&dir)?;
        let telemetry = telemetry_sink(telemetry_cfg)?;
        Ok(Self {
            log_path: dir.join("observe.log"),
            telemetry,
            verbose: false,
        })
    }

    pub fn from_config(workspace: &Path, cfg: &AppConfig) -> Result<Self> {
        let mut observer = Self::new(workspace, &cfg.telemetry)?;
        observer.set_verbose(cfg.log.verbose);
        Ok(observer)
    }

    /// Append the report to the log, warn once per dropped message, and
    /// post counts to the telemetry endpoint when one is configured.
    pub fn record_hydration(&self, report: &HydrationReport) -> Result<()> {
        self.append_log_line(&format!(
            "{} HYDRATE {}",
            Utc::now().to_rfc3339(),
            serde_json::to_string(report)?
        ))?;
        for dropped in &report.dropped {
            self.warn_log(&format!(
                "dropped history message id={} reason={}",
                dropped.id, dropped.reason
            ));
        }
        self.verbose_log(&format!(
            "hydrated {} message(s), {} duplicate(s), {} dropped, {} on screen",
            report.accepted,
            report.duplicates,
            report.dropped.len(),
            report.total_messages
        ));
        self.emit_telemetry(
            "telemetry.hydration",
            json!({
                "accepted": report.accepted,
                "duplicates": report.duplicates,
                "dropped": report.dropped.len(),
                "total_messages": report.total_messages,
            }),
        )
    }

    /// Redeliveries are expected; only surfaced in verbose mode.
    pub fn record_duplicates(&self, dedupe_keys: &[String]) {
        for key in dedupe_keys {
            self.verbose_log(&format!("skipped duplicate {key}"));
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Log a message to stderr with `[rehydrate]` prefix when verbose mode is on.
    pub fn verbose_log(&self, msg: &str) {
        if self.verbose {
            eprintln!("[rehydrate] {msg}");
        }
    }

    /// Always written to the log file and to stderr.
    pub fn warn_log(&self, msg: &str) {
        eprintln!("[rehydrate WARN] {msg}");
        let _ = self.append_log_line(&format!("{} WARN {msg}", Utc::now().to_rfc3339()));
    }

    fn append_log_line(&self, line: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }

    fn emit_telemetry(&self, name: &str, payload: serde_json::Value) -> Result<()> {
        let Some(sink) = &self.telemetry else {
            return Ok(());
        };

        let body = json!({
            "name": name,
            "at": Utc::now().to_rfc3339(),
            "payload": payload,
        });

        // Posted from a background thread; the request may take up to the
        // client timeout and must not hold up the caller.
        let client = sink.client.clone();
        let endpoint = sink.endpoint.clone();
        let log_path = self.log_path.clone();
        std::thread::spawn(move || {
            if let Err(err) = client.post(&endpoint).json(&body).send() {
                let line = format!("{} TELEMETRY_ERROR error={}", Utc::now().to_rfc3339(), err);
                let _ = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_path)
                    .and_then(|mut f| writeln!(f, "{line}"));
            }
        });
        Ok(())
    }
}

fn telemetry_sink(cfg: &TelemetryConfig) -> Result<Option<TelemetrySink>> {
    if !cfg.enabled {
        return Ok(None);
    }
    let Some(endpoint) = cfg.endpoint.clone() else {
        return Ok(None);
    };
    let client = Client::builder().timeout(Duration::from_secs(3)).build()?;
    Ok(Some(TelemetrySink { endpoint, client }))
}
