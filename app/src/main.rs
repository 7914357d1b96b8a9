use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Mutex, PoisonError};

use sqlab_adapters::http::HttpSqlService;
use sqlab_core::error_presenter::RenderedError;
use sqlab_core::logging::{init_logging, LogTarget};
use sqlab_core::markup::sanitize_terminal;
use sqlab_core::query_controller::{Phase, QueryController, ResultsSurface};
use sqlab_core::settings::{FileSettingsStore, Settings};
use sqlab_core::table_renderer::{RenderedResult, RenderedTable, NO_RESULTS_TEXT};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseOutcome {
    Options,
    HelpRequested,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CliOptions {
    config_path: Option<PathBuf>,
    service_url: Option<String>,
    console_url: Option<String>,
    timeout_secs: Option<u64>,
    query: Option<String>,
    html: bool,
}

/// Collects the single outcome of a one-shot query for printing.
#[derive(Debug)]
struct CapturedOutput {
    html: bool,
    rendered: Mutex<Option<String>>,
}

impl CapturedOutput {
    fn new(html: bool) -> Self {
        Self {
            html,
            rendered: Mutex::new(None),
        }
    }

    fn store(&self, text: String) {
        *self.rendered.lock().unwrap_or_else(PoisonError::into_inner) = Some(text);
    }

    fn take(&self) -> String {
        self.rendered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default()
    }
}

impl ResultsSurface for CapturedOutput {
    fn show_loading(&self) {}

    fn show_result(&self, rendered: &RenderedResult) {
        let text = if self.html {
            format!("{}\n{}", rendered.table.to_html(), rendered.stats_html())
        } else {
            format_result_text(rendered)
        };
        self.store(text);
    }

    fn show_error(&self, rendered: &RenderedError) {
        let text = if self.html {
            format!("{}\n{}", rendered.to_html(), rendered.stats_html())
        } else {
            format_error_text(rendered)
        };
        self.store(text);
    }
}

fn run_app(
    run_tui: impl FnOnce() -> Result<(), sqlab_tui::TuiError>,
) -> Result<(), Box<dyn std::error::Error>> {
    let _ = sqlab_core::domain_name();
    let _ = sqlab_adapters::adapter_name();
    let _ = sqlab_tui::ui_name();
    run_tui()?;
    Ok(())
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut options = CliOptions::default();
    if parse_args_from(std::env::args().skip(1), &mut options)? == ParseOutcome::HelpRequested {
        print_help();
        return Ok(ExitCode::SUCCESS);
    }

    let store = load_settings(&options)?;
    let settings = store.settings().clone();
    let log_target = if options.query.is_some() {
        LogTarget::Stderr
    } else {
        LogTarget::File(
            settings
                .logging
                .file
                .clone()
                .unwrap_or_else(|| store.default_log_path()),
        )
    };
    init_logging(&settings.logging, &log_target)?;
    info!(service_url = %settings.service_url, "sqlab starting");

    if let Some(sql) = &options.query {
        let (succeeded, output) = run_once(&settings, sql, options.html)?;
        println!("{output}");
        return Ok(if succeeded {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    run_app(|| sqlab_tui::run(&settings))?;
    Ok(ExitCode::SUCCESS)
}

fn load_settings(options: &CliOptions) -> Result<FileSettingsStore, Box<dyn std::error::Error>> {
    let mut store = match &options.config_path {
        Some(path) => FileSettingsStore::load_from_path(path)?,
        None => FileSettingsStore::load_default()?,
    };
    apply_overrides(options, store.settings_mut());
    Ok(store)
}

fn apply_overrides(options: &CliOptions, settings: &mut Settings) {
    if let Some(service_url) = &options.service_url {
        settings.service_url.clone_from(service_url);
    }
    if let Some(console_url) = &options.console_url {
        settings.console_url.clone_from(console_url);
    }
    if let Some(timeout_secs) = options.timeout_secs {
        settings.request_timeout_secs = Some(timeout_secs);
    }
}

/// Runs one query through the controller and returns whether it succeeded
/// along with the rendered output.
fn run_once(
    settings: &Settings,
    sql: &str,
    html: bool,
) -> Result<(bool, String), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let service = HttpSqlService::from_settings(settings)?;
    let controller = QueryController::new(service, CapturedOutput::new(html));

    runtime.block_on(controller.submit(sql.trim()));

    let succeeded = controller.state().phase == Phase::Success;
    Ok((succeeded, controller.surface().take()))
}

fn format_result_text(rendered: &RenderedResult) -> String {
    let mut lines = Vec::new();
    match &rendered.table {
        RenderedTable::NoResults => lines.push(NO_RESULTS_TEXT.to_string()),
        RenderedTable::Table(view) => {
            lines.push(join_cells(&view.header));
            lines.extend(view.body.iter().map(|row| join_cells(row)));
        }
    }
    lines.push(String::new());
    lines.push(format!("Records returned: {}", rendered.records_returned));
    lines.push(format!("Time: {}", rendered.badge));
    lines.join("\n")
}

fn format_error_text(rendered: &RenderedError) -> String {
    format!(
        "{}\nTip: {}\nTime: {}",
        sanitize_terminal(&rendered.headline()),
        rendered.hint,
        rendered.badge
    )
}

fn join_cells(cells: &[String]) -> String {
    cells
        .iter()
        .map(|cell| sanitize_terminal(cell))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn parse_args_from(
    args: impl IntoIterator<Item = String>,
    options: &mut CliOptions,
) -> io::Result<ParseOutcome> {
    let mut args = args.into_iter();

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "-h" | "--help" => return Ok(ParseOutcome::HelpRequested),
            "--config" => options.config_path = Some(next_value(&mut args, "--config")?.into()),
            "--service-url" => options.service_url = Some(next_value(&mut args, "--service-url")?),
            "--console-url" => options.console_url = Some(next_value(&mut args, "--console-url")?),
            "--timeout-secs" => {
                options.timeout_secs = Some(
                    next_value(&mut args, "--timeout-secs")?
                        .parse::<u64>()
                        .map_err(|error| io_other(format!("invalid --timeout-secs value: {error}")))?,
                );
            }
            "--query" => options.query = Some(next_value(&mut args, "--query")?),
            "--html" => options.html = true,
            _ => {
                return Err(io_other(format!("unknown argument `{flag}`")));
            }
        }
    }

    Ok(ParseOutcome::Options)
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> io::Result<String> {
    args.next()
        .ok_or_else(|| io_other(format!("missing value for `{flag}`")))
}

fn print_help() {
    println!(
        "sqlab SQL learning console\n\n\
Usage:\n  sqlab [OPTIONS]\n\n\
Options:\n  --config <path>        Settings file (default: <config dir>/sqlab/settings.toml)\n  --service-url <url>    SQL service base URL (default: http://localhost:8080)\n  --console-url <url>    Database console URL (default: http://localhost:8082)\n  --timeout-secs <secs>  Request timeout, 0 disables it (default: none)\n  --query <sql>          Run one query, print the result and exit\n  --html                 With --query, print the HTML fragments instead of text\n  -h, --help             Show this help\n\n\
Environment:\n  SQLAB_CONFIG_DIR overrides the config directory.\n  RUST_LOG overrides the configured log level.\n"
    );
}

fn io_other(error: impl std::fmt::Display) -> io::Error {
    io::Error::other(error.to_string())
}
