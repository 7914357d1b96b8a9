use std::io;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("refusing to open non-http url `{0}`")]
    UnsupportedUrl(String),
    #[error("failed to launch `{opener}` for {url}: {source}")]
    Launch {
        opener: &'static str,
        url: String,
        #[source]
        source: io::Error,
    },
}

/// Opens `url` in the system browser without waiting for it.
pub fn open_in_browser(url: &str) -> Result<(), BrowserError> {
    if !is_http_url(url) {
        return Err(BrowserError::UnsupportedUrl(url.to_string()));
    }

    let (opener, args) = opener_command(url);
    Command::new(opener)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| BrowserError::Launch {
            opener,
            url: url.to_string(),
            source,
        })?;

    info!(%url, "opened database console");
    Ok(())
}

fn is_http_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn opener_command(url: &str) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "windows") {
        (
            "cmd",
            vec![
                "/C".to_string(),
                "start".to_string(),
                String::new(),
                url.to_string(),
            ],
        )
    } else if cfg!(target_os = "macos") {
        ("open", vec![url.to_string()])
    } else {
        ("xdg-open", vec![url.to_string()])
    }
}
