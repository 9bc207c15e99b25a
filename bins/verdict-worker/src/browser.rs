/// Browser Probe Engine - Reference Interpreter Execution
///
/// **Core Responsibility:**
/// Run a program through the reference interpreter, which only exists as a
/// script bundle inside a browser page, and recover its output as text.
///
/// **Execution Protocol (per invocation):**
/// 1. Stage a harness document embedding the snippet and the input value
/// 2. Open a fresh page on the shared browser host and navigate to it
/// 3. Poll the result element until its text leaves the `loading...` sentinel
/// 4. Close the page and delete the harness document
///
/// **Resource Rules:**
/// - The browser host is long-lived and shared by all in-flight probes
/// - Every invocation stages its own uniquely named harness document,
///   removed on drop, so parallel probes never touch each other's files
/// - Polling is bounded by an attempt budget and always by a deadline
use crate::config::ProbeConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::probe::{Probe, TypecheckResult};
use anyhow::{anyhow, Context};
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures_util::StreamExt;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Text the harness shows until the interpreter has produced a result
pub const LOADING_SENTINEL: &str = "loading...";

/// Element whose text content carries the interpreter output
pub const RESULT_SELECTOR: &str = "#__app__ pre";

/// A page opened on a browser host
pub trait HarnessPage: Send {
    /// Current text of the result element, `None` while it is not rendered
    fn result_text(&mut self) -> impl Future<Output = HarnessResult<Option<String>>> + Send;

    fn close(self) -> impl Future<Output = HarnessResult<()>> + Send;
}

/// Something that can open isolated pages, usually a headless browser
pub trait BrowserHost: Send + Sync {
    type Page: HarnessPage;

    fn open_page(&self, url: &str) -> impl Future<Output = HarnessResult<Self::Page>> + Send;
}

/// Scratch harness document, deleted when dropped
pub struct HarnessDocument {
    file: NamedTempFile,
}

impl HarnessDocument {
    pub fn create(
        scratch_dir: Option<&Path>,
        snippet: &str,
        input: &str,
        interpreter_url: &str,
    ) -> HarnessResult<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("verdict-harness-").suffix(".html");

        let mut file = match scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        file.write_all(render_harness(snippet, input, interpreter_url).as_bytes())?;
        file.flush()?;

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn url(&self) -> String {
        file_url(self.path())
    }
}

/// Build the harness page for one run
pub fn render_harness(snippet: &str, input: &str, interpreter_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>Stella</title>
</head>
<body>
  <div id="__app__"></div>
  <script>
    var myCodeMirror = {{ getValue: () => {} }};
    var myCodeMirrorInput = {{ getValue: () => {} }};
  </script>
  <script src="{}"></script>
</body>
</html>
"#,
        js_string_literal(snippet),
        js_string_literal(input),
        interpreter_url,
    )
}

/// Quote `text` as a JavaScript string literal that is safe inside `<script>`
fn js_string_literal(text: &str) -> String {
    // A JSON string is a valid JS literal; `<\/` keeps `</script>` from closing the tag
    serde_json::Value::String(text.to_string())
        .to_string()
        .replace("</", "<\\/")
}

fn file_url(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{}", path)
    } else {
        format!("file:///{}", path)
    }
}

/// Poll the result element until it leaves the loading sentinel
pub async fn wait_for_result<P: HarnessPage>(
    page: &mut P,
    poll_interval: Duration,
    max_attempts: Option<u32>,
) -> HarnessResult<String> {
    let mut attempts = 0u32;

    loop {
        if let Some(text) = page.result_text().await? {
            if text.trim() != LOADING_SENTINEL {
                debug!(attempts, "Harness produced a result");
                return Ok(text);
            }
        }

        attempts += 1;
        if let Some(max) = max_attempts {
            if attempts >= max {
                return Err(HarnessError::ProbeTimeout { attempts });
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Resolves once the cancellation flag flips to `true`
async fn cancelled(signal: &mut watch::Receiver<bool>) {
    loop {
        if *signal.borrow_and_update() {
            return;
        }
        if signal.changed().await.is_err() {
            // Sender gone: nobody can cancel any more
            std::future::pending::<()>().await;
        }
    }
}

/// Executes programs on the reference interpreter through a browser host
pub struct BrowserProbe<H> {
    host: H,
    interpreter_url: String,
    config: ProbeConfig,
    scratch_dir: Option<PathBuf>,
    cancel: Option<watch::Receiver<bool>>,
}

impl<H: BrowserHost> BrowserProbe<H> {
    /// Fails if the interpreter bundle cannot be found
    pub fn new(host: H, config: ProbeConfig) -> anyhow::Result<Self> {
        Ok(Self {
            host,
            interpreter_url: interpreter_url(&config.interpreter_script)?,
            scratch_dir: config.scratch_dir.clone(),
            config,
            cancel: None,
        })
    }

    /// Abort in-flight polling once `signal` becomes `true`
    pub fn with_cancellation(mut self, signal: watch::Receiver<bool>) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Run `snippet` with `input` and return the raw result text
    #[tracing::instrument(skip_all, fields(snippet_len = snippet.len()))]
    pub async fn run(&self, snippet: &str, input: &str) -> HarnessResult<String> {
        let document = HarnessDocument::create(
            self.scratch_dir.as_deref(),
            snippet,
            input,
            &self.interpreter_url,
        )?;
        debug!(harness = %document.path().display(), "Harness document staged");

        let mut page = self.host.open_page(&document.url()).await?;
        let outcome = self.await_completion(&mut page).await;

        if let Err(e) = page.close().await {
            warn!(error = %e, "Failed to close harness page");
        }
        drop(document);

        outcome
    }

    /// Decide whether `snippet` typechecks using the configured strategy
    pub async fn typecheck(&self, snippet: &str) -> HarnessResult<TypecheckResult> {
        let probe = Probe::new(self.config.strategy);
        debug!(strategy = ?probe.strategy(), input = %probe.input(), "Probing snippet");
        let output = self.run(snippet, probe.input()).await?;
        Ok(probe.interpret(&output))
    }

    async fn await_completion(&self, page: &mut H::Page) -> HarnessResult<String> {
        let timeout_ms = self.config.timeout_ms;
        let polling = wait_for_result(page, self.config.poll_interval(), self.config.max_poll_attempts);
        let bounded = async {
            match tokio::time::timeout(self.config.timeout(), polling).await {
                Ok(outcome) => outcome,
                Err(_) => Err(HarnessError::ProbeDeadline { timeout_ms }),
            }
        };

        match &self.cancel {
            Some(signal) => {
                let mut signal = signal.clone();
                tokio::select! {
                    outcome = bounded => outcome,
                    _ = cancelled(&mut signal) => Err(HarnessError::ProbeCancelled),
                }
            }
            None => bounded.await,
        }
    }
}

/// `file://` URL of the interpreter bundle, which must exist
pub fn interpreter_url(script: &Path) -> anyhow::Result<String> {
    let script = script
        .canonicalize()
        .with_context(|| format!("Reference interpreter bundle not found: {}", script.display()))?;
    Ok(file_url(&script))
}

fn browser_error(err: impl std::fmt::Display) -> HarnessError {
    HarnessError::Browser(err.to_string())
}

/// Headless Chromium driven over the DevTools protocol
pub struct ChromiumHost {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumHost {
    pub async fn launch(no_sandbox: bool) -> anyhow::Result<Self> {
        let mut builder = BrowserConfig::builder();
        if no_sandbox {
            builder = builder.arg("--no-sandbox");
        }
        let config = builder.build().map_err(|e| anyhow!("Invalid browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser host")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser connection closed");
                    break;
                }
            }
        });

        info!("Browser host launched");
        Ok(Self { browser, handler })
    }

    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        self.browser.close().await.context("Failed to close browser host")?;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler.abort();
        info!("Browser host closed");
        Ok(())
    }
}

pub struct ChromiumPage {
    page: chromiumoxide::Page,
}

impl HarnessPage for ChromiumPage {
    async fn result_text(&mut self) -> HarnessResult<Option<String>> {
        // The interpreter renders the element itself; absent means still booting
        let elements = self
            .page
            .find_elements(RESULT_SELECTOR)
            .await
            .map_err(browser_error)?;
        match elements.into_iter().next() {
            Some(element) => element.inner_text().await.map_err(browser_error),
            None => Ok(None),
        }
    }

    async fn close(self) -> HarnessResult<()> {
        self.page.close().await.map_err(browser_error)
    }
}

impl BrowserHost for ChromiumHost {
    type Page = ChromiumPage;

    async fn open_page(&self, url: &str) -> HarnessResult<ChromiumPage> {
        let page = self.browser.new_page(url).await.map_err(browser_error)?;
        Ok(ChromiumPage { page })
    }
}
