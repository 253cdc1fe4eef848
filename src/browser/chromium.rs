//! chromiumoxide-backed sessions.
//!
//! Local mode launches one Chrome process per session. Remote mode opens a
//! fresh DevTools connection per session and creates a throwaway browser
//! context on it, so concurrent scrapes never share cookies or storage.

#[cfg(feature = "browser")]
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
    RequestStage,
};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::handler::viewport::Viewport;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tokio::time::timeout;

use super::config::BrowserLaunchConfig;
#[cfg(feature = "browser")]
use super::{binary, network, stealth};
use super::{PageSession, SessionLauncher};
use crate::error::BrowserError;

/// Resolves once the document has been parsed, without waiting for
/// subresources or network idle.
#[cfg(feature = "browser")]
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

#[cfg(feature = "browser")]
const BODY_TEXT_SCRIPT: &str = "document.body ? document.body.textContent : ''";

#[cfg(feature = "browser")]
fn click_script(selector: &str, max: usize, stagger: Duration) -> String {
    // JSON string literals are valid JS string literals.
    let selector = serde_json::Value::String(selector.to_string()).to_string();
    format!(
        r#"
        (async () => {{
            let nodes;
            try {{
                nodes = Array.from(document.querySelectorAll({selector})).slice(0, {max});
            }} catch (e) {{
                return 0;
            }}
            let clicked = 0;
            for (const node of nodes) {{
                try {{
                    node.click();
                    clicked++;
                }} catch (e) {{}}
                await new Promise((r) => setTimeout(r, {stagger}));
            }}
            return clicked;
        }})()
        "#,
        selector = selector,
        max = max,
        stagger = stagger.as_millis()
    )
}

/// Launches or connects to Chrome for each session.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    config: BrowserLaunchConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserLaunchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrowserLaunchConfig {
        &self.config
    }
}

/// Budget for closing a page or tearing down a browser before the process
/// is killed.
#[cfg(feature = "browser")]
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Background task that is aborted when the guard is dropped.
#[cfg(feature = "browser")]
struct TaskGuard(JoinHandle<()>);

#[cfg(feature = "browser")]
impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(feature = "browser")]
fn spawn_handler(mut handler: chromiumoxide::Handler) -> TaskGuard {
    TaskGuard(tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    }))
}

/// Collapse a timed-out setup step into a launch error.
#[cfg(feature = "browser")]
fn within<T>(
    step: &str,
    result: Result<Result<T, BrowserError>, tokio::time::error::Elapsed>,
) -> Result<T, BrowserError> {
    result.map_err(|_| BrowserError::Launch(format!("Timed out while {}", step)))?
}

#[cfg(feature = "browser")]
impl ChromiumLauncher {
    async fn launch(&self) -> Result<(Browser, TaskGuard), BrowserError> {
        info!(
            "Launching browser (headless={}, preset={:?})",
            self.config.headless, self.config.preset
        );

        let chrome_path = binary::find_chrome(self.config.executable_path().as_deref())?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .launch_timeout(self.config.launch_timeout())
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .viewport(Viewport {
                width: self.config.viewport_width,
                height: self.config.viewport_height,
                ..Default::default()
            });

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        for arg in self.config.launch_args() {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("Failed to build browser config: {}", e)))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        Ok((browser, spawn_handler(handler)))
    }

    async fn connect_remote(&self, url: &str) -> Result<(Browser, TaskGuard), BrowserError> {
        info!("Connecting to remote browser at {}", url);

        let ws_url = if url.contains("/devtools/browser/") {
            url.to_string()
        } else {
            // Resolve the WebSocket URL from the /json/version endpoint
            let http_url = url
                .replace("ws://", "http://")
                .replace("wss://", "https://");
            let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

            let resp: serde_json::Value = reqwest::Client::new()
                .get(&version_url)
                .timeout(self.config.launch_timeout())
                .send()
                .await
                .map_err(|e| BrowserError::Launch(format!("Remote browser unreachable: {}", e)))?
                .json()
                .await
                .map_err(|e| BrowserError::Launch(format!("Bad browser version info: {}", e)))?;

            resp.get("webSocketDebuggerUrl")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| {
                    BrowserError::Launch("No webSocketDebuggerUrl in response".to_string())
                })?
        };

        debug!("Connecting to WebSocket: {}", ws_url);

        let (browser, handler) = timeout(self.config.launch_timeout(), Browser::connect(ws_url))
            .await
            .map_err(|_| BrowserError::Launch("Timed out connecting to browser".to_string()))?
            .map_err(|e| BrowserError::Launch(format!("Failed to connect: {}", e)))?;

        Ok((browser, spawn_handler(handler)))
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn acquire(&self, user_agent: &str) -> Result<Box<dyn PageSession>, BrowserError> {
        let remote = self.config.remote_url.clone();
        let (mut browser, handler_task) = match &remote {
            Some(url) => self.connect_remote(url).await?,
            None => self.launch().await?,
        };
        let step_timeout = self.config.launch_timeout();

        // A context that times out here may exist on the remote side without
        // us ever learning its id; there is nothing to dispose in that case.
        let context_id = if remote.is_some() {
            let created = timeout(
                step_timeout,
                browser.create_browser_context(CreateBrowserContextParams::default()),
            )
            .await
            .map(|r| {
                r.map_err(|e| {
                    BrowserError::Launch(format!("Failed to create browser context: {}", e))
                })
            });
            match within("creating a browser context", created) {
                Ok(id) => Some(id),
                Err(e) => {
                    shutdown(browser, None, true, handler_task).await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        let opened = timeout(step_timeout, open_page(&browser, context_id.clone())).await;
        let page = match within("opening a page", opened) {
            Ok(page) => page,
            Err(e) => {
                shutdown(browser, context_id, remote.is_some(), handler_task).await;
                return Err(e);
            }
        };

        let mut session = ChromiumSession {
            browser,
            page,
            context_id,
            remote: remote.is_some(),
            handler_task,
            intercept_task: None,
        };

        let prepared = timeout(step_timeout, session.prepare(user_agent)).await;
        if let Err(e) = within("preparing the page", prepared) {
            Box::new(session).release().await;
            return Err(e);
        }

        debug!("Browser session ready");
        Ok(Box::new(session))
    }
}

#[cfg(feature = "browser")]
async fn open_page(
    browser: &Browser,
    context_id: Option<BrowserContextId>,
) -> Result<Page, BrowserError> {
    let result = match context_id {
        Some(id) => {
            let params = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(id)
                .build()
                .map_err(BrowserError::Launch)?;
            browser.new_page(params).await
        }
        None => browser.new_page("about:blank").await,
    };
    result.map_err(|e| BrowserError::Launch(format!("Failed to open page: {}", e)))
}

/// Close whatever the session owns on the browser side. Failures are logged.
/// A local browser that does not shut down in time is killed.
#[cfg(feature = "browser")]
async fn shutdown(
    mut browser: Browser,
    context_id: Option<BrowserContextId>,
    remote: bool,
    handler_task: TaskGuard,
) {
    let teardown = async {
        if let Some(id) = context_id {
            if let Err(e) = browser.dispose_browser_context(id).await {
                warn!("Failed to dispose browser context: {}", e);
            }
        }

        // A remote browser outlives us; only its context is ours.
        if !remote {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed to reap browser process: {}", e);
            }
        }
    };
    let finished = timeout(TEARDOWN_TIMEOUT, teardown).await.is_ok();

    if !finished {
        warn!("Browser teardown timed out after {:?}", TEARDOWN_TIMEOUT);
        if !remote {
            if let Some(Err(e)) = browser.kill().await {
                warn!("Failed to kill browser process: {}", e);
            }
        }
    }

    drop(handler_task);
}

/// One page in its own browser (or browser context).
#[cfg(feature = "browser")]
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    context_id: Option<BrowserContextId>,
    remote: bool,
    handler_task: TaskGuard,
    intercept_task: Option<TaskGuard>,
}

#[cfg(feature = "browser")]
impl ChromiumSession {
    /// Apply request blocking, headers, stealth patches and the user agent.
    async fn prepare(&mut self, user_agent: &str) -> Result<(), BrowserError> {
        self.intercept_requests().await?;

        self.page
            .execute(SetExtraHttpHeadersParams::new(Headers::new(
                network::browser_headers_json(),
            )))
            .await
            .map_err(|e| BrowserError::Launch(format!("Failed to set headers: {}", e)))?;

        self.page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(
                stealth::combined_script(),
            ))
            .await
            .map_err(|e| {
                BrowserError::Launch(format!("Failed to register stealth script: {}", e))
            })?;

        self.set_user_agent(user_agent).await
    }

    /// Pause every request and abort the ones the blocking policy rejects.
    async fn intercept_requests(&mut self) -> Result<(), BrowserError> {
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| BrowserError::Launch(format!("Failed to listen for requests: {}", e)))?;

        let page = self.page.clone();
        self.intercept_task = Some(TaskGuard(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let resource_type = event.resource_type.as_ref();
                let result = if network::should_block(resource_type, &event.request.url) {
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                } else {
                    page.execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ())
                };
                if let Err(e) = result {
                    debug!("Could not resolve paused request {}: {}", event.request.url, e);
                }
            }
        })));

        let pattern = RequestPattern::builder()
            .url_pattern("*")
            .request_stage(RequestStage::Request)
            .build();
        self.page
            .execute(EnableParams::builder().pattern(pattern).build())
            .await
            .map_err(|e| BrowserError::Launch(format!("Failed to enable interception: {}", e)))?;

        Ok(())
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSession for ChromiumSession {
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<(), BrowserError> {
        self.page
            .execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(|e| BrowserError::Launch(format!("Failed to set user agent: {}", e)))?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        info!("Navigating to {}", url);
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Navigation)?;

        let response = self
            .page
            .execute(params)
            .await
            .map_err(|e| BrowserError::Navigation(e.to_string()))?;
        if let Some(error) = &response.result.error_text {
            return Err(BrowserError::Navigation(error.clone()));
        }

        match self.page.evaluate(WAIT_FOR_READY_SCRIPT).await {
            Ok(result) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Err(e) => debug!("Could not check ready state: {}", e),
        }
        Ok(())
    }

    async fn has_element(&mut self, selector: &str) -> bool {
        self.page.find_element(selector).await.is_ok()
    }

    async fn body_text(&mut self) -> Result<String, BrowserError> {
        self.page
            .evaluate(BODY_TEXT_SCRIPT)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }

    async fn click_all(
        &mut self,
        selector: &str,
        max: usize,
        stagger: Duration,
    ) -> Result<usize, BrowserError> {
        self.page
            .evaluate(click_script(selector, max, stagger))
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))
    }

    async fn title(&mut self) -> Option<String> {
        self.page.get_title().await.ok().flatten()
    }

    async fn release(self: Box<Self>) {
        let ChromiumSession {
            browser,
            page,
            context_id,
            remote,
            handler_task,
            intercept_task,
        } = *self;

        drop(intercept_task);
        match timeout(TEARDOWN_TIMEOUT, page.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Failed to close page: {}", e),
            Err(_) => debug!("Timed out closing page"),
        }
        shutdown(browser, context_id, remote, handler_task).await;
        debug!("Browser session released");
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn acquire(&self, _user_agent: &str) -> Result<Box<dyn PageSession>, BrowserError> {
        Err(BrowserError::Unavailable)
    }
}

#[cfg(all(test, feature = "browser"))]
mod tests {
    use super::*;

    #[test]
    fn click_script_escapes_selector() {
        let script = click_script(
            r#"[data-hook="review-expand-link"]"#,
            6,
            Duration::from_millis(120),
        );
        assert!(script.contains(r#"querySelectorAll("[data-hook=\"review-expand-link\"]")"#));
        assert!(script.contains(".slice(0, 6)"));
        assert!(script.contains("setTimeout(r, 120)"));
    }

    #[tokio::test]
    #[ignore] // Requires Chrome to be installed
    async fn launches_and_reads_inline_page() {
        let launcher = ChromiumLauncher::new(BrowserLaunchConfig::default());
        let mut session = launcher
            .acquire(crate::browser::user_agent::random_user_agent())
            .await
            .unwrap();
        session
            .navigate("data:text/html,<title>t</title><body><p id=x>hello</p></body>")
            .await
            .unwrap();
        assert!(session.has_element("#x").await);
        assert!(session.body_text().await.unwrap().contains("hello"));
        session.release().await;
    }
}
