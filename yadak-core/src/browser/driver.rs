use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams, SetBypassCspParams,
};
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::handler::viewport::Viewport as ChromiumViewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::BrowserSection;

use super::engine::BrowserEngineId;
use super::error::{BrowserError, BrowserResult};
use super::stealth::StealthProfile;

/// One live page bound to a launched engine. Everything the site scrapers
/// need goes through this trait so tests can inject fakes.
#[async_trait(?Send)]
pub trait EngineSession {
    /// Navigates and waits for DOM content to be ready, bounded by
    /// `timeout`. Full network idle is never awaited; challenge pages can
    /// hold network idle open indefinitely.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<()>;
    async fn title(&mut self) -> BrowserResult<String>;
    async fn body_text(&mut self) -> BrowserResult<String>;
    async fn evaluate(&mut self, script: &str) -> BrowserResult<serde_json::Value>;
    async fn click(&mut self, selector: &str) -> BrowserResult<()>;
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> BrowserResult<()>;
    /// Human-like randomized pause within the given millisecond range.
    async fn idle(&mut self, range_ms: (u64, u64)) -> BrowserResult<()>;
    /// Releases the engine's resources. Never called twice by the
    /// acquirer; errors are reported but callers swallow them.
    async fn close(&mut self) -> BrowserResult<()>;
}

#[async_trait(?Send)]
pub trait EngineDriver {
    async fn launch(
        &self,
        engine: BrowserEngineId,
        profile: &StealthProfile,
    ) -> BrowserResult<Box<dyn EngineSession>>;
}

/// Production driver over CDP. Launch flags and page configuration follow
/// the hardening set: automation signaling disabled, sandbox flags from
/// config, fingerprint overrides injected at document-start.
#[derive(Debug, Clone)]
pub struct CdpDriver {
    config: BrowserSection,
}

impl CdpDriver {
    pub fn new(config: BrowserSection) -> Self {
        Self { config }
    }

    fn build_chromium_config(
        &self,
        engine: BrowserEngineId,
        profile: &StealthProfile,
    ) -> BrowserResult<ChromiumConfig> {
        let executable = engine.resolve_executable(self.config.executables.for_engine(engine))?;
        let mut builder = ChromiumConfig::builder()
            .chrome_executable(&executable)
            .viewport(ChromiumViewport {
                width: profile.viewport_width,
                height: profile.viewport_height,
                device_scale_factor: None,
                emulating_mobile: profile.viewport_width < profile.viewport_height,
                is_landscape: profile.viewport_width >= profile.viewport_height,
                has_touch: profile.viewport_width < profile.viewport_height,
            });

        if !self.config.headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }

        let mut args = vec![
            format!("--user-agent={}", profile.user_agent),
            format!(
                "--window-size={},{}",
                profile.viewport_width, profile.viewport_height
            ),
            format!("--lang={}", profile.locale),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--no-first-run".to_string(),
            "--disable-infobars".to_string(),
            "--disable-extensions".to_string(),
            "--disable-dev-shm-usage".to_string(),
        ];
        if !self.config.sandbox {
            args.push("--disable-setuid-sandbox".to_string());
        }
        if self.config.disable_gpu {
            args.push("--disable-gpu".to_string());
        }
        if let Some(accept) = &profile.accept_language {
            args.push(format!("--accept-lang={accept}"));
        }
        builder = builder.args(args);

        builder.build().map_err(BrowserError::Configuration)
    }
}

#[async_trait(?Send)]
impl EngineDriver for CdpDriver {
    async fn launch(
        &self,
        engine: BrowserEngineId,
        profile: &StealthProfile,
    ) -> BrowserResult<Box<dyn EngineSession>> {
        let chromium_config = self.build_chromium_config(engine, profile)?;
        info!(
            engine = %engine,
            ua = %profile.user_agent,
            width = profile.viewport_width,
            height = profile.viewport_height,
            headless = self.config.headless,
            "Launching engine instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "engine handler reported error");
                }
            }
        });

        let params = CreateTargetParams::new("about:blank");
        let page = browser.new_page(params).await?;
        configure_page(&page, profile).await?;

        Ok(Box::new(CdpSession {
            engine,
            browser,
            page,
            handler_task: Some(handler_task),
        }))
    }
}

/// Overrides must land before any navigation so they execute ahead of the
/// target site's own scripts.
async fn configure_page(page: &Page, profile: &StealthProfile) -> BrowserResult<()> {
    page.enable_stealth_mode_with_agent(&profile.user_agent)
        .await?;

    let mut params_builder =
        SetUserAgentOverrideParams::builder().user_agent(profile.user_agent.clone());
    if let Some(accept) = &profile.accept_language {
        params_builder = params_builder.accept_language(accept.clone());
    }
    let params = params_builder
        .build()
        .map_err(BrowserError::Configuration)?;
    page.set_user_agent(params).await?;

    if profile.bypass_csp {
        page.execute(SetBypassCspParams::new(true)).await?;
    }

    for script in profile.override_scripts() {
        page.evaluate_on_new_document(
            AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(script)
                .build()
                .map_err(BrowserError::Configuration)?,
        )
        .await?;
    }
    Ok(())
}

pub struct CdpSession {
    engine: BrowserEngineId,
    browser: Browser,
    page: Page,
    handler_task: Option<JoinHandle<()>>,
}

impl CdpSession {
    async fn dom_ready(&self) -> BrowserResult<()> {
        loop {
            let state: String = self
                .page
                .evaluate("document.readyState")
                .await?
                .into_value()
                .map_err(|err| {
                    BrowserError::Unexpected(format!("failed to read document state: {err}"))
                })?;
            if state != "loading" {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
    }
}

#[async_trait(?Send)]
impl EngineSession for CdpSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> BrowserResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        let navigation = async {
            self.page.goto(params).await?;
            self.dom_ready().await
        };
        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| BrowserError::Timeout(format!("navigation to {url}")))?
    }

    async fn title(&mut self) -> BrowserResult<String> {
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn body_text(&mut self) -> BrowserResult<String> {
        self.evaluate("document.body ? document.body.innerText : ''")
            .await
            .map(|value| value.as_str().unwrap_or_default().to_string())
    }

    async fn evaluate(&mut self, script: &str) -> BrowserResult<serde_json::Value> {
        self.page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|err| {
                BrowserError::Unexpected(format!("failed to decode evaluation result: {err}"))
            })
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<()> {
        let element = self.page.find_element(selector).await?;
        element
            .click()
            .await
            .map_err(|err| BrowserError::Unexpected(format!("failed to click {selector}: {err}")))?;
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        let poll = async {
            loop {
                if self.page.find_element(selector).await.is_ok() {
                    return Ok(());
                }
                sleep(Duration::from_millis(250)).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| BrowserError::Timeout(format!("selector {selector}")))?
    }

    async fn idle(&mut self, range_ms: (u64, u64)) -> BrowserResult<()> {
        if range_ms.0 == 0 && range_ms.1 == 0 {
            return Ok(());
        }
        let lower = range_ms.0.min(range_ms.1);
        let upper = range_ms.0.max(range_ms.1);
        let millis = rand::thread_rng().gen_range(lower..=upper);
        sleep(Duration::from_millis(millis)).await;
        Ok(())
    }

    async fn close(&mut self) -> BrowserResult<()> {
        info!(engine = %self.engine, "Shutting down engine instance");
        if let Err(err) = self.browser.close().await {
            warn!(engine = %self.engine, error = %err, "failed to close engine gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            handle.abort();
        }
        Ok(())
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!(engine = %self.engine, "session dropped without explicit close");
                handle.abort();
            }
        }
    }
}
