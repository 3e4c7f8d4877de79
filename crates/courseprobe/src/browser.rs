//! Chromium session over the DevTools protocol.
//!
//! Requires the `browser` feature. The session owns a private tokio runtime
//! and blocks on every command, so [`Session`] stays synchronous.
//!
//! Elements are addressed by a token stored in a `data-courseprobe-handle`
//! attribute. The current frame context is the chain of iframe tokens
//! entered from the top-level document; it is resolved through
//! `contentDocument` on every command, which limits frame switching to
//! same-origin frames.

use crate::clock::SystemClock;
use crate::locator::Locator;
use crate::probe::Probe;
use crate::result::{ProbeError, ProbeResult};
use crate::session::{DomEvent, ElementHandle, ElementState, Session, SessionConfig, WindowHandle};
use crate::wait::Poller;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, InsertTextParams, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::Write as _;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Attribute carrying element handle tokens
pub const HANDLE_ATTR: &str = "data-courseprobe-handle";

/// Marker key of sentinel results
const SENTINEL_KEY: &str = "__courseprobe";

/// Arguments the launcher builder sets itself
const BUILDER_ARGS: [&str; 3] = ["--headless", "--no-sandbox", "--window-size"];

fn session_error(e: impl std::fmt::Display) -> ProbeError {
    ProbeError::session(e.to_string())
}

/// Click target computed in the page
#[derive(Debug, Deserialize)]
struct ClickPoint {
    x: f64,
    y: f64,
    hit: bool,
}

/// Chrome driven through chromiumoxide
#[derive(Debug)]
pub struct ChromiumSession {
    runtime: Runtime,
    browser: Browser,
    handler: JoinHandle<()>,
    page: Page,
    frames: Vec<String>,
    config: SessionConfig,
    closed: bool,
}

impl ChromiumSession {
    /// Launch the browser and open a blank page
    pub fn launch(config: SessionConfig) -> ProbeResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .map_err(|e| ProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;

        let mut builder = BrowserConfig::builder();
        builder = if config.headless {
            builder
                .new_headless_mode()
                .window_size(config.window_width, config.window_height)
        } else {
            builder.with_head()
        };
        builder = builder
            .no_sandbox()
            .request_timeout(config.page_load_timeout);
        for arg in config
            .chrome_args()
            .into_iter()
            .filter(|arg| !BUILDER_ARGS.iter().any(|b| arg.starts_with(b)))
        {
            builder = builder.arg(arg);
        }
        if let Some(ref path) = config.executable {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder
            .build()
            .map_err(|message| ProbeError::BrowserLaunch { message })?;

        let (browser, mut handler) = runtime
            .block_on(Browser::launch(cdp_config))
            .map_err(|e| ProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;
        let handler = runtime.spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        let page = runtime
            .block_on(browser.new_page("about:blank"))
            .map_err(|e| ProbeError::BrowserLaunch {
                message: e.to_string(),
            })?;

        info!(
            browser = %config.browser,
            headless = config.headless,
            "browser session started"
        );
        Ok(Self {
            runtime,
            browser,
            handler,
            page,
            frames: Vec::new(),
            config,
            closed: false,
        })
    }

    /// The launch configuration
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn ensure_open(&self) -> ProbeResult<()> {
        if self.closed {
            return Err(ProbeError::session("session is closed"));
        }
        Ok(())
    }

    /// Expression evaluating to the current context's document, or `null`
    fn document_expr(&self) -> String {
        if self.frames.is_empty() {
            return "document".to_string();
        }
        let chain = json!(self.frames);
        format!(
            "(() => {{ let d = document; \
               for (const t of {chain}) {{ \
                 const f = d.querySelector('[{HANDLE_ATTR}=\"' + t + '\"]'); \
                 if (!f || !f.contentDocument) return null; \
                 d = f.contentDocument; \
               }} \
               return d; }})()"
        )
    }

    fn evaluate_raw(&self, expression: String) -> ProbeResult<Value> {
        let result = self
            .runtime
            .block_on(self.page.evaluate(expression))
            .map_err(|e| ProbeError::script("session", e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    /// Run `body` with `DOC` bound to the current document, mapping sentinels
    fn run_in_context(&self, body: &str) -> ProbeResult<Value> {
        let expression = format!(
            "((DOC) => {{ if (!DOC) return {{ {SENTINEL_KEY}: 'no_frame' }}; {body} }})({})",
            self.document_expr()
        );
        let value = self.evaluate_raw(expression)?;
        match value.get(SENTINEL_KEY).and_then(Value::as_str) {
            Some("no_frame") => Err(ProbeError::NoSuchFrame {
                message: "current frame is no longer attached".to_string(),
            }),
            Some("stale") => Err(ProbeError::StaleElement {
                handle: value
                    .get("handle")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            Some("not_interactable") => Err(ProbeError::not_interactable(
                value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("element is not displayed"),
            )),
            Some(other) => Err(ProbeError::session(format!("unexpected result {other}"))),
            None => Ok(value),
        }
    }

    /// Run `body` with `el` bound to the element behind `handle`
    fn with_element(&self, element: &ElementHandle, body: &str) -> ProbeResult<Value> {
        let token = json!(element.id());
        self.run_in_context(&format!(
            "const el = DOC.querySelector('[{HANDLE_ATTR}=\"' + {token} + '\"]'); \
             if (!el || !el.isConnected) return {{ {SENTINEL_KEY}: 'stale', handle: {token} }}; \
             {body}"
        ))
    }

    /// Like [`Self::with_element`], failing unless the element is rendered
    fn with_displayed(&self, element: &ElementHandle, body: &str) -> ProbeResult<Value> {
        self.with_element(
            element,
            &format!(
                "const r = el.getBoundingClientRect(); \
                 const s = DOC.defaultView.getComputedStyle(el); \
                 if (r.width === 0 || r.height === 0 || s.visibility === 'hidden') \
                   return {{ {SENTINEL_KEY}: 'not_interactable', message: 'element is not displayed' }}; \
                 {body}"
            ),
        )
    }

    /// Tag every element of an array expression and return the tokens
    fn tag_elements(&self, array_expr: &str) -> ProbeResult<Vec<ElementHandle>> {
        let prefix = Uuid::new_v4().simple().to_string();
        let value = self.run_in_context(&format!(
            "const found = {array_expr}; \
             return found.map((el, i) => {{ \
               if (!el.hasAttribute('{HANDLE_ATTR}')) el.setAttribute('{HANDLE_ATTR}', '{prefix}-' + i); \
               return el.getAttribute('{HANDLE_ATTR}'); \
             }});"
        ))?;
        let tokens: Vec<String> = serde_json::from_value(value)?;
        Ok(tokens.into_iter().map(ElementHandle::new).collect())
    }

    fn mouse(&self, kind: DispatchMouseEventType, point: &ClickPoint) -> ProbeResult<()> {
        let params = DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(point.x)
            .y(point.y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(ProbeError::session)?;
        self.runtime
            .block_on(self.page.execute(params))
            .map_err(session_error)?;
        Ok(())
    }

    fn target_ids(&mut self) -> ProbeResult<Vec<TargetId>> {
        let mut browser_targets = self
            .runtime
            .block_on(self.browser.fetch_targets())
            .map_err(session_error)?;
        browser_targets.retain(|t| t.r#type == "page");
        Ok(browser_targets.into_iter().map(|t| t.target_id).collect())
    }
}

impl Session for ChromiumSession {
    fn navigate(&mut self, url: &str) -> ProbeResult<()> {
        self.ensure_open()?;
        let timeout = self.config.page_load_timeout;
        let page = &self.page;
        let navigation = self.runtime.block_on(async move {
            tokio::time::timeout(timeout, page.goto(url))
                .await
                .map(|loaded| loaded.map(|_| ()))
        });
        match navigation {
            Ok(Ok(())) => {
                self.frames.clear();
                debug!(url, "navigated");
                Ok(())
            }
            Ok(Err(e)) => Err(ProbeError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(ProbeError::Navigation {
                url: url.to_string(),
                message: format!("page load exceeded {}s", timeout.as_secs()),
            }),
        }
    }

    fn current_url(&mut self) -> ProbeResult<String> {
        self.ensure_open()?;
        let url = self
            .runtime
            .block_on(self.page.url())
            .map_err(session_error)?;
        Ok(url.unwrap_or_default())
    }

    fn find_elements(&mut self, locator: &Locator) -> ProbeResult<Vec<ElementHandle>> {
        self.ensure_open()?;
        self.tag_elements(&locator.selector().to_all_query("DOC"))
    }

    fn find_element(&mut self, locator: &Locator) -> ProbeResult<ElementHandle> {
        let budget = self.config.implicit_wait;
        Poller::new(SystemClock::shared()).find_element_within(self, locator, budget)
    }

    fn element_state(&mut self, element: &ElementHandle) -> ProbeResult<ElementState> {
        self.ensure_open()?;
        let value = self.with_element(
            element,
            "const r = el.getBoundingClientRect(); \
             const s = DOC.defaultView.getComputedStyle(el); \
             return { \
               displayed: r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none', \
               enabled: !el.disabled, \
               selected: !!(el.checked || el.selected), \
               text: el.innerText || '' \
             };",
        )?;
        Ok(serde_json::from_value(value)?)
    }

    fn attribute(&mut self, element: &ElementHandle, name: &str) -> ProbeResult<Option<String>> {
        self.ensure_open()?;
        let value = self.with_element(element, &format!("return el.getAttribute({name:?});"))?;
        Ok(value.as_str().map(str::to_string))
    }

    fn value(&mut self, element: &ElementHandle) -> ProbeResult<String> {
        self.ensure_open()?;
        let value = self.with_element(element, "return el.value == null ? '' : String(el.value);")?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn click(&mut self, element: &ElementHandle) -> ProbeResult<()> {
        self.ensure_open()?;
        let value = self.with_displayed(
            element,
            "el.scrollIntoView({ block: 'center', inline: 'center' }); \
             const box = el.getBoundingClientRect(); \
             const cx = box.left + box.width / 2, cy = box.top + box.height / 2; \
             const top = DOC.elementFromPoint(cx, cy); \
             const hit = !!top && (top === el || el.contains(top) || top.contains(el)); \
             let x = cx, y = cy, w = DOC.defaultView; \
             while (w.frameElement) { \
               const f = w.frameElement.getBoundingClientRect(); \
               x += f.left; y += f.top; w = w.parent; \
             } \
             return { x, y, hit };",
        )?;
        let point: ClickPoint = serde_json::from_value(value)?;
        if !point.hit {
            return Err(ProbeError::not_interactable(format!(
                "element click intercepted: {element}"
            )));
        }
        self.mouse(DispatchMouseEventType::MousePressed, &point)?;
        self.mouse(DispatchMouseEventType::MouseReleased, &point)
    }

    fn script_click(&mut self, element: &ElementHandle) -> ProbeResult<()> {
        self.ensure_open()?;
        self.with_element(element, "el.click(); return true;")?;
        Ok(())
    }

    fn clear(&mut self, element: &ElementHandle) -> ProbeResult<()> {
        self.ensure_open()?;
        self.with_displayed(
            element,
            "el.focus(); el.value = ''; \
             el.dispatchEvent(new Event('input', { bubbles: true })); return true;",
        )?;
        Ok(())
    }

    fn send_keys(&mut self, element: &ElementHandle, text: &str) -> ProbeResult<()> {
        self.ensure_open()?;
        self.with_displayed(element, "el.focus(); return true;")?;
        self.runtime
            .block_on(self.page.execute(InsertTextParams::new(text)))
            .map_err(session_error)?;
        Ok(())
    }

    fn script_set_value(&mut self, element: &ElementHandle, value: &str) -> ProbeResult<()> {
        self.ensure_open()?;
        self.with_element(
            element,
            &format!(
                "el.value = {value:?}; \
                 el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true;"
            ),
        )?;
        Ok(())
    }

    fn dispatch_events(&mut self, element: &ElementHandle, events: &[DomEvent]) -> ProbeResult<()> {
        self.ensure_open()?;
        let mut body = String::new();
        for event in events {
            let _ = write!(
                body,
                "el.dispatchEvent(new Event({:?}, {{ bubbles: true }})); ",
                event.as_str()
            );
        }
        body.push_str("return true;");
        self.with_element(element, &body)?;
        Ok(())
    }

    fn evaluate(&mut self, probe: &Probe) -> ProbeResult<Value> {
        self.ensure_open()?;
        let body = format!("return {};", probe.script("DOC"));
        self.run_in_context(&body).map_err(|e| match e {
            ProbeError::Script { message, .. } => ProbeError::script(probe.name(), message),
            other => other,
        })
    }

    fn locate(&mut self, probe: &Probe) -> ProbeResult<Option<ElementHandle>> {
        self.ensure_open()?;
        let found = self.tag_elements(&format!(
            "(() => {{ const el = {}; return el ? [el] : []; }})()",
            probe.script("DOC")
        ))?;
        Ok(found.into_iter().next())
    }

    fn switch_to_default_content(&mut self) -> ProbeResult<()> {
        self.ensure_open()?;
        self.frames.clear();
        Ok(())
    }

    fn switch_to_frame(&mut self, frame: &ElementHandle) -> ProbeResult<()> {
        self.ensure_open()?;
        let entered = self.with_element(
            frame,
            "return (el.tagName === 'IFRAME' || el.tagName === 'FRAME') && !!el.contentDocument;",
        )?;
        if entered.as_bool() != Some(true) {
            return Err(ProbeError::NoSuchFrame {
                message: format!("element {frame} is not an accessible frame"),
            });
        }
        self.frames.push(frame.id().to_string());
        Ok(())
    }

    fn window_handle(&mut self) -> ProbeResult<WindowHandle> {
        self.ensure_open()?;
        Ok(WindowHandle::new(self.page.target_id().inner().clone()))
    }

    fn window_handles(&mut self) -> ProbeResult<Vec<WindowHandle>> {
        self.ensure_open()?;
        Ok(self
            .target_ids()?
            .into_iter()
            .map(|id| WindowHandle::new(id.inner().clone()))
            .collect())
    }

    fn switch_to_window(&mut self, handle: &WindowHandle) -> ProbeResult<()> {
        self.ensure_open()?;
        let target = self
            .target_ids()?
            .into_iter()
            .find(|id| id.inner() == handle.id())
            .ok_or_else(|| ProbeError::NoSuchWindow {
                handle: handle.to_string(),
            })?;
        let page = self
            .runtime
            .block_on(self.browser.get_page(target))
            .map_err(|e| ProbeError::NoSuchWindow {
                handle: format!("{handle}: {e}"),
            })?;
        if let Err(e) = self.runtime.block_on(page.bring_to_front()) {
            warn!(window = %handle, error = %e, "could not bring window to front");
        }
        self.page = page;
        self.frames.clear();
        debug!(window = %handle, "switched window");
        Ok(())
    }

    fn quit(&mut self) -> ProbeResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let closed = self.runtime.block_on(self.browser.close());
        self.handler.abort();
        closed.map_err(session_error)?;
        info!("browser session closed");
        Ok(())
    }
}
