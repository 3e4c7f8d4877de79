//! Browser session abstraction.
//!
//! A [`Session`] is the single handle through which every component talks to
//! the browser: element lookup, native and script-level input, frame and
//! window context, and probe evaluation. It is passed explicitly to each call;
//! no component keeps a global driver.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Session (trait, synchronous, &mut self)                 │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐   ┌─────────────────────────┐  │
//! │  │  ChromiumSession     │   │  MockSession            │  │
//! │  │  (feature "browser") │   │  (in-memory DOM world)  │  │
//! │  │  CDP via             │   │  probes interpreted     │  │
//! │  │  chromiumoxide       │   │  natively               │  │
//! │  └──────────────────────┘   └─────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

use crate::locator::Locator;
use crate::probe::Probe;
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tracing::{debug, warn};

/// Opaque element handle issued by a session.
///
/// Handles are only valid in the document context (window and frame) they
/// were issued in; using one elsewhere yields [`ProbeError::StaleElement`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    id: String,
}

impl ElementHandle {
    /// Create a handle from a session-issued id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Handle id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Opaque window handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle(String);

impl WindowHandle {
    /// Create a window handle
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Handle id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of an element's interactive state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Rendered and not hidden
    pub displayed: bool,
    /// Not disabled
    pub enabled: bool,
    /// Checked (radio/checkbox) or selected (option)
    pub selected: bool,
    /// Rendered text
    pub text: String,
}

impl ElementState {
    /// Displayed and enabled
    #[must_use]
    pub const fn is_clickable(&self) -> bool {
        self.displayed && self.enabled
    }
}

/// DOM events dispatched after script-level input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomEvent {
    /// `input`
    Input,
    /// `change`
    Change,
    /// `keyup`
    Keyup,
    /// `blur`
    Blur,
}

impl DomEvent {
    /// Event type name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Change => "change",
            Self::Keyup => "keyup",
            Self::Blur => "blur",
        }
    }
}

impl fmt::Display for DomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A synchronous browser session
pub trait Session: fmt::Debug {
    /// Load a URL in the current window
    fn navigate(&mut self, url: &str) -> ProbeResult<()>;

    /// URL of the current window
    fn current_url(&mut self) -> ProbeResult<String>;

    /// Every element matching the locator in the current context.
    ///
    /// An empty vector means "not found yet" and is not an error.
    fn find_elements(&mut self, locator: &Locator) -> ProbeResult<Vec<ElementHandle>>;

    /// First element matching the locator
    fn find_element(&mut self, locator: &Locator) -> ProbeResult<ElementHandle> {
        self.find_elements(locator)?
            .into_iter()
            .next()
            .ok_or_else(|| ProbeError::no_such_element(locator.to_string()))
    }

    /// Current state of an element
    fn element_state(&mut self, element: &ElementHandle) -> ProbeResult<ElementState>;

    /// Attribute value, `None` when absent
    fn attribute(&mut self, element: &ElementHandle, name: &str) -> ProbeResult<Option<String>>;

    /// Live `value` of a form control; empty for elements without one
    fn value(&mut self, element: &ElementHandle) -> ProbeResult<String>;

    /// Native click
    fn click(&mut self, element: &ElementHandle) -> ProbeResult<()>;

    /// Script-level `element.click()`
    fn script_click(&mut self, element: &ElementHandle) -> ProbeResult<()>;

    /// Native clear of an editable element
    fn clear(&mut self, element: &ElementHandle) -> ProbeResult<()>;

    /// Native typing into an element
    fn send_keys(&mut self, element: &ElementHandle, text: &str) -> ProbeResult<()>;

    /// Script-level value assignment followed by `input` and `change` events
    fn script_set_value(&mut self, element: &ElementHandle, value: &str) -> ProbeResult<()>;

    /// Dispatch bubbling DOM events on an element
    fn dispatch_events(&mut self, element: &ElementHandle, events: &[DomEvent]) -> ProbeResult<()>;

    /// Evaluate a probe in the current context
    fn evaluate(&mut self, probe: &Probe) -> ProbeResult<serde_json::Value>;

    /// Evaluate an element-returning probe and issue a handle for the result
    fn locate(&mut self, probe: &Probe) -> ProbeResult<Option<ElementHandle>>;

    /// Leave every frame and return to the window's top-level document
    fn switch_to_default_content(&mut self) -> ProbeResult<()>;

    /// Enter an iframe element of the current context
    fn switch_to_frame(&mut self, frame: &ElementHandle) -> ProbeResult<()>;

    /// Handle of the current window
    fn window_handle(&mut self) -> ProbeResult<WindowHandle>;

    /// Handles of every open window, in opening order
    fn window_handles(&mut self) -> ProbeResult<Vec<WindowHandle>>;

    /// Make another window current; the frame context resets to the top level
    fn switch_to_window(&mut self, handle: &WindowHandle) -> ProbeResult<()>;

    /// Close the session. Calling it twice is harmless.
    fn quit(&mut self) -> ProbeResult<()>;
}

/// Browser kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    /// Chrome / Chromium
    #[default]
    Chrome,
}

impl BrowserKind {
    /// Parse a configured browser name (case-insensitive)
    pub fn parse(name: &str) -> ProbeResult<Self> {
        if name.trim().eq_ignore_ascii_case("chrome") {
            Ok(Self::Chrome)
        } else {
            Err(ProbeError::UnsupportedBrowser {
                kind: name.to_string(),
            })
        }
    }

    /// Configuration name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Browser kind
    pub browser: BrowserKind,
    /// Run without a visible window
    pub headless: bool,
    /// Window width in headless mode
    pub window_width: u32,
    /// Window height in headless mode
    pub window_height: u32,
    /// How long `find_element` keeps looking before reporting no such element
    pub implicit_wait: Duration,
    /// Budget for page loads
    pub page_load_timeout: Duration,
    /// Chrome executable override
    pub executable: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chrome,
            headless: false,
            window_width: 1920,
            window_height: 1080,
            implicit_wait: Duration::from_secs(2),
            page_load_timeout: Duration::from_secs(60),
            executable: None,
        }
    }
}

impl SessionConfig {
    /// Create new config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set window size
    #[must_use]
    pub const fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Set implicit wait
    #[must_use]
    pub const fn with_implicit_wait(mut self, wait: Duration) -> Self {
        self.implicit_wait = wait;
        self
    }

    /// Set page-load timeout
    #[must_use]
    pub const fn with_page_load_timeout(mut self, timeout: Duration) -> Self {
        self.page_load_timeout = timeout;
        self
    }

    /// Set the browser executable
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<String>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Command-line arguments passed to the browser
    #[must_use]
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(6);
        if self.headless {
            args.push("--headless=new".to_string());
            args.push(format!(
                "--window-size={},{}",
                self.window_width, self.window_height
            ));
        } else {
            args.push("--start-maximized".to_string());
        }
        args.push("--use-fake-ui-for-media-stream".to_string());
        args.push("--no-sandbox".to_string());
        args.push("--disable-dev-shm-usage".to_string());
        args
    }
}

/// Owns a session and quits it when dropped, whatever the outcome of the run
#[derive(Debug)]
pub struct SessionGuard<S: Session> {
    session: S,
    closed: bool,
}

impl<S: Session> SessionGuard<S> {
    /// Take ownership of a session
    #[must_use]
    pub const fn new(session: S) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    /// Quit now and report the error, if any
    pub fn close(mut self) -> ProbeResult<()> {
        self.closed = true;
        self.session.quit()
    }
}

impl<S: Session> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: Session> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: Session> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        debug!("tearing down session");
        if let Err(e) = self.session.quit() {
            warn!(error = %e, "session quit failed during teardown");
        }
    }
}
