//! Blocking W3C WebDriver host.
//!
//! Talks to a WebDriver server (chromedriver, geckodriver, Selenium) over
//! HTTP. Every scoped operation first switches the browsing context to the
//! keypad's frame; the current context is remembered so consecutive calls in
//! the same frame do not re-switch.

use anyhow::{anyhow, bail, Context, Result};
use base64::Engine as _;
use image::RgbaImage;
use reqwest::blocking::Client;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::locator::{ClickEvent, KeyHandle, KeypadLocator, PagePoint, PageRect};
use super::KeypadHost;

/// Web element identifier key defined by the W3C spec.
pub(crate) const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Connection settings for the WebDriver server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// WebDriver server base URL
    pub url: String,
    /// `browserName` capability for new sessions
    pub browser: String,
    /// Extra browser command-line arguments (Chrome only)
    pub args: Vec<String>,
    /// Page opened right after a new session is created
    pub start_url: Option<String>,
    /// HTTP timeout per WebDriver command (milliseconds)
    pub request_timeout_ms: u64,
    /// Polling interval for visibility waits (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:4444".to_string(),
            browser: "chrome".to_string(),
            args: Vec::new(),
            start_url: None,
            request_timeout_ms: 30_000,
            poll_interval_ms: 200,
        }
    }
}

/// Error reported by the WebDriver server (`{"value": {"error", "message"}}`).
#[derive(Debug, Error)]
#[error("WebDriver {status}: {error}: {message}")]
pub struct ProtocolError {
    pub status: u16,
    pub error: String,
    pub message: String,
}

impl ProtocolError {
    fn is_no_such_element(&self) -> bool {
        self.error == "no such element"
    }
}

pub struct WebDriverHost {
    client: Client,
    base: String,
    session_id: String,
    owns_session: bool,
    poll_interval: Duration,
    /// Frame selector the browsing context currently points at.
    /// `None` until the first switch; `Some(None)` is the top-level document.
    context: Option<Option<String>>,
}

impl WebDriverHost {
    /// Creates a new browser session and opens `start_url` if configured.
    pub fn connect(config: &WebDriverConfig) -> Result<Self> {
        let client = build_client(config)?;
        let base = config.url.trim_end_matches('/').to_string();

        let response = client
            .post(format!("{}/session", base))
            .json(&new_session_payload(config))
            .send()
            .with_context(|| format!("Failed to reach WebDriver server at {}", base))?;
        let status = response.status().as_u16();
        let body: Value = response.json().context("Invalid new-session response")?;
        let value = unwrap_value(status, body)?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("New-session response has no sessionId"))?
            .to_string();
        info!(session = %session_id, browser = %config.browser, "WebDriver session created");

        let mut host = Self {
            client,
            base,
            session_id,
            owns_session: true,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            context: None,
        };

        if let Some(url) = &config.start_url {
            host.navigate(url)?;
        }
        Ok(host)
    }

    /// Attaches to a session someone else created. The session is left open on drop.
    pub fn attach(config: &WebDriverConfig, session_id: impl Into<String>) -> Result<Self> {
        let host = Self {
            client: build_client(config)?,
            base: config.url.trim_end_matches('/').to_string(),
            session_id: session_id.into(),
            owns_session: false,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            context: None,
        };
        info!(session = %host.session_id, "Attached to WebDriver session");
        Ok(host)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn navigate(&mut self, url: &str) -> Result<()> {
        info!(%url, "Navigating");
        self.command(Method::POST, "url", Some(json!({ "url": url })))?;
        self.context = Some(None);
        Ok(())
    }

    /// Saves a full-page screenshot, for callers that capture evidence on failure.
    pub fn screenshot(&mut self) -> Result<RgbaImage> {
        self.enter(None)?;
        let value = self.command(Method::GET, "screenshot", None)?;
        decode_screenshot(&value)
    }

    /// Ends the session if this host created it.
    pub fn close(mut self) -> Result<()> {
        self.end_session()
    }

    fn end_session(&mut self) -> Result<()> {
        if !self.owns_session {
            return Ok(());
        }
        self.owns_session = false;
        let url = format!("{}/session/{}", self.base, self.session_id);
        self.client
            .delete(url)
            .send()
            .context("Failed to delete WebDriver session")?;
        info!(session = %self.session_id, "WebDriver session closed");
        Ok(())
    }

    /// Sends one session-scoped command and returns its `value`.
    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}/session/{}/{}", self.base, self.session_id, path);
        debug!(%method, %path, "WebDriver command");

        let mut request = self.client.request(method.clone(), &url);
        if method == Method::POST {
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }
        let response = request
            .send()
            .with_context(|| format!("WebDriver request failed: {} {}", method, path))?;
        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .with_context(|| format!("Invalid WebDriver response for {}", path))?;
        unwrap_value(status, body)
    }

    /// Switches the browsing context to `frame` (or the top-level document).
    fn enter(&mut self, frame: Option<&str>) -> Result<()> {
        let wanted = frame.map(str::to_string);
        if self.context.as_ref() == Some(&wanted) {
            return Ok(());
        }

        self.command(Method::POST, "frame", Some(json!({ "id": null })))?;
        self.context = Some(None);

        if let Some(selector) = frame {
            let frame_id = self
                .find_element(selector)
                .with_context(|| format!("Frame {} not found", selector))?;
            self.command(
                Method::POST,
                "frame",
                Some(json!({ "id": element_reference(&frame_id) })),
            )
            .with_context(|| format!("Failed to switch to frame {}", selector))?;
            self.context = Some(wanted);
        }
        Ok(())
    }

    fn find_element(&self, selector: &str) -> Result<String> {
        let value = self.command(Method::POST, "element", Some(css_query(selector)))?;
        element_id(&value)
    }

    fn find_elements(&self, selector: &str) -> Result<Vec<String>> {
        let value = self.command(Method::POST, "elements", Some(css_query(selector)))?;
        value
            .as_array()
            .ok_or_else(|| anyhow!("Find-elements response is not an array"))?
            .iter()
            .map(element_id)
            .collect()
    }

    fn element_rect(&self, element: &str) -> Result<PageRect> {
        let value = self.command(Method::GET, &format!("element/{}/rect", element), None)?;
        serde_json::from_value(value).context("Invalid element rect")
    }

    fn element_displayed(&self, element: &str) -> Result<bool> {
        let value = self.command(Method::GET, &format!("element/{}/displayed", element), None)?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn element_screenshot(&self, element: &str) -> Result<RgbaImage> {
        let value = self.command(Method::GET, &format!("element/{}/screenshot", element), None)?;
        decode_screenshot(&value)
    }

    /// Runs a script returning `[x, y]` in the current browsing context.
    fn execute_pair(&self, script: &str, args: Vec<Value>) -> Result<(f64, f64)> {
        let value = self.command(
            Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": args })),
        )?;
        let x = value.get(0).and_then(Value::as_f64).unwrap_or(0.0);
        let y = value.get(1).and_then(Value::as_f64).unwrap_or(0.0);
        Ok((x, y))
    }

    fn scroll_offset(&self) -> Result<(f64, f64)> {
        self.execute_pair("return [window.scrollX, window.scrollY];", Vec::new())
    }

    /// Border widths between an element's border box and its content.
    fn client_offset(&self, element: &str) -> Result<(f64, f64)> {
        self.execute_pair(
            "return [arguments[0].clientLeft, arguments[0].clientTop];",
            vec![element_reference(element)],
        )
    }

    /// Clicks at a page coordinate through the actions API.
    fn pointer_click(&mut self, point: PagePoint) -> Result<()> {
        self.enter(None)?;
        let (scroll_x, scroll_y) = self.scroll_offset()?;
        let viewport = PagePoint {
            x: point.x - scroll_x,
            y: point.y - scroll_y,
        };
        self.command(Method::POST, "actions", Some(pointer_click_payload(viewport)))?;
        self.command(Method::DELETE, "actions", None)?;
        Ok(())
    }
}

impl Drop for WebDriverHost {
    fn drop(&mut self) {
        if let Err(e) = self.end_session() {
            warn!(error = %e, "Failed to close WebDriver session");
        }
    }
}

impl KeypadHost for WebDriverHost {
    fn wait_visible(&mut self, keypad: &KeypadLocator, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            match self.enter(keypad.frame.as_deref()) {
                Ok(()) => match self.find_element(&keypad.selector) {
                    Ok(element) => {
                        if self.element_displayed(&element)? {
                            debug!(%keypad, "Keypad visible");
                            return Ok(());
                        }
                    }
                    Err(e) if is_no_such_element(&e) => {}
                    Err(e) => return Err(e),
                },
                // Frame not attached yet
                Err(e) if is_no_such_element(&e) => self.context = None,
                Err(e) => return Err(e),
            }

            if start.elapsed() > timeout {
                bail!(
                    "Keypad {} not visible after {}ms",
                    keypad,
                    timeout.as_millis()
                );
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    fn find_keys(&mut self, keypad: &KeypadLocator) -> Result<Vec<KeyHandle>> {
        self.enter(keypad.frame.as_deref())?;
        let elements = self.find_elements(&keypad.selector)?;
        Ok(elements
            .into_iter()
            .enumerate()
            .map(|(ordinal, element)| KeyHandle {
                ordinal,
                element,
                frame: keypad.frame.clone(),
            })
            .collect())
    }

    fn find_labeled_key(
        &mut self,
        keypad: &KeypadLocator,
        label: &str,
    ) -> Result<Option<KeyHandle>> {
        self.enter(keypad.frame.as_deref())?;
        let selector = labeled_selector(&keypad.selector, label);
        match self.find_element(&selector) {
            Ok(element) => Ok(Some(KeyHandle {
                // Labeled lookups are not part of an enumeration pass.
                ordinal: 0,
                element,
                frame: keypad.frame.clone(),
            })),
            Err(e) if is_no_such_element(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn capture_key(&mut self, key: &KeyHandle) -> Result<RgbaImage> {
        self.enter(key.frame.as_deref())?;
        self.element_screenshot(&key.element)
            .with_context(|| format!("Failed to screenshot key #{}", key.ordinal))
    }

    fn region_bounds(&mut self, keypad: &KeypadLocator) -> Result<PageRect> {
        self.enter(keypad.frame.as_deref())?;
        let element = self.find_element(&keypad.selector)?;
        let rect = self.element_rect(&element)?;
        let Some(frame) = &keypad.frame else {
            return Ok(rect);
        };

        // Rects inside a frame are relative to the frame's document.
        let inner_scroll = self.scroll_offset()?;
        self.enter(None)?;
        let frame_element = self.find_element(frame)?;
        let frame_rect = self.element_rect(&frame_element)?;
        let border = self.client_offset(&frame_element)?;
        Ok(frame_to_page(rect, inner_scroll, frame_rect, border))
    }

    fn capture_region(&mut self, keypad: &KeypadLocator) -> Result<RgbaImage> {
        self.enter(keypad.frame.as_deref())?;
        let element = self.find_element(&keypad.selector)?;
        self.element_screenshot(&element)
            .with_context(|| format!("Failed to screenshot keypad {}", keypad))
    }

    fn activate(&mut self, click: &ClickEvent) -> Result<()> {
        match click {
            ClickEvent::Key(key) => {
                self.enter(key.frame.as_deref())?;
                self.command(Method::POST, &format!("element/{}/click", key.element), None)
                    .with_context(|| format!("Failed to click key #{}", key.ordinal))?;
            }
            ClickEvent::Point(point) => self.pointer_click(*point)?,
            ClickEvent::Frame(selector) => {
                self.enter(None)?;
                let frame = self
                    .find_element(selector)
                    .with_context(|| format!("Frame {} not found", selector))?;
                self.command(Method::POST, &format!("element/{}/click", frame), None)
                    .with_context(|| format!("Failed to click frame {}", selector))?;
            }
        }
        Ok(())
    }
}

fn build_client(config: &WebDriverConfig) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_millis(config.request_timeout_ms))
        .build()
        .context("Failed to build HTTP client")
}

fn new_session_payload(config: &WebDriverConfig) -> Value {
    let mut always_match = json!({ "browserName": config.browser });
    if config.browser == "chrome" && !config.args.is_empty() {
        always_match["goog:chromeOptions"] = json!({ "args": config.args });
    }
    json!({ "capabilities": { "alwaysMatch": always_match } })
}

fn css_query(selector: &str) -> Value {
    json!({ "using": "css selector", "value": selector })
}

fn element_reference(element: &str) -> Value {
    json!({ ELEMENT_KEY: element })
}

/// Selector for the key carrying `label` as its accessible name.
fn labeled_selector(keys: &str, label: &str) -> String {
    let escaped = label.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{}[aria-label=\"{}\"]", keys, escaped)
}

/// Maps a rect from a frame's document into the parent page.
///
/// `frame` is the `<iframe>` border box, `border` its `clientLeft`/`clientTop`
/// and `inner_scroll` the scroll offset of the frame's document.
fn frame_to_page(
    inner: PageRect,
    inner_scroll: (f64, f64),
    frame: PageRect,
    border: (f64, f64),
) -> PageRect {
    PageRect {
        x: frame.x + border.0 + inner.x - inner_scroll.0,
        y: frame.y + border.1 + inner.y - inner_scroll.1,
        width: inner.width,
        height: inner.height,
    }
}

fn pointer_click_payload(point: PagePoint) -> Value {
    json!({
        "actions": [{
            "type": "pointer",
            "id": "keypad-mouse",
            "parameters": { "pointerType": "mouse" },
            "actions": [
                { "type": "pointerMove", "duration": 0, "origin": "viewport",
                  "x": point.x.round() as i64, "y": point.y.round() as i64 },
                { "type": "pointerDown", "button": 0 },
                { "type": "pointerUp", "button": 0 }
            ]
        }]
    })
}

/// Extracts `value` from a WebDriver response, turning error payloads into [`ProtocolError`].
fn unwrap_value(status: u16, mut body: Value) -> Result<Value> {
    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);
    if (200..300).contains(&status) {
        return Ok(value);
    }
    let field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Err(ProtocolError {
        status,
        error: field("error"),
        message: field("message"),
    }
    .into())
}

fn element_id(value: &Value) -> Result<String> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get("ELEMENT"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Response is not a web element reference: {}", value))
}

fn is_no_such_element(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<ProtocolError>()
        .is_some_and(ProtocolError::is_no_such_element)
}

fn decode_screenshot(value: &Value) -> Result<RgbaImage> {
    let encoded = value
        .as_str()
        .ok_or_else(|| anyhow!("Screenshot response is not a string"))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .context("Screenshot is not valid base64")?;
    let img = image::load_from_memory(&bytes).context("Screenshot is not a valid image")?;
    Ok(img.to_rgba8())
}
