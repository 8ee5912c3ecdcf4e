//! In-process WebDriver server for exercising [`WebDriverHost`] over real HTTP.
//!
//! Serves one session (`s1`) over a page made of top-level elements and
//! single-level frames. Tracks the browsing context the way a driver does, so
//! element lookups only see the current document, and records every request.
//!
//! [`WebDriverHost`]: super::WebDriverHost

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use super::locator::PageRect;
use super::webdriver::{WebDriverConfig, ELEMENT_KEY};

pub const SESSION: &str = "s1";

#[derive(Clone, Debug)]
pub struct FakeElement {
    pub selector: String,
    pub rect: PageRect,
    pub displayed: bool,
}

impl FakeElement {
    pub fn new(selector: &str, rect: PageRect) -> Self {
        Self {
            selector: selector.to_string(),
            rect,
            displayed: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FakeFrame {
    pub selector: String,
    /// Border-box rect of the `<iframe>` element in the parent page
    pub rect: PageRect,
    /// `clientLeft` / `clientTop` of the `<iframe>` element
    pub border: (f64, f64),
    /// Scroll offset of the frame's own document
    pub scroll: (f64, f64),
    /// Lookups of the frame element that fail before it is attached
    pub missing_lookups: usize,
    pub elements: Vec<FakeElement>,
    lookups: usize,
}

impl FakeFrame {
    pub fn new(selector: &str, rect: PageRect) -> Self {
        Self {
            selector: selector.to_string(),
            rect,
            border: (0.0, 0.0),
            scroll: (0.0, 0.0),
            missing_lookups: 0,
            elements: Vec::new(),
            lookups: 0,
        }
    }

    pub fn with(mut self, element: FakeElement) -> Self {
        self.elements.push(element);
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct FakePage {
    /// Scroll offset of the top-level document
    pub scroll: (f64, f64),
    pub elements: Vec<FakeElement>,
    pub frames: Vec<FakeFrame>,
}

#[derive(Clone, Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: Value,
}

struct State {
    page: FakePage,
    /// Index of the frame the session is switched into, `None` for the top level
    context: Option<usize>,
    requests: Vec<Request>,
}

pub struct FakeDriver {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
}

impl FakeDriver {
    /// Binds an ephemeral local port and serves requests on a background thread.
    pub fn start(page: FakePage) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State {
            page,
            context: None,
            requests: Vec::new(),
        }));

        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                serve(stream, &shared);
            }
        });

        Self { addr, state }
    }

    /// Host settings pointing at this server, with a short poll interval.
    pub fn config(&self) -> WebDriverConfig {
        WebDriverConfig {
            url: format!("http://{}", self.addr),
            request_timeout_ms: 5_000,
            poll_interval_ms: 20,
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Bodies of the session commands sent as `method /session/s1/<command>`.
    pub fn commands(&self, method: &str, command: &str) -> Vec<Value> {
        let path = format!("/session/{}/{}", SESSION, command);
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .map(|r| r.body)
            .collect()
    }

    /// Lookups of the frame element `selector` from the top-level document.
    pub fn frame_lookups(&self, selector: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .page
            .frames
            .iter()
            .find(|f| f.selector == selector)
            .map_or(0, |f| f.lookups)
    }
}

fn serve(mut stream: TcpStream, state: &Mutex<State>) {
    let Ok(request) = read_request(&mut stream) else { return };
    let (status, value) = {
        let mut state = state.lock().unwrap();
        let reply = state.handle(&request);
        state.requests.push(request);
        reply
    };
    let _ = respond(&mut stream, status, value);
}

fn read_request(stream: &mut TcpStream) -> std::io::Result<Request> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut length = 0;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;
    Ok(Request {
        method,
        path,
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    })
}

fn respond(stream: &mut TcpStream, status: u16, value: Value) -> std::io::Result<()> {
    let body = json!({ "value": value }).to_string();
    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        _ => "Error",
    };
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    )?;
    stream.flush()
}

fn ok(value: Value) -> (u16, Value) {
    (200, value)
}

fn error(status: u16, error: &str) -> (u16, Value) {
    (status, json!({ "error": error, "message": error, "stacktrace": "" }))
}

fn reference(id: String) -> Value {
    json!({ ELEMENT_KEY: id })
}

impl State {
    fn handle(&mut self, request: &Request) -> (u16, Value) {
        let session = format!("/session/{}", SESSION);
        let command = match request.path.strip_prefix(&session) {
            Some(rest) => rest.trim_start_matches('/'),
            None if request.path == "/session" && request.method == "POST" => {
                return ok(json!({ "sessionId": SESSION, "capabilities": {} }));
            }
            None => return error(404, "invalid session id"),
        };
        let segments: Vec<&str> = command.split('/').collect();

        match (request.method.as_str(), segments.as_slice()) {
            ("DELETE", [""]) => ok(Value::Null),
            ("POST", ["url"]) => {
                self.context = None;
                ok(Value::Null)
            }
            ("POST", ["frame"]) => self.switch_frame(&request.body),
            ("POST", ["element"]) => self.find(&request.body, false),
            ("POST", ["elements"]) => self.find(&request.body, true),
            ("GET", ["element", id, "rect"]) => match self.element(id) {
                Some(element) => ok(json!(element.rect)),
                None => error(404, "no such element"),
            },
            ("GET", ["element", id, "displayed"]) => match self.element(id) {
                Some(element) => ok(json!(element.displayed)),
                None => error(404, "no such element"),
            },
            ("POST", ["element", id, "click"]) => match self.element(id) {
                Some(_) => ok(Value::Null),
                None => error(404, "no such element"),
            },
            ("POST", ["execute", "sync"]) => self.execute(&request.body),
            ("POST", ["actions"]) | ("DELETE", ["actions"]) => ok(Value::Null),
            _ => error(404, "unknown command"),
        }
    }

    fn switch_frame(&mut self, body: &Value) -> (u16, Value) {
        let id = &body["id"];
        if id.is_null() {
            self.context = None;
            return ok(Value::Null);
        }
        match id.get(ELEMENT_KEY).and_then(Value::as_str).and_then(|e| self.frame_index(e)) {
            Some(index) if self.context.is_none() => {
                self.context = Some(index);
                ok(Value::Null)
            }
            _ => error(404, "no such frame"),
        }
    }

    fn find(&mut self, body: &Value, many: bool) -> (u16, Value) {
        let selector = body["value"].as_str().unwrap_or_default();
        let mut found = Vec::new();

        match self.context {
            Some(fi) => {
                for (i, e) in self.page.frames[fi].elements.iter().enumerate() {
                    if e.selector == selector {
                        found.push(reference(format!("f{}-{}", fi, i)));
                    }
                }
            }
            None => {
                for (i, e) in self.page.elements.iter().enumerate() {
                    if e.selector == selector {
                        found.push(reference(format!("top-{}", i)));
                    }
                }
                for (fi, frame) in self.page.frames.iter_mut().enumerate() {
                    if frame.selector == selector {
                        frame.lookups += 1;
                        if frame.lookups > frame.missing_lookups {
                            found.push(reference(format!("frame-{}", fi)));
                        }
                    }
                }
            }
        }

        if many {
            return ok(Value::Array(found));
        }
        match found.into_iter().next() {
            Some(element) => ok(element),
            None => error(404, "no such element"),
        }
    }

    fn execute(&self, body: &Value) -> (u16, Value) {
        let target = body["args"]
            .get(0)
            .and_then(|arg| arg.get(ELEMENT_KEY))
            .and_then(Value::as_str);
        let (x, y) = match target {
            Some(id) => match self.frame_index(id) {
                Some(index) => self.page.frames[index].border,
                None => return error(404, "no such element"),
            },
            None => match self.context {
                Some(index) => self.page.frames[index].scroll,
                None => self.page.scroll,
            },
        };
        ok(json!([x, y]))
    }

    fn frame_index(&self, id: &str) -> Option<usize> {
        let index = id.strip_prefix("frame-")?.parse().ok()?;
        (index < self.page.frames.len()).then_some(index)
    }

    /// Element by id, only if it belongs to the current browsing context.
    fn element(&self, id: &str) -> Option<FakeElement> {
        if let Some(index) = self.frame_index(id) {
            let frame = &self.page.frames[index];
            return self
                .context
                .is_none()
                .then(|| FakeElement::new(&frame.selector, frame.rect));
        }
        if let Some(i) = id.strip_prefix("top-") {
            let i: usize = i.parse().ok()?;
            return self.context.is_none().then(|| self.page.elements.get(i).cloned())?;
        }
        let (fi, i) = id.strip_prefix('f')?.split_once('-')?;
        let (fi, i): (usize, usize) = (fi.parse().ok()?, i.parse().ok()?);
        if self.context != Some(fi) {
            return None;
        }
        self.page.frames.get(fi)?.elements.get(i).cloned()
    }
}
