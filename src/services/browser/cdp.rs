//! Chrome DevTools Protocol driver
//!
//! Spawns a headless Chromium with a throwaway profile, connects to its
//! DevTools WebSocket and drives a single page through a flattened target
//! session. Only the handful of domains needed to observe network traffic
//! are used: `Target`, `Page`, `Network` and `Fetch`.

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{BrowserError, BrowserLauncher, BrowserSession, LaunchOptions};

/// Executables probed in `PATH` when no explicit browser is configured
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

const STARTUP_TIMEOUT: Duration = Duration::from_secs(20);
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

static PROFILE_COUNTER: AtomicU64 = AtomicU64::new(0);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, String>>>>>;

/// Protocol event (message without an `id`)
#[derive(Debug)]
struct CdpEvent {
    method: String,
    params: Value,
}

/// Request/response multiplexer over the DevTools WebSocket
struct CdpConnection {
    sink: AsyncMutex<SplitSink<WsStream, Message>>,
    pending: PendingMap,
    next_id: AtomicU64,
}

impl CdpConnection {
    async fn connect(ws_url: &str) -> Result<(Self, mpsc::UnboundedReceiver<CdpEvent>), BrowserError> {
        let (ws, _) = connect_async(ws_url)
            .await
            .map_err(|e| BrowserError::Protocol(format!("WebSocket connect failed: {}", e)))?;
        let (sink, mut stream) = ws.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let text = match message {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };

                let value: Value = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("Ignoring malformed DevTools message: {}", e);
                        continue;
                    }
                };

                if let Some(id) = value.get("id").and_then(Value::as_u64) {
                    let sender = reader_pending.lock().ok().and_then(|mut p| p.remove(&id));
                    if let Some(sender) = sender {
                        let result = match value.get("error") {
                            Some(err) => Err(err
                                .get("message")
                                .and_then(Value::as_str)
                                .unwrap_or("unknown error")
                                .to_string()),
                            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
                        };
                        let _ = sender.send(result);
                    }
                } else if let Some(method) = value.get("method").and_then(Value::as_str) {
                    let event = CdpEvent {
                        method: method.to_string(),
                        params: value.get("params").cloned().unwrap_or(Value::Null),
                    };
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
            }

            // Dropping the senders fails every call still in flight
            if let Ok(mut p) = reader_pending.lock() {
                p.clear();
            }
        });

        Ok((
            Self {
                sink: AsyncMutex::new(sink),
                pending,
                next_id: AtomicU64::new(1),
            },
            event_rx,
        ))
    }

    /// Send a command and wait for its result
    async fn call(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
    ) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut message = json!({ "id": id, "method": method, "params": params });
        if let Some(sid) = session_id {
            message["sessionId"] = json!(sid);
        }

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| BrowserError::Protocol("pending call table poisoned".to_string()))?
            .insert(id, tx);

        self.sink
            .lock()
            .await
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| BrowserError::Protocol(format!("{}: {}", method, e)))?;

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(msg)) => Err(BrowserError::Protocol(format!("{}: {}", method, msg))),
            Err(_) => Err(BrowserError::Protocol(format!("{}: connection closed", method))),
        }
    }
}

/// Launches Chromium-family browsers
pub struct ChromeLauncher {
    executable: Option<PathBuf>,
}

impl ChromeLauncher {
    /// Use `executable` when given, otherwise search `PATH` at launch time
    pub fn new(executable: Option<&str>) -> Self {
        Self {
            executable: executable.map(PathBuf::from),
        }
    }

    fn resolve_executable(&self) -> Result<PathBuf, BrowserError> {
        if let Some(path) = &self.executable {
            return Ok(path.clone());
        }
        BROWSER_CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or(BrowserError::NotFound)
    }
}

/// Command line flags for one isolated session
fn launch_args(options: &LaunchOptions, user_data_dir: &Path) -> Vec<String> {
    let mut args = vec![
        "--headless=new".to_string(),
        "--remote-debugging-port=0".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-gpu".to_string(),
        "--disable-extensions".to_string(),
        "--mute-audio".to_string(),
        format!("--user-data-dir={}", user_data_dir.display()),
        format!("--user-agent={}", options.user_agent),
    ];

    if !options.load_images {
        args.push("--blink-settings=imagesEnabled=false".to_string());
    }
    if options.disable_security {
        args.push("--disable-web-security".to_string());
        args.push("--ignore-certificate-errors".to_string());
    }
    if options.clear_cache {
        args.push("--disk-cache-size=1".to_string());
    }

    args.push("about:blank".to_string());
    args
}

/// Wait for the "DevTools listening on ws://..." banner on stderr
async fn read_devtools_url(stderr: ChildStderr) -> Result<String, BrowserError> {
    let mut lines = BufReader::new(stderr).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| BrowserError::Launch(e.to_string()))?
    {
        if let Some((_, url)) = line.split_once("DevTools listening on ") {
            let url = url.trim().to_string();
            // Keep draining so the browser never blocks on a full pipe
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "browser", "{}", line);
                }
            });
            return Ok(url);
        }
    }

    Err(BrowserError::Launch(
        "browser exited before exposing a DevTools endpoint".to_string(),
    ))
}

/// Create a page target, attach to it and apply the session options
async fn open_page(
    conn: &CdpConnection,
    options: &LaunchOptions,
) -> Result<(String, String), BrowserError> {
    let target = conn
        .call("Target.createTarget", json!({ "url": "about:blank" }), None)
        .await?;
    let target_id = target
        .get("targetId")
        .and_then(Value::as_str)
        .ok_or_else(|| BrowserError::Protocol("createTarget returned no targetId".to_string()))?
        .to_string();

    let attached = conn
        .call(
            "Target.attachToTarget",
            json!({ "targetId": target_id, "flatten": true }),
            None,
        )
        .await?;
    let session_id = attached
        .get("sessionId")
        .and_then(Value::as_str)
        .ok_or_else(|| BrowserError::Protocol("attachToTarget returned no sessionId".to_string()))?
        .to_string();

    let sid = Some(session_id.as_str());
    conn.call("Page.enable", json!({}), sid).await?;
    conn.call("Network.enable", json!({}), sid).await?;
    conn.call(
        "Network.setUserAgentOverride",
        json!({ "userAgent": options.user_agent }),
        sid,
    )
    .await?;

    if options.clear_cache {
        conn.call("Network.clearBrowserCache", json!({}), sid).await?;
        conn.call("Network.setCacheDisabled", json!({ "cacheDisabled": true }), sid)
            .await?;
    }

    if options.lock_navigation {
        conn.call(
            "Fetch.enable",
            json!({
                "patterns": [{ "urlPattern": "*", "resourceType": "Document", "requestStage": "Request" }]
            }),
            sid,
        )
        .await?;
    }

    Ok((target_id, session_id))
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let executable = self.resolve_executable()?;
        let user_data_dir = std::env::temp_dir().join(format!(
            "tunein-addon-profile-{}-{}",
            std::process::id(),
            PROFILE_COUNTER.fetch_add(1, Ordering::SeqCst)
        ));

        debug!("Launching browser: {}", executable.display());

        let mut child = Command::new(&executable)
            .args(launch_args(options, &user_data_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrowserError::Launch(format!("{}: {}", executable.display(), e)))?;

        let setup = async {
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| BrowserError::Launch("stderr not captured".to_string()))?;
            let ws_url = tokio::time::timeout(STARTUP_TIMEOUT, read_devtools_url(stderr))
                .await
                .map_err(|_| BrowserError::Launch("timed out waiting for DevTools endpoint".to_string()))??;
            let (conn, events) = CdpConnection::connect(&ws_url).await?;
            let (target_id, session_id) = open_page(&conn, options).await?;
            Ok::<_, BrowserError>((conn, events, target_id, session_id))
        }
        .await;

        match setup {
            Ok((conn, events, target_id, session_id)) => {
                info!("Browser session started (target {})", target_id);
                Ok(Box::new(ChromeSession {
                    child,
                    conn,
                    events,
                    target_id,
                    session_id,
                    observer: None,
                    lock_navigation: options.lock_navigation,
                    navigation_timeout: options.navigation_timeout,
                    user_data_dir,
                }))
            }
            Err(e) => {
                let _ = child.kill().await;
                let _ = tokio::fs::remove_dir_all(&user_data_dir).await;
                Err(e)
            }
        }
    }
}

/// Drop every event already queued, returning how many were dropped
fn discard_pending(events: &mut mpsc::UnboundedReceiver<CdpEvent>) -> usize {
    let mut dropped = 0;
    while events.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

/// Completion tracking for one `navigate` call.
///
/// A load event only counts once the main frame has navigated to the new
/// document; loads of the previous document are ignored.
#[derive(Debug, Default)]
struct NavigationProgress {
    committed: bool,
    document_navigated: bool,
    loaded: bool,
}

impl NavigationProgress {
    /// `Page.navigate` answered; true when the page is done
    fn on_commit(&mut self) -> bool {
        self.committed = true;
        self.loaded
    }

    fn on_frame_navigated(&mut self, params: &Value) {
        if params.pointer("/frame/parentId").is_none() {
            self.document_navigated = true;
            self.loaded = false;
        }
    }

    /// `Page.loadEventFired`; true when the page is done
    fn on_load(&mut self) -> bool {
        if self.document_navigated {
            self.loaded = true;
        }
        self.loaded && self.committed
    }
}

/// One browser process driving one page
pub struct ChromeSession {
    child: Child,
    conn: CdpConnection,
    events: mpsc::UnboundedReceiver<CdpEvent>,
    target_id: String,
    session_id: String,
    observer: Option<mpsc::UnboundedSender<String>>,
    lock_navigation: bool,
    navigation_timeout: Duration,
    user_data_dir: PathBuf,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    fn observe_requests(&mut self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observer = Some(tx);
        rx
    }

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let conn = &self.conn;
        let events = &mut self.events;
        let session_id = self.session_id.as_str();
        let target_id = self.target_id.as_str();
        let observer = self.observer.as_ref();
        let lock_navigation = self.lock_navigation;
        let timeout = self.navigation_timeout;

        let stale = discard_pending(events);
        if stale > 0 {
            debug!("Discarded {} events buffered before navigation", stale);
        }

        let navigation = conn.call("Page.navigate", json!({ "url": url }), Some(session_id));
        tokio::pin!(navigation);
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut progress = NavigationProgress::default();
        let mut main_document_seen = false;

        loop {
            tokio::select! {
                result = &mut navigation, if !progress.committed => {
                    let result = result?;
                    if let Some(error) = result
                        .get("errorText")
                        .and_then(Value::as_str)
                        .filter(|e| !e.is_empty())
                    {
                        return Err(BrowserError::Navigation(error.to_string()));
                    }
                    if progress.on_commit() {
                        return Ok(());
                    }
                }
                event = events.recv() => {
                    let event = event.ok_or_else(|| {
                        BrowserError::Protocol("connection closed during navigation".to_string())
                    })?;

                    match event.method.as_str() {
                        "Network.requestWillBeSent" => {
                            if let (Some(tx), Some(request_url)) = (
                                observer,
                                event.params.pointer("/request/url").and_then(Value::as_str),
                            ) {
                                let _ = tx.send(request_url.to_string());
                            }
                        }
                        "Fetch.requestPaused" => {
                            let request_id = event
                                .params
                                .get("requestId")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string();
                            // The main frame id equals the target id
                            let is_main_frame = event.params.get("frameId").and_then(Value::as_str)
                                == Some(target_id);

                            if lock_navigation && is_main_frame && main_document_seen {
                                debug!(
                                    "Blocked main frame navigation to {}",
                                    event.params.pointer("/request/url").and_then(serde_json::Value::as_str).unwrap_or("?")
                                );
                                conn.call(
                                    "Fetch.failRequest",
                                    json!({ "requestId": request_id, "errorReason": "Aborted" }),
                                    Some(session_id),
                                )
                                .await?;
                            } else {
                                if is_main_frame {
                                    main_document_seen = true;
                                }
                                conn.call(
                                    "Fetch.continueRequest",
                                    json!({ "requestId": request_id }),
                                    Some(session_id),
                                )
                                .await?;
                            }
                        }
                        "Page.frameNavigated" => {
                            progress.on_frame_navigated(&event.params);
                        }
                        "Page.loadEventFired" => {
                            if progress.on_load() {
                                return Ok(());
                            }
                        }
                        _ => {}
                    }
                }
                _ = &mut deadline => {
                    return Err(BrowserError::Timeout(timeout));
                }
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        let ChromeSession {
            mut child,
            conn,
            target_id,
            user_data_dir,
            ..
        } = *self;

        let page_closed = tokio::time::timeout(
            EXIT_TIMEOUT,
            conn.call("Target.closeTarget", json!({ "targetId": target_id }), None),
        )
        .await;

        let _ = tokio::time::timeout(EXIT_TIMEOUT, conn.call("Browser.close", json!({}), None)).await;

        match tokio::time::timeout(EXIT_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => debug!("Browser exited: {}", status),
            _ => {
                warn!("Browser did not exit in time, killing it");
                let _ = child.kill().await;
            }
        }

        drop(conn);
        if let Err(e) = tokio::fs::remove_dir_all(&user_data_dir).await {
            debug!("Failed to remove browser profile {}: {}", user_data_dir.display(), e);
        }

        match page_closed {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BrowserError::Protocol("timed out closing page".to_string())),
        }
    }
}
