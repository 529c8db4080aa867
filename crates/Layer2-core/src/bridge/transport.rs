//! Bridge Transport - 브리지 프로세스와 stdio JSON-RPC 통신
//!
//! 줄 단위 JSON 메시지:
//! - 요청/응답: id 기반 매칭 (pending map + oneshot)
//! - 알림: id 없는 메시지, 별도 채널로 전달

use crate::mcp::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use mcbot_foundation::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::{debug, error, info};

/// 기본 요청 타임아웃
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application-level error code used by the bridge for bot/script failures
pub const BRIDGE_APP_ERROR: i32 = -32000;

type PendingMap = Arc<RwLock<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// Stdio transport to a bridge process
pub struct BridgeTransport {
    /// 요청 ID 카운터
    request_id: AtomicU64,

    /// 자식 프로세스
    child: Mutex<Option<Child>>,

    /// stdin writer
    stdin_tx: mpsc::Sender<String>,

    /// 대기 중인 요청들 (id -> response sender)
    pending_requests: PendingMap,

    /// 연결 상태
    connected: Arc<AtomicBool>,
}

impl BridgeTransport {
    /// 브리지 프로세스 시작
    ///
    /// Returns the transport and the channel carrying the bridge's
    /// notifications. The channel closes when the process exits.
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<(Self, mpsc::Receiver<JsonRpcRequest>)> {
        info!("Spawning bridge process: {} {:?}", command, args);

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            Error::Connection(format!("Failed to spawn bridge process '{}': {}", command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Internal("Failed to capture bridge stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("Failed to capture bridge stdout".to_string()))?;
        let stderr = child.stderr.take();

        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(32);
        let (notify_tx, notify_rx) = mpsc::channel::<JsonRpcRequest>(64);

        let pending_requests: PendingMap = Arc::new(RwLock::new(HashMap::new()));
        let pending_for_reader = Arc::clone(&pending_requests);

        let connected = Arc::new(AtomicBool::new(true));
        let connected_for_writer = Arc::clone(&connected);
        let connected_for_reader = Arc::clone(&connected);

        // stdin writer task
        let mut stdin_writer = stdin;
        tokio::spawn(async move {
            while let Some(msg) = stdin_rx.recv().await {
                if let Err(e) = stdin_writer.write_all(msg.as_bytes()).await {
                    error!("Failed to write to bridge stdin: {}", e);
                    connected_for_writer.store(false, Ordering::SeqCst);
                    break;
                }
                if let Err(e) = stdin_writer.flush().await {
                    error!("Failed to flush bridge stdin: {}", e);
                    connected_for_writer.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        // stdout reader task
        let mut reader = BufReader::new(stdout).lines();
        tokio::spawn(async move {
            while let Ok(Some(line)) = reader.next_line().await {
                debug!("Bridge stdout: {}", line);
                route_line(&line, &pending_for_reader, &notify_tx).await;
            }
            connected_for_reader.store(false, Ordering::SeqCst);
            // drop every waiter so in-flight requests fail fast
            pending_for_reader.write().await.clear();
            info!("Bridge stdout reader finished");
        });

        // stderr → logs
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "bridge", "{}", line);
                }
            });
        }

        Ok((
            Self {
                request_id: AtomicU64::new(1),
                child: Mutex::new(Some(child)),
                stdin_tx,
                pending_requests,
                connected,
            },
            notify_rx,
        ))
    }

    /// 다음 요청 ID 생성
    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 요청 전송 및 응답 수신 (기본 타임아웃)
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.request_with_timeout(method, params, Some(DEFAULT_REQUEST_TIMEOUT))
            .await
    }

    /// 요청 전송 및 응답 수신
    ///
    /// `None` waits without a deadline (movement requests can take minutes).
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        if !self.is_connected() {
            return Err(Error::Connection("Bridge process is not running".to_string()));
        }

        let id = self.next_id();
        let request = JsonRpcRequest::new(id, method, params);

        let (tx, rx) = oneshot::channel();
        self.pending_requests.write().await.insert(id, tx);

        let msg = serde_json::to_string(&request)?;
        debug!("Sending bridge request: {}", msg);

        if self.stdin_tx.send(format!("{}\n", msg)).await.is_err() {
            self.pending_requests.write().await.remove(&id);
            return Err(Error::Connection("Bridge stdin closed".to_string()));
        }

        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending_requests.write().await.remove(&id);
                    return Err(Error::Protocol(format!(
                        "Bridge request '{}' timed out after {}s",
                        method,
                        limit.as_secs()
                    )));
                }
            },
            None => rx.await,
        };

        let response = received
            .map_err(|_| Error::Connection("Bridge process exited".to_string()))?;

        if let Some(error) = response.error {
            return Err(remote_error(method, error));
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// 프로세스 종료
    pub async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);

        let mut child_guard = self.child.lock().await;
        if let Some(mut child) = child_guard.take() {
            let _ = child.kill().await;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// 한 줄을 응답 또는 알림으로 분배
async fn route_line(
    line: &str,
    pending: &PendingMap,
    notifications: &mpsc::Sender<JsonRpcRequest>,
) {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            debug!("Non-JSON bridge line ignored: {}", e);
            return;
        }
    };

    let is_notification = value.get("method").is_some() && value.get("id").is_none();
    if is_notification {
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(notification) => {
                let _ = notifications.send(notification).await;
            }
            Err(e) => debug!("Malformed bridge notification: {}", e),
        }
        return;
    }

    match serde_json::from_value::<JsonRpcResponse>(value) {
        Ok(response) => {
            if let Some(id) = response.id.as_u64() {
                if let Some(sender) = pending.write().await.remove(&id) {
                    let _ = sender.send(response);
                }
            }
        }
        Err(e) => debug!("Malformed bridge response: {}", e),
    }
}

/// 브리지 에러 → mcbot 에러
///
/// Application errors (bot or script failures) keep the bridge-side stack
/// as the execution trace.
pub fn remote_error(method: &str, error: JsonRpcError) -> Error {
    if error.code == BRIDGE_APP_ERROR {
        let trace = error
            .data
            .as_ref()
            .and_then(|d| d.get("stack"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Error::execution(error.message, trace);
    }
    Error::Protocol(format!("Bridge error on {}: {}", method, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_error_mapping() {
        let app = JsonRpcError {
            code: BRIDGE_APP_ERROR,
            message: "Cannot read properties of null".to_string(),
            data: Some(json!({"stack": "at dig (bridge.js:10:3)"})),
        };
        let err = remote_error("bot/call", app);
        assert_eq!(err.kind(), "ExecutionError");
        assert_eq!(err.trace(), Some("at dig (bridge.js:10:3)"));

        let err = remote_error("bot/get", JsonRpcError::method_not_found());
        assert_eq!(err.kind(), "ProtocolError");
    }

    #[tokio::test]
    async fn test_route_line() {
        let pending: PendingMap = Arc::new(RwLock::new(HashMap::new()));
        let (tx, mut rx) = mpsc::channel(4);
        let (resp_tx, resp_rx) = oneshot::channel();
        pending.write().await.insert(7, resp_tx);

        route_line(r#"{"jsonrpc":"2.0","method":"bot/spawn"}"#, &pending, &tx).await;
        route_line(r#"{"jsonrpc":"2.0","id":7,"result":{"ok":true}}"#, &pending, &tx).await;
        route_line("[bridge] starting", &pending, &tx).await;

        assert_eq!(rx.recv().await.unwrap().method, "bot/spawn");
        assert_eq!(resp_rx.await.unwrap().result, Some(json!({"ok": true})));
        assert!(pending.read().await.is_empty());
    }
}
