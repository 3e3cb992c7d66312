//! HTTP listener for the assistant proxy.
//!
//! A blocking accept thread hands requests to an async loop over a channel;
//! each request is handled on its own task and answered from a blocking task.

use std::io::{self, Read};
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use escribe_core::constants::endpoints::ASSISTANT_ROUTE;
use escribe_core::{AssistantHandler, ProxyResponse};
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::sync::{mpsc, Notify};

const BODY_READ_FAILED: &str = "Failed to read request body";

/// Where a request goes, decided from method and path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Assistant,
    MethodNotAllowed,
    NotFound,
}

pub fn route(method: &Method, url: &str) -> Route {
    let path = url.split('?').next().unwrap_or_default();
    if path != ASSISTANT_ROUTE {
        return Route::NotFound;
    }
    match method {
        Method::Post => Route::Assistant,
        _ => Route::MethodNotAllowed,
    }
}

/// Handle for stopping a running server.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.notify.notify_one();
    }
}

/// Running proxy instance.
pub struct AssistantServer {
    /// Address the listener actually bound to.
    pub addr: SocketAddr,

    handle: tokio::task::JoinHandle<()>,

    shutdown: ShutdownHandle,
}

impl AssistantServer {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Stop accepting requests and wait for the loop to exit.
    pub async fn stop(self) {
        self.shutdown.shutdown();
        let _ = self.handle.await;
    }

    /// Run until something calls [`ShutdownHandle::shutdown`].
    pub async fn wait(self) {
        let _ = self.handle.await;
    }
}

/// Bind `addr` and start serving `POST /api/ai`. Must be called inside a
/// tokio runtime.
pub fn start(addr: &str, handler: AssistantHandler) -> io::Result<AssistantServer> {
    let server = Server::http(addr).map_err(|e| io::Error::other(format!("bind {addr}: {e}")))?;
    let bound = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| io::Error::other("unable to determine bound address"))?;
    let server = Arc::new(server);

    let (tx, mut rx) = mpsc::channel::<Request>(64);
    let accept = server.clone();
    thread::spawn(move || {
        while let Ok(request) = accept.recv() {
            if tx.blocking_send(request).is_err() {
                break;
            }
        }
    });

    let shutdown_notify = Arc::new(Notify::new());
    let shutdown = ShutdownHandle {
        notify: shutdown_notify.clone(),
    };
    let handler = Arc::new(handler);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_notify.notified() => break,
                maybe_req = rx.recv() => {
                    let Some(req) = maybe_req else { break };
                    let handler = handler.clone();
                    tokio::spawn(async move { serve(req, &handler).await });
                }
            }
        }
        server.unblock();
        tracing::info!("Assistant proxy on {} stopped", bound);
    });

    tracing::info!("Assistant proxy listening on {}", bound);
    Ok(AssistantServer {
        addr: bound,
        handle,
        shutdown,
    })
}

async fn serve(req: Request, handler: &AssistantHandler) {
    let method = req.method().clone();
    let url = req.url().to_string();
    tracing::debug!("{} {}", method, url);

    let (req, response) = match route(&method, &url) {
        Route::NotFound => (req, ProxyResponse::not_found()),
        Route::MethodNotAllowed => (req, ProxyResponse::method_not_allowed()),
        Route::Assistant => {
            let read = tokio::task::spawn_blocking(move || {
                let mut req = req;
                let body = read_guarded(req.as_reader());
                (req, body)
            })
            .await;
            let Ok((req, body)) = read else {
                tracing::debug!("Body read cancelled by runtime shutdown");
                return;
            };
            match body {
                Ok(body) => {
                    let response = handler.handle_body(&body).await;
                    (req, response)
                }
                Err(rejection) => (req, rejection),
            }
        }
    };

    let _ = tokio::task::spawn_blocking(move || respond(req, response)).await;
}

/// Read a whole request body. A failing reader is a 400; a panicking one is
/// caught here so the request can still be answered.
pub(crate) fn read_guarded(reader: &mut dyn Read) -> Result<Vec<u8>, ProxyResponse> {
    let mut body = Vec::new();
    match panic::catch_unwind(AssertUnwindSafe(|| reader.read_to_end(&mut body))) {
        Ok(Ok(_)) => Ok(body),
        Ok(Err(e)) => {
            tracing::warn!("Failed to read request body: {}", e);
            Err(ProxyResponse::bad_request())
        }
        Err(_) => {
            tracing::warn!("Request body reader panicked");
            Err(ProxyResponse::error(500, BODY_READ_FAILED))
        }
    }
}

fn respond(req: Request, response: ProxyResponse) {
    let mut reply =
        Response::from_string(response.body.to_string()).with_status_code(response.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        reply = reply.with_header(header);
    }
    if let Err(e) = req.respond(reply) {
        tracing::debug!("Client went away before the reply: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_path_then_method() {
        assert_eq!(route(&Method::Post, "/api/ai"), Route::Assistant);
        assert_eq!(route(&Method::Post, "/api/ai?debug=1"), Route::Assistant);
        assert_eq!(route(&Method::Get, "/api/ai"), Route::MethodNotAllowed);
        assert_eq!(route(&Method::Post, "/api/other"), Route::NotFound);
        assert_eq!(route(&Method::Get, "/"), Route::NotFound);
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection reset"))
        }
    }

    struct PanickingReader;

    impl Read for PanickingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            panic!("reader blew up");
        }
    }

    #[test]
    fn read_guarded_returns_whole_body() {
        let mut reader = io::Cursor::new(br#"{"messages":[]}"#.to_vec());
        assert_eq!(read_guarded(&mut reader).unwrap(), br#"{"messages":[]}"#.to_vec());
    }

    #[test]
    fn read_guarded_maps_io_errors_to_bad_request() {
        let rejection = read_guarded(&mut BrokenReader).unwrap_err();
        assert_eq!(rejection.status, 400);
    }

    #[test]
    fn read_guarded_answers_reader_panic_with_500() {
        let rejection = read_guarded(&mut PanickingReader).unwrap_err();
        assert_eq!(rejection.status, 500);
        assert_eq!(rejection.body["error"], "Failed to read request body");
    }
}
