//! Development server with live reload.
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │     │  Reload Thread   │
//! │  (HTTP Server)  │     │  (task queue)    │     │  (ws accept)     │
//! └────────┬────────┘     └────────┬─────────┘     └────────┬─────────┘
//!          │                       │                        │
//!          ▼                       ▼                        ▼
//!    serve dev/ files        re-run stages  ──notify──▶  browsers
//! ```
//!
//! Request resolution: exact file, then the directory's `index.html`, then
//! 404. HTML responses carry the reload client.

use crate::{context::BuildContext, log, reload, vfs::FileProvider, watch};
use anyhow::{Context, Result, anyhow};
use regex::Regex;
use std::{
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Component, Path, PathBuf},
    sync::{Arc, LazyLock},
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

static BODY_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</body\s*>").unwrap());

/// Serve the working directory until Ctrl+C, optionally with the watcher.
pub fn serve(ctx: &BuildContext, with_watcher: bool) -> Result<()> {
    let serve = &ctx.config.serve;
    let interface: IpAddr = serve
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", serve.interface))?;

    let (server, addr) = try_bind_port(interface, serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    if with_watcher {
        let watch_ctx = ctx.clone();
        std::thread::spawn(move || {
            if let Err(e) = watch::watch_blocking(&watch_ctx) {
                log!("watch"; "{e:#}");
            }
        });
    }

    let client = ctx.reload().port().map(reload::client_script);
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, ctx, client.as_deref()) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let addr = server.server_addr().to_ip().unwrap_or(addr);
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Path Resolution
// ============================================================================

/// What a request URL maps to under the serve root.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolved {
    File(PathBuf),
    NotFound,
    /// The path tried to leave the serve root.
    Forbidden,
}

/// Map a raw request URL to a file under `root`.
pub fn resolve(fs: &dyn FileProvider, root: &Path, url: &str) -> Resolved {
    // Strip query string and fragment (`font.woff2?t=123`) before decoding
    let raw = url.split(['?', '#']).next().unwrap_or_default();
    let path = urlencoding::decode(raw).map_or_else(|_| raw.to_owned(), |s| s.into_owned());
    let relative = Path::new(path.trim_start_matches('/'));

    let mut local = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => local.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Resolved::Forbidden;
            }
        }
    }

    if fs.is_file(&local) {
        return Resolved::File(local);
    }
    let index = local.join("index.html");
    if fs.is_file(&index) {
        return Resolved::File(index);
    }
    Resolved::NotFound
}

/// Insert `<script>` with `client` before the last `</body>`, or append it.
pub fn inject_reload(html: &str, client: &str) -> String {
    let tag = format!("<script>{client}</script>");
    match BODY_CLOSE.find_iter(html).last() {
        Some(close) => {
            let mut out = String::with_capacity(html.len() + tag.len());
            out.push_str(&html[..close.start()]);
            out.push_str(&tag);
            out.push_str(&html[close.start()..]);
            out
        }
        None => format!("{html}{tag}"),
    }
}

// ============================================================================
// Request Handling
// ============================================================================

fn handle_request(request: Request, ctx: &BuildContext, client: Option<&str>) -> Result<()> {
    let path = match resolve(ctx.fs(), &ctx.paths.dev, request.url()) {
        Resolved::File(path) => path,
        Resolved::NotFound => return respond_status(request, 404, "404 Not Found"),
        Resolved::Forbidden => return respond_status(request, 403, "403 Forbidden"),
    };

    let content = ctx
        .fs()
        .read(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = guess_content_type(&path);

    let body = match client {
        Some(client) if content_type.starts_with("text/html") => {
            inject_reload(&String::from_utf8_lossy(&content), client).into_bytes()
        }
        _ => content,
    };

    let response = Response::from_data(body)
        .with_header(header("Content-Type", content_type)?)
        .with_header(header("Cache-Control", "no-cache")?);
    request.respond(response)?;
    Ok(())
}

fn respond_status(request: Request, status: u16, text: &str) -> Result<()> {
    let response = Response::new(
        StatusCode(status),
        vec![header("Content-Type", "text/plain")?],
        Cursor::new(text.as_bytes().to_vec()),
        Some(text.len()),
        None,
    );
    request.respond(response)?;
    Ok(())
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow!("invalid header {name}: {value}"))
}

/// Guess MIME content type from file extension.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("map") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",

        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
