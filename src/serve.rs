//! Local preview server.
//!
//! Serves the output root over HTTP with `tiny_http`. Request resolution:
//!
//! 1. exact file → the file
//! 2. directory with `index.html` → that file
//! 3. directory without → generated listing
//! 4. anything else → 404
//!
//! Paths containing `..` never leave the output root. With watching on, a
//! background thread rebuilds the site on change while requests keep being
//! answered from whatever is on disk.

use crate::config::SiteConfig;
use crate::macros::MacroTable;
use crate::watch;
use maud::{DOCTYPE, Markup, html};
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server, StatusCode};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("serve: failed to bind {address}: {message}")]
    Bind { address: String, message: String },
}

/// What a request path maps to on disk.
#[derive(Debug, PartialEq)]
pub enum Resolved {
    File(PathBuf),
    Listing(PathBuf),
    NotFound,
}

/// Map a raw request URL onto the served directory.
pub fn resolve(root: &Path, url: &str) -> Resolved {
    let path = url.split(['?', '#']).next().unwrap_or("");
    let decoded = urlencoding::decode(path)
        .map(|p| p.into_owned())
        .unwrap_or_default();
    let rel = Path::new(decoded.trim_matches('/'));
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return Resolved::NotFound;
    }

    let local = root.join(rel);
    if local.is_file() {
        return Resolved::File(local);
    }
    if local.is_dir() {
        let index = local.join("index.html");
        return if index.is_file() {
            Resolved::File(index)
        } else {
            Resolved::Listing(local)
        };
    }
    Resolved::NotFound
}

/// Guess MIME content type from file extension.
fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Directory listing for a directory without an `index.html`.
fn directory_listing(dir: &Path, root: &Path) -> std::io::Result<Markup> {
    let mut entries: Vec<(String, bool)> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| {
            let is_dir = e.file_type().map(|t| t.is_dir()).unwrap_or(false);
            (e.file_name().to_string_lossy().into_owned(), is_dir)
        })
        .filter(|(name, _)| !name.starts_with('.'))
        .collect();
    entries.sort();

    let rel = crate::naming::slash_path(dir.strip_prefix(root).unwrap_or(dir));
    let base = if rel.is_empty() {
        "/".to_string()
    } else {
        format!("/{rel}/")
    };
    let title = format!("Index of {base}");

    Ok(html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { (title) }
            }
            body {
                h1 { (title) }
                ul {
                    @if !rel.is_empty() {
                        li { a href=".." { "../" } }
                    }
                    @for (name, is_dir) in &entries {
                        @let suffix = if *is_dir { "/" } else { "" };
                        li {
                            a href={ (base) (urlencoding::encode(name)) (suffix) } { (name) (suffix) }
                        }
                    }
                }
            }
        }
    })
}

fn content_type_header(value: &'static str) -> Header {
    Header::from_bytes("Content-Type", value).expect("content types are ASCII constants")
}

fn handle(request: Request, root: &Path) -> std::io::Result<()> {
    match resolve(root, request.url()) {
        Resolved::File(path) => {
            let body = std::fs::read(&path)?;
            let response =
                Response::from_data(body).with_header(content_type_header(content_type(&path)));
            request.respond(response)
        }
        Resolved::Listing(dir) => {
            let page = directory_listing(&dir, root)?.into_string();
            let response = Response::from_string(page)
                .with_header(content_type_header("text/html; charset=utf-8"));
            request.respond(response)
        }
        Resolved::NotFound => {
            let body = "404 Not Found";
            let response = Response::new(
                StatusCode(404),
                vec![content_type_header("text/plain; charset=utf-8")],
                Cursor::new(body),
                Some(body.len()),
                None,
            );
            request.respond(response)
        }
    }
}

/// Serve `config.output` under `site_root` until the process is stopped.
///
/// The caller builds the site first; with `watch` set a background thread
/// rebuilds on every change.
pub fn serve(
    site_root: &Path,
    config: &SiteConfig,
    address: &str,
    watch: bool,
    macros: MacroTable,
) -> Result<(), ServeError> {
    let server = Server::http(address).map_err(|e| ServeError::Bind {
        address: address.to_string(),
        message: e.to_string(),
    })?;
    let root = site_root.join(&config.output);
    tracing::info!(address, root = %root.display(), "serving");
    println!("Serving {} on http://{address}", root.display());

    if watch {
        let site_root = site_root.to_path_buf();
        let config = config.clone();
        std::thread::spawn(move || {
            if let Err(e) = watch::watch_blocking(&site_root, &config, &macros) {
                tracing::error!(error = %e, "watcher stopped");
            }
        });
    }

    for request in server.incoming_requests() {
        let url = request.url().to_string();
        if let Err(e) = handle(request, &root) {
            tracing::warn!(url, error = %e, "request failed");
        }
    }
    Ok(())
}
