//! `styx init`: scaffold a new site.
//!
//! ```text
//! my-site/
//! ├── config.toml        stock config, every option documented
//! └── src/
//!     ├── layout.tmpl    layout for documents in src/
//!     ├── index.html     stand-alone template listing the documents
//!     ├── hello.md       first document
//!     ├── css/style.css
//!     └── robots.txt
//! ```
//!
//! The target must not exist. If anything fails half way the directory is
//! removed again, so a failed `init` leaves nothing behind.

use crate::config;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InitError {
    #[error("init: path {} already exists", .0.display())]
    Exists(PathBuf),
    #[error("init: failed to create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

const LAYOUT: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>{{ current.title }}</title>
  <link rel="stylesheet" href="/css/style.css">
</head>
<body>
  <nav><a href="/">Home</a></nav>
  <article>
    <h1>{{ current.title }}</h1>
    <time datetime="{{ current.time }}">{{ current.time | date(format="%B %e, %Y") }}</time>
    {{ current.content | safe }}
  </article>
</body>
</html>
"#;

const INDEX: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Home</title>
  <link rel="stylesheet" href="/css/style.css">
</head>
<body>
  <h1>Posts</h1>
  <ul>
  {% for page in dir %}
    <li><a href="{{ page.path }}">{{ page.title }}</a></li>
  {% endfor %}
  </ul>
</body>
</html>
"#;

const HELLO: &str = r#"+++
title = "Hello, world"
+++

This is your first document. Edit `src/hello.md`, then run `styx build`.

- Documents are markdown with a metadata block on top.
- Each directory of documents has a `layout.tmpl`.
- `.html` files are templates that can list documents.
"#;

const STYLE: &str = r#"body {
  max-width: 40rem;
  margin: 2rem auto;
  padding: 0 1rem;
  font-family: system-ui, sans-serif;
  line-height: 1.5;
}

time {
  color: #666;
}
"#;

const ROBOTS: &str = "User-agent: *\nDisallow:\n";

/// Files written by [`init_site`], relative to the new site root.
pub fn scaffold() -> [(&'static str, &'static str); 6] {
    [
        (config::CONFIG_FILENAME, config::stock_config_toml()),
        ("src/layout.tmpl", LAYOUT),
        ("src/index.html", INDEX),
        ("src/hello.md", HELLO),
        ("src/css/style.css", STYLE),
        ("src/robots.txt", ROBOTS),
    ]
}

/// Create a new site at `root`. Returns the files written.
pub fn init_site(root: &Path) -> Result<Vec<&'static str>, InitError> {
    if root.exists() {
        return Err(InitError::Exists(root.to_path_buf()));
    }

    let files = scaffold();
    let result = files.par_iter().try_for_each(|(rel, contents)| {
        let path = root.join(rel);
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, contents)
        };
        write().map_err(|source| InitError::Io {
            path: path.clone(),
            source,
        })
    });

    if let Err(err) = result {
        if let Err(e) = std::fs::remove_dir_all(root) {
            tracing::warn!(path = %root.display(), error = %e, "failed to remove partial site");
        }
        return Err(err);
    }
    Ok(files.iter().map(|(rel, _)| *rel).collect())
}
