//! Minification keyed by content type.
//!
//! HTML goes through `minify_html` directly. Stylesheets and scripts are
//! wrapped in a `<style>` / `<script>` element so the same minifier handles
//! them, then unwrapped. SVG is re-emitted token by token with `quick-xml`:
//! comments and the whitespace between tags go, text keeps its word breaks.
//!
//! Minification never fails: if a minified asset cannot be unwrapped the
//! original bytes are kept.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::ffi::OsStr;
use std::io::Cursor;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinifyKind {
    Html,
    Css,
    Js,
    Svg,
}

impl MinifyKind {
    /// Kind of a stand-alone asset file, by extension. `None` for anything
    /// that is copied untouched. HTML is not an asset: `.html` files are
    /// templates.
    pub fn for_asset(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(OsStr::to_str)?;
        match ext.to_ascii_lowercase().as_str() {
            "css" => Some(Self::Css),
            "js" => Some(Self::Js),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }
}

/// Minify `content` when `enabled`, otherwise borrow it unchanged.
pub fn minify_if(enabled: bool, kind: MinifyKind, content: &[u8]) -> Cow<'_, [u8]> {
    if enabled {
        Cow::Owned(minify(kind, content))
    } else {
        Cow::Borrowed(content)
    }
}

pub fn minify(kind: MinifyKind, content: &[u8]) -> Vec<u8> {
    match kind {
        MinifyKind::Html => minify_html_bytes(content),
        MinifyKind::Css => minify_wrapped(content, b"<style>", b"</style>"),
        MinifyKind::Js => minify_wrapped(content, b"<script>", b"</script>"),
        MinifyKind::Svg => minify_svg(content),
    }
}

fn html_cfg() -> minify_html::Cfg {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    cfg
}

fn minify_html_bytes(html: &[u8]) -> Vec<u8> {
    minify_html::minify(html, &html_cfg())
}

fn minify_wrapped(content: &[u8], open: &[u8], close: &[u8]) -> Vec<u8> {
    let mut wrapped = Vec::with_capacity(open.len() + content.len() + close.len());
    wrapped.extend_from_slice(open);
    wrapped.extend_from_slice(content);
    wrapped.extend_from_slice(close);

    let minified = minify_html_bytes(&wrapped);
    minified
        .strip_prefix(open)
        .and_then(|rest| rest.strip_suffix(close))
        .map(<[u8]>::to_vec)
        .unwrap_or_else(|| content.to_vec())
}

/// Elements whose whitespace-only text is a visible word break.
const TEXT_ELEMENTS: [&[u8]; 3] = [b"text", b"tspan", b"textPath"];

/// Token-aware SVG minification. Anything that does not parse as XML, or is
/// not UTF-8, is left untouched.
fn minify_svg(svg: &[u8]) -> Vec<u8> {
    if std::str::from_utf8(svg).is_err() {
        return svg.to_vec();
    }
    minify_svg_events(svg).unwrap_or_else(|| svg.to_vec())
}

/// Re-emit the event stream with comments dropped, tags rewritten with
/// single-space attribute separators, whitespace runs in text collapsed to
/// one space, and whitespace-only text between tags removed (kept inside
/// text elements and next to entity references).
fn minify_svg_events(svg: &[u8]) -> Option<Vec<u8>> {
    let mut reader = Reader::from_reader(svg);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(svg.len())));

    let mut text_depth = 0usize;
    let mut after_inline = false;
    loop {
        let event = reader.read_event().ok()?;
        let keep_space = std::mem::replace(&mut after_inline, false);
        match event {
            Event::Eof => break,
            Event::Comment(_) => {}
            Event::Start(elem) => {
                if TEXT_ELEMENTS.contains(&elem.local_name().as_ref()) {
                    text_depth += 1;
                }
                writer.write_event(Event::Start(compact_tag(&elem)?)).ok()?;
            }
            Event::Empty(elem) => {
                writer.write_event(Event::Empty(compact_tag(&elem)?)).ok()?;
            }
            Event::End(elem) => {
                if TEXT_ELEMENTS.contains(&elem.local_name().as_ref()) {
                    text_depth = text_depth.saturating_sub(1);
                }
                writer.write_event(Event::End(elem)).ok()?;
            }
            Event::Text(text) => {
                let collapsed = collapse_whitespace(&String::from_utf8_lossy(&text));
                if collapsed == " " && text_depth == 0 && !keep_space {
                    continue;
                }
                after_inline = true;
                writer
                    .write_event(Event::Text(BytesText::from_escaped(collapsed)))
                    .ok()?;
            }
            other => {
                // Entity references sit inline with text; declarations do not.
                after_inline = !matches!(other, Event::Decl(_) | Event::PI(_) | Event::DocType(_));
                writer.write_event(other).ok()?;
            }
        }
    }
    Some(writer.into_inner().into_inner())
}

/// The same tag with its attributes separated by single spaces.
fn compact_tag(elem: &BytesStart<'_>) -> Option<BytesStart<'static>> {
    let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    let mut compact = BytesStart::new(name);
    for attr in elem.attributes() {
        let attr = attr.ok()?;
        // Re-quoting with `"` would break a value that contains one.
        if attr.value.contains(&b'"') {
            return None;
        }
        compact.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
    }
    Some(compact)
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_kinds() {
        assert_eq!(MinifyKind::for_asset(Path::new("a/site.css")), Some(MinifyKind::Css));
        assert_eq!(MinifyKind::for_asset(Path::new("app.JS")), Some(MinifyKind::Js));
        assert_eq!(MinifyKind::for_asset(Path::new("logo.svg")), Some(MinifyKind::Svg));
        assert_eq!(MinifyKind::for_asset(Path::new("page.html")), None);
        assert_eq!(MinifyKind::for_asset(Path::new("robots.txt")), None);
        assert_eq!(MinifyKind::for_asset(Path::new("Makefile")), None);
    }

    #[test]
    fn html_whitespace_removed() {
        let html = b"<html>\n  <head>\n  </head>\n  <body>\n    <p>Hello</p>\n  </body>\n</html>";
        let out = String::from_utf8(minify(MinifyKind::Html, html)).unwrap();
        assert!(!out.contains("\n  "));
        assert!(out.contains("<p>Hello</p>"));
    }

    #[test]
    fn css_is_unwrapped() {
        let css = b"body {\n    color: red;\n}\n";
        let out = minify(MinifyKind::Css, css);
        assert!(!out.starts_with(b"<style>"));
        assert!(out.len() < css.len());
        assert!(!out.contains(&b'\n'));
    }

    #[test]
    fn js_is_unwrapped() {
        let js = b"function   add(a, b) {\n    return a + b;\n}\n";
        let out = minify(MinifyKind::Js, js);
        assert!(!out.starts_with(b"<script>"));
        assert!(out.len() <= js.len());
    }

    #[test]
    fn svg_whitespace_between_tags_removed() {
        let svg = b"<svg>\n\n  <rect/>\n</svg>\n";
        assert_eq!(minify(MinifyKind::Svg, svg), b"<svg><rect/></svg>");
    }

    #[test]
    fn svg_keeps_attribute_and_word_breaks() {
        let svg = "<svg>\n  <rect\n    x=\"1\"\n    y=\"2\"/>\n  <text>hello\n    world</text>\n</svg>";
        let out = String::from_utf8(minify(MinifyKind::Svg, svg.as_bytes())).unwrap();
        assert_eq!(out, r#"<svg><rect x="1" y="2"/><text>hello world</text></svg>"#);
    }

    #[test]
    fn svg_space_between_text_spans_kept() {
        let svg = b"<svg><text><tspan>a</tspan> <tspan>b</tspan></text></svg>";
        assert_eq!(minify(MinifyKind::Svg, svg), svg.to_vec());
    }

    #[test]
    fn svg_comments_dropped_declaration_kept() {
        let svg = b"<?xml version=\"1.0\"?>\n<!-- logo -->\n<svg viewBox=\"0 0 1 1\"><g/></svg>";
        let out = String::from_utf8(minify(MinifyKind::Svg, svg)).unwrap();
        assert_eq!(out, r#"<?xml version="1.0"?><svg viewBox="0 0 1 1"><g/></svg>"#);
    }

    #[test]
    fn malformed_svg_untouched() {
        let svg = b"<svg>\n  <g>\n</svg>\n";
        assert_eq!(minify(MinifyKind::Svg, svg), svg.to_vec());
    }

    #[test]
    fn non_utf8_svg_untouched() {
        let bytes = [0xff, 0xfe, b'\n', b' '];
        assert_eq!(minify(MinifyKind::Svg, &bytes), bytes);
    }

    #[test]
    fn disabled_borrows() {
        let html = b"<p>\n  x\n</p>";
        let out = minify_if(false, MinifyKind::Html, html);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, html);
    }
}
