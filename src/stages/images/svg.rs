//! SVG optimization as a single quick-xml event pass.
//!
//! - `viewBox="0 0 W H"` is dropped from `svg`, `symbol` and `pattern`
//!   elements whose `width`/`height` already say `W`/`H`
//! - comments, doctype, XML declaration and processing instructions go
//! - whitespace-only text between tags goes, except inside text content
//!   elements and under `xml:space="preserve"`
//!
//! Element ids and every other attribute are written back byte for byte.

use anyhow::Result;
use quick_xml::{
    Reader, Writer,
    events::{BytesStart, Event},
};
use std::io::Cursor;

fn create_xml_reader(content: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);
    reader
}

/// Optimize an SVG document.
pub fn optimize(content: &[u8]) -> Result<Vec<u8>> {
    let mut reader = create_xml_reader(content);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(content.len())));

    // One entry per open element: whether its whitespace is significant.
    let mut preserve: Vec<bool> = Vec::new();
    // Whitespace-only text next to an entity reference is text content.
    // Otherwise it is held back and dropped.
    let mut pending_space: Option<Event<'_>> = None;
    let mut after_ref = false;

    loop {
        let event = reader.read_event()?;
        if let Some(space) = pending_space.take()
            && matches!(event, Event::GeneralRef(_))
        {
            writer.write_event(space)?;
        }
        let is_ref = matches!(event, Event::GeneralRef(_));

        match event {
            Event::Eof => break,
            Event::Comment(_) | Event::DocType(_) | Event::Decl(_) | Event::PI(_) => {}
            Event::Text(text) => {
                let significant = after_ref || preserve.last().copied().unwrap_or(false);
                if !significant && text.iter().all(u8::is_ascii_whitespace) {
                    pending_space = Some(Event::Text(text));
                } else {
                    writer.write_event(Event::Text(text))?;
                }
            }
            Event::Start(elem) => {
                let inherited = preserve.last().copied().unwrap_or(false);
                preserve.push(keeps_whitespace(&elem, inherited));
                let elem = strip_redundant_view_box(elem, preserve.len() - 1);
                writer.write_event(Event::Start(elem))?;
            }
            Event::Empty(elem) => {
                let elem = strip_redundant_view_box(elem, preserve.len());
                writer.write_event(Event::Empty(elem))?;
            }
            Event::End(elem) => {
                preserve.pop();
                writer.write_event(Event::End(elem))?;
            }
            other => writer.write_event(other)?,
        }
        after_ref = is_ref;
    }

    Ok(writer.into_inner().into_inner())
}

/// Whitespace inside `elem` renders: text content elements, or an
/// `xml:space` setting that says so.
fn keeps_whitespace(elem: &BytesStart<'_>, inherited: bool) -> bool {
    let text_content = matches!(
        elem.name().as_ref(),
        b"text" | b"tspan" | b"textPath" | b"title" | b"desc"
    );
    match attr(elem, b"xml:space").as_deref() {
        Some(b"preserve") => true,
        Some(b"default") => text_content,
        _ => inherited || text_content,
    }
}

fn strip_redundant_view_box(elem: BytesStart<'_>, depth: usize) -> BytesStart<'_> {
    let applies = match elem.name().as_ref() {
        b"svg" => depth == 0,
        b"symbol" | b"pattern" => true,
        _ => false,
    };
    if !applies || !has_redundant_view_box(&elem) {
        return elem;
    }
    rebuild_without(&elem, b"viewBox")
}

fn attr<'a>(elem: &'a BytesStart<'_>, key: &[u8]) -> Option<std::borrow::Cow<'a, [u8]>> {
    elem.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| a.value)
}

/// `viewBox` is `0 0 W H` and matches `width`/`height` (an optional `px`
/// suffix allowed).
fn has_redundant_view_box(elem: &BytesStart<'_>) -> bool {
    let (Some(view_box), Some(width), Some(height)) = (
        attr(elem, b"viewBox"),
        attr(elem, b"width"),
        attr(elem, b"height"),
    ) else {
        return false;
    };

    let view_box = String::from_utf8_lossy(&view_box);
    let parts: Vec<&str> = view_box
        .split(|c: char| c.is_ascii_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect();
    let [x, y, w, h] = parts.as_slice() else {
        return false;
    };

    let width = String::from_utf8_lossy(&width);
    let height = String::from_utf8_lossy(&height);
    *x == "0" && *y == "0" && *w == strip_px(&width) && *h == strip_px(&height)
}

fn strip_px(value: &str) -> &str {
    value.trim().strip_suffix("px").unwrap_or(value.trim())
}

/// Copy `elem` without the attribute named `skip`.
fn rebuild_without(elem: &BytesStart<'_>, skip: &[u8]) -> BytesStart<'static> {
    let tag = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    let mut rebuilt = BytesStart::new(tag);
    for attr in elem.attributes().flatten() {
        if attr.key.as_ref() != skip {
            rebuilt.push_attribute((attr.key.as_ref(), attr.value.as_ref()));
        }
    }
    rebuilt
}
