//! Minimal element tree over quick-xml events. Names are stored without
//! namespace prefixes; lookups are case-insensitive.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(name))
    }

    /// Child element text, falling back to an attribute of the same name.
    /// Blank values count as absent.
    pub fn value_of(&self, names: &[&str]) -> Option<String> {
        for n in names {
            if let Some(c) = self.child(n) {
                let t = c.text.trim();
                if !t.is_empty() {
                    return Some(t.to_string());
                }
            }
            if let Some(a) = self.attr(n) {
                let a = a.trim();
                if !a.is_empty() {
                    return Some(a.to_string());
                }
            }
        }
        None
    }

    /// All descendants (self included) in document order.
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            out.push(e);
            for c in e.children.iter().rev() {
                stack.push(c);
            }
        }
        out
    }
}

fn start_element(e: &BytesStart<'_>) -> Result<Element, String> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
    let mut attrs = Vec::new();
    for a in e.attributes() {
        let a = a.map_err(|err| format!("bad attribute on <{}>: {}", name, err))?;
        let key = String::from_utf8_lossy(a.key.local_name().as_ref()).to_string();
        let value = a
            .unescape_value()
            .map_err(|err| format!("bad attribute value on <{}>: {}", name, err))?
            .to_string();
        attrs.push((key, value));
    }
    Ok(Element { name, attrs, text: String::new(), children: Vec::new() })
}

fn attach(stack: &mut [Element], el: Element, root: &mut Option<Element>) -> Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(el);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(el);
            Ok(())
        }
        None => Err(format!("multiple root elements (second is <{}>)", el.name)),
    }
}

/// Parse a whole document and return its root element.
pub fn parse_document(xml: &str) -> Result<Element, String> {
    let xml = xml.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(start_element(&e)?),
            Ok(Event::Empty(e)) => {
                let el = start_element(&e)?;
                attach(&mut stack, el, &mut root)?;
            }
            Ok(Event::End(_)) => {
                let el = stack.pop().ok_or_else(|| "unbalanced closing tag".to_string())?;
                attach(&mut stack, el, &mut root)?;
            }
            Ok(Event::Text(t)) => {
                let s = t
                    .unescape()
                    .map_err(|err| format!("bad text at byte {}: {}", reader.buffer_position(), err))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&s);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(format!("malformed XML at byte {}: {}", reader.buffer_position(), err)),
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(format!("unexpected end of document inside <{}>", open.name));
    }
    root.ok_or_else(|| "document has no root element".to_string())
}
