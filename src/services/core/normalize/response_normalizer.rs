//! Format-sniffing response parser.
//!
//! The on-prem OLAP endpoint answers with JSON, XML or TSV depending on the
//! server version, and sometimes with nothing at all. This parser is total:
//! any input yields a (possibly empty) row list, never an error. When no
//! rows can be extracted the raw text is preserved for diagnostics.

use crate::types::Row;
use crate::utils::Logger;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;

/// Container keys probed, in order, when a JSON object wraps its row list.
const JSON_CONTAINER_KEYS: [&str; 5] = ["data", "rows", "records", "items", "result"];

/// Candidate row element names probed, in order, in XML payloads.
const XML_ROW_TAGS: [&str; 4] = ["row", "record", "item", "r"];

/// Envelope elements never treated as rows in the attribute fallback.
const XML_ENVELOPE_TAGS: [&str; 4] = ["olap", "report", "result", "response"];

/// Characters of raw text kept for diagnostics when parsing yields nothing.
const RAW_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Xml,
    Tsv,
    Empty,
    Unrecognized,
}

/// Result of normalization: rows plus what the payload looked like.
#[derive(Debug, Clone)]
pub struct ParsedRows {
    pub rows: Vec<Row>,
    pub format: ResponseFormat,
    /// Present when no rows were extracted from a non-empty body.
    pub raw_preview: Option<String>,
}

impl ParsedRows {
    fn empty(format: ResponseFormat, raw: &str) -> Self {
        let trimmed = raw.trim();
        let raw_preview = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.chars().take(RAW_PREVIEW_CHARS).collect())
        };
        Self {
            rows: Vec::new(),
            format,
            raw_preview,
        }
    }

    fn with_rows(rows: Vec<Row>, format: ResponseFormat, raw: &str) -> Self {
        if rows.is_empty() {
            Self::empty(format, raw)
        } else {
            Self {
                rows,
                format,
                raw_preview: None,
            }
        }
    }
}

pub struct ResponseNormalizer;

impl ResponseNormalizer {
    /// Parses an arbitrary backend payload into flat rows. Total: never
    /// fails, never panics.
    pub fn parse(raw: &str) -> ParsedRows {
        let text = raw.trim();
        if text.is_empty() {
            return ParsedRows::empty(ResponseFormat::Empty, raw);
        }

        if text.starts_with('{') || text.starts_with('[') {
            if let Some(rows) = Self::parse_json_rows(text) {
                return ParsedRows::with_rows(rows, ResponseFormat::Json, raw);
            }
        }

        if text.starts_with('<') {
            return ParsedRows::with_rows(Self::parse_xml_rows(text), ResponseFormat::Xml, raw);
        }

        if text.contains('\t') {
            return ParsedRows::with_rows(Self::parse_tsv_rows(text), ResponseFormat::Tsv, raw);
        }

        Logger::named("normalizer").warn(&format!(
            "unrecognized payload format: {}",
            text.chars().take(80).collect::<String>()
        ));
        ParsedRows::empty(ResponseFormat::Unrecognized, raw)
    }

    fn parse_json_rows(text: &str) -> Option<Vec<Row>> {
        let value: Value = serde_json::from_str(text).ok()?;
        match value {
            Value::Array(items) => Some(Self::rows_from_array(items)),
            Value::Object(map) => {
                for key in JSON_CONTAINER_KEYS {
                    if let Some(Value::Array(items)) = map.get(key) {
                        return Some(Self::rows_from_array(items.clone()));
                    }
                }
                if map.is_empty() {
                    Some(Vec::new())
                } else {
                    // A bare object is a single row.
                    Some(vec![map.into_iter().collect()])
                }
            }
            _ => Some(Vec::new()),
        }
    }

    fn rows_from_array(items: Vec<Value>) -> Vec<Row> {
        items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map.into_iter().collect()),
                _ => None,
            })
            .collect()
    }

    fn parse_xml_rows(text: &str) -> Vec<Row> {
        let Some(root) = XmlNode::parse(text) else {
            return Vec::new();
        };

        for tag in XML_ROW_TAGS {
            let mut rows = Vec::new();
            root.visit(&mut |node| {
                if node.tag == tag {
                    let mut row = Row::new();
                    for child in &node.children {
                        row.insert(
                            child.tag.clone(),
                            Value::String(child.text.trim().to_string()),
                        );
                    }
                    for (key, value) in &node.attrs {
                        row.insert(key.clone(), Value::String(value.clone()));
                    }
                    if !row.is_empty() {
                        rows.push(row);
                    }
                }
            });
            if !rows.is_empty() {
                return rows;
            }
        }

        // No row-like tags: any attributed element outside the envelope.
        let mut rows = Vec::new();
        root.visit(&mut |node| {
            if !node.attrs.is_empty() && !XML_ENVELOPE_TAGS.contains(&node.tag.as_str()) {
                let row: Row = node
                    .attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                rows.push(row);
            }
        });
        rows
    }

    fn parse_tsv_rows(text: &str) -> Vec<Row> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = match reader.headers() {
            Ok(h) => h.clone(),
            Err(_) => return Vec::new(),
        };

        let mut rows = Vec::new();
        for record in reader.records().flatten() {
            let mut row = Row::new();
            for (header, field) in headers.iter().zip(record.iter()) {
                if !header.is_empty() {
                    row.insert(header.to_string(), Value::String(field.to_string()));
                }
            }
            if !row.is_empty() {
                rows.push(row);
            }
        }
        rows
    }
}

/// Minimal XML tree for row extraction. Namespaces and processing
/// instructions are irrelevant to the payloads this feeds on.
struct XmlNode {
    tag: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn parse(text: &str) -> Option<XmlNode> {
        let mut reader = Reader::from_str(text);

        let mut stack = vec![XmlNode {
            tag: String::new(),
            attrs: Vec::new(),
            text: String::new(),
            children: Vec::new(),
        }];

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(Self::from_start(&start)),
                Ok(Event::Empty(start)) => {
                    let node = Self::from_start(&start);
                    stack.last_mut()?.children.push(node);
                }
                Ok(Event::Text(t)) => {
                    if let Ok(chunk) = t.unescape() {
                        stack.last_mut()?.text.push_str(&chunk);
                    }
                }
                Ok(Event::End(_)) => {
                    if stack.len() < 2 {
                        return None;
                    }
                    let node = stack.pop()?;
                    stack.last_mut()?.children.push(node);
                }
                Ok(Event::Eof) => break,
                Err(_) => return None,
                Ok(_) => {}
            }
        }

        if stack.len() != 1 {
            // Unclosed elements: treat the document as malformed.
            return None;
        }
        stack.pop()
    }

    fn from_start(start: &BytesStart<'_>) -> XmlNode {
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let attrs = start
            .attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr
                    .unescape_value()
                    .map(|v| v.into_owned())
                    .unwrap_or_default();
                (key, value)
            })
            .collect();
        XmlNode {
            tag,
            attrs,
            text: String::new(),
            children: Vec::new(),
        }
    }

    fn visit(&self, f: &mut impl FnMut(&XmlNode)) {
        for child in &self.children {
            f(child);
            child.visit(f);
        }
    }
}
