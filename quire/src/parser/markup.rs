use std::ops::Range;
use std::sync::Arc;

use crate::element::{Attribute, Element, Location, TagNode, TextNode};
use crate::error::ValidationError;
use crate::output::is_void;

/// Elements whose content is taken verbatim, without looking for tags.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Read markup source into a list of top-level elements.
pub fn parse_elements(
    source: &str,
    filename: &Arc<str>,
    file_id: usize,
) -> Result<Vec<Element>, Vec<ValidationError>> {
    let mut state = ReadState::new(source, filename.clone(), file_id);
    state.read();
    state.finalize()
}

// ---------------------------------------------------------------------------
// Read state
// ---------------------------------------------------------------------------

struct ReadState<'a> {
    source: &'a str,
    filename: Arc<str>,
    file_id: usize,
    line_starts: Vec<usize>,
    pos: usize,
    /// Tags opened but not yet closed. Innermost = last.
    open: Vec<OpenTag>,
    /// Completed top-level elements.
    top: Vec<Element>,
    /// Pending literal text and the offset it starts at.
    text: Option<(usize, String)>,
    errors: Vec<ValidationError>,
}

struct OpenTag {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<Element>,
    start: usize,
}

impl<'a> ReadState<'a> {
    fn new(source: &'a str, filename: Arc<str>, file_id: usize) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        ReadState {
            source,
            filename,
            file_id,
            line_starts,
            pos: 0,
            open: Vec::new(),
            top: Vec::new(),
            text: None,
            errors: Vec::new(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn location(&self, span: Range<usize>) -> Location {
        let line = self.line_starts.partition_point(|&s| s <= span.start);
        Location::new(self.filename.clone(), line, span, self.file_id)
    }

    fn error(&mut self, message: impl Into<String>, span: Range<usize>) {
        let location = self.location(span);
        self.errors.push(ValidationError::new(message, &location));
    }

    fn read(&mut self) {
        while self.pos < self.source.len() {
            let Some(lt) = self.rest().find('<') else {
                let end = self.source.len();
                self.push_text(self.pos, end);
                self.pos = end;
                break;
            };
            let start = self.pos + lt;
            if lt > 0 {
                self.push_text(self.pos, start);
            }
            self.pos = start;

            let rest = self.rest();
            if rest.starts_with("<!--") {
                self.skip_comment(start);
            } else if rest.starts_with("</") {
                self.read_end_tag(start);
            } else if rest.starts_with("<!") {
                self.read_declaration(start);
            } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                self.read_start_tag(start);
            } else {
                self.push_text(start, start + 1);
                self.pos = start + 1;
            }
        }
    }

    fn finalize(mut self) -> Result<Vec<Element>, Vec<ValidationError>> {
        self.flush_text();
        while let Some(open) = self.open.pop() {
            let span = open.start..open.start + open.name.len() + 1;
            self.error(format!("<{}> is never closed", open.name), span);
            let end = self.source.len();
            self.close(open, end);
        }

        if self.errors.is_empty() {
            Ok(self.top)
        } else {
            Err(self.errors)
        }
    }

    // -----------------------------------------------------------------------
    // Text
    // -----------------------------------------------------------------------

    fn push_text(&mut self, start: usize, end: usize) {
        let slice = &self.source[start..end];
        match &mut self.text {
            Some((_, text)) => text.push_str(slice),
            None => self.text = Some((start, slice.to_string())),
        }
    }

    fn flush_text(&mut self) {
        if let Some((start, text)) = self.text.take() {
            let location = self.location(start..start + text.len());
            self.append(Element::Text(TextNode { text, location }));
        }
    }

    fn append(&mut self, element: Element) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(element),
            None => self.top.push(element),
        }
    }

    // -----------------------------------------------------------------------
    // Markup
    // -----------------------------------------------------------------------

    fn skip_comment(&mut self, start: usize) {
        self.flush_text();
        match self.rest().find("-->") {
            Some(end) => self.pos += end + 3,
            None => {
                self.error("comment is never closed", start..start + 4);
                self.pos = self.source.len();
            }
        }
    }

    /// `<!doctype ...>` and friends pass through as text.
    fn read_declaration(&mut self, start: usize) {
        let end = match self.rest().find('>') {
            Some(i) => self.pos + i + 1,
            None => {
                self.error("declaration is never closed", start..start + 2);
                self.source.len()
            }
        };
        self.push_text(start, end);
        self.pos = end;
    }

    fn read_end_tag(&mut self, start: usize) {
        self.flush_text();
        let Some(gt) = self.rest().find('>') else {
            self.error("end tag is never closed", start..self.source.len());
            self.pos = self.source.len();
            return;
        };
        let end = self.pos + gt + 1;
        let name = self.source[start + 2..end - 1].trim().to_ascii_lowercase();
        self.pos = end;

        let Some(depth) = self.open.iter().rposition(|t| t.name == name) else {
            self.error(format!("unexpected </{}>", name), start..end);
            return;
        };

        while self.open.len() > depth + 1 {
            if let Some(inner) = self.open.pop() {
                let span = inner.start..inner.start + inner.name.len() + 1;
                self.error(
                    format!("<{}> is never closed (found </{}>)", inner.name, name),
                    span,
                );
                self.close(inner, start);
            }
        }
        if let Some(open) = self.open.pop() {
            self.close(open, end);
        }
    }

    fn read_start_tag(&mut self, start: usize) {
        self.flush_text();
        self.pos = start + 1;
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':'));
        let name = name.to_ascii_lowercase();
        let mut attributes: Vec<Attribute> = Vec::new();

        let self_closing = loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                self.error(format!("<{}> tag is never closed", name), start..self.pos);
                return;
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                break true;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break false;
            }

            let attr_start = self.pos;
            let attr_name =
                self.take_while(|c| !c.is_whitespace() && !matches!(c, '=' | '>' | '/'));
            if attr_name.is_empty() {
                // Stray '/' or similar.
                self.pos += 1;
                continue;
            }
            self.skip_whitespace();
            let value = if self.rest().starts_with('=') {
                self.pos += 1;
                self.skip_whitespace();
                match self.read_attribute_value() {
                    Some(v) => v,
                    None => {
                        self.error(
                            format!("attribute '{}' has an unterminated value", attr_name),
                            attr_start..self.source.len(),
                        );
                        self.pos = self.source.len();
                        return;
                    }
                }
            } else {
                String::new()
            };

            if attributes.iter().any(|a| a.name == attr_name) {
                self.error(
                    format!("duplicate attribute '{}'", attr_name),
                    attr_start..self.pos,
                );
                continue;
            }
            attributes.push(Attribute {
                name: attr_name.to_string(),
                value,
            });
        };

        let open = OpenTag {
            name,
            attributes,
            children: Vec::new(),
            start,
        };

        if self_closing || is_void(&open.name) {
            let end = self.pos;
            self.close(open, end);
        } else if RAW_TEXT_ELEMENTS.contains(&open.name.as_str()) {
            self.read_raw_text(open);
        } else {
            self.open.push(open);
        }
    }

    fn read_attribute_value(&mut self) -> Option<String> {
        let rest = self.rest();
        let quote = rest.chars().next()?;
        if quote == '"' || quote == '\'' {
            let close = rest[1..].find(quote)?;
            let value = rest[1..1 + close].to_string();
            self.pos += close + 2;
            Some(value)
        } else {
            Some(
                self.take_while(|c| !c.is_whitespace() && c != '>')
                    .to_string(),
            )
        }
    }

    fn read_raw_text(&mut self, mut open: OpenTag) {
        let closing = format!("</{}", open.name);
        let content_start = self.pos;
        let Some(i) = self.rest().to_ascii_lowercase().find(&closing) else {
            let span = open.start..open.start + open.name.len() + 1;
            self.error(format!("<{}> is never closed", open.name), span);
            self.pos = self.source.len();
            return;
        };
        let content_end = content_start + i;
        if content_end > content_start {
            let location = self.location(content_start..content_end);
            open.children.push(Element::Text(TextNode {
                text: self.source[content_start..content_end].to_string(),
                location,
            }));
        }
        self.pos = content_end;
        let end = match self.rest().find('>') {
            Some(gt) => self.pos + gt + 1,
            None => self.source.len(),
        };
        self.pos = end;
        self.close(open, end);
    }

    fn close(&mut self, open: OpenTag, end: usize) {
        let location = self.location(open.start..end);
        self.append(Element::Tag(TagNode {
            name: open.name,
            attributes: open.attributes,
            children: open.children,
            location,
        }));
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }
}
