//! Source file parsing and text extraction.

use quick_xml::events::Event;
use quick_xml::Reader;
use ragvault_core::{AppError, AppResult};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Body part of a Word (OOXML) package.
const DOCX_BODY: &str = "word/document.xml";

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    Docx,
    Code,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("docx") => Self::Docx,
            Some("rs") | Some("py") | Some("js") | Some("ts") | Some("go") | Some("c")
            | Some("cpp") | Some("java") | Some("sh") | Some("yaml") | Some("yml")
            | Some("json") | Some("toml") => Self::Code,
            Some("txt") | Some("text") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Docx => "docx",
            Self::Code => "code",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Text extracted from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub content_type: ContentType,
    pub text: String,
}

/// Read a file and extract clean text according to its content type.
pub fn parse_file(path: &Path) -> AppResult<ParsedDocument> {
    let content_type = ContentType::from_path(path);

    if content_type == ContentType::Docx {
        return Ok(ParsedDocument {
            content_type,
            text: normalize_whitespace(&extract_docx(path)?),
        });
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Ingest(format!("Failed to read {:?}: {}", path, e)))?;

    let extracted = match content_type {
        ContentType::Markdown => clean_markdown(&raw),
        ContentType::Html => clean_html(&raw),
        ContentType::Code => clean_code(&raw),
        ContentType::PlainText | ContentType::Docx => raw,
        ContentType::Unknown => {
            if raw.contains('\0') {
                return Err(AppError::Ingest(format!(
                    "Skipping likely binary file: {:?}",
                    path
                )));
            }
            raw
        }
    };

    Ok(ParsedDocument {
        content_type,
        text: normalize_whitespace(&extracted),
    })
}

/// Pull the paragraph text out of a `.docx` package.
fn extract_docx(path: &Path) -> AppResult<String> {
    let file = File::open(path)
        .map_err(|e| AppError::Ingest(format!("Failed to read {:?}: {}", path, e)))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| AppError::Ingest(format!("Not a Word document {:?}: {}", path, e)))?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| AppError::Ingest(format!("No {} in {:?}: {}", DOCX_BODY, path, e)))?
        .read_to_string(&mut xml)
        .map_err(|e| AppError::Ingest(format!("Failed to read {} in {:?}: {}", DOCX_BODY, path, e)))?;

    docx_body_text(&xml)
        .map_err(|e| AppError::Ingest(format!("Malformed Word document {:?}: {}", path, e)))
}

/// Text runs of a WordprocessingML body. Paragraphs end with a blank line,
/// `<w:br/>` is a line break and `<w:tab/>` a tab.
fn docx_body_text(xml: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::with_capacity(xml.len() / 4);
    let mut in_run_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => in_run_text = true,
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_run_text => text.push_str(&e.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

/// Collapse runs of blanks inside lines and runs of blank lines into a
/// single paragraph break. Control characters other than newlines are
/// dropped.
pub fn normalize_whitespace(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in text.lines() {
        let words: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c.is_control())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(words.join(" "));
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs.join("\n\n")
}

/// Drop header markers, rules and code fences; keep paragraph breaks.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        result.push_str(trimmed);
        result.push('\n');
    }

    result
}

/// Strip tags and the bodies of script/style elements.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut skipped_element: Option<&str> = None;

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;
            let rest = &text[i..];
            match skipped_element {
                Some(name) => {
                    if starts_with_ignore_case(rest, &format!("</{}", name)) {
                        skipped_element = None;
                    }
                }
                None => {
                    skipped_element = ["script", "style"]
                        .into_iter()
                        .find(|name| starts_with_ignore_case(rest, &format!("<{}", name)));
                }
            }
        } else if ch == '>' {
            if in_tag {
                // Tag boundaries separate words.
                result.push(' ');
            }
            in_tag = false;
        } else if !in_tag && skipped_element.is_none() {
            result.push(ch);
        }
    }

    result
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Drop single-line comments.
fn clean_code(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("//") || trimmed.starts_with('#') {
            continue;
        }
        result.push_str(trimmed);
        result.push('\n');
    }

    result
}
