use crate::global::GlobalStore;
use chrono::{SecondsFormat, Utc};
use jot_core::{JotError, JotResult, Note};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
    Html,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Html => "html",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Markdown => "Markdown",
            Self::Html => "HTML",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub include_trashed: bool,
    pub include_metadata: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Markdown,
            include_trashed: true,
            include_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub dir: PathBuf,
    pub format: ExportFormat,
    pub exported: usize,
    pub files: Vec<String>,
}

/// Writes every mirrored note into `dir`, one file per note plus a README.
pub fn export_notes(
    global: &GlobalStore,
    dir: &Path,
    options: &ExportOptions,
) -> JotResult<ExportSummary> {
    let notes: Vec<Note> = global
        .snapshot()
        .into_iter()
        .filter(|note| options.include_trashed || !note.in_trash)
        .collect();
    if notes.is_empty() {
        return Err(JotError::usage("there are no notes to export"));
    }

    fs::create_dir_all(dir).map_err(|err| {
        JotError::io(format!(
            "failed to create export dir '{}': {}",
            dir.display(),
            err
        ))
    })?;

    let readme = render_readme(notes.len(), options);
    write_file(&dir.join("README.txt"), &readme)?;

    let mut files = Vec::with_capacity(notes.len());
    for note in &notes {
        let file_name = format!(
            "{}_{}.{}",
            safe_id(&note.id),
            slugify(&note.title),
            options.format.extension()
        );
        let rendered = match options.format {
            ExportFormat::Markdown => render_markdown(note, options.include_metadata),
            ExportFormat::Html => render_html(note, options.include_metadata),
        };
        write_file(&dir.join(&file_name), &rendered)?;
        files.push(file_name);
    }

    info!(dir = %dir.display(), count = files.len(), format = options.format.label(), "exported notes");
    Ok(ExportSummary {
        dir: dir.to_path_buf(),
        format: options.format,
        exported: files.len(),
        files,
    })
}

fn write_file(path: &Path, contents: &str) -> JotResult<()> {
    fs::write(path, contents)
        .map_err(|err| JotError::io(format!("failed to write '{}': {}", path.display(), err)))
}

fn render_readme(count: usize, options: &ExportOptions) -> String {
    let yes_no = |flag: bool| if flag { "yes" } else { "no" };
    format!(
        "Jot notes export\n\
         Exported at: {}\n\
         Format: {}\n\
         Notes: {}\n\
         Includes trashed notes: {}\n\
         Includes metadata: {}\n\
         \n\
         Each note is written as \"<id>_<title>.{}\".\n\
         With metadata enabled every file starts with the note's id, title and timestamps.\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        options.format.label(),
        count,
        yes_no(options.include_trashed),
        yes_no(options.include_metadata),
        options.format.extension(),
    )
}

fn metadata_lines(note: &Note) -> String {
    format!(
        "id: {}\ntitle: {}\ncreatedAt: {}\nupdatedAt: {}\ninTrash: {}\n",
        note.id,
        note.title.replace('\n', " "),
        note.created_at.as_deref().unwrap_or("unknown"),
        note.updated_at.as_deref().unwrap_or("unknown"),
        note.in_trash,
    )
}

fn render_markdown(note: &Note, include_metadata: bool) -> String {
    let mut out = String::new();
    if include_metadata {
        out.push_str("---\n");
        out.push_str(&metadata_lines(note));
        out.push_str("---\n\n");
    }
    out.push_str(&format!("# {}\n\n", note.title.replace('\n', " ")));
    out.push_str(html_to_markdown(&note.content).trim_start_matches('\n'));
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn render_html(note: &Note, include_metadata: bool) -> String {
    let mut out = String::new();
    if include_metadata {
        out.push_str("<!--\n");
        out.push_str(&metadata_lines(note).replace("--", "- -"));
        out.push_str("-->\n\n");
    }
    let title = escape_html(&note.title);
    out.push_str(&format!(
        "<!DOCTYPE html>\n<html>\n<head>\n  <meta charset=\"UTF-8\">\n  <title>{title}</title>\n</head>\n<body>\n  <h1>{title}</h1>\n  {}\n</body>\n</html>\n",
        note.content
    ));
    out
}

enum ListKind {
    Bulleted,
    Numbered(usize),
}

/// Maps the common formatting tags onto Markdown and strips the rest.
pub fn html_to_markdown(html: &str) -> String {
    let mut out = String::new();
    let mut lists: Vec<ListKind> = Vec::new();
    let mut links: Vec<String> = Vec::new();
    let mut in_pre = false;
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let Some(len) = rest[start..].find('>') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let raw = &rest[start + 1..start + len];
        rest = &rest[start + len + 1..];

        let closing = raw.starts_with('/');
        let body = raw.trim_start_matches('/').trim_end_matches('/').trim();
        let name = body
            .split(|ch: char| ch.is_whitespace())
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match (name.as_str(), closing) {
            ("h1" | "h2" | "h3" | "h4" | "h5" | "h6", false) => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                out.push('\n');
                out.push_str(&"#".repeat(level));
                out.push(' ');
            }
            ("h1" | "h2" | "h3" | "h4" | "h5" | "h6", true) => out.push_str("\n\n"),
            ("p" | "div", true) => out.push_str("\n\n"),
            ("br", _) => out.push('\n'),
            ("strong" | "b", _) => out.push_str("**"),
            ("em" | "i", _) => out.push('*'),
            ("code", _) if !in_pre => out.push('`'),
            ("pre", false) => {
                in_pre = true;
                out.push_str("```\n");
            }
            ("pre", true) => {
                in_pre = false;
                out.push_str("\n```\n\n");
            }
            ("blockquote", false) => out.push_str("> "),
            ("blockquote", true) => out.push_str("\n\n"),
            ("a", false) => {
                links.push(attribute(body, "href").unwrap_or_default().to_string());
                out.push('[');
            }
            ("a", true) => {
                let href = links.pop().unwrap_or_default();
                out.push_str(&format!("]({href})"));
            }
            ("img", _) => {
                let src = attribute(body, "src").unwrap_or_default();
                let alt = attribute(body, "alt").unwrap_or_default();
                out.push_str(&format!("![{alt}]({src})"));
            }
            ("ul", false) => lists.push(ListKind::Bulleted),
            ("ol", false) => lists.push(ListKind::Numbered(0)),
            ("ul" | "ol", true) => {
                lists.pop();
                out.push('\n');
            }
            ("li", false) => match lists.last_mut() {
                Some(ListKind::Numbered(index)) => {
                    *index += 1;
                    out.push_str(&format!("{index}. "));
                }
                _ => out.push_str("- "),
            },
            ("li", true) => out.push('\n'),
            _ => {}
        }
    }
    out.push_str(rest);

    collapse_blank_lines(&decode_entities(&out))
}

fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=\"");
    let lowered = tag.to_ascii_lowercase();
    let start = lowered.find(&needle)? + needle.len();
    let len = tag[start..].find('"')?;
    Some(&tag[start..start + len])
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.split('\n') {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            blank_run = 0;
            out.push_str(line);
            out.push('\n');
        }
    }
    out.trim_end_matches('\n').to_string() + "\n"
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn safe_id(id: &str) -> String {
    id.chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
        .collect()
}

fn slugify(input: &str) -> String {
    let mut out = String::new();
    let mut prev_dash = false;

    for ch in input.chars() {
        let lowered = ch.to_ascii_lowercase();
        if lowered.is_ascii_alphanumeric() {
            out.push(lowered);
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }

    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        return "note".to_string();
    }
    trimmed.to_string()
}
