//! Self-contained HTML rendition of a session, used when no document
//! engine is available, and the print launcher that opens it.

use std::path::Path;

use minijinja::Environment;
use serde::Serialize;
use tracing::info;

use crate::error::{AppError, AppResult};

use super::text::{strip_markup, truncate};
use super::{display_time, ReportContent};

const TEMPLATE_NAME: &str = "report.html";

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{{ title }}</title>
<style>
  body { font-family: Helvetica, Arial, sans-serif; color: #222; margin: 32px; }
  h1 { color: #1c4f8c; margin-bottom: 4px; }
  .muted { color: #737373; font-size: 12px; }
  .summary { background: #f4f6f9; padding: 12px 16px; border-radius: 6px; }
  .entry { page-break-inside: avoid; border-bottom: 1px solid #ddd; padding: 12px 0; }
  .question { font-weight: bold; }
  .response { white-space: pre-wrap; }
  .figure { display: flex; gap: 16px; page-break-inside: avoid; margin: 12px 0; }
  .figure img { width: 240px; height: 180px; object-fit: cover; border: 1px solid #ccc; }
  .note { font-style: italic; color: #737373; }
  footer { margin-top: 32px; font-size: 11px; color: #737373; }
</style>
</head>
<body>
<h1>{{ title }}</h1>
<div class="muted">Generated: {{ generated }}</div>

<h2>Session Summary</h2>
<div class="summary">
  <div>Total Questions: {{ total_questions }}</div>
  <div>Total Images: {{ total_images }}</div>
  {% if duration %}<div>Session Duration: {{ duration }}</div>{% endif %}
</div>

{% if entries %}
<h2>Conversation History</h2>
{% for entry in entries %}
<div class="entry">
  <div class="question">Q{{ entry.number }}: {{ entry.question }}</div>
  <div class="response">{{ entry.response }}</div>
  <div class="muted">{{ entry.timestamp }}</div>
</div>
{% endfor %}
{% endif %}
{% for note in entry_notes %}<p class="note">{{ note }}</p>{% endfor %}

{% if images %}
<h2>Generated Images</h2>
{% for image in images %}
<div class="figure">
  <img src="{{ image.data_url }}" alt="{{ image.prompt }}">
  <div>
    <div><strong>Prompt:</strong> {{ image.prompt }}</div>
    <div><strong>Style:</strong> {{ image.style }}</div>
    <div><strong>Auto-generated:</strong> {{ "Yes" if image.auto_generated else "No" }}</div>
    <div class="muted">{{ image.timestamp }}</div>
  </div>
</div>
{% endfor %}
{% endif %}
{% for note in image_notes %}<p class="note">{{ note }}</p>{% endfor %}

<footer>{{ attribution }}</footer>
{% if auto_print %}
<script>
  window.addEventListener("load", function () { window.print(); });
  window.addEventListener("afterprint", function () { window.close(); });
</script>
{% endif %}
</body>
</html>
"#;

#[derive(Serialize)]
struct EntryView {
    number: usize,
    question: String,
    response: String,
    timestamp: String,
}

#[derive(Serialize)]
struct ImageView {
    prompt: String,
    style: String,
    auto_generated: bool,
    timestamp: String,
    data_url: String,
}

#[derive(Serialize)]
struct ReportView<'a> {
    title: &'a str,
    generated: String,
    total_questions: usize,
    total_images: usize,
    duration: Option<String>,
    entries: Vec<EntryView>,
    entry_notes: &'a [String],
    images: Vec<ImageView>,
    image_notes: &'a [String],
    attribution: &'a str,
    auto_print: bool,
}

/// Render the report as one HTML document. Text is escaped by the
/// template engine and is not folded to ASCII.
pub fn render(content: &ReportContent<'_>, auto_print: bool) -> AppResult<String> {
    let policy = content.policy;
    let view = ReportView {
        title: content.title,
        generated: display_time(content.generated_at),
        total_questions: content.total_questions,
        total_images: content.total_images,
        duration: content.duration.clone(),
        entries: content
            .selection
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| EntryView {
                number: content.first_entry_number + i,
                question: e.question.clone(),
                response: truncate(&strip_markup(&e.response), policy.response_chars),
                timestamp: display_time(e.timestamp),
            })
            .collect(),
        entry_notes: &content.entry_notes,
        images: content
            .selection
            .images
            .iter()
            .map(|img| ImageView {
                prompt: truncate(&img.prompt, policy.prompt_chars),
                style: img.style.clone(),
                auto_generated: img.is_auto_generated,
                timestamp: display_time(img.timestamp),
                data_url: format!("data:{};base64,{}", img.mime_type(), img.payload()),
            })
            .collect(),
        image_notes: &content.image_notes,
        attribution: content.attribution,
        auto_print,
    };

    let mut env = Environment::new();
    env.add_template(TEMPLATE_NAME, TEMPLATE)
        .map_err(|e| AppError::Validation(format!("invalid report template: {e}")))?;
    env.get_template(TEMPLATE_NAME)
        .and_then(|t| t.render(&view))
        .map_err(|e| AppError::Validation(format!("failed to render report: {e}")))
}

/// Opens a rendered HTML file so the user can print or save it.
pub trait PrintLauncher: Send + Sync {
    fn launch(&self, html_path: &Path) -> AppResult<()>;
}

/// Opens the file in the default browser; the page prints itself on load.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserPrintLauncher;

impl PrintLauncher for BrowserPrintLauncher {
    fn launch(&self, html_path: &Path) -> AppResult<()> {
        info!(path = %html_path.display(), "opening report for printing");
        open::that(html_path).map_err(|e| {
            AppError::Storage(format!("failed to open {}: {e}", html_path.display()))
        })
    }
}
