//! Export pipeline: turns a session snapshot into a downloadable report or
//! a size-bounded email attachment.
//!
//! Each export runs Validate, ChooseEngine, then either the paginated
//! document path or the HTML print fallback, then size governance for the
//! email medium. Saving and sending happen in the caller.

pub mod engine;
pub mod html;
pub mod layout;
pub mod pdf;
pub mod policy;
pub mod text;

#[cfg(test)]
mod testing;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{format_duration, ConversationEntry, SessionSnapshot};

pub use html::BrowserPrintLauncher;
pub use pdf::PdfEngineFactory;
pub use policy::{
    InclusionPolicy, Medium, DEFAULT_EMAIL_CEILING, DEFAULT_EMAIL_ENTRIES, DEFAULT_EMAIL_IMAGES,
};

use engine::{Color, EngineFactory, EngineOptions, ImageRef, TextStyle};
use html::PrintLauncher;
use layout::{Block, Layout};
use policy::{estimate_size, select, Selection};
use text::{strip_markup, truncate};

/// Report heading.
pub const REPORT_TITLE: &str = "Australian Property Intelligence Report";
/// Footer text stamped on every page.
pub const ATTRIBUTION: &str = "Generated by Australian Property Intelligence";

/// Local wall-clock rendering used throughout the report.
pub(crate) fn display_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%d/%m/%Y, %H:%M:%S")
        .to_string()
}

#[allow(clippy::cast_precision_loss)]
fn megabytes(bytes: usize) -> String {
    format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Everything a renderer needs for one report.
#[derive(Debug, Clone)]
pub struct ReportContent<'a> {
    pub title: &'a str,
    pub attribution: &'a str,
    pub generated_at: DateTime<Utc>,
    /// Totals over the whole session, not just the selection.
    pub total_questions: usize,
    pub total_images: usize,
    pub duration: Option<String>,
    pub selection: Selection<'a>,
    pub policy: &'a InclusionPolicy,
    /// Number shown for the first selected entry.
    pub first_entry_number: usize,
    pub entry_notes: Vec<String>,
    pub image_notes: Vec<String>,
}

impl<'a> ReportContent<'a> {
    fn new(
        snapshot: &SessionSnapshot<'a>,
        selection: Selection<'a>,
        policy: &'a InclusionPolicy,
        images_dropped: bool,
    ) -> Self {
        let mut selection = selection;
        let mut entry_notes = Vec::new();
        let mut image_notes = Vec::new();

        if selection.omitted_entries > 0 {
            entry_notes.push(format!(
                "...and {} more questions in full export",
                selection.omitted_entries
            ));
        }
        if images_dropped {
            selection.images = &[];
            let ceiling = policy.size_ceiling.map_or_else(String::new, |c| {
                format!(" under {}", megabytes(c))
            });
            image_notes.push(format!(
                "Images were omitted to keep this attachment{ceiling}. All {} images are available in the full export.",
                snapshot.image_gallery.len()
            ));
        } else if selection.omitted_images > 0 {
            image_notes.push(format!(
                "...and {} more images in full export",
                selection.omitted_images
            ));
        }

        Self {
            title: REPORT_TITLE,
            attribution: ATTRIBUTION,
            generated_at: Utc::now(),
            total_questions: snapshot.conversation_history.len(),
            total_images: snapshot.image_gallery.len(),
            duration: snapshot.duration().map(format_duration),
            first_entry_number: selection.omitted_entries + 1,
            selection,
            policy,
            entry_notes,
            image_notes,
        }
    }

    fn notes(&self) -> Vec<String> {
        self.entry_notes
            .iter()
            .chain(&self.image_notes)
            .cloned()
            .collect()
    }
}

/// Encoding of an artifact's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Pdf,
    Html,
}

impl ArtifactFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Html => "html",
        }
    }
}

/// A finished export.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub medium: Medium,
    pub format: ArtifactFormat,
    pub bytes: Vec<u8>,
    pub entries_included: usize,
    pub images_embedded: usize,
    pub image_placeholders: usize,
    /// Images were removed to respect the size ceiling.
    pub images_dropped: bool,
    /// Truncation and omission notes printed in the document.
    pub notes: Vec<String>,
}

impl ExportArtifact {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Bytes encoded for email transport.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Download filename for the given date.
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!(
            "property-intelligence-report-{}.{}",
            date.format("%Y-%m-%d"),
            self.format.extension()
        )
    }
}

struct PdfOutcome {
    bytes: Vec<u8>,
    embedded: usize,
    placeholders: usize,
}

/// Produces export artifacts from snapshots.
///
/// Both capabilities are optional. Without a document engine downloads
/// fall back to HTML; without a print launcher saved HTML is not opened.
#[derive(Clone, Default)]
pub struct ExportPipeline {
    engine: Option<Arc<dyn EngineFactory>>,
    printer: Option<Arc<dyn PrintLauncher>>,
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("engine", &self.engine.is_some())
            .field("printer", &self.printer.is_some())
            .finish()
    }
}

impl ExportPipeline {
    pub fn new(
        engine: Option<Arc<dyn EngineFactory>>,
        printer: Option<Arc<dyn PrintLauncher>>,
    ) -> Self {
        Self { engine, printer }
    }

    /// Render `snapshot` for the policy's medium.
    pub fn render(
        &self,
        snapshot: &SessionSnapshot<'_>,
        policy: &InclusionPolicy,
    ) -> AppResult<ExportArtifact> {
        validate(snapshot)?;
        let Some(factory) = self.engine.as_deref() else {
            if policy.medium == Medium::Email {
                return Err(AppError::Validation(
                    "Email export needs the PDF engine, which is unavailable.".to_string(),
                ));
            }
            debug!("no document engine, using HTML fallback");
            return self.render_html(snapshot, policy);
        };

        let selection = select(snapshot, policy);
        let mut dropped = false;
        if let Some(ceiling) = policy.size_ceiling {
            let estimate = estimate_size(&selection, policy, true);
            if !selection.images.is_empty() && estimate > ceiling {
                info!(estimate, ceiling, "estimated size over ceiling, dropping images");
                dropped = true;
            }
        }

        let mut content = ReportContent::new(snapshot, selection, policy, dropped);
        let mut outcome = assemble_pdf(factory, &content)?;

        if let Some(ceiling) = policy.size_ceiling {
            if outcome.bytes.len() > ceiling && !dropped && !selection.images.is_empty() {
                info!(
                    size = outcome.bytes.len(),
                    ceiling, "rendered size over ceiling, rendering without images"
                );
                dropped = true;
                content = ReportContent::new(snapshot, selection, policy, true);
                outcome = assemble_pdf(factory, &content)?;
            }
            if outcome.bytes.len() > ceiling {
                return Err(AppError::Capacity(format!(
                    "The report is {} even without images, over the {} email limit. Use the full download instead.",
                    megabytes(outcome.bytes.len()),
                    megabytes(ceiling)
                )));
            }
        }

        info!(
            medium = %policy.medium,
            size = outcome.bytes.len(),
            embedded = outcome.embedded,
            placeholders = outcome.placeholders,
            "export rendered"
        );
        Ok(ExportArtifact {
            medium: policy.medium,
            format: ArtifactFormat::Pdf,
            bytes: outcome.bytes,
            entries_included: content.selection.entries.len(),
            images_embedded: outcome.embedded,
            image_placeholders: outcome.placeholders,
            images_dropped: dropped,
            notes: content.notes(),
        })
    }

    /// Render the HTML print fallback regardless of engine availability.
    pub fn render_html(
        &self,
        snapshot: &SessionSnapshot<'_>,
        policy: &InclusionPolicy,
    ) -> AppResult<ExportArtifact> {
        validate(snapshot)?;
        let content = ReportContent::new(snapshot, select(snapshot, policy), policy, false);
        let document = html::render(&content, self.printer.is_some())?;
        Ok(ExportArtifact {
            medium: policy.medium,
            format: ArtifactFormat::Html,
            bytes: document.into_bytes(),
            entries_included: content.selection.entries.len(),
            images_embedded: content.selection.images.len(),
            image_placeholders: 0,
            images_dropped: false,
            notes: content.notes(),
        })
    }

    /// Write a download artifact into `dir` under today's filename. HTML
    /// artifacts are then handed to the print launcher, if any.
    pub fn save(&self, artifact: &ExportArtifact, dir: &Path) -> AppResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(artifact.file_name(Local::now().date_naive()));
        fs::write(&path, &artifact.bytes)?;
        info!(path = %path.display(), size = artifact.size(), "report saved");

        if artifact.format == ArtifactFormat::Html {
            if let Some(printer) = &self.printer {
                printer.launch(&path)?;
            }
        }
        Ok(path)
    }
}

fn validate(snapshot: &SessionSnapshot<'_>) -> AppResult<()> {
    if snapshot.is_empty() {
        return Err(AppError::Validation("No data to export".to_string()));
    }
    Ok(())
}

fn entry_meta(entry: &ConversationEntry) -> String {
    let mut meta = format!("Asked {}", display_time(entry.timestamp));
    if entry.context_used() {
        meta.push_str(" | Property context used");
    }
    if let Some(tokens) = entry.token_count() {
        meta.push_str(&format!(" | {tokens} tokens"));
    }
    meta
}

fn assemble_pdf(factory: &dyn EngineFactory, content: &ReportContent<'_>) -> AppResult<PdfOutcome> {
    let policy = content.policy;
    let mut engine = factory.create(EngineOptions {
        max_image_px: policy.max_image_px,
    });

    let loaded: Vec<Option<ImageRef>> = content
        .selection
        .images
        .iter()
        .map(|img| match engine.load_image(img.payload()) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(id = %img.id, error = %e, "image could not be embedded");
                None
            }
        })
        .collect();
    let all_failed = !loaded.is_empty() && loaded.iter().all(Option::is_none);

    let title = TextStyle::new(20.0).bold().color(Color::ACCENT);
    let heading = TextStyle::new(14.0).bold().color(Color::ACCENT);
    let strong = TextStyle::new(11.0).bold();
    let body = TextStyle::new(10.0);
    let muted = TextStyle::new(9.0).color(Color::GREY);

    let mut layout = Layout::new(engine.as_mut());
    let width = layout.content_width();
    let section = |name: &str| Block::new().paragraph(name, heading, 0.0, width).gap(6.0);

    layout.emit(
        &Block::new()
            .paragraph(content.title, title, 0.0, width)
            .paragraph(
                &format!("Generated: {}", display_time(content.generated_at)),
                muted,
                0.0,
                width,
            )
            .gap(16.0),
    );

    let mut summary = section("Session Summary")
        .paragraph(
            &format!("Total Questions: {}", content.total_questions),
            body,
            0.0,
            width,
        )
        .paragraph(
            &format!("Total Images: {}", content.total_images),
            body,
            0.0,
            width,
        );
    if let Some(duration) = &content.duration {
        summary = summary.paragraph(&format!("Session Duration: {duration}"), body, 0.0, width);
    }
    layout.emit(&summary.gap(16.0));

    let mut pending = Some(section("Conversation History"));
    for (i, entry) in content.selection.entries.iter().enumerate() {
        let block = pending
            .take()
            .unwrap_or_default()
            .paragraph(
                &format!("Q{}: {}", content.first_entry_number + i, entry.question),
                strong,
                0.0,
                width,
            )
            .gap(2.0)
            .paragraph(
                &truncate(&strip_markup(&entry.response), policy.response_chars),
                body,
                10.0,
                width,
            )
            .gap(2.0)
            .paragraph(&entry_meta(entry), muted, 10.0, width)
            .gap(10.0);
        layout.emit(&block);
    }
    for note in &content.entry_notes {
        layout.emit(&Block::new().paragraph(note, muted, 0.0, width).gap(8.0));
    }

    let mut embedded = 0;
    let mut placeholders = 0;
    if all_failed {
        layout.emit(
            &section("Generated Images")
                .paragraph(
                    &format!(
                        "None of the {} images could be embedded in this document.",
                        loaded.len()
                    ),
                    muted,
                    0.0,
                    width,
                )
                .gap(8.0),
        );
    } else if !loaded.is_empty() {
        let mut pending = Some(section("Generated Images"));
        for (img, image) in content.selection.images.iter().zip(&loaded) {
            let yes_no = if img.is_auto_generated { "Yes" } else { "No" };
            let caption = [
                (
                    format!("Prompt: {}", truncate(&img.prompt, policy.prompt_chars)),
                    body,
                ),
                (format!("Style: {}", img.style), body),
                (format!("Auto-generated: {yes_no}"), body),
                (display_time(img.timestamp), muted),
            ];
            let block = pending
                .take()
                .unwrap_or_default()
                .figure(*image, policy.image_box, &caption, width);
            layout.emit(&block);
            if image.is_some() {
                embedded += 1;
            } else {
                placeholders += 1;
            }
        }
    }
    for note in &content.image_notes {
        layout.emit(&Block::new().paragraph(note, muted, 0.0, width).gap(8.0));
    }

    layout.footers(content.attribution);
    let bytes = engine
        .finish()
        .map_err(|e| AppError::Document(e.to_string()))?;
    Ok(PdfOutcome {
        bytes,
        embedded,
        placeholders,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use serde_json::json;

    use super::testing::RecordingFactory;
    use super::*;
    use crate::models::{GeneratedImage, META_CONTEXT_USED, META_TOKEN_COUNT};

    const VALID: &str = "iVBORw0KGgoAAAANSUhEUg==";
    const CORRUPT: &str = "%%% not base64 %%%";

    fn entries(n: usize) -> Vec<ConversationEntry> {
        (0..n)
            .map(|i| {
                ConversationEntry::new(
                    format!("Question {i}"),
                    format!("<p>Answer <strong>{i}</strong></p>"),
                    BTreeMap::new(),
                )
            })
            .collect()
    }

    fn images(payloads: &[&str]) -> Vec<GeneratedImage> {
        payloads
            .iter()
            .enumerate()
            .map(|(i, p)| {
                GeneratedImage::new((*p).to_string(), format!("prompt {i}"), "photo".into(), None, false)
            })
            .collect()
    }

    fn pipeline(factory: &RecordingFactory) -> ExportPipeline {
        ExportPipeline::new(Some(Arc::new(factory.clone())), None)
    }

    #[test]
    fn empty_snapshot_is_rejected() {
        let factory = RecordingFactory::new();
        let snap = SessionSnapshot::new(&[], &[]);
        for policy in [InclusionPolicy::download(), InclusionPolicy::email(3, 3, 1024)] {
            let err = pipeline(&factory).render(&snap, &policy).unwrap_err();
            assert!(matches!(err, AppError::Validation(ref m) if m == "No data to export"));
        }
        assert!(factory.recording.lock().unwrap().options.is_none());

        let err = ExportPipeline::default()
            .render(&snap, &InclusionPolicy::download())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn download_summary_counts_all_questions() {
        let factory = RecordingFactory::new();
        let entries = entries(5);
        let snap = SessionSnapshot::new(&entries, &[]);

        let artifact = pipeline(&factory)
            .render(&snap, &InclusionPolicy::download())
            .unwrap();

        let rec = factory.recording.lock().unwrap();
        assert!(rec.has_text("Total Questions: 5"));
        assert!(rec.has_text("Q5: Question 4"));
        assert!(rec.has_text("Answer 4"));
        assert_eq!(artifact.format, ArtifactFormat::Pdf);
        assert_eq!(artifact.entries_included, 5);
        assert!(artifact.notes.is_empty());
        assert_eq!(rec.options, Some(EngineOptions { max_image_px: 1024 }));
    }

    #[test]
    fn email_caps_images_and_notes_the_rest() {
        let factory = RecordingFactory::new();
        let entries = entries(1);
        let images = images(&[VALID; 10]);
        let snap = SessionSnapshot::new(&entries, &images);

        let artifact = pipeline(&factory)
            .render(&snap, &InclusionPolicy::email(3, 3, DEFAULT_EMAIL_CEILING))
            .unwrap();

        let rec = factory.recording.lock().unwrap();
        assert_eq!(rec.images(), 3);
        assert!(rec.has_text("...and 7 more images in full export"));
        assert!(rec.has_text("Prompt: prompt 9"));
        assert!(!rec.has_text("Prompt: prompt 6"));
        assert_eq!(artifact.images_embedded, 3);
        assert_eq!(
            artifact.notes,
            vec!["...and 7 more images in full export".to_string()]
        );
        assert_eq!(rec.options, Some(EngineOptions { max_image_px: 384 }));
    }

    #[test]
    fn email_keeps_last_entries_with_original_numbering() {
        let factory = RecordingFactory::new();
        let entries = entries(5);
        let snap = SessionSnapshot::new(&entries, &[]);

        pipeline(&factory)
            .render(&snap, &InclusionPolicy::email(3, 3, DEFAULT_EMAIL_CEILING))
            .unwrap();

        let rec = factory.recording.lock().unwrap();
        assert!(rec.has_text("Q3: Question 2"));
        assert!(rec.has_text("Q5: Question 4"));
        assert!(!rec.has_text("Question 1"));
        assert!(rec.has_text("...and 2 more questions in full export"));
        assert!(rec.has_text("Total Questions: 5"));
    }

    #[test]
    fn oversized_images_are_dropped_but_text_kept() {
        let factory = RecordingFactory::new();
        let entries = entries(3);
        let big = "A".repeat(40_000);
        let images = images(&[big.as_str(), big.as_str(), big.as_str()]);
        let snap = SessionSnapshot::new(&entries, &images);

        let artifact = pipeline(&factory)
            .render(&snap, &InclusionPolicy::email(3, 3, 20_000))
            .unwrap();

        let rec = factory.recording.lock().unwrap();
        assert_eq!(rec.images(), 0);
        assert_eq!(artifact.images_embedded, 0);
        assert!(artifact.images_dropped);
        for i in 0..3 {
            assert!(rec.has_text(&format!("Question {i}")));
        }
        assert!(rec.has_text("Images were omitted"));
        assert!(artifact.size() <= 20_000);
    }

    #[test]
    fn text_over_ceiling_is_a_capacity_error() {
        let factory = RecordingFactory::new();
        let entries = entries(2);
        let images = images(&[VALID]);
        let snap = SessionSnapshot::new(&entries, &images);

        let err = pipeline(&factory)
            .render(&snap, &InclusionPolicy::email(3, 3, 10))
            .unwrap_err();
        assert!(matches!(err, AppError::Capacity(_)));
    }

    #[test]
    fn corrupt_image_becomes_one_placeholder() {
        let factory = RecordingFactory::new();
        let entries = entries(1);
        let images = images(&[VALID, CORRUPT, VALID]);
        let snap = SessionSnapshot::new(&entries, &images);

        let artifact = pipeline(&factory)
            .render(&snap, &InclusionPolicy::download())
            .unwrap();

        let rec = factory.recording.lock().unwrap();
        assert_eq!(rec.images(), 2);
        assert_eq!(rec.rects(), 1);
        assert!(rec.has_text("Image not available"));
        assert_eq!(artifact.images_embedded, 2);
        assert_eq!(artifact.image_placeholders, 1);
    }

    #[test]
    fn all_images_failing_yields_single_line() {
        let factory = RecordingFactory::new();
        let entries = entries(1);
        let images = images(&[CORRUPT, "", CORRUPT]);
        let snap = SessionSnapshot::new(&entries, &images);

        let artifact = pipeline(&factory)
            .render(&snap, &InclusionPolicy::download())
            .unwrap();

        let rec = factory.recording.lock().unwrap();
        assert_eq!(rec.images(), 0);
        assert_eq!(rec.rects(), 0);
        assert!(rec.has_text("None of the 3 images could be embedded"));
        assert_eq!(artifact.image_placeholders, 0);
    }

    #[test]
    fn every_page_gets_a_footer() {
        let factory = RecordingFactory::new();
        let entries: Vec<_> = (0..30)
            .map(|i| ConversationEntry::new(format!("Q{i}"), "word ".repeat(300), BTreeMap::new()))
            .collect();
        let snap = SessionSnapshot::new(&entries, &[]);

        pipeline(&factory)
            .render(&snap, &InclusionPolicy::download())
            .unwrap();

        let rec = factory.recording.lock().unwrap();
        let pages = rec.pages;
        assert!(pages > 1);
        let footers: Vec<_> = rec
            .texts()
            .into_iter()
            .filter(|t| t.starts_with("Page "))
            .collect();
        assert_eq!(footers.len(), pages);
        assert_eq!(footers[0], "Page 1 of ".to_string() + &pages.to_string());
        assert!(footers.contains(&format!("Page {pages} of {pages}")));
        assert_eq!(
            rec.texts().iter().filter(|t| *t == ATTRIBUTION).count(),
            pages
        );
    }

    #[test]
    fn entry_meta_reports_context_and_tokens() {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_CONTEXT_USED.to_string(), json!(true));
        metadata.insert(META_TOKEN_COUNT.to_string(), json!(321));
        let entry = ConversationEntry::new("q".into(), "r".into(), metadata);
        let meta = entry_meta(&entry);
        assert!(meta.starts_with("Asked "));
        assert!(meta.contains("Property context used"));
        assert!(meta.ends_with("321 tokens"));
    }

    #[test]
    fn non_ascii_is_folded_for_pdf() {
        let factory = RecordingFactory::new();
        let entries = vec![ConversationEntry::new(
            "Caf\u{e9} \u{201c}near\u{201d} the beach?".into(),
            "Yes \u{2014} 5 min".into(),
            BTreeMap::new(),
        )];
        let snap = SessionSnapshot::new(&entries, &[]);

        pipeline(&factory)
            .render(&snap, &InclusionPolicy::download())
            .unwrap();

        let rec = factory.recording.lock().unwrap();
        assert!(rec.has_text("Q1: Cafe \"near\" the beach?"));
        assert!(rec.has_text("Yes - 5 min"));
        assert!(rec.texts().iter().all(|t| t.is_ascii()));
    }

    #[test]
    fn falls_back_to_html_without_engine() {
        let entries = vec![
            ConversationEntry::new("<script>alert(1)</script>".into(), "ok".into(), BTreeMap::new()),
            ConversationEntry::new("Caf\u{e9}?".into(), "ok".into(), BTreeMap::new()),
        ];
        let images = images(&[VALID]);
        let snap = SessionSnapshot::new(&entries, &images);

        let artifact = ExportPipeline::default()
            .render(&snap, &InclusionPolicy::download())
            .unwrap();

        assert_eq!(artifact.format, ArtifactFormat::Html);
        let html = String::from_utf8(artifact.bytes).unwrap();
        assert!(html.contains("Total Questions: 2"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Caf\u{e9}?"));
        assert!(html.contains("base64,iVBORw0KGgo"));
        assert!(!html.contains("window.print"));
    }

    #[test]
    fn email_without_engine_is_rejected() {
        let entries = entries(1);
        let snap = SessionSnapshot::new(&entries, &[]);
        let err = ExportPipeline::default()
            .render(&snap, &InclusionPolicy::email(3, 3, DEFAULT_EMAIL_CEILING))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn file_name_uses_date_and_format() {
        let entries = entries(1);
        let snap = SessionSnapshot::new(&entries, &[]);
        let artifact = ExportPipeline::default()
            .render(&snap, &InclusionPolicy::download())
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            artifact.file_name(date),
            "property-intelligence-report-2024-03-09.html"
        );
    }

    #[derive(Default)]
    struct RecordingPrinter {
        launched: Mutex<Vec<PathBuf>>,
    }

    impl PrintLauncher for RecordingPrinter {
        fn launch(&self, html_path: &Path) -> AppResult<()> {
            self.launched.lock().unwrap().push(html_path.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn saving_html_launches_printer() {
        let dir = tempfile::tempdir().unwrap();
        let printer = Arc::new(RecordingPrinter::default());
        let pipeline = ExportPipeline::new(None, Some(printer.clone()));
        let entries = entries(1);
        let snap = SessionSnapshot::new(&entries, &[]);

        let artifact = pipeline.render(&snap, &InclusionPolicy::download()).unwrap();
        assert!(String::from_utf8_lossy(&artifact.bytes).contains("window.print"));
        let path = pipeline.save(&artifact, &dir.path().join("reports")).unwrap();

        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "html");
        assert_eq!(*printer.launched.lock().unwrap(), vec![path]);
    }

    #[test]
    fn real_pdf_engine_smoke() {
        let entries = entries(2);
        let png = pdf::tests::png_base64(40, 30);
        let images = images(&[png.as_str(), CORRUPT]);
        let snap = SessionSnapshot::new(&entries, &images);
        let pipeline = ExportPipeline::new(Some(Arc::new(PdfEngineFactory)), None);

        let artifact = pipeline.render(&snap, &InclusionPolicy::download()).unwrap();
        assert!(artifact.bytes.starts_with(b"%PDF"));
        assert_eq!(artifact.images_embedded, 1);
        assert_eq!(artifact.image_placeholders, 1);

        let email = pipeline
            .render(&snap, &InclusionPolicy::email(3, 3, DEFAULT_EMAIL_CEILING))
            .unwrap();
        assert!(email.size() <= DEFAULT_EMAIL_CEILING);
        assert!(!email.to_base64().is_empty());
    }
}
