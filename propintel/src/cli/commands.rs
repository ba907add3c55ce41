//! CLI command execution.
//!
//! Builds the session store, API clients and export pipeline from the
//! configuration and runs one command against them. Every failure ends
//! up as a single error notification.

use std::fs;
use std::future::Future;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::debug;

use crate::api::{AnalysisClient, EmailClient, EmailRequest, SharedStorage, DEFAULT_QUESTIONS};
use crate::config::{Config, NotificationConfig};
use crate::confirm::{AssumeNo, AssumeYes, Confirm, TerminalConfirm};
use crate::error::{AppError, AppResult};
use crate::export::text::{strip_markup, truncate};
use crate::export::{
    BrowserPrintLauncher, ExportArtifact, ExportPipeline, InclusionPolicy, Medium,
    PdfEngineFactory,
};
use crate::models::{format_duration, ImageId, SessionSnapshot};
use crate::notify::{NotificationChannel, NotificationSink, Severity};
use crate::store::{ChangeKind, FileStorage, HistoryObserver, MergeStrategy, SessionStore};

use super::args::{Cli, Commands, DataAction, ImageAction};

/// Logs every store mutation.
struct LogObserver;

impl HistoryObserver for LogObserver {
    fn history_changed(&self, kind: ChangeKind, snapshot: &SessionSnapshot<'_>) {
        debug!(
            ?kind,
            entries = snapshot.conversation_history.len(),
            images = snapshot.image_gallery.len(),
            "session changed"
        );
    }
}

struct App {
    config: Config,
    store: SessionStore,
    /// Backs the session mirror and the API response caches.
    storage: SharedStorage,
    notifier: NotificationChannel,
    /// Used for destructive actions.
    confirm: Box<dyn Confirm>,
    /// Used for "Try again?" after retryable failures.
    retry: Box<dyn Confirm>,
    pipeline: ExportPipeline,
}

/// Execute the parsed command, rendering notifications into `sink`.
///
/// Configuration failures are reported like any other failure.
pub async fn execute(cli: Cli, sink: Arc<dyn NotificationSink>) -> Result<()> {
    let (notifier, result) = match Config::load(cli.config.as_deref()) {
        Ok(config) => {
            let notifier = NotificationChannel::new(sink, config.notifications.max_visible);
            let result = match App::new(config, cli.yes, notifier.clone()) {
                Ok(mut app) => app.run(cli.command).await,
                Err(e) => Err(e),
            };
            (notifier, result)
        }
        Err(e) => {
            let notifier = NotificationChannel::new(sink, NotificationConfig::default().max_visible);
            (notifier, Err(e))
        }
    };
    if let Err(e) = &result {
        report_failure(&notifier, e);
    }
    result
}

/// Show `err` as a sticky error notification unless the same message is
/// already on screen.
fn report_failure(notifier: &NotificationChannel, err: &anyhow::Error) {
    let message = err
        .downcast_ref::<AppError>()
        .map_or_else(|| format!("{err:#}"), AppError::user_message);
    let already_shown = notifier
        .visible()
        .iter()
        .any(|n| n.severity == Severity::Error && n.message == message);
    if !already_shown {
        notifier.notify(message, Severity::Error, 0);
    }
    debug!(error = ?err, "command failed");
}

fn artifact_summary(artifact: &ExportArtifact) -> String {
    let kind = match artifact.medium {
        Medium::Download => "Report",
        Medium::Email => "Attachment",
    };
    let mut summary = format!(
        "{kind} covers {} questions with {} images",
        artifact.entries_included, artifact.images_embedded
    );
    if artifact.image_placeholders > 0 {
        summary.push_str(&format!(
            " ({} could not be embedded)",
            artifact.image_placeholders
        ));
    }
    summary
}

impl App {
    fn new(config: Config, assume_yes: bool, notifier: NotificationChannel) -> Result<Self> {
        let files = FileStorage::new(config.data_dir()?);
        debug!(dir = %files.dir().display(), "using session storage");

        let interactive = std::io::stdin().is_terminal();
        let confirm: Box<dyn Confirm> = if assume_yes {
            Box::new(AssumeYes)
        } else if interactive {
            Box::new(TerminalConfirm)
        } else {
            Box::new(AssumeNo)
        };
        let retry: Box<dyn Confirm> = if interactive && !assume_yes {
            Box::new(TerminalConfirm)
        } else {
            Box::new(AssumeNo)
        };

        let pipeline = ExportPipeline::new(
            Some(Arc::new(PdfEngineFactory)),
            Some(Arc::new(BrowserPrintLauncher)),
        );

        Ok(Self::with_parts(
            config,
            Arc::new(files),
            notifier,
            confirm,
            retry,
            pipeline,
        ))
    }

    fn with_parts(
        config: Config,
        storage: SharedStorage,
        notifier: NotificationChannel,
        confirm: Box<dyn Confirm>,
        retry: Box<dyn Confirm>,
        pipeline: ExportPipeline,
    ) -> Self {
        let mut store =
            SessionStore::open(Box::new(Arc::clone(&storage)), config.storage.key.clone());
        store.subscribe(Box::new(LogObserver));
        Self {
            config,
            store,
            storage,
            notifier,
            confirm,
            retry,
            pipeline,
        }
    }

    async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Health => self.health().await,
            Commands::Questions => self.questions().await,
            Commands::Ask { question, details } => self.ask(&question.join(" "), details).await,
            Commands::History => {
                self.history();
                Ok(())
            }
            Commands::Images { action } => match action {
                ImageAction::Add {
                    file,
                    prompt,
                    style,
                    seed,
                    auto,
                } => self.add_image(&file, prompt, style, seed, auto),
                ImageAction::List => {
                    self.list_images();
                    Ok(())
                }
                ImageAction::Delete { id } => {
                    self.delete_image(&id);
                    Ok(())
                }
            },
            Commands::Export { html, out } => self.export(html, out),
            Commands::Email {
                to,
                subject,
                message,
                max_images,
            } => self.email(to, subject, message, max_images).await,
            Commands::Data { action } => match action {
                DataAction::Export { file } => self.export_data(&file),
                DataAction::Import { file, replace } => self.import_data(&file, replace),
            },
            Commands::Clear => {
                self.clear();
                Ok(())
            }
        }
    }

    fn info(&self, message: impl Into<String>, severity: Severity) {
        self.notifier
            .notify(message, severity, self.config.notifications.default_duration_ms);
    }

    /// Run `op`, offering to re-run it with the same inputs after a
    /// retryable failure. The failure stays on screen if the user declines.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    debug!(error = %e, "retryable failure");
                    let shown = self.notifier.notify(e.user_message(), Severity::Error, 0);
                    if !self.retry.confirm("Try again?") {
                        return Err(e);
                    }
                    self.notifier.dismiss(shown);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn analysis_client(&self) -> AppResult<AnalysisClient> {
        AnalysisClient::new(
            &self.config.api.base_url,
            self.config.api.timeout(),
            self.config.api.cache_ttl(),
            Some(Arc::clone(&self.storage)),
        )
    }

    async fn health(&self) -> Result<()> {
        let client = self.analysis_client()?;
        let health = self.with_retry(|| client.health()).await?;
        println!("API status: {} ({})", health.status, client.base_url());
        if health.is_degraded() {
            self.info("The analysis API is running in degraded mode.", Severity::Warning);
        } else if !health.is_healthy() {
            self.info(
                format!("The analysis API reported '{}'.", health.status),
                Severity::Warning,
            );
        }
        Ok(())
    }

    async fn questions(&self) -> Result<()> {
        for (i, question) in self.preset_questions().await?.iter().enumerate() {
            println!("{:>2}. {question}", i + 1);
        }
        Ok(())
    }

    /// Questions from the API, or the built-in examples when it has none.
    async fn preset_questions(&self) -> AppResult<Vec<String>> {
        let client = self.analysis_client()?;
        let questions = match client.questions().await {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => DEFAULT_QUESTIONS.iter().map(ToString::to_string).collect(),
            Err(e) => {
                self.info(
                    format!("{} Showing example questions instead.", e.user_message()),
                    Severity::Warning,
                );
                DEFAULT_QUESTIONS.iter().map(ToString::to_string).collect()
            }
        };
        Ok(questions)
    }

    async fn ask(&mut self, question: &str, details: bool) -> Result<()> {
        let client = self.analysis_client()?;
        let response = self
            .with_retry(|| client.analyze(question, details))
            .await?;

        let asked = if response.question.is_empty() {
            question.trim()
        } else {
            response.question.as_str()
        };
        self.store
            .append_conversation_entry(asked, response.answer.clone(), response.metadata());

        println!("{}", strip_markup(&response.answer));
        if details {
            if let Some(kind) = &response.question_type {
                println!("\nQuestion type: {kind}");
            }
            if let Some(secs) = response.processing_time {
                println!("Processing time: {secs:.2}s");
            }
        }
        Ok(())
    }

    fn history(&self) {
        let snapshot = self.store.snapshot();
        if snapshot.conversation_history.is_empty() {
            println!("No questions asked yet.");
        }
        for (i, entry) in snapshot.conversation_history.iter().enumerate() {
            println!(
                "Q{}: {}  ({})",
                i + 1,
                entry.question,
                entry.timestamp.format("%Y-%m-%d %H:%M")
            );
            println!("    {}\n", truncate(&strip_markup(&entry.response), 200).replace('\n', "\n    "));
        }

        println!("Total Questions: {}", snapshot.conversation_history.len());
        println!("Total Images: {}", snapshot.image_gallery.len());
        if let Some(duration) = snapshot.duration() {
            println!("Session Duration: {}", format_duration(duration));
        }
    }

    fn add_image(
        &mut self,
        file: &Path,
        prompt: String,
        style: String,
        seed: Option<u64>,
        auto: bool,
    ) -> Result<()> {
        let bytes = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
        if image::guess_format(&bytes).is_err() {
            bail!("{} is not a supported image", file.display());
        }
        let id = self
            .store
            .append_image(BASE64.encode(&bytes), prompt, style, seed, auto);
        println!("{id}");
        self.info("Image added to gallery", Severity::Success);
        Ok(())
    }

    fn list_images(&self) {
        let gallery = self.store.snapshot().image_gallery;
        if gallery.is_empty() {
            println!("No images in the gallery.");
        }
        for image in gallery {
            let auto = if image.is_auto_generated { " (auto)" } else { "" };
            println!(
                "{}  [{}]{auto}  {}  {}",
                image.id,
                image.style,
                image.timestamp.format("%Y-%m-%d %H:%M"),
                truncate(&image.prompt, 60)
            );
        }
    }

    fn delete_image(&mut self, id: &str) {
        let id = ImageId::from(id);
        let known = self
            .store
            .snapshot()
            .image_gallery
            .iter()
            .any(|image| image.id == id);
        if !known {
            self.info(format!("No image with id {id}"), Severity::Warning);
        } else if self.store.delete_image(&id, self.confirm.as_ref()) {
            self.info("Image deleted", Severity::Success);
        } else {
            self.info("Image kept", Severity::Info);
        }
    }

    fn export(&self, html: bool, out: Option<PathBuf>) -> Result<()> {
        let snapshot = self.store.snapshot();
        let policy = InclusionPolicy::download();
        let artifact = if html {
            self.pipeline.render_html(&snapshot, &policy)?
        } else {
            self.pipeline.render(&snapshot, &policy)?
        };
        for note in &artifact.notes {
            self.info(note.clone(), Severity::Info);
        }
        self.info(artifact_summary(&artifact), Severity::Info);

        let dir = out.unwrap_or_else(|| self.config.output_dir());
        let path = self.pipeline.save(&artifact, &dir)?;
        println!("{}", path.display());
        self.info(
            format!("Report saved to {}", path.display()),
            Severity::Success,
        );
        Ok(())
    }

    async fn email(
        &self,
        to: String,
        subject: String,
        message: String,
        max_images: Option<usize>,
    ) -> Result<()> {
        let email = &self.config.email;
        let policy = InclusionPolicy::email(
            email.max_entries,
            max_images.unwrap_or(email.max_images),
            email.max_attachment_bytes,
        );
        let artifact = self.pipeline.render(&self.store.snapshot(), &policy)?;
        debug!(summary = %artifact_summary(&artifact), "email attachment rendered");
        if artifact.images_dropped {
            self.info(
                "Images were left out to keep the attachment small enough to send.",
                Severity::Warning,
            );
        }

        let request = EmailRequest {
            to,
            subject,
            message,
            pdf_base64: artifact.to_base64(),
        };
        let client = EmailClient::new(self.config.email_endpoint(), self.config.api.timeout())?;
        self.with_retry(|| client.send(&request)).await?;
        self.info(format!("Report emailed to {}", request.to), Severity::Success);
        Ok(())
    }

    fn export_data(&self, file: &Path) -> Result<()> {
        let blob = self.store.export_data()?;
        fs::write(file, blob).with_context(|| format!("Failed to write {}", file.display()))?;
        self.info(
            format!("Session data exported to {}", file.display()),
            Severity::Success,
        );
        Ok(())
    }

    fn import_data(&mut self, file: &Path, replace: bool) -> Result<()> {
        let blob =
            fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
        let strategy = if replace {
            MergeStrategy::Replace
        } else {
            MergeStrategy::Append
        };
        let summary = self.store.import_data(&blob, strategy)?;
        self.info(
            format!(
                "Imported {} questions and {} images",
                summary.entries, summary.images
            ),
            Severity::Success,
        );
        Ok(())
    }

    fn clear(&mut self) {
        if self.store.clear_all(self.confirm.as_ref()) {
            self.info("Session cleared", Severity::Success);
        } else {
            self.info("Nothing was cleared", Severity::Info);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use clap::Parser;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::notify::Notification;
    use crate::store::MemoryStorage;

    /// Answers confirmations from a fixed script, then declines.
    #[derive(Clone, Default)]
    struct Scripted {
        answers: Arc<Mutex<VecDeque<bool>>>,
        asked: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn answering(answers: &[bool]) -> Self {
            Self {
                answers: Arc::new(Mutex::new(answers.iter().copied().collect())),
                asked: Arc::default(),
            }
        }

        fn asked(&self) -> Vec<String> {
            self.asked.lock().unwrap().clone()
        }
    }

    impl Confirm for Scripted {
        fn confirm(&self, prompt: &str) -> bool {
            self.asked.lock().unwrap().push(prompt.to_string());
            self.answers.lock().unwrap().pop_front().unwrap_or(false)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        shown: Mutex<Vec<(Severity, String)>>,
    }

    impl RecordingSink {
        fn messages(&self, severity: Severity) -> Vec<String> {
            self.shown
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _)| *s == severity)
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    impl NotificationSink for RecordingSink {
        fn show(&self, n: &Notification) {
            self.shown.lock().unwrap().push((n.severity, n.message.clone()));
        }
    }

    fn app_with(
        server: &MockServer,
        storage: SharedStorage,
        retry: &Scripted,
        sink: &Arc<RecordingSink>,
    ) -> App {
        let mut config = Config::default();
        config.api.base_url = server.uri();
        config.api.timeout_secs = 2;
        App::with_parts(
            config,
            storage,
            NotificationChannel::new(sink.clone(), 5),
            Box::new(AssumeNo),
            Box::new(retry.clone()),
            ExportPipeline::default(),
        )
    }

    fn app_for(server: &MockServer, retry: &Scripted, sink: &Arc<RecordingSink>) -> App {
        app_with(server, Arc::new(MemoryStorage::new()), retry, sink)
    }

    fn ask(question: &str) -> Commands {
        Commands::Ask {
            question: question.split(' ').map(ToString::to_string).collect(),
            details: false,
        }
    }

    fn answer(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "answer": text}))
    }

    #[tokio::test]
    async fn accepted_retry_resends_the_same_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(answer("<p>Steady growth.</p>"))
            .expect(1)
            .mount(&server)
            .await;

        let retry = Scripted::answering(&[true]);
        let sink = Arc::new(RecordingSink::default());
        let mut app = app_for(&server, &retry, &sink);
        app.run(ask("Darwin outlook?")).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].body, requests[1].body);
        assert_eq!(retry.asked(), vec!["Try again?"]);

        let snapshot = app.store.snapshot();
        assert_eq!(snapshot.conversation_history.len(), 1);
        assert_eq!(snapshot.conversation_history[0].question, "Darwin outlook?");
        assert!(app
            .notifier
            .visible()
            .iter()
            .all(|n| n.severity != Severity::Error));
    }

    #[tokio::test]
    async fn validation_failures_are_never_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "Property analysis service not available"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let retry = Scripted::answering(&[true, true]);
        let sink = Arc::new(RecordingSink::default());
        let mut app = app_for(&server, &retry, &sink);
        let err = app.run(ask("Perth?")).await.unwrap_err();
        report_failure(&app.notifier, &err);

        assert!(retry.asked().is_empty());
        assert_eq!(
            sink.messages(Severity::Error),
            vec!["Property analysis service not available"]
        );
        assert!(app.store.snapshot().conversation_history.is_empty());
    }

    #[tokio::test]
    async fn declined_retry_reports_the_failure_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let retry = Scripted::answering(&[false]);
        let sink = Arc::new(RecordingSink::default());
        let mut app = app_for(&server, &retry, &sink);
        let err = app.run(ask("Cairns?")).await.unwrap_err();
        report_failure(&app.notifier, &err);

        assert_eq!(retry.asked().len(), 1);
        let errors = sink.messages(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("HTTP 503"));
    }

    #[tokio::test]
    async fn unavailable_questions_fall_back_to_examples() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let retry = Scripted::default();
        let sink = Arc::new(RecordingSink::default());
        let app = app_for(&server, &retry, &sink);
        let questions = app.preset_questions().await.unwrap();

        assert_eq!(questions, DEFAULT_QUESTIONS);
        let warnings = sink.messages(Severity::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].ends_with("Showing example questions instead."));
        assert!(retry.asked().is_empty());
    }

    #[tokio::test]
    async fn answers_are_reused_across_runs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(answer("Yields are firm."))
            .expect(1)
            .mount(&server)
            .await;

        let storage: SharedStorage = Arc::new(MemoryStorage::new());
        let retry = Scripted::default();
        let sink = Arc::new(RecordingSink::default());
        for _ in 0..2 {
            let mut app = app_with(&server, Arc::clone(&storage), &retry, &sink);
            app.run(ask("Geelong yields?")).await.unwrap();
        }

        let app = app_with(&server, storage, &retry, &sink);
        assert_eq!(app.store.snapshot().conversation_history.len(), 2);
    }

    #[tokio::test]
    async fn malformed_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        fs::write(&config, "[api\nbase_url = ").unwrap();
        let cli = Cli::parse_from([
            "propintel",
            "--config",
            config.to_str().unwrap(),
            "history",
        ]);

        let sink = Arc::new(RecordingSink::default());
        let err = execute(cli, sink.clone()).await.unwrap_err();

        let errors = sink.messages(Severity::Error);
        assert_eq!(errors, vec![format!("{err:#}")]);
        assert!(errors[0].starts_with("Invalid config file"));
    }
}
