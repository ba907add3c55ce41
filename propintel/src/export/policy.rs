//! Per-medium inclusion policy and email size governance.

use crate::models::{ConversationEntry, GeneratedImage, SessionSnapshot};

use super::text::{strip_markup, truncate};

/// Default email ceiling: 5 MiB.
pub const DEFAULT_EMAIL_CEILING: usize = 5 * 1024 * 1024;
/// Default number of conversation entries attached to an email.
pub const DEFAULT_EMAIL_ENTRIES: usize = 3;
/// Default number of images attached to an email.
pub const DEFAULT_EMAIL_IMAGES: usize = 3;

/// Fixed per-entry allowance for headings, timestamps and layout.
const ENTRY_OVERHEAD: usize = 200;
/// Fixed allowance for header, summary and footers.
const DOCUMENT_OVERHEAD: usize = 4 * 1024;

/// Export target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    /// Full document saved locally.
    Download,
    /// Size-bounded document attached to an email.
    Email,
}

impl Medium {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Email => "email",
        }
    }
}

impl std::fmt::Display for Medium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What goes into an artifact, and how large it may get.
#[derive(Debug, Clone, PartialEq)]
pub struct InclusionPolicy {
    pub medium: Medium,
    /// Keep only the most recent N entries.
    pub max_entries: Option<usize>,
    /// Keep only the most recent N images.
    pub max_images: Option<usize>,
    pub include_images: bool,
    /// Character budget for each response.
    pub response_chars: usize,
    /// Character budget for each image prompt.
    pub prompt_chars: usize,
    /// Box each image is drawn into, in points.
    pub image_box: (f32, f32),
    /// Longest side images are resampled to, in pixels.
    pub max_image_px: u32,
    /// Upper bound on the artifact size in bytes.
    pub size_ceiling: Option<usize>,
}

impl InclusionPolicy {
    /// Full-download medium: everything, generous budgets.
    pub const fn download() -> Self {
        Self {
            medium: Medium::Download,
            max_entries: None,
            max_images: None,
            include_images: true,
            response_chars: 2000,
            prompt_chars: 200,
            image_box: (240.0, 180.0),
            max_image_px: 1024,
            size_ceiling: None,
        }
    }

    /// Email medium: recent items only, small images, bounded size.
    pub const fn email(max_entries: usize, max_images: usize, size_ceiling: usize) -> Self {
        Self {
            medium: Medium::Email,
            max_entries: Some(max_entries),
            max_images: Some(max_images),
            include_images: max_images > 0,
            response_chars: 600,
            prompt_chars: 100,
            image_box: (160.0, 120.0),
            max_image_px: 384,
            size_ceiling: Some(size_ceiling),
        }
    }
}

impl Default for InclusionPolicy {
    fn default() -> Self {
        Self::download()
    }
}

/// The slice of a snapshot an artifact covers.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub entries: &'a [ConversationEntry],
    pub images: &'a [GeneratedImage],
    pub omitted_entries: usize,
    pub omitted_images: usize,
}

/// Apply the policy's caps, keeping the most recent items in order.
pub fn select<'a>(snapshot: &SessionSnapshot<'a>, policy: &InclusionPolicy) -> Selection<'a> {
    let entries = tail(snapshot.conversation_history, policy.max_entries);
    let images = if policy.include_images {
        tail(snapshot.image_gallery, policy.max_images)
    } else {
        &[]
    };
    Selection {
        entries,
        images,
        omitted_entries: snapshot.conversation_history.len() - entries.len(),
        omitted_images: snapshot.image_gallery.len() - images.len(),
    }
}

fn tail<T>(items: &[T], cap: Option<usize>) -> &[T] {
    match cap {
        Some(n) if items.len() > n => &items[items.len() - n..],
        _ => items,
    }
}

/// Rough artifact size for a selection.
pub fn estimate_size(selection: &Selection<'_>, policy: &InclusionPolicy, with_images: bool) -> usize {
    let text: usize = selection
        .entries
        .iter()
        .map(|e| {
            e.question.len()
                + truncate(&strip_markup(&e.response), policy.response_chars).len()
                + ENTRY_OVERHEAD
        })
        .sum();
    let images: usize = if with_images {
        selection
            .images
            .iter()
            .map(|i| i.estimated_bytes() + policy.prompt_chars + ENTRY_OVERHEAD)
            .sum()
    } else {
        0
    };
    DOCUMENT_OVERHEAD + text + images
}
