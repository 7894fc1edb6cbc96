#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub id: String,
}

#[derive(Debug, Clone, Default)]
pub struct Message {
    pub id: String,
    pub subject: Option<String>,
    pub parts: PartTree,
}

impl Message {
    pub fn subject_or_default(&self) -> &str {
        self.subject.as_deref().unwrap_or("No Subject")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    pub mime_type: String,
    /// Set when the body lives in a separately retrievable attachment.
    pub attachment_id: Option<String>,
    pub children: Vec<usize>,
}

/// MIME structure of a message as a flat arena. Index 0 is the root payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartTree {
    parts: Vec<Part>,
}

impl PartTree {
    /// Appends `part` under `parent` (or as the root when `parent` is `None`)
    /// and returns its index.
    pub fn push(&mut self, parent: Option<usize>, part: Part) -> usize {
        let index = self.parts.len();
        self.parts.push(part);
        if let Some(parent) = parent {
            self.parts[parent].children.push(index);
        }
        index
    }

    pub fn root(&self) -> Option<usize> {
        if self.parts.is_empty() { None } else { Some(0) }
    }

    pub fn get(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }
}

/// Result of checking one image's text against the name lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A deny term was present, so the image cannot keep the message.
    Skip,
    Found(String),
    NoMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Found { name: String, image_index: usize },
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Apply the label and remove from the inbox
    Keep,
    /// Move to trash
    Discard,
}

impl Disposition {
    pub fn description(&self) -> &'static str {
        match self {
            Disposition::Keep => "keep",
            Disposition::Discard => "discard",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub processed: usize,
    pub kept: usize,
    pub discarded: usize,
    pub failed: usize,
}
