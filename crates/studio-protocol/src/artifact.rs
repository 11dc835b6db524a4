//! Generated artifacts and their media resolution.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::ProtocolResult;

/// Section used for artifacts without a `section_name`.
pub const DEFAULT_SECTION: &str = "Other";

/// One generated artifact, as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Base64 encoded body for inline artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
}

/// Where an artifact's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource<'a> {
    /// Embedded base64 body.
    Inline { mime_type: &'a str, content: &'a str },
    /// External reference, used verbatim.
    Url(&'a str),
}

impl fmt::Display for MediaSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline { mime_type, content } => {
                write!(f, "data:{};base64,{}", mime_type, content)
            }
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// Coarse display category derived from the MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Table,
    Other,
}

impl ArtifactEntry {
    /// Inline when both `content` and `mime_type` are non-empty, otherwise
    /// `url`.
    pub fn media_source(&self) -> Option<MediaSource<'_>> {
        let content = self.content.as_deref().filter(|c| !c.is_empty());
        let mime_type = self.mime_type.as_deref().filter(|m| !m.is_empty());
        match (content, mime_type) {
            (Some(content), Some(mime_type)) => {
                Some(MediaSource::Inline { mime_type, content })
            }
            _ => self.url.as_deref().map(MediaSource::Url),
        }
    }

    pub fn media_kind(&self) -> MediaKind {
        match self.mime_type.as_deref() {
            Some(mime) if mime.starts_with("image/") => MediaKind::Image,
            Some(mime) if mime.starts_with("video/") => MediaKind::Video,
            Some("text/csv") => MediaKind::Table,
            _ => MediaKind::Other,
        }
    }

    /// Section this artifact is displayed under.
    pub fn section(&self) -> &str {
        match self.section_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_SECTION,
        }
    }

    /// Best human label: filename, then caption.
    pub fn label(&self) -> Option<&str> {
        self.filename.as_deref().or(self.caption.as_deref())
    }

    /// Decoded inline body, or `None` when there is no inline content.
    pub fn decode_content(&self) -> ProtocolResult<Option<Vec<u8>>> {
        match self.content.as_deref().map(str::trim) {
            Some(content) if !content.is_empty() => Ok(Some(STANDARD.decode(content)?)),
            _ => Ok(None),
        }
    }
}

/// Artifacts sharing one section, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSection<'a> {
    pub name: &'a str,
    pub items: Vec<&'a ArtifactEntry>,
}

/// Group artifacts by section. Sections appear in order of first use.
pub fn group_by_section(artifacts: &[ArtifactEntry]) -> Vec<ArtifactSection<'_>> {
    let mut sections: Vec<ArtifactSection<'_>> = Vec::new();
    for artifact in artifacts {
        let name = artifact.section();
        match sections.iter_mut().find(|s| s.name == name) {
            Some(section) => section.items.push(artifact),
            None => sections.push(ArtifactSection {
                name,
                items: vec![artifact],
            }),
        }
    }
    sections
}
