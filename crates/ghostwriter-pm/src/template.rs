//! Template types used by the prompt manager.
//!
//! Defines [`PromptTemplate`] for representing template sources and the
//! table of built-in templates compiled into the binary.

use serde::{Deserialize, Serialize};

/// Metadata about a prompt template, including its name and source content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Template name used for lookup (e.g., `blog_post`).
    pub name: String,

    /// Raw Jinja2 template source.
    pub source: String,
}

impl PromptTemplate {
    /// Create a template from a name and source.
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Built-in templates as `(name, source)` pairs.
pub(crate) const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("rewrite", include_str!("../templates/rewrite.j2")),
    ("blog_post", include_str!("../templates/blog_post.j2")),
    ("email", include_str!("../templates/email.j2")),
    (
        "product_description",
        include_str!("../templates/product_description.j2"),
    ),
    ("social_post", include_str!("../templates/social_post.j2")),
    ("essay", include_str!("../templates/essay.j2")),
    ("cover_letter", include_str!("../templates/cover_letter.j2")),
    ("press_release", include_str!("../templates/press_release.j2")),
    ("youtube_script", include_str!("../templates/youtube_script.j2")),
];
