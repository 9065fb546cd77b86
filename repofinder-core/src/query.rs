//! Search query construction
//!
//! Every identity attribute is expanded into one query per searchable
//! field of the repository search API.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{IdentityAttribute, OrgIdentity};

/// Repository field a query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    /// Name, description and README text
    Text,
    /// Repository topics
    Topics,
    /// Committer email addresses
    Email,
}

impl SearchField {
    pub const ALL: [SearchField; 3] = [SearchField::Text, SearchField::Topics, SearchField::Email];

    /// Render the query expression for a value, or None when the field
    /// cannot express it
    pub fn expression(&self, value: &str) -> Option<String> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        match self {
            SearchField::Text => Some(format!("\"{}\" in:name,description,readme", quote_safe(value))),
            SearchField::Topics => {
                let slug = topic_slug(value);
                if slug.is_empty() {
                    None
                } else {
                    Some(format!("topic:{}", slug))
                }
            }
            SearchField::Email => Some(format!("\"{}\" in:email", quote_safe(value))),
        }
    }
}

/// A search expression plus the attribute and field that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub origin: IdentityAttribute,
    pub field: SearchField,
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Build the ordered query list for an identity.
///
/// Order is name, acronym, email domain, website, then extra keywords; each
/// expands to text, topic and email queries. Empty attributes are skipped and
/// a query whose text repeats an earlier one is dropped.
pub fn build_queries(identity: &OrgIdentity) -> Vec<Query> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut queries = Vec::new();

    for (origin, value) in identity.attributes() {
        for field in SearchField::ALL {
            let Some(text) = field.expression(&value) else {
                continue;
            };
            if seen.insert(text.clone()) {
                queries.push(Query {
                    text,
                    origin: origin.clone(),
                    field,
                });
            }
        }
    }

    queries
}

/// Topic slug: lowercase ASCII alphanumerics joined by single dashes
pub fn topic_slug(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn quote_safe(value: &str) -> String {
    value.replace('"', "")
}
