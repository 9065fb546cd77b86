//! Organization identity
//!
//! The identity is the only user input that drives discovery and the
//! confidence rubric. It is created once per run and never mutated.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// The organization whose repositories are being searched for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgIdentity {
    /// Full name, e.g. "University of California, Santa Cruz"
    pub name: String,
    /// Short name, e.g. "UCSC"
    pub acronym: String,
    /// Mail domain, e.g. "ucsc.edu"
    pub email_domain: String,
    /// Website URL, e.g. "https://www.ucsc.edu"
    pub website_url: String,
    /// Extra search keywords, in entry order without duplicates
    #[serde(default)]
    pub extra_keywords: Vec<String>,
}

/// Identity attribute a query or identifier was derived from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityAttribute {
    Name,
    Acronym,
    EmailDomain,
    Website,
    Keyword(String),
}

impl std::fmt::Display for IdentityAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Acronym => write!(f, "acronym"),
            Self::EmailDomain => write!(f, "email_domain"),
            Self::Website => write!(f, "website"),
            Self::Keyword(k) => write!(f, "keyword:{}", k),
        }
    }
}

impl OrgIdentity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            ..Self::default()
        }
    }

    pub fn with_acronym(mut self, acronym: &str) -> Self {
        self.acronym = acronym.trim().to_string();
        self
    }

    pub fn with_email_domain(mut self, domain: &str) -> Self {
        self.email_domain = domain.trim().trim_start_matches('@').to_string();
        self
    }

    pub fn with_website(mut self, url: &str) -> Self {
        self.website_url = url.trim().to_string();
        self
    }

    pub fn with_keyword(mut self, keyword: &str) -> Self {
        self.add_keyword(keyword);
        self
    }

    /// Add an extra keyword, ignoring blanks and case-insensitive duplicates
    pub fn add_keyword(&mut self, keyword: &str) {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return;
        }
        let lowered = keyword.to_lowercase();
        if !self.extra_keywords.iter().any(|k| k.to_lowercase() == lowered) {
            self.extra_keywords.push(keyword.to_string());
        }
    }

    /// Website reduced to its host: scheme, `www.` and path removed
    pub fn website_host(&self) -> String {
        website_host(&self.website_url)
    }

    /// Non-empty identity attributes in query order
    pub fn attributes(&self) -> Vec<(IdentityAttribute, String)> {
        let mut attrs = Vec::new();
        let fixed = [
            (IdentityAttribute::Name, self.name.trim().to_string()),
            (IdentityAttribute::Acronym, self.acronym.trim().to_string()),
            (IdentityAttribute::EmailDomain, self.email_domain.trim().to_string()),
            (IdentityAttribute::Website, self.website_host()),
        ];
        for (attr, value) in fixed {
            if !value.is_empty() {
                attrs.push((attr, value));
            }
        }
        for keyword in &self.extra_keywords {
            let keyword = keyword.trim();
            if !keyword.is_empty() {
                attrs.push((IdentityAttribute::Keyword(keyword.to_string()), keyword.to_string()));
            }
        }
        attrs
    }

    /// Lowercased identifiers matched by the confidence rubric
    ///
    /// Extra keywords are search aids only and never count as identity evidence.
    pub fn identifiers(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (attr, value) in self.attributes() {
            if matches!(attr, IdentityAttribute::Keyword(_)) {
                continue;
            }
            let lowered = value.to_lowercase();
            if !out.contains(&lowered) {
                out.push(lowered);
            }
        }
        out
    }

    /// Reject an identity that cannot produce a single query
    pub fn validate(&self) -> ConfigResult<()> {
        if self.attributes().is_empty() {
            return Err(ConfigError::EmptyIdentity);
        }
        Ok(())
    }

    /// File-name-safe label, preferring the acronym
    pub fn slug(&self) -> String {
        let base = if !self.acronym.trim().is_empty() {
            self.acronym.trim()
        } else if !self.name.trim().is_empty() {
            self.name.trim()
        } else {
            "repositories"
        };
        let slug: String = base
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        slug.trim_matches('_').to_string()
    }
}

fn website_host(url: &str) -> String {
    let url = url.trim().to_lowercase();
    let without_scheme = url.split("://").last().unwrap_or_default();
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    host.trim_start_matches("www.").to_string()
}
