//! Keyword taxonomies
//!
//! Two taxonomies drive classification: a domain tree
//! (domain → field → subfield → topic) and a flat list of project types.
//! Defaults are embedded TOML; either can be replaced from a file. The domain
//! tree additionally accepts the flat JSON entry format
//! `[{"Domain", "Field", "Subfield", "Topic", "Keywords"}]`.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{ConfigError, ConfigResult};

/// A keyword matched on word boundaries, case-insensitively
#[derive(Debug, Clone)]
pub struct Keyword {
    pub text: String,
    regex: Regex,
}

impl Keyword {
    pub fn new(text: &str) -> ConfigResult<Self> {
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Err(ConfigError::Taxonomy("empty keyword".to_string()));
        }
        let pattern = format!(r"(?:^|\W){}(?:\W|$)", regex::escape(&text));
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ConfigError::Taxonomy(format!("keyword {:?}: {}", text, e)))?;
        Ok(Self { text, regex })
    }

    pub fn is_in(&self, corpus: &str) -> bool {
        self.regex.is_match(corpus)
    }
}

impl PartialEq for Keyword {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

fn compile_keywords(raw: &[String]) -> ConfigResult<Vec<Keyword>> {
    let mut out: Vec<Keyword> = Vec::new();
    for text in raw {
        if text.trim().is_empty() {
            continue;
        }
        let keyword = Keyword::new(text)?;
        if !out.contains(&keyword) {
            out.push(keyword);
        }
    }
    Ok(out)
}

/// Depth of a node in the domain tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyLevel {
    Domain,
    Field,
    Subfield,
    Topic,
}

impl TaxonomyLevel {
    pub const ALL: [TaxonomyLevel; 4] = [
        TaxonomyLevel::Domain,
        TaxonomyLevel::Field,
        TaxonomyLevel::Subfield,
        TaxonomyLevel::Topic,
    ];

    pub fn child(&self) -> Option<TaxonomyLevel> {
        match self {
            TaxonomyLevel::Domain => Some(TaxonomyLevel::Field),
            TaxonomyLevel::Field => Some(TaxonomyLevel::Subfield),
            TaxonomyLevel::Subfield => Some(TaxonomyLevel::Topic),
            TaxonomyLevel::Topic => None,
        }
    }
}

impl std::fmt::Display for TaxonomyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaxonomyLevel::Domain => "domain",
            TaxonomyLevel::Field => "field",
            TaxonomyLevel::Subfield => "subfield",
            TaxonomyLevel::Topic => "topic",
        };
        f.write_str(s)
    }
}

/// A node of the domain tree
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordTaxonomyNode {
    pub level: TaxonomyLevel,
    pub name: String,
    pub keywords: Vec<Keyword>,
    pub children: Vec<KeywordTaxonomyNode>,
}

impl KeywordTaxonomyNode {
    pub fn new(level: TaxonomyLevel, name: &str) -> Self {
        Self {
            level,
            name: name.trim().to_string(),
            keywords: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> ConfigResult<Self> {
        let raw: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();
        for keyword in compile_keywords(&raw)? {
            if !self.keywords.contains(&keyword) {
                self.keywords.push(keyword);
            }
        }
        Ok(self)
    }

    pub fn with_child(mut self, child: KeywordTaxonomyNode) -> Self {
        self.children.push(child);
        self
    }

    fn child_mut(&mut self, level: TaxonomyLevel, name: &str) -> &mut KeywordTaxonomyNode {
        let idx = match self.children.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                self.children.push(KeywordTaxonomyNode::new(level, name));
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    /// Number of nodes in this subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }
}

// On-disk node: one shape for every level, children under the next level's key
#[derive(Debug, Deserialize)]
struct RawNode {
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    field: Vec<RawNode>,
    #[serde(default)]
    subfield: Vec<RawNode>,
    #[serde(default)]
    topic: Vec<RawNode>,
}

#[derive(Debug, Deserialize)]
struct RawDomainFile {
    #[serde(default)]
    domain: Vec<RawNode>,
}

impl RawNode {
    fn into_node(self, level: TaxonomyLevel) -> ConfigResult<KeywordTaxonomyNode> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Taxonomy(format!("unnamed {} node", level)));
        }
        let mut node = KeywordTaxonomyNode::new(level, &self.name);
        node.keywords = compile_keywords(&self.keywords)?;
        let children = match level {
            TaxonomyLevel::Domain => self.field,
            TaxonomyLevel::Field => self.subfield,
            TaxonomyLevel::Subfield => self.topic,
            TaxonomyLevel::Topic => Vec::new(),
        };
        if let Some(child_level) = level.child() {
            for child in children {
                node.children.push(child.into_node(child_level)?);
            }
        }
        Ok(node)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawKeywords {
    List(Vec<String>),
    Joined(String),
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    #[serde(rename = "Domain")]
    domain: String,
    #[serde(rename = "Field")]
    field: String,
    #[serde(rename = "Subfield")]
    subfield: String,
    #[serde(rename = "Topic")]
    topic: String,
    #[serde(rename = "Keywords", default)]
    keywords: Option<RawKeywords>,
}

/// The domain → field → subfield → topic tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainTaxonomy {
    pub domains: Vec<KeywordTaxonomyNode>,
}

impl DomainTaxonomy {
    /// Load the embedded default tree
    pub fn load_embedded() -> ConfigResult<Self> {
        Self::from_toml_str(include_str!("../taxonomy/domains.toml"))
    }

    /// Load from a `.json` flat entry file or a `.toml` tree file
    pub fn load_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_entries(&content)
        } else {
            Self::from_toml_str(&content)
        };
        parsed.map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let raw: RawDomainFile =
            toml::from_str(content).map_err(|e| ConfigError::Taxonomy(e.to_string()))?;
        let domains = raw
            .domain
            .into_iter()
            .map(|d| d.into_node(TaxonomyLevel::Domain))
            .collect::<ConfigResult<Vec<_>>>()?;
        Self::validated(domains)
    }

    /// Build a tree from flat entries; keywords attach to the topic node and
    /// nodes keep first-seen order
    pub fn from_json_entries(content: &str) -> ConfigResult<Self> {
        let entries: Vec<FlatEntry> =
            serde_json::from_str(content).map_err(|e| ConfigError::Taxonomy(e.to_string()))?;

        let mut root = KeywordTaxonomyNode::new(TaxonomyLevel::Domain, "root");
        for entry in entries {
            let keywords = match entry.keywords {
                Some(RawKeywords::List(list)) => list,
                Some(RawKeywords::Joined(joined)) => joined
                    .split([',', ';'])
                    .map(|k| k.to_string())
                    .collect(),
                None => Vec::new(),
            };
            let compiled = compile_keywords(&keywords)?;

            let topic = root
                .child_mut(TaxonomyLevel::Domain, entry.domain.trim())
                .child_mut(TaxonomyLevel::Field, entry.field.trim())
                .child_mut(TaxonomyLevel::Subfield, entry.subfield.trim())
                .child_mut(TaxonomyLevel::Topic, entry.topic.trim());
            for keyword in compiled {
                if !topic.keywords.contains(&keyword) {
                    topic.keywords.push(keyword);
                }
            }
        }

        Self::validated(root.children)
    }

    fn validated(domains: Vec<KeywordTaxonomyNode>) -> ConfigResult<Self> {
        if domains.is_empty() {
            return Err(ConfigError::Taxonomy("taxonomy has no domains".to_string()));
        }
        Ok(Self { domains })
    }

    pub fn get(&self, name: &str) -> Option<&KeywordTaxonomyNode> {
        self.domains.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.domains.iter().map(|d| d.node_count()).sum()
    }
}

/// Coarse kind of project a repository is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProjectType {
    #[serde(rename = "Class Project")]
    ClassProject,
    #[serde(rename = "Research Project")]
    ResearchProject,
    #[serde(rename = "Syllabus")]
    Syllabus,
    #[serde(rename = "Other")]
    Other,
}

impl ProjectType {
    pub const ALL: [ProjectType; 4] = [
        ProjectType::ClassProject,
        ProjectType::ResearchProject,
        ProjectType::Syllabus,
        ProjectType::Other,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProjectType::ClassProject => "Class Project",
            ProjectType::ResearchProject => "Research Project",
            ProjectType::Syllabus => "Syllabus",
            ProjectType::Other => "Other",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One project type with its keywords
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTypeCategory {
    pub project_type: ProjectType,
    pub keywords: Vec<Keyword>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    name: String,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawProjectTypeFile {
    #[serde(default)]
    category: Vec<RawCategory>,
}

/// Project-type keyword lists
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTypeTaxonomy {
    pub categories: Vec<ProjectTypeCategory>,
}

impl ProjectTypeTaxonomy {
    pub fn load_embedded() -> ConfigResult<Self> {
        Self::from_toml_str(include_str!("../taxonomy/project_types.toml"))
    }

    pub fn load_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let raw: RawProjectTypeFile =
            toml::from_str(content).map_err(|e| ConfigError::Taxonomy(e.to_string()))?;

        let mut categories: Vec<ProjectTypeCategory> = Vec::new();
        for cat in raw.category {
            let project_type = ProjectType::from_name(&cat.name)
                .ok_or_else(|| ConfigError::Taxonomy(format!("unknown project type {:?}", cat.name)))?;
            if categories.iter().any(|c| c.project_type == project_type) {
                return Err(ConfigError::Taxonomy(format!("duplicate project type {:?}", cat.name)));
            }
            categories.push(ProjectTypeCategory {
                project_type,
                keywords: compile_keywords(&cat.keywords)?,
            });
        }

        if categories.is_empty() {
            return Err(ConfigError::Taxonomy("no project types defined".to_string()));
        }
        Ok(Self { categories })
    }

    pub fn get(&self, project_type: ProjectType) -> Option<&ProjectTypeCategory> {
        self.categories.iter().find(|c| c.project_type == project_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_word_boundaries() {
        let hw = Keyword::new("hw").unwrap();
        assert!(hw.is_in("Submit HW 3 by Friday"));
        assert!(hw.is_in("hw"));
        assert!(!hw.is_in("however"));

        let phrase = Keyword::new("used in").unwrap();
        assert!(phrase.is_in("This tool was used in our paper."));

        let cpp = Keyword::new("c++").unwrap();
        assert!(cpp.is_in("written in C++."));
    }

    #[test]
    fn test_load_embedded_domains() {
        let taxonomy = DomainTaxonomy::load_embedded().unwrap();
        assert!(taxonomy.len() >= 4);
        assert!(taxonomy.get("Life Sciences").is_some());
        let life = taxonomy.get("Life Sciences").unwrap();
        assert!(!life.children.is_empty());
        assert!(life.children.iter().all(|f| f.level == TaxonomyLevel::Field));
    }

    #[test]
    fn test_load_embedded_project_types() {
        let taxonomy = ProjectTypeTaxonomy::load_embedded().unwrap();
        for project_type in ProjectType::ALL {
            assert!(taxonomy.get(project_type).is_some(), "{}", project_type);
        }
        let class = taxonomy.get(ProjectType::ClassProject).unwrap();
        assert!(class.keywords.iter().any(|k| k.text == "homework"));
    }

    #[test]
    fn test_toml_tree() {
        let toml = r#"
            [[domain]]
            name = "D1"
            keywords = ["alpha"]

            [[domain.field]]
            name = "F1"
            keywords = ["beta", "BETA"]

            [[domain.field.subfield]]
            name = "S1"

            [[domain.field.subfield.topic]]
            name = "T1"
            keywords = ["gamma"]
        "#;
        let taxonomy = DomainTaxonomy::from_toml_str(toml).unwrap();
        let d1 = &taxonomy.domains[0];
        assert_eq!(d1.children[0].keywords.len(), 1);
        let t1 = &d1.children[0].children[0].children[0];
        assert_eq!(t1.level, TaxonomyLevel::Topic);
        assert_eq!(t1.keywords[0].text, "gamma");
        assert_eq!(taxonomy.node_count(), 4);
    }

    #[test]
    fn test_json_entries_merge() {
        let json = r#"[
            {"Domain": "Life Sciences", "Field": "Biology", "Subfield": "Genetics", "Topic": "Genomics", "Keywords": ["genome", "dna"]},
            {"Domain": "Life Sciences", "Field": "Biology", "Subfield": "Genetics", "Topic": "Epigenetics", "Keywords": "methylation; chromatin"},
            {"Domain": "Physical Sciences", "Field": "Physics", "Subfield": "Optics", "Topic": "Lasers", "Keywords": ["laser"]}
        ]"#;
        let taxonomy = DomainTaxonomy::from_json_entries(json).unwrap();
        assert_eq!(taxonomy.len(), 2);
        let genetics = &taxonomy.domains[0].children[0].children[0];
        assert_eq!(genetics.children.len(), 2);
        assert_eq!(genetics.children[1].keywords[1].text, "chromatin");
    }

    #[test]
    fn test_empty_taxonomy_rejected() {
        assert!(DomainTaxonomy::from_toml_str("").is_err());
        assert!(DomainTaxonomy::from_json_entries("[]").is_err());
    }

    #[test]
    fn test_unknown_project_type_rejected() {
        let toml = r#"
            [[category]]
            name = "Startup"
            keywords = ["seed"]
        "#;
        assert!(ProjectTypeTaxonomy::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_load_path_reports_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[[domain]]\nkeywords = 3").unwrap();
        match DomainTaxonomy::load_path(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
