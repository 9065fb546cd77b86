//! Hierarchical keyword classifier
//!
//! Selection walks the domain tree top-down: at each level the child of the
//! already selected parent with the most hits wins, ties going to the first
//! declared. A level with no hits is `Unknown`, as is everything below it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{
    DomainTaxonomy, KeywordTaxonomyNode, ProjectType, ProjectTypeTaxonomy, TaxonomyLevel,
    UNKNOWN_LABEL,
};

/// A keyword found in the corpus and the node it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub level: TaxonomyLevel,
    pub category: String,
    pub keyword: String,
}

/// Best-match labels from the domain tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainClassification {
    pub domain: String,
    pub field: String,
    pub subfield: String,
    pub topic: String,
    pub matched_keywords: Vec<KeywordMatch>,
    /// Hit counts of every node with at least one hit, by level then name
    pub hierarchical_scores: BTreeMap<TaxonomyLevel, BTreeMap<String, usize>>,
}

impl DomainClassification {
    pub fn label(&self, level: TaxonomyLevel) -> &str {
        match level {
            TaxonomyLevel::Domain => &self.domain,
            TaxonomyLevel::Field => &self.field,
            TaxonomyLevel::Subfield => &self.subfield,
            TaxonomyLevel::Topic => &self.topic,
        }
    }
}

/// Project-type decision with per-category evidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTypeResult {
    pub project_type: ProjectType,
    pub scores: BTreeMap<ProjectType, usize>,
    pub matches: BTreeMap<ProjectType, Vec<String>>,
}

// Subtree hit totals mirroring the taxonomy shape
struct ScoredNode {
    total: usize,
    children: Vec<ScoredNode>,
}

/// Classifies corpora against the domain and project-type taxonomies
#[derive(Debug, Clone)]
pub struct Classifier {
    domains: DomainTaxonomy,
    project_types: ProjectTypeTaxonomy,
    scientific_domains: Vec<String>,
}

impl Classifier {
    pub fn new(
        domains: DomainTaxonomy,
        project_types: ProjectTypeTaxonomy,
        scientific_domains: Vec<String>,
    ) -> Self {
        Self {
            domains,
            project_types,
            scientific_domains,
        }
    }

    pub fn domains(&self) -> &DomainTaxonomy {
        &self.domains
    }

    /// Whether a selected domain is on the scientific allowlist
    pub fn is_scientific(&self, domain: &str) -> bool {
        self.scientific_domains
            .iter()
            .any(|d| d.trim().eq_ignore_ascii_case(domain.trim()))
    }

    pub fn classify_domain(&self, corpus: &str) -> DomainClassification {
        let mut matched_keywords = Vec::new();
        let mut hierarchical_scores: BTreeMap<TaxonomyLevel, BTreeMap<String, usize>> =
            BTreeMap::new();

        let scored: Vec<ScoredNode> = self
            .domains
            .domains
            .iter()
            .map(|d| score_node(d, corpus, &mut matched_keywords, &mut hierarchical_scores))
            .collect();

        let mut labels: Vec<String> = Vec::with_capacity(4);
        let mut nodes: &[KeywordTaxonomyNode] = &self.domains.domains;
        let mut scores: &[ScoredNode] = &scored;

        for _ in TaxonomyLevel::ALL {
            match select(scores) {
                Some(idx) => {
                    labels.push(nodes[idx].name.clone());
                    scores = &scores[idx].children;
                    nodes = &nodes[idx].children;
                }
                None => break,
            }
        }
        while labels.len() < 4 {
            labels.push(UNKNOWN_LABEL.to_string());
        }

        let mut labels = labels.into_iter();
        DomainClassification {
            domain: labels.next().unwrap_or_default(),
            field: labels.next().unwrap_or_default(),
            subfield: labels.next().unwrap_or_default(),
            topic: labels.next().unwrap_or_default(),
            matched_keywords,
            hierarchical_scores,
        }
    }

    /// Pick a project type; `extra` is appended to the corpus (root file names)
    pub fn classify_project_type(&self, corpus: &str, extra: &[String]) -> ProjectTypeResult {
        let text = if extra.is_empty() {
            corpus.to_string()
        } else {
            format!("{}\n{}", corpus, extra.join(" "))
        };

        let mut scores = BTreeMap::new();
        let mut matches = BTreeMap::new();
        for project_type in ProjectType::ALL {
            scores.insert(project_type, 0);
            matches.insert(project_type, Vec::new());
        }

        for category in &self.project_types.categories {
            let found: Vec<String> = category
                .keywords
                .iter()
                .filter(|k| k.is_in(&text))
                .map(|k| k.text.clone())
                .collect();
            scores.insert(category.project_type, found.len());
            matches.insert(category.project_type, found);
        }

        let best = scores.values().copied().max().unwrap_or(0);
        let leaders: Vec<ProjectType> = scores
            .iter()
            .filter(|(_, &s)| s == best)
            .map(|(p, _)| *p)
            .collect();

        let project_type = if best == 0 || leaders.len() != 1 {
            ProjectType::Other
        } else {
            leaders[0]
        };

        ProjectTypeResult {
            project_type,
            scores,
            matches,
        }
    }
}

fn score_node(
    node: &KeywordTaxonomyNode,
    corpus: &str,
    matched: &mut Vec<KeywordMatch>,
    hierarchical: &mut BTreeMap<TaxonomyLevel, BTreeMap<String, usize>>,
) -> ScoredNode {
    let mut own = 0;
    for keyword in &node.keywords {
        if keyword.is_in(corpus) {
            own += 1;
            matched.push(KeywordMatch {
                level: node.level,
                category: node.name.clone(),
                keyword: keyword.text.clone(),
            });
        }
    }

    let children: Vec<ScoredNode> = node
        .children
        .iter()
        .map(|c| score_node(c, corpus, matched, hierarchical))
        .collect();
    let total = own + children.iter().map(|c| c.total).sum::<usize>();

    if total > 0 {
        *hierarchical
            .entry(node.level)
            .or_default()
            .entry(node.name.clone())
            .or_insert(0) += total;
    }

    ScoredNode { total, children }
}

// First index with the highest non-zero total
fn select(scores: &[ScoredNode]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (idx, node) in scores.iter().enumerate() {
        if node.total == 0 {
            continue;
        }
        match best {
            Some((_, total)) if total >= node.total => {}
            _ => best = Some((idx, node.total)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(level: TaxonomyLevel, name: &str, keywords: &[&str]) -> KeywordTaxonomyNode {
        KeywordTaxonomyNode::new(level, name)
            .with_keywords(keywords)
            .unwrap()
    }

    fn sample_taxonomy() -> DomainTaxonomy {
        use TaxonomyLevel::*;
        let d1 = node(Domain, "D1", &["delta"])
            .with_child(
                node(Field, "F1", &["foxtrot"])
                    .with_child(node(Subfield, "S1", &["sierra"]).with_child(node(Topic, "T1", &["tango"]))),
            )
            .with_child(
                node(Field, "F2", &["fjord"])
                    .with_child(node(Subfield, "S2", &["salsa"]).with_child(node(Topic, "T2", &["tulip"]))),
            );
        let d2 = node(Domain, "D2", &["dune"])
            .with_child(node(Field, "F3", &["fern"]).with_child(node(Subfield, "S3", &["sage"])));
        DomainTaxonomy {
            domains: vec![d1, d2],
        }
    }

    fn classifier() -> Classifier {
        Classifier::new(
            sample_taxonomy(),
            ProjectTypeTaxonomy::load_embedded().unwrap(),
            vec!["D1".to_string()],
        )
    }

    #[test]
    fn test_partial_path_yields_unknown_below() {
        let result = classifier().classify_domain("delta and a fjord");
        assert_eq!(result.domain, "D1");
        assert_eq!(result.field, "F2");
        assert_eq!(result.subfield, UNKNOWN_LABEL);
        assert_eq!(result.topic, UNKNOWN_LABEL);
        assert_eq!(result.matched_keywords.len(), 2);
        assert_eq!(result.hierarchical_scores[&TaxonomyLevel::Domain]["D1"], 2);
        assert_eq!(result.hierarchical_scores[&TaxonomyLevel::Field]["F2"], 1);
    }

    #[test]
    fn test_no_hits_all_unknown() {
        let result = classifier().classify_domain("nothing relevant here");
        for level in TaxonomyLevel::ALL {
            assert_eq!(result.label(level), UNKNOWN_LABEL);
        }
        assert!(result.matched_keywords.is_empty());
        assert!(result.hierarchical_scores.is_empty());
    }

    #[test]
    fn test_topic_hits_support_ancestors() {
        let result = classifier().classify_domain("a tulip");
        assert_eq!(result.domain, "D1");
        assert_eq!(result.field, "F2");
        assert_eq!(result.subfield, "S2");
        assert_eq!(result.topic, "T2");
    }

    #[test]
    fn test_ties_go_to_first_declared() {
        let result = classifier().classify_domain("delta dune foxtrot fjord");
        assert_eq!(result.domain, "D1");
        assert_eq!(result.field, "F1");
    }

    #[test]
    fn test_selection_stays_under_parent() {
        // D2 wins on its own keywords; F1 hits do not leak into D2's children
        let result = classifier().classify_domain("dune fern sage foxtrot");
        assert_eq!(result.domain, "D2");
        assert_eq!(result.field, "F3");
        assert_eq!(result.subfield, "S3");
        assert_eq!(result.topic, UNKNOWN_LABEL);
    }

    #[test]
    fn test_scientific_allowlist() {
        let c = classifier();
        assert!(c.is_scientific("D1"));
        assert!(c.is_scientific(" d1 "));
        assert!(!c.is_scientific("D2"));
        assert!(!c.is_scientific(UNKNOWN_LABEL));
    }

    #[test]
    fn test_project_type_winner() {
        let result = classifier().classify_project_type("Homework 2 for CS101: the assignment", &[]);
        assert_eq!(result.project_type, ProjectType::ClassProject);
        assert_eq!(result.scores[&ProjectType::ClassProject], 2);
        assert!(result.matches[&ProjectType::ClassProject].contains(&"homework".to_string()));
    }

    #[test]
    fn test_project_type_zero_hits_is_other() {
        let result = classifier().classify_project_type("zzz", &[]);
        assert_eq!(result.project_type, ProjectType::Other);
        assert!(result.scores.values().all(|&s| s == 0));
    }

    #[test]
    fn test_project_type_tie_is_other() {
        let result = classifier().classify_project_type("homework thesis", &[]);
        assert_eq!(result.scores[&ProjectType::ClassProject], 1);
        assert_eq!(result.scores[&ProjectType::ResearchProject], 1);
        assert_eq!(result.project_type, ProjectType::Other);
    }

    #[test]
    fn test_project_type_uses_file_names() {
        let files = vec!["syllabus.pdf".to_string()];
        let result = classifier().classify_project_type("", &files);
        assert_eq!(result.project_type, ProjectType::Syllabus);
    }
}
