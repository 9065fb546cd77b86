//! Run configuration from `repofinder.toml`
//!
//! ```toml
//! [activity]
//! window-months = 6
//!
//! [activity.weights]      # percentages, custom tables must total 100
//! commits = 40
//! prs_merged = 60
//!
//! [activity.ceilings]
//! commits = 1000
//!
//! [extraction]
//! concurrency = 8
//! max-contributors = 50
//!
//! [classification]
//! taxonomy = "oaont.json"
//! scientific-domains = ["Life Sciences", "Physical Sciences"]
//! ```
//!
//! Every section is optional; missing values take their defaults.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{
    ActivityWindow, Classifier, ConfigError, ConfigResult, DomainTaxonomy, ProjectTypeTaxonomy,
    WeightTable, DEFAULT_WINDOW_MONTHS,
};

/// File name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "repofinder.toml";

/// Default worker pool size for candidate extraction
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Domains that mark a repository as scientific unless configured otherwise
pub const DEFAULT_SCIENTIFIC_DOMAINS: &[&str] = &[
    "Physical Sciences",
    "Life Sciences",
    "Health Sciences",
    "Social Sciences",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// File the settings came from
    #[serde(skip)]
    pub source: Option<PathBuf>,
    pub activity: ActivitySettings,
    pub extraction: ExtractionSettings,
    pub classification: ClassificationSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ActivitySettings {
    pub window_months: u32,
    /// Replaces the default weights when non-empty
    pub weights: BTreeMap<String, f64>,
    pub ceilings: BTreeMap<String, f64>,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            window_months: DEFAULT_WINDOW_MONTHS,
            weights: BTreeMap::new(),
            ceilings: BTreeMap::new(),
        }
    }
}

impl ActivitySettings {
    pub fn weight_table(&self) -> ConfigResult<WeightTable> {
        WeightTable::default().with_overrides(&self.weights, &self.ceilings)
    }

    pub fn window(&self) -> ConfigResult<ActivityWindow> {
        ActivityWindow::last_months(self.window_months)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractionSettings {
    /// Candidates processed at once
    pub concurrency: usize,
    /// Search queries in flight at once
    pub search_concurrency: usize,
    /// Contributors examined per repository
    pub max_contributors: usize,
    /// Repositories scanned per contributor
    pub max_user_repos: usize,
    /// Pages fetched per search query (GitHub stops at 10 pages of 100)
    pub max_search_pages: usize,
    /// Pull requests whose reviews are fetched, newest first
    pub max_reviewed_pulls: usize,
    /// Issue commenters whose profiles are checked for affiliation
    pub max_participants: usize,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            search_concurrency: 1,
            max_contributors: 100,
            max_user_repos: 100,
            max_search_pages: 10,
            max_reviewed_pulls: 100,
            max_participants: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClassificationSettings {
    /// Domain taxonomy file (`.toml` tree or `.json` flat entries)
    pub taxonomy: Option<PathBuf>,
    /// Project-type taxonomy file
    pub project_types: Option<PathBuf>,
    pub scientific_domains: Vec<String>,
}

impl Default for ClassificationSettings {
    fn default() -> Self {
        Self {
            taxonomy: None,
            project_types: None,
            scientific_domains: DEFAULT_SCIENTIFIC_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

impl ClassificationSettings {
    /// Load taxonomies (embedded unless overridden) into a classifier
    pub fn build_classifier(&self) -> ConfigResult<Classifier> {
        let domains = match &self.taxonomy {
            Some(path) => DomainTaxonomy::load_path(path)?,
            None => DomainTaxonomy::load_embedded()?,
        };
        let project_types = match &self.project_types {
            Some(path) => ProjectTypeTaxonomy::load_path(path)?,
            None => ProjectTypeTaxonomy::load_embedded()?,
        };
        debug!(
            "Loaded taxonomy: {} domains, {} nodes",
            domains.len(),
            domains.node_count()
        );
        Ok(Classifier::new(domains, project_types, self.scientific_domains.clone()))
    }
}

impl Settings {
    /// Load settings from a TOML file; relative taxonomy paths resolve
    /// against the file's directory
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Settings = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if let Some(dir) = path.parent() {
            let resolve = |p: &mut Option<PathBuf>| {
                if let Some(inner) = p.as_mut() {
                    if inner.is_relative() {
                        *inner = dir.join(&*inner);
                    }
                }
            };
            resolve(&mut settings.classification.taxonomy);
            resolve(&mut settings.classification.project_types);
        }

        settings.source = Some(path.to_path_buf());
        settings.validate()?;
        Ok(settings)
    }

    /// Load `repofinder.toml` from `directory` if present, else defaults
    pub fn discover(directory: &Path) -> ConfigResult<Self> {
        let candidate = directory.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Check everything that can be checked without loading taxonomies
    pub fn validate(&self) -> ConfigResult<()> {
        self.activity.weight_table()?;
        if self.activity.window_months == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self.extraction.concurrency == 0 {
            return Err(ConfigError::Missing("extraction.concurrency must be at least 1".to_string()));
        }
        if self.extraction.search_concurrency == 0 {
            return Err(ConfigError::Missing(
                "extraction.search-concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
