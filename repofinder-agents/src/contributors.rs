//! Contributor profile lookups
//!
//! The same people contribute to many of an organization's repositories, so
//! profiles (with their owned repositories) are cached for the whole run.
//! Per-repository contribution counts are applied on top of the cached
//! profile. Issue commenters only need an affiliation, so theirs are cached
//! separately without fetching repositories.

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::debug;

use repofinder_core::{ContributorProfile, OrgIdentity, RepoId};
use repofinder_github::{ApiError, ApiResult, ContributorRef, SharedHost};

/// Profiles fetched at once for one repository
const PROFILE_CONCURRENCY: usize = 4;

pub struct ContributorCollector {
    host: SharedHost,
    identity: Arc<OrgIdentity>,
    max_contributors: usize,
    max_user_repos: usize,
    cache: DashMap<String, ContributorProfile>,
    affiliations: DashMap<String, String>,
}

impl ContributorCollector {
    pub fn new(
        host: SharedHost,
        identity: Arc<OrgIdentity>,
        max_contributors: usize,
        max_user_repos: usize,
    ) -> Self {
        Self {
            host,
            identity,
            max_contributors,
            max_user_repos,
            cache: DashMap::new(),
            affiliations: DashMap::new(),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Annotated profiles for a repository's top contributors.
    ///
    /// Fails only when the listing itself fails or the host rejects our
    /// credentials; an individual profile that cannot be fetched is dropped.
    pub async fn collect(&self, id: &RepoId) -> ApiResult<Vec<ContributorProfile>> {
        let refs = self.host.contributors(id, self.max_contributors).await?;
        debug!("{} lists {} contributors", id, refs.len());

        let profiles: Vec<ApiResult<Option<ContributorProfile>>> = stream::iter(refs)
            .map(|contributor| self.profile(contributor))
            .buffered(PROFILE_CONCURRENCY)
            .collect()
            .await;

        let mut collected = Vec::new();
        for profile in profiles {
            if let Some(profile) = profile? {
                collected.push(profile);
            }
        }
        Ok(collected)
    }

    async fn profile(&self, contributor: ContributorRef) -> ApiResult<Option<ContributorProfile>> {
        let cached = self.cache.get(&contributor.login).map(|p| p.clone());
        let mut profile = match cached {
            Some(profile) => profile,
            None => match self.fetch(&contributor.login).await {
                Ok(profile) => {
                    self.cache.insert(contributor.login.clone(), profile.clone());
                    profile
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("Profile of {} unavailable: {}", contributor.login, e);
                    return Ok(None);
                }
            },
        };
        profile.contributions = contributor.contributions;
        Ok(Some(profile))
    }

    /// Affiliation of any user; None when the profile cannot be fetched
    pub async fn affiliation(&self, login: &str) -> ApiResult<Option<String>> {
        let known = self
            .cache
            .get(login)
            .map(|p| p.affiliation.clone())
            .or_else(|| self.affiliations.get(login).map(|a| a.clone()));
        if known.is_some() {
            return Ok(known);
        }
        match self.host.user(login).await {
            Ok(mut profile) => {
                profile.annotate(&self.identity);
                self.affiliations
                    .insert(login.to_string(), profile.affiliation.clone());
                Ok(Some(profile.affiliation))
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!("Profile of {} unavailable: {}", login, e);
                Ok(None)
            }
        }
    }

    /// The first `limit` of `logins` whose affiliation is not the
    /// organization, `Unknown` included. Unfetchable profiles are left out.
    pub async fn external(&self, logins: &[String], limit: usize) -> ApiResult<Vec<String>> {
        let org = self.identity.name.trim().to_lowercase();
        let resolved: Vec<(&String, ApiResult<Option<String>>)> = stream::iter(logins.iter().take(limit))
            .map(|login| async move { (login, self.affiliation(login).await) })
            .buffered(PROFILE_CONCURRENCY)
            .collect()
            .await;

        let mut external = Vec::new();
        for (login, affiliation) in resolved {
            if affiliation?.is_some_and(|a| a.trim().to_lowercase() != org) {
                external.push(login.clone());
            }
        }
        Ok(external)
    }

    async fn fetch(&self, login: &str) -> Result<ContributorProfile, ApiError> {
        let mut profile = self.host.user(login).await?;
        match self.host.user_repositories(login, self.max_user_repos).await {
            Ok(repos) => profile.repositories = repos,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("Repositories of {} unavailable: {}", login, e),
        }
        profile.annotate(&self.identity);
        Ok(profile)
    }
}
