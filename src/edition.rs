//! # Edition Resolution
//!
//! This module decides which edition of a publication a reference resolves
//! to. The decision is a pure function of the requested edition, the upgrade
//! flag, an optional pinned override and the list of available editions.
//!
//! ## Process
//!
//! 1.  **Override**: if the manifest supplied a resolution for the
//!     reference's path, that edition is used verbatim. Availability is not
//!     queried.
//! 2.  **Pinned**: without `upgrade`, the requested edition is used as is.
//!     Whether it exists is only discovered when the publication is fetched.
//! 3.  **Upgrade**: otherwise the available editions are fetched, filtered
//!     to the requested edition and those the strategy considers compatible
//!     with it, and the greatest one under the strategy's ordering wins.
//!
//! ## Strategies
//!
//! Ordering and compatibility are injected through [`EditionStrategy`]:
//!
//! - **[`SemverStrategy`]**: semantic versions, leniently parsed
//!   (`v1.2`, `1`), compatible within the caret range of the request.
//! - **[`ReviewersEditionStrategy`]**: reviewers editions such as `2e`,
//!   `2e3u`, `2e3u1c` and drafts like `3e1d`; updates and corrections of
//!   the same edition are compatible, drafts never are.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use log::debug;
use regex::Regex;
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path::Path;

/// Ordering and compatibility rules over edition identifiers.
pub trait EditionStrategy: Send + Sync {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    /// Total order over edition identifiers.
    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Whether `candidate` may replace `requested` when upgrading.
    fn compatible(&self, requested: &str, candidate: &str) -> bool;
}

/// Which built-in strategy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditionScheme {
    #[default]
    Semver,
    Reviewers,
}

impl EditionScheme {
    pub fn strategy(self) -> Arc<dyn EditionStrategy> {
        match self {
            EditionScheme::Semver => Arc::new(SemverStrategy),
            EditionScheme::Reviewers => Arc::new(ReviewersEditionStrategy),
        }
    }
}

impl FromStr for EditionScheme {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "semver" => Ok(EditionScheme::Semver),
            "reviewers" => Ok(EditionScheme::Reviewers),
            other => Err(format!(
                "unknown edition scheme '{}', expected 'semver' or 'reviewers'",
                other
            )),
        }
    }
}

impl fmt::Display for EditionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditionScheme::Semver => f.write_str("semver"),
            EditionScheme::Reviewers => f.write_str("reviewers"),
        }
    }
}

/// Semantic versions, compatible within the caret range of the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemverStrategy;

/// Parse an edition as a semantic version, padding missing minor and patch
/// components and tolerating a `v` or `refs/tags/` prefix.
pub fn parse_semver_lenient(edition: &str) -> Option<Version> {
    let tag = edition.strip_prefix("refs/tags/").unwrap_or(edition);
    let tag = tag.strip_prefix('v').unwrap_or(tag);

    if let Ok(version) = Version::parse(tag) {
        return Some(version);
    }

    let split_at = tag.find(['-', '+']).unwrap_or(tag.len());
    let (core, suffix) = tag.split_at(split_at);
    let padded = match core.split('.').count() {
        1 => format!("{}.0.0{}", core, suffix),
        2 => format!("{}.0{}", core, suffix),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

impl EditionStrategy for SemverStrategy {
    fn name(&self) -> &'static str {
        "semver"
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        match (parse_semver_lenient(a), parse_semver_lenient(b)) {
            (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => a.cmp(b),
        }
    }

    fn compatible(&self, requested: &str, candidate: &str) -> bool {
        let (Some(requested_version), Some(candidate_version)) =
            (parse_semver_lenient(requested), parse_semver_lenient(candidate))
        else {
            return requested == candidate;
        };
        let Ok(range) = VersionReq::parse(&format!("^{}", requested_version)) else {
            return requested == candidate;
        };
        range.matches(&candidate_version) && candidate_version >= requested_version
    }
}

/// A parsed reviewers edition: `<edition>e[<update>u][<correction>c][<draft>d]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewersEdition {
    pub edition: u64,
    pub update: u64,
    pub correction: u64,
    pub draft: Option<u64>,
}

impl ReviewersEdition {
    pub fn parse(value: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^([1-9][0-9]*)e(?:([1-9][0-9]*)u)?(?:([1-9][0-9]*)c)?(?:([1-9][0-9]*)d)?$")
                .expect("reviewers edition pattern is valid")
        });
        let captures = pattern.captures(value)?;
        let number = |index: usize| -> Option<Option<u64>> {
            match captures.get(index) {
                Some(found) => found.as_str().parse().ok().map(Some),
                None => Some(None),
            }
        };
        Some(Self {
            edition: number(1)??,
            update: number(2)?.unwrap_or(0),
            correction: number(3)?.unwrap_or(0),
            draft: number(4)?,
        })
    }

    pub fn is_draft(&self) -> bool {
        self.draft.is_some()
    }

    // Drafts precede the release they lead up to.
    fn sort_key(&self) -> (u64, u64, u64, bool, u64) {
        match self.draft {
            Some(draft) => (self.edition, self.update, self.correction, false, draft),
            None => (self.edition, self.update, self.correction, true, 0),
        }
    }
}

impl PartialOrd for ReviewersEdition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReviewersEdition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Reviewers editions: updates and corrections of one edition are
/// compatible upgrades, new editions and drafts are not.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewersEditionStrategy;

impl EditionStrategy for ReviewersEditionStrategy {
    fn name(&self) -> &'static str {
        "reviewers"
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        match (ReviewersEdition::parse(a), ReviewersEdition::parse(b)) {
            (Some(ea), Some(eb)) => ea.cmp(&eb).then_with(|| a.cmp(b)),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => a.cmp(b),
        }
    }

    fn compatible(&self, requested: &str, candidate: &str) -> bool {
        match (ReviewersEdition::parse(requested), ReviewersEdition::parse(candidate)) {
            (Some(requested), Some(candidate)) => {
                candidate.edition == requested.edition
                    && !candidate.is_draft()
                    && candidate > requested
            }
            _ => requested == candidate,
        }
    }
}

/// One reference's edition question.
#[derive(Debug, Clone)]
pub struct EditionRequest<'a> {
    /// `repository/publisher/project`, for error messages.
    pub reference: &'a str,
    pub requested: &'a str,
    pub upgrade: bool,
    /// Edition pinned by a resolution override for this path.
    pub pinned: Option<&'a str>,
    pub path: &'a Path,
}

/// Where a resolved edition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditionSource {
    Override,
    Requested,
    Upgraded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEdition {
    pub edition: String,
    pub source: EditionSource,
}

/// Resolve the edition for one reference.
///
/// `load_editions` is only called for upgrade requests without an override;
/// it returns `Ok(None)` when the project has no editions list.
pub fn resolve_edition<F>(
    request: &EditionRequest<'_>,
    strategy: &dyn EditionStrategy,
    load_editions: F,
) -> Result<ResolvedEdition>
where
    F: FnOnce() -> Result<Option<Vec<String>>>,
{
    if let Some(pinned) = request.pinned {
        debug!(
            "Using pinned edition {} of {} at {}",
            pinned, request.reference, request.path
        );
        return Ok(ResolvedEdition {
            edition: pinned.to_string(),
            source: EditionSource::Override,
        });
    }

    if !request.upgrade {
        return Ok(ResolvedEdition {
            edition: request.requested.to_string(),
            source: EditionSource::Requested,
        });
    }

    let available = load_editions()?.ok_or_else(|| Error::NotFound {
        what: format!("editions of {}", request.reference),
        path: request.path.to_string(),
    })?;

    let latest = latest_compatible(strategy, request.requested, &available).ok_or_else(|| {
        Error::EditionResolutionFailed {
            reference: request.reference.to_string(),
            requested: request.requested.to_string(),
            path: request.path.to_string(),
        }
    })?;

    debug!(
        "Upgraded {} from {} to {} at {} ({} strategy)",
        request.reference,
        request.requested,
        latest,
        request.path,
        strategy.name()
    );

    Ok(ResolvedEdition {
        edition: latest.clone(),
        source: EditionSource::Upgraded,
    })
}

/// The greatest available edition that is the requested one or compatible
/// with it.
pub fn latest_compatible<'a>(
    strategy: &dyn EditionStrategy,
    requested: &str,
    available: &'a [String],
) -> Option<&'a String> {
    available
        .iter()
        .filter(|edition| edition.as_str() == requested || strategy.compatible(requested, edition))
        .max_by(|a, b| strategy.compare(a, b))
}
