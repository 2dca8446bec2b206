//! Upstream version resolution.
//!
//! Two strategies, chosen from the package's source URL:
//!
//! - **Release lookup.** Sources hosted under `github.com/{owner}/{repo}/…`
//!   are checked against the release API's `releases/latest` endpoint. The
//!   returned `tag_name` is compared to the manifest version as an exact
//!   string, so `v1.2.3` against `1.2.3` is an update.
//! - **Increment probing.** Any other source is probed by bumping one
//!   component of the dot-separated version at a time, least significant
//!   first, without resetting lower components, and sending a HEAD for the
//!   templated URL. The first candidate that exists wins.
//!
//! Probing is a best-effort heuristic, not an enumeration of upstream
//! versions. It never tries a carry (`1.9.9` → `1.10.0` is not attempted)
//! and cannot see gaps, so an up-to-date answer from it is not a guarantee.

use serde::Deserialize;
use url::Url;

use crate::http::HttpTransport;
use crate::manifest::Package;
use crate::template;

/// Outcome of checking one package for a newer upstream version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheckResult {
    /// The mirrored version is current.
    UpToDate,
    /// Upstream has this newer version.
    UpdateAvailable(String),
    /// The check could not reach a conclusion; the reason is kept for the
    /// run report. Treated as up to date.
    Indeterminate(String),
}

impl VersionCheckResult {
    /// The new version, if an update was found.
    pub fn new_version(&self) -> Option<&str> {
        match self {
            VersionCheckResult::UpdateAvailable(v) => Some(v),
            _ => None,
        }
    }
}

/// How a package is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Query a release API endpoint.
    ReleaseLookup { endpoint: String },
    /// Probe incremented versions against the source template.
    IncrementProbe,
}

/// Body of a `releases/latest` response; only the tag matters.
#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Derive the `releases/latest` endpoint for a source URL hosted on GitHub.
///
/// Everything after the repository segment (`releases/download/…`) is
/// dropped. Returns `None` for any other host.
pub fn release_endpoint(source_url: &str, release_api: &str) -> Option<String> {
    let url = Url::parse(source_url).ok()?;
    let host = url.host_str()?;
    if !host.eq_ignore_ascii_case("github.com") && !host.eq_ignore_ascii_case("www.github.com") {
        return None;
    }
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?;
    Some(format!(
        "{}/repos/{owner}/{repo}/releases/latest",
        release_api.trim_end_matches('/')
    ))
}

/// Pick the strategy for a package.
pub fn select_strategy(package: &Package, release_api: &str) -> Strategy {
    let url = package.source_url(&package.version);
    match release_endpoint(&url, release_api) {
        Some(endpoint) => Strategy::ReleaseLookup { endpoint },
        None => Strategy::IncrementProbe,
    }
}

/// Lazy sequence of probe candidates for a version, least significant
/// component first. Yields exactly one candidate per component.
#[derive(Debug, Clone)]
pub struct CandidateVersions {
    components: Vec<String>,
    /// Components not yet bumped; the next one bumped is `remaining - 1`.
    remaining: usize,
}

impl CandidateVersions {
    /// Parse a version made of dot-separated non-negative integers.
    ///
    /// Returns `None` for anything else (`1.2-rc1`, `v1.2`, `1..2`).
    pub fn new(version: &str) -> Option<Self> {
        let components: Vec<String> = version.split('.').map(str::to_string).collect();
        let numeric = components
            .iter()
            .all(|c| !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit()) && c.parse::<u64>().is_ok());
        if !numeric {
            return None;
        }
        let remaining = components.len();
        Some(CandidateVersions {
            components,
            remaining,
        })
    }
}

impl Iterator for CandidateVersions {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.remaining > 0 {
            self.remaining -= 1;
            let idx = self.remaining;
            let current = &self.components[idx];
            let Some(bumped) = current.parse::<u64>().ok().and_then(|n| n.checked_add(1)) else {
                continue;
            };
            // Keep zero padding: "01" -> "02".
            let bumped = format!("{bumped:0width$}", width = current.len());
            let mut parts = self.components.clone();
            parts[idx] = bumped;
            return Some(parts.join("."));
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

/// Checks packages against their upstream sources.
pub struct Resolver<'a> {
    transport: &'a dyn HttpTransport,
    release_api: String,
}

impl<'a> Resolver<'a> {
    /// Create a resolver using `release_api` as the release-hosting API base.
    pub fn new(transport: &'a dyn HttpTransport, release_api: &str) -> Self {
        Resolver {
            transport,
            release_api: release_api.to_string(),
        }
    }

    /// Decide whether a newer version of `package` exists upstream.
    ///
    /// Never fails; problems reaching a conclusion come back as
    /// [`VersionCheckResult::Indeterminate`].
    pub fn resolve(&self, package: &Package) -> VersionCheckResult {
        let result = match select_strategy(package, &self.release_api) {
            Strategy::ReleaseLookup { endpoint } => self.lookup_release(package, &endpoint),
            Strategy::IncrementProbe => self.probe_increments(package),
        };
        match &result {
            VersionCheckResult::UpToDate => {
                log::info!("{} {} is up to date", package.name, package.version)
            }
            VersionCheckResult::UpdateAvailable(v) => {
                log::info!("{} {} -> {v}", package.name, package.version)
            }
            VersionCheckResult::Indeterminate(reason) => {
                log::warn!("{}: could not check for updates: {reason}", package.name)
            }
        }
        result
    }

    fn lookup_release(&self, package: &Package, endpoint: &str) -> VersionCheckResult {
        let resp = match self.transport.get(endpoint) {
            Ok(resp) => resp,
            Err(e) => return VersionCheckResult::Indeterminate(e.to_string()),
        };
        if !resp.is_success() {
            return VersionCheckResult::Indeterminate(format!(
                "release lookup {endpoint} returned HTTP {}",
                resp.status
            ));
        }
        let release: LatestRelease = match serde_json::from_slice(&resp.body) {
            Ok(release) => release,
            Err(e) => {
                return VersionCheckResult::Indeterminate(format!(
                    "release lookup {endpoint} returned no usable tag_name: {e}"
                ))
            }
        };
        if release.tag_name.is_empty() {
            return VersionCheckResult::Indeterminate(format!(
                "release lookup {endpoint} returned an empty tag_name"
            ));
        }

        if release.tag_name != package.version {
            VersionCheckResult::UpdateAvailable(release.tag_name)
        } else {
            VersionCheckResult::UpToDate
        }
    }

    fn probe_increments(&self, package: &Package) -> VersionCheckResult {
        if !template::has_version_placeholder(&package.source) {
            return VersionCheckResult::Indeterminate(format!(
                "source has no {} placeholder to probe",
                template::VERSION_PLACEHOLDER
            ));
        }
        let Some(candidates) = CandidateVersions::new(&package.version) else {
            return VersionCheckResult::Indeterminate(format!(
                "version '{}' is not dot-separated integers; cannot probe",
                package.version
            ));
        };

        for candidate in candidates {
            let url = package.source_url(&candidate);
            match self.transport.head(&url) {
                Ok(status) if (200..300).contains(&status) => {
                    return VersionCheckResult::UpdateAvailable(candidate);
                }
                Ok(status) => log::debug!("probe {url}: HTTP {status}"),
                Err(e) => return VersionCheckResult::Indeterminate(format!("probe failed: {e}")),
            }
        }
        VersionCheckResult::UpToDate
    }
}
