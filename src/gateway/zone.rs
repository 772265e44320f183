//! Path zones and the requirement each one carries.
//!
//! Zones are declared once at startup. A path is classified by the most
//! specific matching prefix; when two zones declare the same prefix the later
//! declaration wins. Matching is segment aligned (`/omk/odk` covers
//! `/omk/odk/forms` but not `/omk/odkx`), ignores ASCII case, and runs on the
//! [`canonical_path`]: percent-decoded once, with `.`/`..` segments and
//! repeated slashes resolved. The gate forwards that same path upstream, so
//! what was classified is what gets served.

use std::{collections::BTreeSet, fmt, str::FromStr};
use thiserror::Error;

use super::principal::Role;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// No authentication is attempted at all.
    Public,
    Authenticated,
    /// Authenticated and holding one of these roles.
    RequiresRole(BTreeSet<Role>),
}

impl Requirement {
    #[must_use]
    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self::RequiresRole(roles.into_iter().collect())
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Authenticated => f.write_str("authenticated"),
            Self::RequiresRole(roles) => {
                let names: Vec<&str> = roles.iter().map(|role| role.as_str()).collect();
                write!(f, "role:{}", names.join(","))
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ZoneParseError {
    #[error("zone must look like PREFIX=REQUIREMENT: {0}")]
    Syntax(String),
    #[error("zone prefix must start with '/': {0}")]
    Prefix(String),
    #[error("unknown requirement: {0}")]
    Requirement(String),
    #[error("role zone needs at least one role: {0}")]
    EmptyRoles(String),
    #[error("unknown role in zone: {0}")]
    Role(String),
}

impl FromStr for Requirement {
    type Err = ZoneParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value.to_ascii_lowercase().as_str() {
            "public" => return Ok(Self::Public),
            "authenticated" | "auth" => return Ok(Self::Authenticated),
            _ => {}
        }
        let Some(list) = value
            .strip_prefix("role:")
            .or_else(|| value.strip_prefix("roles:"))
        else {
            return Err(ZoneParseError::Requirement(value.to_string()));
        };
        let mut roles = BTreeSet::new();
        for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            let role = name
                .parse::<Role>()
                .map_err(|_| ZoneParseError::Role(name.to_string()))?;
            roles.insert(role);
        }
        if roles.is_empty() {
            return Err(ZoneParseError::EmptyRoles(value.to_string()));
        }
        Ok(Self::RequiresRole(roles))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Zone {
    prefix: String,
    requirement: Requirement,
}

impl Zone {
    #[must_use]
    pub fn new(prefix: &str, requirement: Requirement) -> Self {
        Self {
            prefix: normalize_path(prefix),
            requirement,
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    fn covers(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return true;
        }
        let (Some(head), rest) = (path.get(..self.prefix.len()), path.get(self.prefix.len()..))
        else {
            return false;
        };
        head.eq_ignore_ascii_case(&self.prefix)
            && rest.is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

impl FromStr for Zone {
    type Err = ZoneParseError;

    /// `PREFIX=public`, `PREFIX=authenticated` or `PREFIX=role:admin,data-viewer`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((prefix, requirement)) = s.split_once('=') else {
            return Err(ZoneParseError::Syntax(s.to_string()));
        };
        let prefix = prefix.trim();
        if !prefix.starts_with('/') {
            return Err(ZoneParseError::Prefix(prefix.to_string()));
        }
        Ok(Self::new(prefix, requirement.parse()?))
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.prefix, self.requirement)
    }
}

/// Declared zones plus the requirement for paths none of them cover.
#[derive(Clone, Debug)]
pub struct ZoneTable {
    zones: Vec<Zone>,
    fallback: Requirement,
}

impl Default for ZoneTable {
    /// OpenRosa endpoints stay open for data-collection clients, the aggregate
    /// API needs a login, and raw submissions need an admin or data viewer.
    fn default() -> Self {
        Self::new(vec![
            Zone::new("/formList", Requirement::Public),
            Zone::new("/view", Requirement::Public),
            Zone::new("/omk/odk", Requirement::Authenticated),
            Zone::new(
                "/omk/data/submissions",
                Requirement::roles([Role::Admin, Role::DataViewer]),
            ),
        ])
    }
}

impl ZoneTable {
    #[must_use]
    pub fn new(zones: Vec<Zone>) -> Self {
        Self {
            zones,
            fallback: Requirement::Public,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Requirement) -> Self {
        self.fallback = fallback;
        self
    }

    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// The zone governing `path`, if any declared zone covers it.
    #[must_use]
    pub fn matching(&self, path: &str) -> Option<&Zone> {
        let path = canonical_path(path).unwrap_or_else(|| normalize_path(path));
        let mut best: Option<&Zone> = None;
        for zone in &self.zones {
            if !zone.covers(&path) {
                continue;
            }
            // `>=` lets a later declaration of the same prefix override.
            if best.map_or(true, |current| zone.prefix.len() >= current.prefix.len()) {
                best = Some(zone);
            }
        }
        best
    }

    /// Requirement for a request path as it appears on the wire.
    #[must_use]
    pub fn classify(&self, path: &str) -> &Requirement {
        self.matching(path)
            .map_or(&self.fallback, |zone| &zone.requirement)
    }
}

/// Resolve `.`/`..` segments and collapse repeated slashes.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Percent-decode `path` once, then normalize it. An encoded `/` or `.`
/// counts as the real thing. A trailing slash survives.
///
/// Returns `None` when the decoded bytes are not UTF-8.
#[must_use]
pub fn canonical_path(path: &str) -> Option<String> {
    let decoded = urlencoding::decode(path).ok()?;
    let mut canonical = normalize_path(&decoded);
    if decoded.ends_with('/') && canonical != "/" {
        canonical.push('/');
    }
    Some(canonical)
}

/// Re-encode a canonical path segment by segment for the wire.
#[must_use]
pub fn encode_path(canonical: &str) -> String {
    canonical
        .split('/')
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_mount_points() {
        let table = ZoneTable::default();
        assert_eq!(table.classify("/formList"), &Requirement::Public);
        assert_eq!(table.classify("/view/submissionList"), &Requirement::Public);
        assert_eq!(table.classify("/omk/odk/forms"), &Requirement::Authenticated);
        assert_eq!(
            table.classify("/omk/data/submissions/form1/a.json"),
            &Requirement::roles([Role::Admin, Role::DataViewer])
        );
        assert_eq!(table.classify("/omk/data/forms/x.xml"), &Requirement::Public);
        assert_eq!(table.classify("/omk/pages"), &Requirement::Public);
    }

    #[test]
    fn most_specific_prefix_wins() {
        let table = ZoneTable::new(vec![
            Zone::new("/omk/data/submissions", Requirement::roles([Role::Admin])),
            Zone::new("/omk", Requirement::Authenticated),
        ]);
        assert_eq!(
            table.classify("/omk/data/submissions/a"),
            &Requirement::roles([Role::Admin])
        );
        assert_eq!(table.classify("/omk/data"), &Requirement::Authenticated);
    }

    #[test]
    fn later_declaration_overrides_same_prefix() {
        let table = ZoneTable::new(vec![
            Zone::new("/omk/odk", Requirement::Authenticated),
            Zone::new("/omk/odk/", Requirement::Public),
        ]);
        assert_eq!(table.classify("/omk/odk/forms"), &Requirement::Public);
    }

    #[test]
    fn prefixes_are_segment_aligned() {
        let table = ZoneTable::new(vec![Zone::new("/omk/odk", Requirement::Authenticated)]);
        assert_eq!(table.classify("/omk/odkx"), &Requirement::Public);
        assert_eq!(table.classify("/omk/odk"), &Requirement::Authenticated);
    }

    #[test]
    fn path_tricks_do_not_escape_zones() {
        let table = ZoneTable::default();
        assert_eq!(
            table.classify("/formList/../omk/odk/forms"),
            &Requirement::Authenticated
        );
        assert_eq!(table.classify("//omk//odk/forms"), &Requirement::Authenticated);
        assert_eq!(table.classify("/OMK/ODK/forms"), &Requirement::Authenticated);
        assert_eq!(table.classify("/omk/./odk"), &Requirement::Authenticated);
    }

    #[test]
    fn encoded_segments_do_not_escape_zones() {
        let table = ZoneTable::default();
        let submissions = Requirement::roles([Role::Admin, Role::DataViewer]);
        assert_eq!(
            table.classify("/formList/%2e%2e/omk/data/submissions/form1/a.json"),
            &submissions
        );
        assert_eq!(
            table.classify("/formList/%2E%2E/omk/data/submissions/a.json"),
            &submissions
        );
        assert_eq!(table.classify("/omk/data/%73ubmissions/form1/a.json"), &submissions);
        assert_eq!(table.classify("/omk/data%2Fsubmissions/a.json"), &submissions);
        // Decoded once only: a double-encoded dot stays a literal segment.
        assert_eq!(
            table.classify("/formList/%252e%252e/omk/data/submissions"),
            &Requirement::Public
        );
    }

    #[test]
    fn canonical_paths_round_trip_to_the_wire() {
        assert_eq!(
            canonical_path("/formList/%2e%2e/omk/data/submissions/a.json").as_deref(),
            Some("/omk/data/submissions/a.json")
        );
        assert_eq!(canonical_path("/omk/pages/").as_deref(), Some("/omk/pages/"));
        assert_eq!(canonical_path("/a%20b/%25").as_deref(), Some("/a b/%"));
        assert_eq!(canonical_path("/%ff"), None);

        assert_eq!(encode_path("/a b/%/"), "/a%20b/%25/");
        assert_eq!(encode_path("/formList/%2e%2e"), "/formList/%252e%252e");
        assert_eq!(encode_path("/"), "/");
    }

    #[test]
    fn fallback_applies_to_uncovered_paths() {
        let table = ZoneTable::new(vec![Zone::new("/public", Requirement::Public)])
            .with_fallback(Requirement::Authenticated);
        assert_eq!(table.classify("/public/a"), &Requirement::Public);
        assert_eq!(table.classify("/anything"), &Requirement::Authenticated);
    }

    #[test]
    fn root_zone_covers_everything() {
        let table = ZoneTable::new(vec![Zone::new("/", Requirement::Authenticated)]);
        assert_eq!(table.classify("/x/y"), &Requirement::Authenticated);
    }

    #[test]
    fn parses_zone_syntax() {
        assert_eq!(
            "/omk/odk=authenticated".parse::<Zone>(),
            Ok(Zone::new("/omk/odk", Requirement::Authenticated))
        );
        assert_eq!(
            "/omk/data/submissions=role:admin, data-viewer".parse::<Zone>(),
            Ok(Zone::new(
                "/omk/data/submissions",
                Requirement::roles([Role::Admin, Role::DataViewer])
            ))
        );
        assert_eq!(
            "/formList=PUBLIC".parse::<Zone>(),
            Ok(Zone::new("/formList", Requirement::Public))
        );
    }

    #[test]
    fn rejects_bad_zone_syntax() {
        assert!(matches!("/omk".parse::<Zone>(), Err(ZoneParseError::Syntax(_))));
        assert!(matches!("omk=public".parse::<Zone>(), Err(ZoneParseError::Prefix(_))));
        assert!(matches!(
            "/omk=private".parse::<Zone>(),
            Err(ZoneParseError::Requirement(_))
        ));
        assert!(matches!(
            "/omk=role:".parse::<Zone>(),
            Err(ZoneParseError::EmptyRoles(_))
        ));
        assert!(matches!(
            "/omk=role:root".parse::<Zone>(),
            Err(ZoneParseError::Role(_))
        ));
    }

    #[test]
    fn displays_round_trip_syntax() {
        let zone = Zone::new("/omk/data/submissions/", Requirement::roles([Role::DataViewer, Role::Admin]));
        assert_eq!(zone.to_string(), "/omk/data/submissions=role:admin,data-viewer");
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/a/b/../c/./d/"), "/a/c/d");
        assert_eq!(normalize_path("/../../etc"), "/etc");
    }
}
