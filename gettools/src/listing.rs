use crate::error::ParseError;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// A dotted numeric version as it appears in a directory listing, e.g.
/// `12.1.0` or a bare build number such as `20800274`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct VersionToken {
    raw: String,
    parts: Vec<u64>,
}

impl VersionToken {
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts
            .cmp(&other.parts)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl std::str::FromStr for VersionToken {
    type Err = std::num::ParseIntError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let raw = token.strip_suffix('/').unwrap_or(token);
        let parts = raw
            .split('.')
            .map(u64::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: raw.to_string(),
            parts,
        })
    }
}

/// Picks the newest version out of a listing page.
pub trait LatestVersionResolver {
    fn resolve(&mut self, url: &str, listing: &str) -> Result<VersionToken, ParseError>;
}

/// Collects digit-leading text nodes of an html directory listing.
pub struct ListingParser {
    text: Regex,
    tokens: BTreeSet<VersionToken>,
}

impl Default for ListingParser {
    fn default() -> Self {
        Self {
            text: Regex::new(r">([^<]+)<").unwrap(),
            tokens: Default::default(),
        }
    }
}

impl ListingParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, html: &str) {
        for cap in self.text.captures_iter(html) {
            let data = &cap[1];
            if data.contains('\n') || !data.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            match data.parse::<VersionToken>() {
                Ok(token) => {
                    self.tokens.insert(token);
                }
                Err(err) => log::debug!("skipping listing entry {:?}: {}", data, err),
            }
        }
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    pub fn tokens(&self) -> impl Iterator<Item = &VersionToken> {
        self.tokens.iter()
    }

    pub fn latest(&self) -> Option<&VersionToken> {
        self.tokens.iter().next_back()
    }
}

impl LatestVersionResolver for ListingParser {
    fn resolve(&mut self, url: &str, listing: &str) -> Result<VersionToken, ParseError> {
        self.feed(listing);
        log::debug!("{} versions listed at {}", self.tokens.len(), url);
        let latest = self.latest().cloned();
        self.clear();
        latest.ok_or_else(|| ParseError::NoVersions {
            url: url.to_string(),
        })
    }
}
