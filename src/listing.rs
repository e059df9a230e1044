use scraper::{Html, Selector};

use crate::pattern::PackagePattern;

/// Rule for deciding which of several matching remote filenames is newest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RemotePick {
    /// Lexicographically greatest name. The fixed-width timestamp token puts
    /// the most significant fields first, so the greatest name is the newest
    /// build no matter how the listing happens to be sorted.
    #[default]
    ByName,
    /// Last match in page order. Trusts the server to sort the listing
    /// oldest-first, the way autoindex pages usually do.
    LastListed,
}

impl RemotePick {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "by-name" => Some(Self::ByName),
            "last-listed" => Some(Self::LastListed),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ByName => "by-name",
            Self::LastListed => "last-listed",
        }
    }
}

/// Extracts every conventional package filename from a directory-listing
/// body, in page order. Anchor text is scanned first since index pages link
/// each file; when no anchor yields a match the raw body is scanned instead,
/// which covers plain-text listings.
pub fn extract_matches(body: &str, pattern: &PackagePattern) -> Vec<String> {
    let document = Html::parse_document(body);
    let mut names = Vec::new();
    if let Ok(anchors) = Selector::parse("a") {
        for anchor in document.select(&anchors) {
            let text = anchor.text().collect::<String>();
            for name in pattern.find_all(&text) {
                names.push(name.to_owned());
            }
        }
    }
    if names.is_empty() {
        names = pattern
            .find_all(body)
            .into_iter()
            .map(str::to_owned)
            .collect();
    }
    names
}

/// Applies the pick rule to the extracted matches. None when the listing
/// contained no conventional filename at all.
pub fn pick_latest(matches: &[String], pick: RemotePick) -> Option<&String> {
    match pick {
        RemotePick::ByName => matches.iter().max(),
        RemotePick::LastListed => matches.last(),
    }
}
