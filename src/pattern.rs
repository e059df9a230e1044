use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

pub const TIMESTAMP_DIGITS: usize = 12;

/// Naming convention for distributable packages: the product name, one
/// whitespace character, a parenthesized 12-digit build timestamp and the
/// file extension, e.g. `Product (202301012359).jar`. Product and extension
/// compare ASCII-case-insensitively.
#[derive(Clone, Debug)]
pub struct PackagePattern {
    product: String,
    extension: String,
}

impl PackagePattern {
    pub fn new(product: &str, extension: &str) -> Self {
        let extension = if extension.starts_with('.') {
            extension.to_owned()
        } else {
            format!(".{extension}")
        };
        Self {
            product: product.to_owned(),
            extension,
        }
    }

    /// Human-readable form of the convention for log and error text.
    pub fn describe(&self) -> String {
        format!("{} (YYYYMMDDHHMM){}", self.product, self.extension)
    }

    /// True when `name` as a whole follows the convention.
    pub fn matches(&self, name: &str) -> bool {
        self.timestamp_token(name).is_some()
    }

    /// The 12-digit token of a conventional filename, or None when the name
    /// does not follow the convention exactly.
    pub fn timestamp_token<'n>(&self, name: &'n str) -> Option<&'n str> {
        match self.match_at(name) {
            Some((whole, token)) if whole.len() == name.len() => Some(token),
            _ => None,
        }
    }

    /// Every conventional filename embedded in `text`, in text order.
    /// Matches do not overlap; scanning resumes after each match.
    pub fn find_all<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut found = Vec::new();
        let mut rest = text;
        while !rest.is_empty() {
            if let Some((whole, _)) = self.match_at(rest) {
                found.push(whole);
                rest = &rest[whole.len()..];
            } else {
                let step = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
                rest = &rest[step..];
            }
        }
        found
    }

    /// Matches the convention at the start of `text`, returning the whole
    /// matched slice and the timestamp token within it.
    fn match_at<'t>(&self, text: &'t str) -> Option<(&'t str, &'t str)> {
        let rest = strip_prefix_ignore_ascii_case(text, &self.product)?;
        let mut chars = rest.chars();
        if !chars.next()?.is_whitespace() {
            return None;
        }
        let rest = chars.as_str().strip_prefix('(')?;
        let token = rest.get(..TIMESTAMP_DIGITS)?;
        if !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let rest = rest.get(TIMESTAMP_DIGITS..)?.strip_prefix(')')?;
        let tail = rest.get(..self.extension.len())?;
        if !tail.eq_ignore_ascii_case(&self.extension) {
            return None;
        }
        let matched = text.len() - rest.len() + self.extension.len();
        Some((&text[..matched], token))
    }
}

/// Renders a timestamp token as a calendar date for log output. Returns
/// None when the digits do not form a real date; the convention itself only
/// guarantees 12 digits, not a valid moment in time.
pub fn timestamp_label(token: &str) -> Option<String> {
    if token.len() != TIMESTAMP_DIGITS || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = token[..4].parse::<i32>().ok()?;
    let part = |range: std::ops::Range<usize>| token[range].parse::<u32>().ok();
    let date = NaiveDate::from_ymd_opt(year, part(4..6)?, part(6..8)?)?;
    let time = NaiveTime::from_hms_opt(part(8..10)?, part(10..12)?, 0)?;
    Some(NaiveDateTime::new(date, time).format("%Y-%m-%d %H:%M").to_string())
}

fn strip_prefix_ignore_ascii_case<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}
