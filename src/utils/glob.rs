//! Glob patterns over `/`-separated relative keys.
//!
//! | Pattern  | Matches                                   |
//! |----------|-------------------------------------------|
//! | `*`      | any run of characters except `/`          |
//! | `?`      | one character except `/`                  |
//! | `**/`    | zero or more leading directories          |
//! | `**`     | anything, including `/`                   |
//! | `{a,b}`  | either alternative                        |
//!
//! Patterns are anchored: `*.html` matches `index.html` but not
//! `blog/index.html`.

use anyhow::{Result, bail};
use regex::Regex;

/// A compiled set of glob patterns; a key matches if any pattern matches.
#[derive(Debug, Clone, Default)]
pub struct GlobSet {
    patterns: Vec<(String, Regex)>,
}

impl GlobSet {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Ok((p.to_string(), Regex::new(&to_regex(p)?)?))
            })
            .collect::<Result<_>>()?;
        Ok(Self { patterns })
    }

    pub fn is_match(&self, key: &str) -> bool {
        self.patterns.iter().any(|(_, re)| re.is_match(key))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(p, _)| p.as_str())
    }
}

/// Translate a glob into an anchored regex.
fn to_regex(glob: &str) -> Result<String> {
    let mut re = String::from("^");
    let chars: Vec<char> = glob.chars().collect();
    let mut in_group = false;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    re.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    re.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            '{' if !in_group => {
                in_group = true;
                re.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                re.push(')');
            }
            ',' if in_group => re.push('|'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    if in_group {
        bail!("unclosed `{{` in glob `{glob}`");
    }
    re.push('$');
    Ok(re)
}
