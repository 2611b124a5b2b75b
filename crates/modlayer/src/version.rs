//! Module versions.
//!
//! A version string is a release sequence, optionally followed by a
//! pre-release (after `-`) and a build (after `+`). Each part is split into
//! tokens at `.`, `-`, `+` and at every digit/non-digit transition, so
//! `1.2beta3-rc.1+b7` has the sequence `[1, 2, "beta", 3]`, the pre-release
//! `["rc", 1]`, and the build `["b", 7]`.
//!
//! Comparison walks the token lists pairwise. Numbers compare numerically,
//! strings lexically, and a number against a string compares their string
//! forms. When one list is a prefix of the other, the longer list is greater
//! unless its extra tokens are all `0`, which makes `1.0.0 == 1.0`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(u64),
    Text(String),
}

impl Token {
    fn is_zero(&self) -> bool {
        matches!(self, Token::Number(0))
    }

    fn compare(&self, other: &Token) -> Ordering {
        match (self, other) {
            (Token::Number(a), Token::Number(b)) => a.cmp(b),
            (Token::Text(a), Token::Text(b)) => a.cmp(b),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Text(s) => f.write_str(s),
        }
    }
}

/// A parsed module version.
///
/// Equality, ordering, and hashing all follow the token comparison described
/// in the module docs. [`Display`](fmt::Display) returns the original string.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    sequence: Vec<Token>,
    pre: Vec<Token>,
    build: Vec<Token>,
}

impl Version {
    /// Parses a version string.
    ///
    /// # Errors
    ///
    /// Fails on an empty string, on a string that does not start with a
    /// digit, and on an empty pre-release or build part.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let chars: Vec<char> = input.chars().collect();
        let n = chars.len();
        if n == 0 {
            return Err(VersionError::Empty);
        }
        if !chars[0].is_ascii_digit() {
            return Err(VersionError::NoLeadingDigit(input.to_string()));
        }

        let mut sequence = Vec::with_capacity(4);
        let mut pre = Vec::new();
        let mut build = Vec::new();

        let mut i = take_number(input, &chars, 0, &mut sequence)?;
        let mut c = chars[0];

        // Release sequence
        while i < n {
            c = chars[i];
            if c == '.' {
                i += 1;
                continue;
            }
            if c == '-' || c == '+' {
                i += 1;
                break;
            }
            i = if c.is_ascii_digit() {
                take_number(input, &chars, i, &mut sequence)?
            } else {
                take_string(&chars, i, &mut sequence)
            };
        }

        if c == '-' && i >= n {
            return Err(VersionError::EmptyPreRelease(input.to_string()));
        }

        // Pre-release
        while c == '-' && i < n {
            c = chars[i];
            i = if c.is_ascii_digit() {
                take_number(input, &chars, i, &mut pre)?
            } else {
                take_string(&chars, i, &mut pre)
            };
            if i >= n {
                break;
            }
            c = chars[i];
            if c == '.' || c == '-' {
                i += 1;
                // Keep looping over the pre-release.
                c = '-';
                continue;
            }
            if c == '+' {
                i += 1;
                break;
            }
            c = '-';
        }

        if c == '+' && i >= n {
            return Err(VersionError::EmptyBuild(input.to_string()));
        }

        // Build
        while i < n {
            c = chars[i];
            i = if c.is_ascii_digit() {
                take_number(input, &chars, i, &mut build)?
            } else {
                take_string(&chars, i, &mut build)
            };
            if i >= n {
                break;
            }
            c = chars[i];
            if c == '.' || c == '-' || c == '+' {
                i += 1;
            }
        }

        Ok(Self {
            raw: input.to_string(),
            sequence,
            pre,
            build,
        })
    }

    /// Returns the string this version was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn hash_tokens<H: Hasher>(tokens: &[Token], state: &mut H) {
        let significant = tokens
            .iter()
            .rposition(|t| !t.is_zero())
            .map_or(0, |last| last + 1);
        significant.hash(state);
        for token in &tokens[..significant] {
            match token {
                Token::Number(n) => {
                    0u8.hash(state);
                    n.hash(state);
                }
                Token::Text(s) => {
                    1u8.hash(state);
                    s.hash(state);
                }
            }
        }
    }
}

fn take_number(
    input: &str,
    chars: &[char],
    mut i: usize,
    acc: &mut Vec<Token>,
) -> Result<usize, VersionError> {
    let mut value: u64 = 0;
    while i < chars.len() {
        let Some(digit) = chars[i].to_digit(10) else {
            break;
        };
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(digit)))
            .ok_or_else(|| VersionError::NumberTooLarge(input.to_string()))?;
        i += 1;
    }
    acc.push(Token::Number(value));
    Ok(i)
}

fn take_string(chars: &[char], start: usize, acc: &mut Vec<Token>) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '.' || c == '-' || c == '+' || c.is_ascii_digit() {
            break;
        }
        i += 1;
    }
    acc.push(Token::Text(chars[start..i].iter().collect()));
    i
}

fn compare_tokens(a: &[Token], b: &[Token]) -> Ordering {
    let common = a.len().min(b.len());
    for (x, y) in a[..common].iter().zip(&b[..common]) {
        let ordering = x.compare(y);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    let rest = if a.len() > b.len() {
        &a[common..]
    } else {
        &b[common..]
    };
    if rest.iter().all(Token::is_zero) {
        Ordering::Equal
    } else {
        a.len().cmp(&b.len())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_tokens(&self.sequence, &other.sequence)
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                // A version without a pre-release is newer than one with.
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => compare_tokens(&self.pre, &other.pre),
            })
            .then_with(|| compare_tokens(&self.build, &other.build))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Self::hash_tokens(&self.sequence, state);
        Self::hash_tokens(&self.pre, state);
        Self::hash_tokens(&self.build, state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}
