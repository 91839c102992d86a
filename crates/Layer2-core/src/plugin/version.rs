//! Plugin Version - 버전과 버전 범위
//!
//! 지원하는 범위 문법: `*`, `1.x`, `1.2.x`, `1.2.3`, `=1.2.3`, `^1.2.0`,
//! `~1.2.0`, `>=1.0.0 <2.0.0`, `1.0.0 - 1.4.0`, `^1.0.0 || ^2.0.0`.
//! prerelease 버전도 일반 순서 비교로 범위에 포함된다.

use extrt_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ============================================================================
// PluginVersion
// ============================================================================

/// 플러그인 버전
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PluginVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl PluginVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    /// 버전 문자열 파싱 (예: "1.2.3", "v1.2.3-rc.1", "1.2.3+build.5")
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);
        // build metadata 는 비교에 쓰이지 않음
        let s = s.split('+').next()?;

        let (core, pre) = match s.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return None,
            None => (s, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return None;
        }

        Some(Self {
            major: parts[0].parse().ok()?,
            minor: parts[1].parse().ok()?,
            patch: parts[2].parse().ok()?,
            pre,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

impl Ord for PluginVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple()
            .cmp(&other.triple())
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                // 1.0.0-rc < 1.0.0
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

impl PartialOrd for PluginVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// prerelease 식별자 비교 (숫자 식별자는 숫자로)
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

impl std::fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

impl Default for PluginVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl TryFrom<String> for PluginVersion {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        PluginVersion::parse(&value).ok_or_else(|| format!("invalid version '{}'", value))
    }
}

impl From<PluginVersion> for String {
    fn from(version: PluginVersion) -> Self {
        version.to_string()
    }
}

impl std::str::FromStr for PluginVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PluginVersion::parse(s)
            .ok_or_else(|| Error::InvalidManifest(format!("invalid version '{}'", s)))
    }
}

// ============================================================================
// VersionRange
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: PluginVersion,
}

impl Comparator {
    fn new(op: Op, version: PluginVersion) -> Self {
        Self { op, version }
    }

    fn matches(&self, v: &PluginVersion) -> bool {
        let ord = v.cmp(&self.version);
        match self.op {
            Op::Eq => ord == Ordering::Equal,
            Op::Gt => ord == Ordering::Greater,
            Op::Gte => ord != Ordering::Less,
            Op::Lt => ord == Ordering::Less,
            Op::Lte => ord != Ordering::Greater,
        }
    }
}

/// 부분 버전 (`1`, `1.2`, `1.x`, `1.2.3-rc.1`)
#[derive(Debug, Clone)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Option<String>,
}

impl Partial {
    fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('v').unwrap_or(s);
        let s = s.split('+').next()?;
        let (core, pre) = match s.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return None,
            None => (s, None),
        };

        let mut nums = [None, None, None];
        let parts: Vec<&str> = core.split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return None;
        }
        for (slot, part) in nums.iter_mut().zip(parts.iter()) {
            *slot = match *part {
                "x" | "X" | "*" => None,
                n => Some(n.parse().ok()?),
            };
        }

        // 와일드카드 뒤에 숫자가 오는 형태(1.x.3)는 거부
        if nums[0].is_none() && (nums[1].is_some() || nums[2].is_some()) {
            return None;
        }
        if nums[1].is_none() && nums[2].is_some() {
            return None;
        }

        Some(Self {
            major: nums[0],
            minor: nums[1],
            patch: nums[2],
            pre,
        })
    }

    fn floor(&self) -> PluginVersion {
        PluginVersion {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            pre: self.pre.clone(),
        }
    }

    fn is_full(&self) -> bool {
        self.patch.is_some()
    }

    /// 와일드카드 부분의 다음 상한 (1.2 -> 1.3.0, 1 -> 2.0.0)
    fn wildcard_ceiling(&self) -> Option<PluginVersion> {
        match (self.major, self.minor, self.patch) {
            (None, _, _) => None,
            (Some(major), None, _) => Some(PluginVersion::new(major + 1, 0, 0)),
            (Some(major), Some(minor), None) => Some(PluginVersion::new(major, minor + 1, 0)),
            _ => None,
        }
    }
}

/// 버전 범위 (OR 로 묶인 AND 비교식 집합)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    raw: String,
    sets: Vec<Vec<Comparator>>,
}

impl VersionRange {
    /// 모든 버전을 허용하는 범위
    pub fn any() -> Self {
        Self {
            raw: "*".to_string(),
            sets: vec![vec![]],
        }
    }

    /// 범위 문자열 파싱
    pub fn parse(s: &str) -> Result<Self> {
        let raw = s.trim().to_string();
        let mut sets = Vec::new();

        for alternative in raw.split("||") {
            let set = parse_set(alternative.trim())
                .ok_or_else(|| Error::InvalidManifest(format!("invalid version range '{}'", raw)))?;
            sets.push(set);
        }

        Ok(Self { raw, sets })
    }

    /// 버전이 범위를 만족하는지
    pub fn matches(&self, version: &PluginVersion) -> bool {
        self.sets
            .iter()
            .any(|set| set.iter().all(|c| c.matches(version)))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        VersionRange::parse(&value).map_err(|e| e.to_string())
    }
}

impl From<VersionRange> for String {
    fn from(range: VersionRange) -> Self {
        range.raw
    }
}

impl std::str::FromStr for VersionRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        VersionRange::parse(s)
    }
}

/// 공백으로 구분된 AND 집합 하나 파싱
fn parse_set(s: &str) -> Option<Vec<Comparator>> {
    if s.is_empty() || s == "*" || s == "x" || s == "X" {
        return Some(vec![]);
    }

    // ">= 1.2.3" 처럼 연산자와 버전 사이 공백 허용
    let mut tokens: Vec<String> = Vec::new();
    for token in s.split_whitespace() {
        match tokens.last_mut() {
            Some(last) if is_bare_operator(last) => last.push_str(token),
            _ => tokens.push(token.to_string()),
        }
    }

    // hyphen 범위: "1.0.0 - 2.0.0"
    if tokens.len() == 3 && tokens[1] == "-" {
        let low = Partial::parse(&tokens[0])?;
        let high = Partial::parse(&tokens[2])?;
        let mut set = vec![Comparator::new(Op::Gte, low.floor())];
        match high.wildcard_ceiling() {
            Some(ceiling) if !high.is_full() => set.push(Comparator::new(Op::Lt, ceiling)),
            _ if high.major.is_some() => set.push(Comparator::new(Op::Lte, high.floor())),
            _ => {}
        }
        return Some(set);
    }

    let mut set = Vec::new();
    for token in &tokens {
        set.extend(parse_comparator(token)?);
    }
    Some(set)
}

fn is_bare_operator(token: &str) -> bool {
    matches!(token, "<" | "<=" | ">" | ">=" | "=" | "^" | "~")
}

fn parse_comparator(token: &str) -> Option<Vec<Comparator>> {
    if token == "*" || token == "x" || token == "X" {
        return Some(vec![]);
    }

    if let Some(rest) = token.strip_prefix('^') {
        let p = Partial::parse(rest)?;
        let floor = p.floor();
        let ceiling = match (p.major?, p.minor, p.patch) {
            (0, Some(0), Some(patch)) => PluginVersion::new(0, 0, patch + 1),
            (0, Some(minor), _) => PluginVersion::new(0, minor + 1, 0),
            (major, _, _) => PluginVersion::new(major + 1, 0, 0),
        };
        return Some(vec![
            Comparator::new(Op::Gte, floor),
            Comparator::new(Op::Lt, ceiling),
        ]);
    }

    if let Some(rest) = token.strip_prefix('~') {
        let p = Partial::parse(rest)?;
        let major = p.major?;
        let ceiling = match p.minor {
            Some(minor) => PluginVersion::new(major, minor + 1, 0),
            None => PluginVersion::new(major + 1, 0, 0),
        };
        return Some(vec![
            Comparator::new(Op::Gte, p.floor()),
            Comparator::new(Op::Lt, ceiling),
        ]);
    }

    let (op, rest) = if let Some(rest) = token.strip_prefix(">=") {
        (Some(Op::Gte), rest)
    } else if let Some(rest) = token.strip_prefix("<=") {
        (Some(Op::Lte), rest)
    } else if let Some(rest) = token.strip_prefix('>') {
        (Some(Op::Gt), rest)
    } else if let Some(rest) = token.strip_prefix('<') {
        (Some(Op::Lt), rest)
    } else if let Some(rest) = token.strip_prefix('=') {
        (None, rest)
    } else {
        (None, token)
    };

    let p = Partial::parse(rest)?;
    let comparators = match op {
        // 정확한 버전 또는 와일드카드
        None => match p.wildcard_ceiling() {
            Some(ceiling) => vec![
                Comparator::new(Op::Gte, p.floor()),
                Comparator::new(Op::Lt, ceiling),
            ],
            None if p.major.is_none() => vec![],
            None => vec![Comparator::new(Op::Eq, p.floor())],
        },
        // >1.2 는 1.3.0 이상
        Some(Op::Gt) if !p.is_full() => match p.wildcard_ceiling() {
            Some(ceiling) => vec![Comparator::new(Op::Gte, ceiling)],
            None => vec![],
        },
        // <=1.2 는 1.3.0 미만
        Some(Op::Lte) if !p.is_full() => match p.wildcard_ceiling() {
            Some(ceiling) => vec![Comparator::new(Op::Lt, ceiling)],
            None => vec![],
        },
        Some(op) => vec![Comparator::new(op, p.floor())],
    };

    Some(comparators)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> PluginVersion {
        PluginVersion::parse(s).unwrap()
    }

    fn satisfies(version: &str, range: &str) -> bool {
        VersionRange::parse(range).unwrap().matches(&v(version))
    }

    #[test]
    fn test_version_parse() {
        let version = v("1.2.3");
        assert_eq!(version.major, 1);
        assert_eq!(version.minor, 2);
        assert_eq!(version.patch, 3);

        assert_eq!(v("v2.0.0-rc.1").pre.as_deref(), Some("rc.1"));
        assert_eq!(v("1.0.0+build.7"), PluginVersion::new(1, 0, 0));
        assert!(PluginVersion::parse("1.2").is_none());
        assert!(PluginVersion::parse("1.2.three").is_none());
    }

    #[test]
    fn test_version_ordering() {
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha.2") < v("1.0.0-alpha.10"));
        assert!(v("1.0.0-alpha") < v("1.0.0-beta"));
        assert!(v("1.10.0") > v("1.9.9"));
    }

    #[test]
    fn test_caret_and_tilde() {
        assert!(satisfies("1.4.0", "^1.2.0"));
        assert!(!satisfies("2.0.0", "^1.2.0"));
        assert!(!satisfies("1.1.9", "^1.2.0"));
        assert!(satisfies("0.2.5", "^0.2.1"));
        assert!(!satisfies("0.3.0", "^0.2.1"));
        assert!(satisfies("1.2.9", "~1.2.0"));
        assert!(!satisfies("1.3.0", "~1.2.0"));
    }

    #[test]
    fn test_wildcards_and_exact() {
        assert!(satisfies("7.7.7", "*"));
        assert!(satisfies("1.9.0", "1.x"));
        assert!(!satisfies("2.0.0", "1.x"));
        assert!(satisfies("1.2.4", "1.2"));
        assert!(satisfies("1.2.3", "=1.2.3"));
        assert!(!satisfies("1.2.4", "1.2.3"));
    }

    #[test]
    fn test_comparators_and_alternatives() {
        assert!(satisfies("1.5.0", ">=1.0.0 <2.0.0"));
        assert!(satisfies("1.5.0", ">= 1.0.0 < 2.0.0"));
        assert!(!satisfies("2.0.0", ">=1.0.0 <2.0.0"));
        assert!(satisfies("3.1.0", "^1.0.0 || ^3.0.0"));
        assert!(satisfies("1.4.0", "1.0.0 - 1.4.0"));
        assert!(!satisfies("1.4.1", "1.0.0 - 1.4.0"));
        assert!(satisfies("4.15.0-prerelease.1", ">=4.14.0"));
    }

    #[test]
    fn test_invalid_range() {
        assert!(VersionRange::parse(">=banana").is_err());
        assert!(VersionRange::parse("1.x.3").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let range: VersionRange = serde_json::from_str("\"^1.0.0\"").unwrap();
        assert_eq!(range.as_str(), "^1.0.0");
        let version: PluginVersion = serde_json::from_str("\"1.2.3\"").unwrap();
        assert_eq!(serde_json::to_string(&version).unwrap(), "\"1.2.3\"");
        assert!(serde_json::from_str::<PluginVersion>("\"nope\"").is_err());
    }
}
