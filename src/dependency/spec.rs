//! Dependency Spec Grammar
//!
//! A dependency spec is `name [op version]` where `op` is one of `==`, `=`,
//! `>=`, `<=`, `>`, `<`, `!=`, matching the manager's own match-spec
//! spelling (`numpy`, `pandas=2.0.0`, `python>=3.9`).
//!
//! `=` is the manager's fuzzy match: the installed version must equal the
//! requested one or extend it at a component boundary (`1.18` accepts
//! `1.18.1`). `==` requires exact equality.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::errors::EnvError;

/// Version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionOp {
    /// `==` - exact version match
    Exact,
    /// `=` - fuzzy match at component boundaries
    Equal,
    /// `!=`
    NotEqual,
    /// `>=`
    GreaterEq,
    /// `<=`
    LessEq,
    /// `>`
    Greater,
    /// `<`
    Less,
}

impl VersionOp {
    fn as_str(self) -> &'static str {
        match self {
            VersionOp::Exact => "==",
            VersionOp::Equal => "=",
            VersionOp::NotEqual => "!=",
            VersionOp::GreaterEq => ">=",
            VersionOp::LessEq => "<=",
            VersionOp::Greater => ">",
            VersionOp::Less => "<",
        }
    }
}

/// A version clause: operator plus requested version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub op: VersionOp,
    pub version: String,
}

impl Constraint {
    /// Checks whether an installed version satisfies this clause.
    pub fn matches(&self, installed: &str) -> bool {
        match self.op {
            VersionOp::Exact => installed == self.version,
            VersionOp::Equal => fuzzy_match(&self.version, installed),
            VersionOp::NotEqual => installed != self.version,
            VersionOp::GreaterEq => compare_versions(installed, &self.version) != Ordering::Less,
            VersionOp::LessEq => compare_versions(installed, &self.version) != Ordering::Greater,
            VersionOp::Greater => compare_versions(installed, &self.version) == Ordering::Greater,
            VersionOp::Less => compare_versions(installed, &self.version) == Ordering::Less,
        }
    }
}

/// Fuzzy match: exact, or extends the requested version at a `.` boundary.
fn fuzzy_match(requested: &str, installed: &str) -> bool {
    installed == requested
        || installed
            .strip_prefix(requested)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Compares dot-separated versions component-wise.
///
/// Components are compared numerically when both sides parse as integers,
/// lexicographically otherwise. Missing components count as zero, so
/// `1.0` == `1.0.0`.
fn compare_versions(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<&str> = a.split('.').collect();
    let b_parts: Vec<&str> = b.split('.').collect();
    let len = a_parts.len().max(b_parts.len());

    for i in 0..len {
        let x = a_parts.get(i).copied().unwrap_or("0");
        let y = b_parts.get(i).copied().unwrap_or("0");

        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(xn), Ok(yn)) => xn.cmp(&yn),
            _ => x.cmp(y),
        };

        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

/// A parsed dependency spec: package name plus optional version clause.
///
/// # Example
///
/// ```
/// use envx::dependency::Dependency;
///
/// let dep: Dependency = "pandas=2.0.0".parse().unwrap();
/// assert_eq!(dep.name, "pandas");
/// assert!(dep.satisfied_by("2.0.0"));
/// assert!(!dep.satisfied_by("1.5.3"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Package name.
    pub name: String,
    /// Optional version clause; `None` means any version.
    pub constraint: Option<Constraint>,
}

impl Dependency {
    /// Creates an unconstrained dependency on a package name.
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    /// Creates a dependency pinned with an exact installed version.
    ///
    /// Used by backends to represent entries of the live package list.
    pub fn installed(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: Some(Constraint {
                op: VersionOp::Exact,
                version: version.into(),
            }),
        }
    }

    /// Checks whether an installed version satisfies this spec.
    ///
    /// An unconstrained spec is satisfied by any version.
    pub fn satisfied_by(&self, installed_version: &str) -> bool {
        match &self.constraint {
            Some(constraint) => constraint.matches(installed_version),
            None => true,
        }
    }
}

/// Ordered operator table. Two-character operators come first so `>=` is not
/// read as `>` followed by `=version`.
const OPERATORS: &[(&str, VersionOp)] = &[
    ("==", VersionOp::Exact),
    ("!=", VersionOp::NotEqual),
    (">=", VersionOp::GreaterEq),
    ("<=", VersionOp::LessEq),
    (">", VersionOp::Greater),
    ("<", VersionOp::Less),
    ("=", VersionOp::Equal),
];

impl FromStr for Dependency {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s.trim();

        if spec.is_empty() {
            return Err(EnvError::DependencyParse {
                spec: s.to_string(),
                reason: "empty spec".to_string(),
            });
        }

        let split = OPERATORS.iter().find_map(|(symbol, op)| {
            spec.find(symbol).map(|idx| (idx, symbol.len(), *op))
        });

        let Some((idx, symbol_len, op)) = split else {
            return Ok(Dependency::unversioned(spec));
        };

        let name = spec[..idx].trim();
        let version = spec[idx + symbol_len..].trim();

        if name.is_empty() {
            return Err(EnvError::DependencyParse {
                spec: s.to_string(),
                reason: "missing package name before operator".to_string(),
            });
        }
        if version.is_empty() {
            return Err(EnvError::DependencyParse {
                spec: s.to_string(),
                reason: "missing version after operator".to_string(),
            });
        }

        Ok(Dependency {
            name: name.to_string(),
            constraint: Some(Constraint {
                op,
                version: version.to_string(),
            }),
        })
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some(c) => write!(f, "{}{}{}", self.name, c.op.as_str(), c.version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Computes the requested-minus-installed set difference.
///
/// A requested spec is missing when no installed package has its name, or
/// when the installed version fails its version clause. Request order is
/// preserved.
pub fn missing_from(requested: &[Dependency], installed: &[Dependency]) -> Vec<Dependency> {
    requested
        .iter()
        .filter(|dep| {
            let found = installed.iter().find(|pkg| pkg.name == dep.name);
            match found {
                Some(pkg) => match &pkg.constraint {
                    Some(c) => !dep.satisfied_by(&c.version),
                    // Version unknown: only name-only requests are satisfied
                    None => dep.constraint.is_some(),
                },
                None => true,
            }
        })
        .cloned()
        .collect()
}
