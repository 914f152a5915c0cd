//! Surface extraction from raw Solidity source text.
//!
//! The ABI is authoritative for callable methods; everything the ABI does not
//! carry (events, errors, imports, inheritance, natspec) is scraped from the
//! source with line-oriented regexes. This is heuristic by design: sources
//! that fail to match simply contribute nothing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclKind {
    Contract,
    Interface,
    Library,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclKind,
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamList {
    pub name: String,
    pub params: Vec<String>,
}

impl ParamList {
    /// Canonical form used for hashing: `Name(type1,type2)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.params.join(","))
    }
}

static DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(abstract\s+contract|contract|interface|library)\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:is\s+([^{]+))?\{",
    )
    .expect("declaration regex")
});

static EVENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\bevent\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*(?:anonymous\s*)?;")
        .expect("event regex")
});

static ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\berror\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)\s*;").expect("error regex")
});

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:\{[^}]*\}\s+from\s+)?["']([^"']+)["']"#)
        .expect("import regex")
});

static IMPORT_SYMBOLS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+\{([^}]*)\}\s+from\s+["'][^"']+["']"#)
        .expect("import symbols regex")
});

static CONSTANT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)\bbytes32\s+(?:public\s+|internal\s+|private\s+)?constant\s+([A-Z][A-Z0-9_]*)\s*=\s*([^;]+);",
    )
    .expect("constant regex")
});

static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@title\s+(.+)").expect("title regex"));

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@custom:version\s+(\S+)").expect("version regex"));

/// All contract/interface/library declarations with their inheritance lists.
pub fn extract_declarations(source: &str) -> Vec<Declaration> {
    DECL_RE
        .captures_iter(source)
        .map(|cap| {
            let kind = if cap[1].starts_with("interface") {
                DeclKind::Interface
            } else if cap[1].starts_with("library") {
                DeclKind::Library
            } else {
                DeclKind::Contract
            };
            let parents = cap
                .get(3)
                .map(|m| {
                    m.as_str()
                        .split(',')
                        .map(|p| {
                            // Drop constructor-style parent arguments: `Base(1)`.
                            p.trim()
                                .split(['(', ' '])
                                .next()
                                .unwrap_or("")
                                .trim()
                                .to_string()
                        })
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            Declaration {
                name: cap[2].to_string(),
                kind,
                parents,
            }
        })
        .collect()
}

pub fn extract_events(source: &str) -> Vec<ParamList> {
    EVENT_RE
        .captures_iter(source)
        .map(|cap| ParamList {
            name: cap[1].to_string(),
            params: canonical_params(&cap[2]),
        })
        .collect()
}

pub fn extract_errors(source: &str) -> Vec<ParamList> {
    ERROR_RE
        .captures_iter(source)
        .map(|cap| ParamList {
            name: cap[1].to_string(),
            params: canonical_params(&cap[2]),
        })
        .collect()
}

/// Import path strings, in order of appearance.
pub fn extract_imports(source: &str) -> Vec<String> {
    IMPORT_RE
        .captures_iter(source)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Symbol names pulled in through `import { A, B } from "..."`.
pub fn extract_imported_symbols(source: &str) -> Vec<String> {
    let mut symbols = Vec::new();
    for cap in IMPORT_SYMBOLS_RE.captures_iter(source) {
        for sym in cap[1].split(',') {
            // `Name as Alias` binds the alias locally.
            let sym = sym.trim();
            let name = match sym.split_once(" as ") {
                Some((_, alias)) => alias.trim(),
                None => sym,
            };
            if !name.is_empty() {
                symbols.push(name.to_string());
            }
        }
    }
    symbols
}

/// `bytes32 constant NAME = value;` pairs, raw value text trimmed.
pub fn extract_constants(source: &str) -> Vec<(String, String)> {
    CONSTANT_RE
        .captures_iter(source)
        .map(|cap| (cap[1].to_string(), cap[2].trim().to_string()))
        .collect()
}

pub fn extract_title(source: &str) -> Option<String> {
    TITLE_RE
        .captures(source)
        .map(|cap| cap[1].trim().trim_end_matches("*/").trim().to_string())
}

pub fn extract_version(source: &str) -> Option<String> {
    VERSION_RE.captures(source).map(|cap| cap[1].to_string())
}

/// A contract counts as upgradeable when it opts in via natspec or reaches
/// an upgrade-oriented ancestor.
pub fn is_upgradeable(source: &str, parents: &[String]) -> bool {
    if source.contains("@custom:upgradeable") {
        return true;
    }
    parents
        .iter()
        .any(|p| p.ends_with("Upgradeable") || p == "Initializable")
}

/// Normalize a raw parameter list into canonical ABI types.
pub fn canonical_params(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter_map(|p| {
            // First token is the type; `indexed` and the name follow.
            p.split_whitespace().next().map(canonical_type)
        })
        .collect()
}

/// Expand Solidity shorthand types to their canonical ABI names.
pub fn canonical_type(ty: &str) -> String {
    let (base, suffix) = match ty.find('[') {
        Some(idx) => (&ty[..idx], &ty[idx..]),
        None => (ty, ""),
    };
    let base = match base {
        "uint" => "uint256",
        "int" => "int256",
        "byte" => "bytes1",
        other => other,
    };
    format!("{base}{suffix}")
}
