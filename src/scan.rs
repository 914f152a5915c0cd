//! Contract discovery, categorization, and time-travel variant pairing.

use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::fsutil::{read_to_string, walk_source_files};
use crate::solidity::{self, DeclKind};

/// Suffix pairing a test-oriented variant to its base module.
pub const TIME_TRAVEL_SUFFIX: &str = "TimeTravel";

/// Module naming convention.
pub const MODULE_SUFFIX: &str = "Facet";

/// Fixed allow-list of infrastructure contract names.
pub const INFRASTRUCTURE_CONTRACTS: &[&str] =
    &["Diamond", "DiamondInit", "AddressResolver", "AccessManager"];

#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub abi: Value,
    pub bytecode: String,
    pub deployed_bytecode: String,
}

/// One discovered source unit: a (file, contract name) pair whose compiled
/// artifact resolved.
#[derive(Debug, Clone)]
pub struct ContractFile {
    pub path: PathBuf,
    pub rel_path: PathBuf,
    pub directory: PathBuf,
    pub file_name: String,
    /// All names declared in the file, in declaration order.
    pub contract_names: Vec<String>,
    /// The name this unit represents.
    pub name: String,
    pub kind: DeclKind,
    pub source: String,
    pub artifact: ContractArtifact,
}

/// Exhaustive, disjoint partition of discovered files.
#[derive(Debug, Default)]
pub struct CategorizedContracts {
    pub modules: Vec<ContractFile>,
    pub variants: Vec<ContractFile>,
    pub infrastructure: Vec<ContractFile>,
    pub mocks: Vec<ContractFile>,
    pub interfaces: Vec<ContractFile>,
    pub libraries: Vec<ContractFile>,
    pub other: Vec<ContractFile>,
}

impl CategorizedContracts {
    pub fn total(&self) -> usize {
        self.modules.len()
            + self.variants.len()
            + self.infrastructure.len()
            + self.mocks.len()
            + self.interfaces.len()
            + self.libraries.len()
            + self.other.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    MockOrTest,
    TimeTravelVariant,
    Module,
    Infrastructure,
    Interface,
    Library,
    Other,
}

/// Ordered classification table; first match wins.
///
/// Mock detection runs before module detection so a mock whose name happens
/// to end in the module suffix is never misclassified. The order is a
/// deliberate tie-break, kept as one visible list.
const CLASSIFIERS: &[(Bucket, fn(&ContractFile) -> bool)] = &[
    (Bucket::MockOrTest, is_mock_or_test),
    (Bucket::TimeTravelVariant, is_time_travel_variant),
    (Bucket::Module, is_module),
    (Bucket::Infrastructure, is_infrastructure),
    (Bucket::Interface, is_interface),
    (Bucket::Library, is_library),
    (Bucket::Other, |_| true),
];

pub fn classify(file: &ContractFile) -> Bucket {
    for (bucket, predicate) in CLASSIFIERS {
        if predicate(file) {
            return *bucket;
        }
    }
    Bucket::Other
}

fn is_mock_or_test(file: &ContractFile) -> bool {
    let name = file.name.as_str();
    if name.starts_with("Mock")
        || name.ends_with("Mock")
        || name.starts_with("Test")
        || name.ends_with("Test")
    {
        return true;
    }
    file.rel_path.components().any(|c| {
        matches!(
            c.as_os_str().to_string_lossy().as_ref(),
            "mock" | "mocks" | "test" | "tests"
        )
    })
}

fn is_time_travel_variant(file: &ContractFile) -> bool {
    file.name.ends_with(TIME_TRAVEL_SUFFIX)
        && file.name.len() > TIME_TRAVEL_SUFFIX.len()
}

fn is_module(file: &ContractFile) -> bool {
    file.name.ends_with(MODULE_SUFFIX) && file.name.len() > MODULE_SUFFIX.len()
}

fn is_infrastructure(file: &ContractFile) -> bool {
    INFRASTRUCTURE_CONTRACTS.contains(&file.name.as_str())
}

fn is_interface(file: &ContractFile) -> bool {
    if file.kind == DeclKind::Interface {
        return true;
    }
    let mut chars = file.name.chars();
    chars.next() == Some('I') && chars.next().is_some_and(|c| c.is_ascii_uppercase())
}

fn is_library(file: &ContractFile) -> bool {
    file.kind == DeclKind::Library
}

/// Walk the source tree and produce one `ContractFile` per declared name
/// whose compiled artifact resolves.
///
/// Names without an artifact are skipped silently: partial compilation
/// (bare interfaces, abstract bases) is an expected state, not an error.
/// Files are visited in sorted path order, so when two files declare the
/// same name the lexicographically first one wins in any name-keyed map
/// built downstream.
pub fn find_all_contracts(source_root: &Path, artifact_root: &Path) -> Result<Vec<ContractFile>> {
    let mut results = Vec::new();

    for path in walk_source_files(source_root)? {
        let Ok(source) = read_to_string(&path) else {
            continue;
        };
        let declarations = solidity::extract_declarations(&source);
        if declarations.is_empty() {
            continue;
        }

        let rel_path = path.strip_prefix(source_root).unwrap_or(&path).to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let contract_names: Vec<String> =
            declarations.iter().map(|d| d.name.clone()).collect();

        let mut seen = std::collections::BTreeSet::new();
        for decl in &declarations {
            if !seen.insert(decl.name.clone()) {
                continue;
            }
            let Some(artifact) = load_artifact(artifact_root, &rel_path, &decl.name) else {
                continue;
            };
            results.push(ContractFile {
                path: path.clone(),
                rel_path: rel_path.clone(),
                directory: directory.clone(),
                file_name: file_name.clone(),
                contract_names: contract_names.clone(),
                name: decl.name.clone(),
                kind: decl.kind,
                source: source.clone(),
                artifact,
            });
        }
    }

    Ok(results)
}

/// Load the compiled artifact for one contract name.
///
/// Hardhat layout: the `.sol` relative path becomes a directory holding one
/// JSON file per contract declared in it.
fn load_artifact(artifact_root: &Path, rel_path: &Path, name: &str) -> Option<ContractArtifact> {
    let path = artifact_root.join(rel_path).join(format!("{name}.json"));
    let raw = std::fs::read_to_string(&path).ok()?;
    let doc: Value = serde_json::from_str(&raw).ok()?;
    let abi = doc.get("abi")?.clone();
    let bytecode = doc
        .get("bytecode")
        .and_then(Value::as_str)
        .unwrap_or("0x")
        .to_string();
    let deployed_bytecode = doc
        .get("deployedBytecode")
        .and_then(Value::as_str)
        .unwrap_or("0x")
        .to_string();
    Some(ContractArtifact {
        abi,
        bytecode,
        deployed_bytecode,
    })
}

/// Single-pass partition over the ordered classifier table.
pub fn categorize_contracts(files: Vec<ContractFile>) -> CategorizedContracts {
    let mut out = CategorizedContracts::default();
    for file in files {
        match classify(&file) {
            Bucket::MockOrTest => out.mocks.push(file),
            Bucket::TimeTravelVariant => out.variants.push(file),
            Bucket::Module => out.modules.push(file),
            Bucket::Infrastructure => out.infrastructure.push(file),
            Bucket::Interface => out.interfaces.push(file),
            Bucket::Library => out.libraries.push(file),
            Bucket::Other => out.other.push(file),
        }
    }
    out
}

/// Pair each base module with its time-travel variant, if one exists.
///
/// A variant pairs iff its name is exactly the base name plus the fixed
/// suffix; at most one variant per base.
pub fn pair_time_travel_variants(
    bases: &[ContractFile],
    variants: &[ContractFile],
) -> BTreeMap<String, Option<ContractFile>> {
    let mut pairing = BTreeMap::new();
    for base in bases {
        let wanted = format!("{}{TIME_TRAVEL_SUFFIX}", base.name);
        let variant = variants.iter().find(|v| v.name == wanted).cloned();
        pairing.insert(base.name.clone(), variant);
    }
    pairing
}
