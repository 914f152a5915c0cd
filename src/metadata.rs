//! Per-contract metadata assembly.
//!
//! Methods come from the compiled ABI; events and errors come from source
//! text. Module contracts aggregate events/errors across their full
//! inheritance chain, because a module's externally observable surface is
//! the union of everything it composes; non-module contracts stand alone
//! and keep only their direct declarations.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::abi::{self, MethodDefinition};
use crate::scan::{Bucket, ContractFile, INFRASTRUCTURE_CONTRACTS, classify};
use crate::solidity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub name: String,
    pub signature: String,
    pub topic_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDefinition {
    pub name: String,
    pub signature: String,
    pub selector: String,
}

/// The unit of generator input, one per processed contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractMetadata {
    pub name: String,
    pub source_path: String,
    pub layer: u8,
    pub category: String,
    pub has_variant: bool,
    pub roles: BTreeMap<String, String>,
    pub resolver_key: Option<String>,
    pub methods: Vec<MethodDefinition>,
    pub events: Vec<EventDefinition>,
    pub errors: Vec<ErrorDefinition>,
    pub imports: Vec<String>,
    pub inherits: Vec<String>,
    pub version: Option<String>,
    pub upgradeable: bool,
    pub description: Option<String>,
}

/// Global name→value tables built during the constant-scanning stages.
#[derive(Debug, Clone, Default)]
pub struct ConstantTables {
    pub roles: BTreeMap<String, String>,
    pub resolver_keys: BTreeMap<String, String>,
}

/// Keyword table for category inference: (keyword, category, layer).
const CATEGORY_KEYWORDS: &[(&str, &str, u8)] = &[
    ("diamond", "infrastructure", 0),
    ("resolver", "infrastructure", 0),
    ("access", "administration", 0),
    ("admin", "administration", 0),
    ("storage", "storage", 1),
    ("token", "token", 1),
    ("treasury", "treasury", 1),
    ("vault", "treasury", 1),
    ("staking", "staking", 2),
    ("stake", "staking", 2),
    ("reward", "rewards", 2),
    ("gov", "governance", 3),
    ("vote", "governance", 3),
];

const DEFAULT_LAYER: u8 = 2;
const DEFAULT_CATEGORY: &str = "general";

/// Build metadata for one contract. Deterministic given its inputs.
pub fn extract_metadata(
    file: &ContractFile,
    has_variant: bool,
    tables: &ConstantTables,
    files_by_name: &BTreeMap<String, ContractFile>,
) -> ContractMetadata {
    let is_module = classify(file) == Bucket::Module;
    let parents = direct_parents(file);
    let imports = solidity::extract_imports(&file.source);
    let (layer, category) = infer_layer_and_category(file);

    let (events, errors) = if is_module {
        collect_inherited_surface(file, files_by_name)
    } else {
        (
            solidity::extract_events(&file.source),
            solidity::extract_errors(&file.source),
        )
    };

    let events = events
        .into_iter()
        .map(|e| EventDefinition {
            topic_hash: abi::topic_hash(&e.signature()),
            signature: e.signature(),
            name: e.name,
        })
        .collect();
    let errors = errors
        .into_iter()
        .map(|e| ErrorDefinition {
            selector: abi::selector(&e.signature()),
            signature: e.signature(),
            name: e.name,
        })
        .collect();

    ContractMetadata {
        name: file.name.clone(),
        source_path: crate::fsutil::to_unix_path(&file.rel_path),
        layer,
        category,
        has_variant,
        roles: collect_roles(file, tables),
        resolver_key: if is_module {
            resolve_resolver_key(file, tables)
        } else {
            None
        },
        methods: abi::extract_methods_from_abi(&file.artifact.abi),
        events,
        errors,
        imports,
        upgradeable: solidity::is_upgradeable(&file.source, &parents),
        inherits: parents,
        version: solidity::extract_version(&file.source),
        description: solidity::extract_title(&file.source),
    }
}

/// Direct inheritance parents of the unit's own declaration.
fn direct_parents(file: &ContractFile) -> Vec<String> {
    solidity::extract_declarations(&file.source)
        .into_iter()
        .find(|d| d.name == file.name)
        .map(|d| d.parents)
        .unwrap_or_default()
}

/// Depth-first walk over the inheritance chain, own declarations first,
/// deduplicated by signature. Cycles terminate via the visited set.
fn collect_inherited_surface(
    file: &ContractFile,
    files_by_name: &BTreeMap<String, ContractFile>,
) -> (Vec<solidity::ParamList>, Vec<solidity::ParamList>) {
    let mut events = Vec::new();
    let mut errors = Vec::new();
    let mut seen_events = BTreeSet::new();
    let mut seen_errors = BTreeSet::new();
    let mut visited = BTreeSet::new();
    let mut stack = vec![file.name.clone()];

    while let Some(name) = stack.pop() {
        if !visited.insert(name.clone()) {
            continue;
        }
        let Some(current) = (if name == file.name {
            Some(file)
        } else {
            files_by_name.get(&name)
        }) else {
            continue;
        };

        for event in solidity::extract_events(&current.source) {
            if seen_events.insert(event.signature()) {
                events.push(event);
            }
        }
        for error in solidity::extract_errors(&current.source) {
            if seen_errors.insert(error.signature()) {
                errors.push(error);
            }
        }

        // Push in reverse so parents are visited in declaration order.
        let parents = solidity::extract_declarations(&current.source)
            .into_iter()
            .find(|d| d.name == name)
            .map(|d| d.parents)
            .unwrap_or_default();
        for parent in parents.into_iter().rev() {
            stack.push(parent);
        }
    }

    (events, errors)
}

/// Role bindings: `*_ROLE` constants declared locally keep their own value;
/// imported role symbols resolve through the global table.
fn collect_roles(file: &ContractFile, tables: &ConstantTables) -> BTreeMap<String, String> {
    let mut roles = BTreeMap::new();
    for (name, value) in solidity::extract_constants(&file.source) {
        if name.ends_with("_ROLE") {
            roles.insert(name, value);
        }
    }
    for symbol in solidity::extract_imported_symbols(&file.source) {
        if symbol.ends_with("_ROLE")
            && let Some(value) = tables.roles.get(&symbol)
        {
            roles.entry(symbol).or_insert_with(|| value.clone());
        }
    }
    roles
}

/// Resolver-key binding, attempted for module contracts only.
///
/// An unresolved key leaves the field unset; the pipeline surfaces it as a
/// warning, never an error.
fn resolve_resolver_key(file: &ContractFile, tables: &ConstantTables) -> Option<String> {
    for symbol in solidity::extract_imported_symbols(&file.source) {
        if symbol.ends_with("_RESOLVER_KEY")
            && let Some(value) = tables.resolver_keys.get(&symbol)
        {
            return Some(value.clone());
        }
    }
    solidity::extract_constants(&file.source)
        .into_iter()
        .find(|(name, _)| name.ends_with("_RESOLVER_KEY"))
        .map(|(_, value)| value)
}

/// Priority-ordered, intentionally redundant inference: explicit layer tag,
/// then infrastructure allow-list, then contract-name keywords, then
/// path-segment keywords, then the default.
pub fn infer_layer_and_category(file: &ContractFile) -> (u8, String) {
    if let Some(layer) = explicit_layer_tag(file) {
        let category = keyword_category(&file.name)
            .or_else(|| path_keyword_category(file))
            .map(|(c, _)| c)
            .unwrap_or(DEFAULT_CATEGORY);
        return (layer, category.to_string());
    }
    if INFRASTRUCTURE_CONTRACTS.contains(&file.name.as_str()) {
        return (0, "infrastructure".to_string());
    }
    if let Some((category, layer)) = keyword_category(&file.name) {
        return (layer, category.to_string());
    }
    if let Some((category, layer)) = path_keyword_category(file) {
        return (layer, category.to_string());
    }
    (DEFAULT_LAYER, DEFAULT_CATEGORY.to_string())
}

fn explicit_layer_tag(file: &ContractFile) -> Option<u8> {
    file.rel_path.components().find_map(|c| {
        let segment = c.as_os_str().to_string_lossy().to_lowercase();
        let digit = segment.strip_prefix("layer")?;
        match digit {
            "0" => Some(0),
            "1" => Some(1),
            "2" => Some(2),
            "3" => Some(3),
            _ => None,
        }
    })
}

fn keyword_category(name: &str) -> Option<(&'static str, u8)> {
    let lowered = name.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(kw, _, _)| lowered.contains(kw))
        .map(|(_, category, layer)| (*category, *layer))
}

fn path_keyword_category(file: &ContractFile) -> Option<(&'static str, u8)> {
    file.rel_path.components().find_map(|c| {
        let segment = c.as_os_str().to_string_lossy().to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(kw, _, _)| segment.contains(kw))
            .map(|(_, category, layer)| (*category, *layer))
    })
}

/// Storage wrappers are extracted alongside infrastructure when enabled.
pub fn is_storage_wrapper(name: &str) -> bool {
    name.ends_with("Storage") && name.len() > "Storage".len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ContractArtifact;
    use crate::solidity::DeclKind;
    use serde_json::json;
    use std::path::PathBuf;

    fn contract(name: &str, rel: &str, source: &str) -> ContractFile {
        ContractFile {
            path: PathBuf::from(rel),
            rel_path: PathBuf::from(rel),
            directory: PathBuf::new(),
            file_name: String::new(),
            contract_names: vec![name.to_string()],
            name: name.to_string(),
            kind: DeclKind::Contract,
            source: source.to_string(),
            artifact: ContractArtifact {
                abi: json!([]),
                bytecode: "0x".to_string(),
                deployed_bytecode: "0x".to_string(),
            },
        }
    }

    fn by_name(files: &[ContractFile]) -> BTreeMap<String, ContractFile> {
        let mut map = BTreeMap::new();
        for f in files {
            map.entry(f.name.clone()).or_insert_with(|| f.clone());
        }
        map
    }

    #[test]
    fn module_aggregates_ancestor_events_nonmodule_does_not() {
        let base = contract(
            "RewardBase",
            "contracts/base/RewardBase.sol",
            "contract RewardBase { event RewardPaid(address to, uint256 amount); }",
        );
        let module = contract(
            "RewardsFacet",
            "contracts/facets/RewardsFacet.sol",
            "contract RewardsFacet is RewardBase { event Claimed(address to); }",
        );
        let plain = contract(
            "RewardSink",
            "contracts/RewardSink.sol",
            "contract RewardSink is RewardBase { }",
        );
        let map = by_name(&[base.clone()]);
        let tables = ConstantTables::default();

        let module_meta = extract_metadata(&module, false, &tables, &map);
        let names: Vec<&str> = module_meta.events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Claimed", "RewardPaid"]);

        let plain_meta = extract_metadata(&plain, false, &tables, &map);
        assert!(plain_meta.events.is_empty());
    }

    #[test]
    fn inheritance_cycles_terminate() {
        let a = contract(
            "AFacet",
            "contracts/AFacet.sol",
            "contract AFacet is BFacet { event A(); }",
        );
        let b = contract(
            "BFacet",
            "contracts/BFacet.sol",
            "contract BFacet is AFacet { event B(); }",
        );
        let map = by_name(&[a.clone(), b]);
        let meta = extract_metadata(&a, false, &ConstantTables::default(), &map);
        assert_eq!(meta.events.len(), 2);
    }

    #[test]
    fn resolver_key_resolves_through_table_for_modules_only() {
        let source = r#"
import { STAKING_RESOLVER_KEY } from "../Keys.sol";
contract StakingFacet { }
"#;
        let module = contract("StakingFacet", "contracts/facets/StakingFacet.sol", source);
        let mut tables = ConstantTables::default();
        tables
            .resolver_keys
            .insert("STAKING_RESOLVER_KEY".to_string(), "0xabc".to_string());

        let meta = extract_metadata(&module, false, &tables, &BTreeMap::new());
        assert_eq!(meta.resolver_key.as_deref(), Some("0xabc"));

        // Unresolved key stays unset.
        let missing = extract_metadata(
            &module,
            false,
            &ConstantTables::default(),
            &BTreeMap::new(),
        );
        assert!(missing.resolver_key.is_none());

        // Non-modules never bind one.
        let plain = contract("Treasury", "contracts/Treasury.sol", source);
        let meta = extract_metadata(&plain, false, &tables, &BTreeMap::new());
        assert!(meta.resolver_key.is_none());
    }

    #[test]
    fn roles_from_local_constants_and_imports() {
        let source = r#"
import { PAUSER_ROLE } from "../Roles.sol";
contract StakingFacet {
    bytes32 public constant OPERATOR_ROLE = keccak256("OPERATOR_ROLE");
}
"#;
        let module = contract("StakingFacet", "contracts/facets/StakingFacet.sol", source);
        let mut tables = ConstantTables::default();
        tables
            .roles
            .insert("PAUSER_ROLE".to_string(), "keccak256(\"PAUSER_ROLE\")".to_string());

        let meta = extract_metadata(&module, false, &tables, &BTreeMap::new());
        assert_eq!(meta.roles.len(), 2);
        assert!(meta.roles.contains_key("OPERATOR_ROLE"));
        assert!(meta.roles.contains_key("PAUSER_ROLE"));
    }

    #[test]
    fn layer_inference_priority_order() {
        // Explicit path tag beats everything.
        let tagged = contract("StakingFacet", "contracts/layer3/StakingFacet.sol", "");
        assert_eq!(infer_layer_and_category(&tagged), (3, "staking".to_string()));

        // Infrastructure allow-list.
        let infra = contract("Diamond", "contracts/Diamond.sol", "");
        assert_eq!(infer_layer_and_category(&infra), (0, "infrastructure".to_string()));

        // Name keyword.
        let named = contract("RewardsFacet", "contracts/facets/RewardsFacet.sol", "");
        assert_eq!(infer_layer_and_category(&named), (2, "rewards".to_string()));

        // Path keyword when the name says nothing.
        let pathed = contract("Escrow", "contracts/governance/Escrow.sol", "");
        assert_eq!(infer_layer_and_category(&pathed), (3, "governance".to_string()));

        // Default.
        let plain = contract("Escrow", "contracts/misc/Escrow.sol", "");
        assert_eq!(infer_layer_and_category(&plain), (2, "general".to_string()));
    }

    #[test]
    fn has_variant_flag_is_taken_from_input() {
        let module = contract("StakingFacet", "a/S.sol", "contract StakingFacet {}");
        let meta = extract_metadata(&module, true, &ConstantTables::default(), &BTreeMap::new());
        assert!(meta.has_variant);
    }

    #[test]
    fn storage_wrapper_detection() {
        assert!(is_storage_wrapper("StakingStorage"));
        assert!(!is_storage_wrapper("Storage"));
        assert!(!is_storage_wrapper("StakingFacet"));
    }
}
