//! ABI method extraction.
//!
//! The compiled ABI is the authoritative source for callable methods, since
//! it reflects what the compiler actually emitted. Source text only backs
//! events and errors (see `metadata`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha3::{Digest, Keccak256};

/// Introspection entry points that never belong in the public catalog.
pub const INTROSPECTION_METHODS: &[&str] = &[
    "facets",
    "facetFunctionSelectors",
    "facetAddresses",
    "facetAddress",
    "supportsInterface",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDefinition {
    pub name: String,
    pub signature: String,
    pub selector: String,
}

/// Extract method definitions from an ABI array.
///
/// Malformed ABI yields an empty list; the owning contract simply has zero
/// methods in its metadata.
pub fn extract_methods_from_abi(abi: &Value) -> Vec<MethodDefinition> {
    let Some(entries) = abi.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            if entry.get("type").and_then(Value::as_str) != Some("function") {
                return None;
            }
            let name = entry.get("name").and_then(Value::as_str)?;
            if INTROSPECTION_METHODS.contains(&name) {
                return None;
            }
            let inputs = entry.get("inputs").and_then(Value::as_array);
            let params: Vec<String> = inputs
                .map(|inputs| inputs.iter().filter_map(abi_param_type).collect())
                .unwrap_or_default();
            let signature = format!("{name}({})", params.join(","));
            Some(MethodDefinition {
                name: name.to_string(),
                selector: selector(&signature),
                signature,
            })
        })
        .collect()
}

/// Canonical type for one ABI parameter, expanding tuples recursively.
fn abi_param_type(param: &Value) -> Option<String> {
    let ty = param.get("type").and_then(Value::as_str)?;
    if let Some(rest) = ty.strip_prefix("tuple") {
        let components = param.get("components").and_then(Value::as_array)?;
        let inner: Vec<String> = components.iter().filter_map(abi_param_type).collect();
        return Some(format!("({}){rest}", inner.join(",")));
    }
    Some(ty.to_string())
}

/// 4-byte function/error selector: `0x` + first four bytes of keccak-256.
pub fn selector(signature: &str) -> String {
    let digest = keccak256(signature);
    format!("0x{}", hex::encode(&digest[..4]))
}

/// 32-byte event topic hash.
pub fn topic_hash(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature)))
}

fn keccak256(input: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_functions_with_selectors() {
        let abi = json!([
            {
                "type": "function",
                "name": "transfer",
                "inputs": [
                    {"name": "to", "type": "address"},
                    {"name": "amount", "type": "uint256"}
                ]
            },
            {"type": "event", "name": "Transfer", "inputs": []},
            {"type": "function", "name": "supportsInterface", "inputs": [{"type": "bytes4"}]}
        ]);

        let methods = extract_methods_from_abi(&abi);
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "transfer");
        assert_eq!(methods[0].signature, "transfer(address,uint256)");
        // Well-known ERC-20 selector.
        assert_eq!(methods[0].selector, "0xa9059cbb");
    }

    #[test]
    fn expands_tuple_parameters() {
        let abi = json!([
            {
                "type": "function",
                "name": "submit",
                "inputs": [{
                    "type": "tuple",
                    "components": [
                        {"type": "address"},
                        {"type": "uint256[]"}
                    ]
                }]
            }
        ]);

        let methods = extract_methods_from_abi(&abi);
        assert_eq!(methods[0].signature, "submit((address,uint256[]))");
    }

    #[test]
    fn malformed_abi_yields_empty_list() {
        assert!(extract_methods_from_abi(&json!({"not": "an array"})).is_empty());
        assert!(extract_methods_from_abi(&json!([{"type": "function"}])).is_empty());
        assert!(extract_methods_from_abi(&json!(null)).is_empty());
    }

    #[test]
    fn selectors_are_deterministic() {
        let abi = json!([
            {"type": "function", "name": "stake", "inputs": [{"type": "uint256"}]},
            {"type": "function", "name": "unstake", "inputs": []}
        ]);
        let a = extract_methods_from_abi(&abi);
        let b = extract_methods_from_abi(&abi);
        assert_eq!(a, b);
    }

    #[test]
    fn topic_hash_matches_known_event() {
        // keccak256("Transfer(address,address,uint256)")
        assert_eq!(
            topic_hash("Transfer(address,address,uint256)"),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }
}
