//! Deployable bytecode from compiled contract artifacts.
//!
//! Searches `<dir>/<Name>.sol/<Name>.json` (forge) and then `<dir>/<Name>.json`
//! (brownie, hardhat). Forge nests the hex under `bytecode.object`; the others
//! store it directly under `bytecode`.

use std::path::{Path, PathBuf};

use crate::error::HarnessError;

fn candidate_paths(dir: &Path, contract_name: &str) -> [PathBuf; 2] {
    [
        dir.join(format!("{contract_name}.sol")).join(format!("{contract_name}.json")),
        dir.join(format!("{contract_name}.json")),
    ]
}

/// Read creation bytecode for `contract_name` from `dir`.
pub fn load_bytecode(dir: &Path, contract_name: &str) -> Result<Vec<u8>, HarnessError> {
    let path = candidate_paths(dir, contract_name)
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| {
            HarnessError::Artifact(format!(
                "Cannot find artifact for {contract_name} in {}. Compile the contracts first.",
                dir.display()
            ))
        })?;

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| HarnessError::Artifact(format!("Cannot read {}: {e}", path.display())))?;
    let json: serde_json::Value = serde_json::from_str(&contents)?;

    let bytecode = &json["bytecode"];
    let hex_str = bytecode["object"]
        .as_str()
        .or_else(|| bytecode.as_str())
        .ok_or_else(|| {
            HarnessError::Artifact(format!("{} has no bytecode field", path.display()))
        })?;

    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if hex_str.is_empty() {
        return Err(HarnessError::Artifact(format!(
            "{contract_name} has empty bytecode (abstract contract or interface?)"
        )));
    }
    hex::decode(hex_str)
        .map_err(|e| HarnessError::Artifact(format!("Invalid bytecode hex in {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forge_layout() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("TheVault.sol");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            nested.join("TheVault.json"),
            r#"{"bytecode": {"object": "0x6080604052"}}"#,
        )
        .unwrap();

        let code = load_bytecode(dir.path(), "TheVault").unwrap();
        assert_eq!(code, vec![0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn test_flat_layout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("GlpBlueberryFarmer.json"),
            r#"{"contractName": "GlpBlueberryFarmer", "bytecode": "60806040"}"#,
        )
        .unwrap();

        let code = load_bytecode(dir.path(), "GlpBlueberryFarmer").unwrap();
        assert_eq!(code, vec![0x60, 0x80, 0x60, 0x40]);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_bytecode(dir.path(), "Nope").unwrap_err();
        assert!(err.is_missing_environment());
    }

    #[test]
    fn test_empty_bytecode() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IStrategy.json"), r#"{"bytecode": "0x"}"#).unwrap();
        assert!(load_bytecode(dir.path(), "IStrategy").is_err());
    }
}
