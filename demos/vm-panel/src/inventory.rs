//! List of VMs managed by the panel.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use vmsim::core::vm_key::VmKey;

pub const VMS_JSON_VAR: &str = "AZURE_VMS_JSON";
pub const VMS_YAML_B64_VAR: &str = "AZURE_VMS_YAML_B64";
pub const INVENTORY_FILE: &str = "azure_vms.yaml";

#[derive(Debug, Default, Serialize, Deserialize)]
struct VmEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    resource_group: String,
    #[serde(default)]
    subscription_id: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct InventoryDocument {
    #[serde(default)]
    vms: Vec<VmEntry>,
}

/// Where the inventory is read from. Only the first present source is used.
#[derive(Debug, PartialEq)]
pub enum InventorySource {
    Json(String),
    YamlBase64(String),
    File(String),
    None,
}

impl InventorySource {
    /// Detects the source from environment variables and the state directory.
    pub fn detect(state_dir: &Path) -> Self {
        if let Ok(json) = env::var(VMS_JSON_VAR) {
            return InventorySource::Json(json);
        }
        if let Ok(encoded) = env::var(VMS_YAML_B64_VAR) {
            return InventorySource::YamlBase64(encoded);
        }
        let path = state_dir.join(INVENTORY_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => InventorySource::File(content),
            Err(_) => InventorySource::None,
        }
    }

    fn parse(&self) -> Result<InventoryDocument> {
        let doc: InventoryDocument = match self {
            InventorySource::Json(json) => serde_json::from_str(json)?,
            InventorySource::YamlBase64(encoded) => {
                let bytes = STANDARD.decode(encoded.trim())?;
                parse_yaml(&String::from_utf8(bytes)?)?
            }
            InventorySource::File(content) => parse_yaml(content)?,
            InventorySource::None => InventoryDocument::default(),
        };
        Ok(doc)
    }

    fn name(&self) -> &'static str {
        match self {
            InventorySource::Json(_) => VMS_JSON_VAR,
            InventorySource::YamlBase64(_) => VMS_YAML_B64_VAR,
            InventorySource::File(_) => INVENTORY_FILE,
            InventorySource::None => "defaults",
        }
    }
}

fn parse_yaml(content: &str) -> Result<InventoryDocument> {
    if content.trim().is_empty() {
        return Ok(InventoryDocument::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

pub fn default_vm() -> VmKey {
    VmKey::new("demo-sub", "demo-rg", "demo-vm-1")
}

/// Returns VMs listed by the source. Falls back to a single demo VM if the list is empty or broken.
pub fn load_inventory(source: &InventorySource) -> Vec<VmKey> {
    let vms: Vec<VmKey> = match source.parse() {
        Ok(doc) => doc
            .vms
            .iter()
            .map(|vm| VmKey::new(&vm.subscription_id, &vm.resource_group, &vm.name))
            .collect(),
        Err(e) => {
            log::warn!("failed to load VM inventory from {}: {}", source.name(), e);
            Vec::new()
        }
    };
    if vms.is_empty() {
        vec![default_vm()]
    } else {
        vms
    }
}

/// Finds VM by its full key or by a name unique within the inventory.
pub fn resolve_vm(vms: &[VmKey], query: &str) -> Result<VmKey> {
    if query.contains('/') {
        return query.parse::<VmKey>().map_err(|e| anyhow!(e));
    }
    let matches: Vec<&VmKey> = vms.iter().filter(|vm| vm.name == query).collect();
    match matches.as_slice() {
        [vm] => Ok((*vm).clone()),
        [] => bail!("VM {:?} is not in the inventory", query),
        _ => bail!("VM name {:?} is ambiguous, use subscription/resource-group/name", query),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = "vms:\n  - name: web\n    resource_group: rg1\n    subscription_id: s1\n  - name: db\n    resource_group: rg2\n    subscription_id: s1\n";

    #[test]
    fn json_source() {
        let source = InventorySource::Json(
            r#"{"vms": [{"name": "web", "resource_group": "rg1", "subscription_id": "s1"}]}"#.to_string(),
        );
        assert_eq!(load_inventory(&source), vec![VmKey::new("s1", "rg1", "web")]);
    }

    #[test]
    fn base64_yaml_source() {
        let source = InventorySource::YamlBase64(STANDARD.encode(YAML));
        let vms = load_inventory(&source);
        assert_eq!(vms.len(), 2);
        assert_eq!(vms[1], VmKey::new("s1", "rg2", "db"));
    }

    #[test]
    fn file_source_from_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(INVENTORY_FILE), YAML).unwrap();
        if env::var(VMS_JSON_VAR).is_err() && env::var(VMS_YAML_B64_VAR).is_err() {
            let source = InventorySource::detect(dir.path());
            assert_eq!(source, InventorySource::File(YAML.to_string()));
            assert_eq!(load_inventory(&source)[0], VmKey::new("s1", "rg1", "web"));
        }
    }

    #[test]
    fn broken_or_empty_source_gives_demo_vm() {
        assert_eq!(load_inventory(&InventorySource::None), vec![default_vm()]);
        assert_eq!(
            load_inventory(&InventorySource::Json("{not json".to_string())),
            vec![default_vm()]
        );
        assert_eq!(
            load_inventory(&InventorySource::YamlBase64("%%%".to_string())),
            vec![default_vm()]
        );
        assert_eq!(load_inventory(&InventorySource::File("vms: []".to_string())), vec![default_vm()]);
    }

    #[test]
    fn vm_lookup() {
        let vms = load_inventory(&InventorySource::File(YAML.to_string()));
        assert_eq!(resolve_vm(&vms, "db").unwrap(), VmKey::new("s1", "rg2", "db"));
        assert_eq!(resolve_vm(&vms, "x/y/z").unwrap(), VmKey::new("x", "y", "z"));
        assert!(resolve_vm(&vms, "cache").is_err());
    }
}
