//! Virtual machine identity.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Composite key (subscription, resource group, name) which addresses a single VM.
///
/// The key is opaque: no validation is performed beyond string equality.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VmKey {
    pub subscription_id: String,
    pub resource_group: String,
    pub name: String,
}

impl VmKey {
    pub fn new(subscription_id: &str, resource_group: &str, name: &str) -> Self {
        Self {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        }
    }
}

impl Display for VmKey {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.subscription_id, self.resource_group, self.name)
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("VM key must look like subscription/resource-group/name, got {0:?}")]
pub struct VmKeyParseError(pub String);

impl FromStr for VmKey {
    type Err = VmKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [subscription_id, resource_group, name] => Ok(Self::new(subscription_id, resource_group, name)),
            _ => Err(VmKeyParseError(s.to_string())),
        }
    }
}
