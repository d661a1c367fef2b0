// ABOUTME: Deployment descriptor model consumed by the step engine.
// ABOUTME: Modules, resources, and a visitor for descriptor-wide rewrites.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// The deployment descriptor of an MTA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// A deployable module; each module becomes one application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,

    /// Application name; defaults to the module name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// Entry in the MTA archive holding this module's content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "humantime_serde"
    )]
    pub upload_timeout: Option<Duration>,

    /// Service broker whose subscriber this module's application is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_broker: Option<String>,
}

impl Module {
    pub fn app_name(&self) -> &str {
        self.app_name.as_deref().unwrap_or(&self.name)
    }
}

/// The application a module turns into, as tracked while it is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppToProcess {
    pub name: String,
    pub module_name: String,
    #[serde(default, with = "humantime_serde")]
    pub upload_timeout: Option<Duration>,
    #[serde(default)]
    pub service_broker: Option<String>,
}

impl From<&Module> for AppToProcess {
    fn from(module: &Module) -> Self {
        Self {
            name: module.app_name().to_string(),
            module_name: module.name.clone(),
            upload_timeout: module.upload_timeout,
            service_broker: module.service_broker.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

/// Visitor over the descriptor tree. All methods default to no-ops.
pub trait DescriptorVisitor {
    fn visit_descriptor(&mut self, _descriptor: &mut DeploymentDescriptor) {}
    fn visit_module(&mut self, _module: &mut Module) {}
    fn visit_resource(&mut self, _resource: &mut Resource) {}
}

impl DeploymentDescriptor {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn accept(&mut self, visitor: &mut dyn DescriptorVisitor) {
        visitor.visit_descriptor(self);
        for module in &mut self.modules {
            visitor.visit_module(module);
        }
        for resource in &mut self.resources {
            visitor.visit_resource(resource);
        }
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn archive_elements(&self) -> MtaArchiveElements {
        let mut elements = MtaArchiveElements::default();
        for module in &self.modules {
            if let Some(path) = &module.path {
                elements.add_module_file_name(&module.name, path);
            }
        }
        elements
    }
}

/// Maps module names to their entry names inside the MTA archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtaArchiveElements {
    modules: BTreeMap<String, String>,
}

impl MtaArchiveElements {
    pub fn add_module_file_name(&mut self, module: &str, file_name: &str) {
        self.modules.insert(module.to_string(), file_name.to_string());
    }

    pub fn module_file_name(&self, module: &str) -> Option<&str> {
        self.modules.get(module).map(String::as_str)
    }
}
