//! Inspection of the combined descriptor-set artifact.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use prost::Message;
use prost_types::{DescriptorProto, FileDescriptorSet};

use crate::error::{CodegenError, Result};

/// A decoded descriptor set.
#[derive(Debug, Clone, Default)]
pub struct DescriptorSet {
    inner: FileDescriptorSet,
}

impl DescriptorSet {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| CodegenError::io(path, e))?;
        Self::decode(&bytes).map_err(|detail| CodegenError::InvalidDescriptor {
            path: path.to_path_buf(),
            detail,
        })
    }

    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, String> {
        FileDescriptorSet::decode(bytes)
            .map(|inner| Self { inner })
            .map_err(|e| e.to_string())
    }

    /// Schema file names in the set, as the compiler recorded them.
    pub fn files(&self) -> Vec<&str> {
        self.inner.file.iter().map(|f| f.name()).collect()
    }

    /// Fully qualified names of every message, nested ones included.
    pub fn message_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for file in &self.inner.file {
            let scope = file.package();
            for message in &file.message_type {
                collect_messages(scope, message, &mut names);
            }
        }
        names
    }

    /// Fully qualified names of every service.
    pub fn service_names(&self) -> BTreeSet<String> {
        self.inner
            .file
            .iter()
            .flat_map(|file| {
                file.service
                    .iter()
                    .map(move |service| qualify(file.package(), service.name()))
            })
            .collect()
    }

    pub fn contains_message(&self, name: &str) -> bool {
        self.message_names().contains(name)
    }
}

fn collect_messages(scope: &str, message: &DescriptorProto, names: &mut BTreeSet<String>) {
    let name = qualify(scope, message.name());
    for nested in &message.nested_type {
        collect_messages(&name, nested, names);
    }
    names.insert(name);
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}
