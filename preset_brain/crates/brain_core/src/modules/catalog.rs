use crate::modules::protocol::DeviceDescriptor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BUILTIN_DEVICES: &[(&str, &str)] = &[(
    "mooer-ge150-pro.json",
    include_str!("../../devices/mooer-ge150-pro.json"),
)];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("duplicate device id: {0}")]
    DuplicateDevice(String),
    #[error("io error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid device descriptor {origin}: {source}")]
    Descriptor {
        origin: String,
        source: serde_json::Error,
    },
}

/// Read-only lookup of device descriptors by exact device id.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    devices: Vec<DeviceDescriptor>,
    by_id: HashMap<String, usize>,
}

impl DeviceCatalog {
    /// Descriptors compiled into the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        let descriptors = BUILTIN_DEVICES
            .iter()
            .map(|(origin, raw)| parse_descriptor(origin, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_descriptors(descriptors)
    }

    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = DeviceDescriptor>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        catalog.extend(descriptors)?;
        Ok(catalog)
    }

    /// Reads every `*.json` file in `dir`, in file-name order.
    pub fn load_dir(dir: &Path) -> Result<Vec<DeviceDescriptor>, CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        paths.sort();

        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
                path: path.clone(),
                source,
            })?;
            out.push(parse_descriptor(&path.display().to_string(), &raw)?);
        }
        Ok(out)
    }

    pub fn extend(
        &mut self,
        descriptors: impl IntoIterator<Item = DeviceDescriptor>,
    ) -> Result<(), CatalogError> {
        for d in descriptors {
            if self.by_id.contains_key(&d.device_id) {
                return Err(CatalogError::DuplicateDevice(d.device_id));
            }
            self.by_id.insert(d.device_id.clone(), self.devices.len());
            self.devices.push(d);
        }
        Ok(())
    }

    pub fn find(&self, device_id: &str) -> Result<&DeviceDescriptor, CatalogError> {
        self.by_id
            .get(device_id)
            .map(|&i| &self.devices[i])
            .ok_or_else(|| CatalogError::DeviceNotFound(device_id.to_string()))
    }

    /// Device ids in load order.
    pub fn names(&self) -> Vec<&str> {
        self.devices.iter().map(|d| d.device_id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

fn parse_descriptor(origin: &str, raw: &str) -> Result<DeviceDescriptor, CatalogError> {
    serde_json::from_str(raw).map_err(|source| CatalogError::Descriptor {
        origin: origin.to_string(),
        source,
    })
}
