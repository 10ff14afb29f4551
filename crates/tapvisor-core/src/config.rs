//! Topology loading.
//!
//! A topology is one or more TOML files declaring `[network.<name>]` and
//! `[vm.<name>]` tables. Paths inside are resolved against the directory
//! of the first file (or directory) given.

use crate::error::{CoreError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tapvisor_net::{NetworkSpec, Tap};
use tapvisor_vm::{Boot, VmSpec};

/// Directory under the base directory holding default run directories.
pub const STATE_DIR: &str = ".tapvisor";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TopologyFile {
    network: BTreeMap<String, NetworkSpec>,
    vm: BTreeMap<String, VmSpec>,
}

/// Declared networks and VMs, with paths resolved and defaults applied.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Directory relative paths were resolved against
    pub base_dir: PathBuf,
    pub networks: BTreeMap<String, NetworkSpec>,
    pub vms: BTreeMap<String, VmSpec>,
}

impl Topology {
    /// Load and merge topology files.
    ///
    /// Each path is a file or a directory of `*.toml` files (read in name
    /// order). Missing paths are skipped. Later declarations replace
    /// earlier ones of the same name.
    pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut base_dir = None;
        let mut files = Vec::new();

        for path in paths.iter().map(AsRef::as_ref) {
            if path.is_dir() {
                base_dir.get_or_insert_with(|| path.to_path_buf());
                files.extend(toml_files(path)?);
            } else if path.is_file() {
                base_dir.get_or_insert_with(|| parent_dir(path));
                files.push(path.to_path_buf());
            } else {
                tracing::debug!(path = %path.display(), "config path does not exist, skipping");
            }
        }

        let Some(base_dir) = base_dir else {
            return Err(CoreError::Config(format!(
                "no configuration found in {}",
                paths
                    .iter()
                    .map(|p| p.as_ref().display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        };

        let mut merged = TopologyFile::default();
        for file in &files {
            tracing::debug!(path = %file.display(), "loading config");
            let text = fs::read_to_string(file)?;
            let parsed: TopologyFile = toml::from_str(&text).map_err(|source| CoreError::Toml {
                path: file.clone(),
                source,
            })?;
            merged.network.extend(parsed.network);
            merged.vm.extend(parsed.vm);
        }

        Self::finalize(merged, absolute(&base_dir)?)
    }

    /// Parse a single TOML document, resolving paths against `base_dir`.
    pub fn from_toml_str(text: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let parsed: TopologyFile = toml::from_str(text).map_err(|source| CoreError::Toml {
            path: PathBuf::from("<string>"),
            source,
        })?;
        Self::finalize(parsed, base_dir.into())
    }

    /// Names and paths only. Problems with a single VM or network surface
    /// when that item is used.
    fn finalize(file: TopologyFile, base_dir: PathBuf) -> Result<Self> {
        let mut vms = file.vm;

        for (name, vm) in vms.iter_mut() {
            vm.name = name.clone();
            resolve_vm(vm, &base_dir);
        }

        Ok(Self {
            base_dir,
            networks: file.network,
            vms,
        })
    }

    pub fn vm(&self, name: &str) -> Result<&VmSpec> {
        self.vms
            .get(name)
            .ok_or_else(|| CoreError::UnknownVm(name.to_string()))
    }

    pub fn network(&self, name: &str) -> Result<&NetworkSpec> {
        self.networks
            .get(name)
            .ok_or_else(|| CoreError::UnknownNetwork(name.to_string()))
    }

    /// Every `memberOf` of `vm` names a declared network.
    pub fn check_membership(&self, vm: &VmSpec) -> Result<()> {
        for net in &vm.network {
            if let Some(network) = net.member_of.as_deref() {
                if !self.networks.contains_key(network) {
                    return Err(CoreError::Config(format!(
                        "VM {} is a member of undeclared network {network}",
                        vm.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// One named VM, or all of them in name order.
    pub fn select_vms(&self, selection: Option<&str>) -> Result<Vec<&VmSpec>> {
        match selection {
            Some(name) => Ok(vec![self.vm(name)?]),
            None => Ok(self.vms.values().collect()),
        }
    }

    /// Tap-backed networks in name order.
    pub fn tap_networks(&self) -> impl Iterator<Item = (&str, &Tap)> {
        self.networks
            .iter()
            .filter_map(|(name, spec)| spec.as_tap().map(|tap| (name.as_str(), tap)))
    }
}

fn toml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn absolute(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}

fn resolve(base: &Path, path: &mut PathBuf) {
    if !path.as_os_str().is_empty() && path.is_relative() {
        *path = base.join(&*path);
    }
}

fn resolve_vm(vm: &mut VmSpec, base: &Path) {
    if vm.run_dir.as_os_str().is_empty() {
        vm.run_dir = base.join(STATE_DIR).join(&vm.name);
    } else {
        resolve(base, &mut vm.run_dir);
    }

    if let Some(key) = vm.ssh_key.as_mut() {
        resolve(base, key);
    }

    match vm.boot.as_mut() {
        Some(Boot::Kexec(k)) => {
            resolve(base, &mut k.kernel);
            resolve(base, &mut k.initrd);
        }
        Some(Boot::Firmware(f)) => resolve(base, &mut f.path),
        Some(Boot::FreeBsd(b)) => {
            resolve(base, &mut b.userboot);
            resolve(base, &mut b.bootvolume);
        }
        None => {}
    }

    for hdd in &mut vm.hdd {
        resolve(base, &mut hdd.path);
        if hdd.driver.is_empty() {
            hdd.driver = "virtio-blk".into();
        }
        if hdd.format.is_empty() {
            hdd.format = "raw".into();
        }
    }

    for cd in &mut vm.cdrom {
        resolve(base, &mut cd.path);
        if cd.driver.is_empty() {
            cd.driver = "ahci-cd".into();
        }
    }
}
