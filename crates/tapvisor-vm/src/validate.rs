//! Pre-flight checks before a VM is started.

use crate::config::{Boot, NetConf, VmSpec};
use crate::controller::VmStatus;
use crate::error::{Result, VmError};
use std::fs::OpenOptions;

/// Check that `spec` is complete and the host can run it.
///
/// Network interfaces are not probed while the VM is running, since a
/// running hypervisor holds its tap devices open.
pub fn validate(spec: &VmSpec, status: VmStatus) -> Result<()> {
    let missing = |what: &str| VmError::Config(format!("VM {}: {what} not specified", spec.name));

    if spec.uuid.is_empty() {
        return Err(missing("UUID"));
    }
    if spec.cores == 0 {
        return Err(missing("cores"));
    }
    if spec.memory.is_empty() {
        return Err(missing("memory"));
    }
    if spec.run_dir.as_os_str().is_empty() {
        return Err(missing("run directory"));
    }

    match &spec.boot {
        None => return Err(missing("boot")),
        Some(Boot::Kexec(k)) => {
            if !k.kernel.is_file() {
                return Err(VmError::Validation(format!(
                    "kernel not found: {}",
                    k.kernel.display()
                )));
            }
            if !k.initrd.is_file() {
                return Err(VmError::Validation(format!(
                    "initrd not found: {}",
                    k.initrd.display()
                )));
            }
        }
        Some(Boot::Firmware(_)) | Some(Boot::FreeBsd(_)) => {}
    }

    if status.is_running() {
        tracing::debug!(vm = %spec.name, "running, skipping network checks");
        return Ok(());
    }

    spec.network.iter().try_for_each(validate_net)
}

fn validate_net(net: &NetConf) -> Result<()> {
    match net.driver.as_str() {
        "virtio-tap" => {
            if net.mac.as_deref().map_or(true, str::is_empty) {
                return Err(VmError::Config(
                    "interface type tap requires a MAC address".into(),
                ));
            }
            let Some(path) = net.device_path() else {
                return Err(VmError::Config("interface type tap requires a device".into()));
            };
            OpenOptions::new().write(true).open(&path).map_err(|e| {
                VmError::Validation(format!(
                    "cannot open tap interface {} for writing: {e}",
                    path.display()
                ))
            })?;
            Ok(())
        }
        "virtio-net" => {
            if !nix::unistd::geteuid().is_root() {
                return Err(VmError::Validation(
                    "virtio-net requires running as UID 0".into(),
                ));
            }
            Ok(())
        }
        "virtio-vpnkit" => Err(VmError::Config(
            "virtio-vpnkit support is not yet implemented".into(),
        )),
        other => Err(VmError::Config(format!(
            "network driver {other:?} not supported: drivers virtio-tap, virtio-net and virtio-vpnkit are supported"
        ))),
    }
}
