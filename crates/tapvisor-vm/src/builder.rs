//! Builder pattern for ergonomic VmSpec construction.

use crate::config::{Boot, Cdrom, Firmware, FreeBsd, Hdd, Kexec, NetConf, VmSpec};
use std::path::PathBuf;

/// Fluent builder for [`VmSpec`].
///
/// # Example
///
/// ```
/// use tapvisor_vm::{NetConf, VmBuilder};
///
/// let spec = VmBuilder::new("web")
///     .cores(2)
///     .memory("512M")
///     .run_dir("/var/run/tapvisor/web")
///     .with_network(NetConf::tap("tap0", "lan"))
///     .kexec("/boot/vmlinuz", "/boot/initrd", "console=ttyS0")
///     .build_spec();
///
/// assert_eq!(spec.name, "web");
/// ```
#[derive(Debug, Clone)]
pub struct VmBuilder {
    spec: VmSpec,
}

impl VmBuilder {
    /// Create a new builder for a VM called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            spec: VmSpec {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    /// Set the number of virtual CPUs.
    pub fn cores(mut self, count: u32) -> Self {
        self.spec.cores = count;
        self
    }

    /// Set the memory size, e.g. `512M` or `2G`.
    pub fn memory(mut self, size: impl Into<String>) -> Self {
        self.spec.memory = size.into();
        self
    }

    pub fn uuid(mut self, uuid: impl Into<String>) -> Self {
        self.spec.uuid = uuid.into();
        self
    }

    /// Set the run directory for PID, identity and console files.
    pub fn run_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.run_dir = path.into();
        self
    }

    /// Append a network interface; slots follow call order.
    pub fn with_network(mut self, net: NetConf) -> Self {
        self.spec.network.push(net);
        self
    }

    /// Append a raw disk image on `virtio-blk`.
    pub fn with_disk(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.hdd.push(Hdd::new(path));
        self
    }

    pub fn with_hdd(mut self, hdd: Hdd) -> Self {
        self.spec.hdd.push(hdd);
        self
    }

    pub fn with_cdrom(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.cdrom.push(Cdrom::new(path));
        self
    }

    /// Boot a kernel and initrd directly.
    pub fn kexec(
        mut self,
        kernel: impl Into<PathBuf>,
        initrd: impl Into<PathBuf>,
        cmdline: impl Into<String>,
    ) -> Self {
        self.spec.boot = Some(Boot::Kexec(Kexec {
            kernel: kernel.into(),
            initrd: initrd.into(),
            cmdline: cmdline.into(),
        }));
        self
    }

    /// Boot from a firmware image.
    pub fn firmware(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.boot = Some(Boot::Firmware(Firmware { path: path.into() }));
        self
    }

    /// Boot through the FreeBSD userboot loader.
    pub fn freebsd(
        mut self,
        userboot: impl Into<PathBuf>,
        bootvolume: impl Into<PathBuf>,
        kernelenv: impl Into<String>,
    ) -> Self {
        self.spec.boot = Some(Boot::FreeBsd(FreeBsd {
            userboot: userboot.into(),
            bootvolume: bootvolume.into(),
            kernelenv: kernelenv.into(),
        }));
        self
    }

    /// Build and return the spec.
    pub fn build_spec(self) -> VmSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_is_replaced_not_stacked() {
        let spec = VmBuilder::new("vm")
            .kexec("k", "i", "")
            .firmware("/usr/share/uefi.fd")
            .build_spec();
        assert!(matches!(spec.boot, Some(Boot::Firmware(_))));
    }

    #[test]
    fn test_slots_follow_call_order() {
        let spec = VmBuilder::new("vm")
            .with_disk("a.img")
            .with_hdd(Hdd {
                format: "qcow".into(),
                ..Hdd::new("b.qcow2")
            })
            .with_cdrom("seed.iso")
            .build_spec();
        assert_eq!(spec.hdd[0].path, PathBuf::from("a.img"));
        assert_eq!(spec.hdd[1].format, "qcow");
        assert_eq!(spec.cdrom[0].driver, "ahci-cd");
    }
}
