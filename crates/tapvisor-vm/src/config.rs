//! Declared VM configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the PID file inside a run directory.
pub const PID_FILE: &str = "pid";
/// Name of the UUID file inside a run directory.
pub const UUID_FILE: &str = "uuid";

/// Declaration of a single VM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmSpec {
    /// Table key the VM was declared under
    #[serde(skip)]
    pub name: String,
    /// Memory size as understood by the hypervisor, e.g. `512M`
    pub memory: String,
    /// Number of virtual CPUs
    pub cores: u32,
    /// Hypervisor UUID; generated and persisted when empty
    pub uuid: String,
    pub ssh_key: Option<PathBuf>,
    pub provision_pre: Option<String>,
    pub provision_post: Option<String>,
    /// Ordering hints. Carried, not scheduled.
    pub before: Vec<String>,
    pub after: Vec<String>,
    pub requires: Vec<String>,
    /// Directory holding PID, identity and console files
    pub run_dir: PathBuf,
    /// Network interfaces, in slot order
    pub network: Vec<NetConf>,
    pub boot: Option<Boot>,
    /// Disks, in slot order
    pub hdd: Vec<Hdd>,
    /// Optical drives, in slot order
    pub cdrom: Vec<Cdrom>,
}

impl VmSpec {
    pub fn pid_file(&self) -> PathBuf {
        self.run_dir.join(PID_FILE)
    }

    pub fn uuid_file(&self) -> PathBuf {
        self.run_dir.join(UUID_FILE)
    }

    /// Per-network MAC file, `<network>_mac`.
    pub fn mac_file(&self, network: &str) -> PathBuf {
        mac_file(&self.run_dir, network)
    }

    /// Tap devices this VM attaches to `network`.
    pub fn devices_in<'a>(&'a self, network: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.network
            .iter()
            .filter(move |n| n.member_of.as_deref() == Some(network))
            .filter_map(|n| n.device.as_deref())
            .filter(|d| !d.is_empty())
    }
}

pub(crate) fn mac_file(run_dir: &Path, network: &str) -> PathBuf {
    run_dir.join(format!("{network}_mac"))
}

/// One guest network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConf {
    pub ip: Option<String>,
    /// Colon-separated MAC; generated per network when empty
    pub mac: Option<String>,
    /// Host-side device, e.g. `tap0` or `/dev/tap0`
    pub device: Option<String>,
    /// `virtio-tap`, `virtio-net` or `virtio-vpnkit`
    pub driver: String,
    /// Network this interface joins
    #[serde(rename = "memberOf")]
    pub member_of: Option<String>,
}

impl NetConf {
    /// A `virtio-tap` interface on `device` joined to `network`.
    pub fn tap(device: &str, network: &str) -> Self {
        Self {
            device: Some(device.to_string()),
            driver: "virtio-tap".into(),
            member_of: Some(network.to_string()),
            ..Default::default()
        }
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }

    /// Path of the host device node.
    pub fn device_path(&self) -> Option<PathBuf> {
        let device = self.device.as_deref().filter(|d| !d.is_empty())?;
        if device.starts_with('/') {
            Some(PathBuf::from(device))
        } else {
            Some(Path::new("/dev").join(device))
        }
    }
}

/// Boot method; exactly one per VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBoot")]
pub enum Boot {
    #[serde(rename = "kexec")]
    Kexec(Kexec),
    #[serde(rename = "firmware")]
    Firmware(Firmware),
    #[serde(rename = "fbsd")]
    FreeBsd(FreeBsd),
}

/// Direct kernel boot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Kexec {
    pub kernel: PathBuf,
    pub initrd: PathBuf,
    pub cmdline: String,
}

/// UEFI or other bootrom image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Firmware {
    pub path: PathBuf,
}

/// FreeBSD userboot loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreeBsd {
    pub userboot: PathBuf,
    pub bootvolume: PathBuf,
    pub kernelenv: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBoot {
    kexec: Option<Kexec>,
    firmware: Option<Firmware>,
    fbsd: Option<FreeBsd>,
}

impl TryFrom<RawBoot> for Boot {
    type Error = String;

    fn try_from(raw: RawBoot) -> Result<Self, Self::Error> {
        match (raw.kexec, raw.firmware, raw.fbsd) {
            (Some(k), None, None) => Ok(Boot::Kexec(k)),
            (None, Some(f), None) => Ok(Boot::Firmware(f)),
            (None, None, Some(b)) => Ok(Boot::FreeBsd(b)),
            (None, None, None) => {
                Err("boot requires one of kexec, firmware or fbsd".to_string())
            }
            _ => Err("boot declares more than one of kexec, firmware and fbsd".to_string()),
        }
    }
}

/// A disk image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hdd {
    pub path: PathBuf,
    pub format: String,
    pub driver: String,
    pub size: Option<String>,
    pub create: bool,
}

impl Default for Hdd {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            format: "raw".into(),
            driver: "virtio-blk".into(),
            size: None,
            create: false,
        }
    }
}

impl Hdd {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// An optical drive image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cdrom {
    pub path: PathBuf,
    pub driver: String,
    pub extract: bool,
}

impl Default for Cdrom {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            driver: "ahci-cd".into(),
            extract: false,
        }
    }
}

impl Cdrom {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_vm() {
        let spec: VmSpec = toml::from_str(
            r#"
            memory = "1G"
            cores = 2
            run_dir = "/var/run/vm1"
            after = ["db"]

            [[network]]
            driver = "virtio-tap"
            device = "tap0"
            memberOf = "lan"

            [[hdd]]
            path = "disk.img"

            [[cdrom]]
            path = "seed.iso"

            [boot.kexec]
            kernel = "vmlinuz"
            initrd = "initrd.gz"
            cmdline = "console=ttyS0"
            "#,
        )
        .unwrap();

        assert_eq!(spec.memory, "1G");
        assert_eq!(spec.cores, 2);
        assert_eq!(spec.after, vec!["db"]);
        assert_eq!(spec.network[0].member_of.as_deref(), Some("lan"));
        assert_eq!(spec.hdd[0].driver, "virtio-blk");
        assert_eq!(spec.hdd[0].format, "raw");
        assert_eq!(spec.cdrom[0].driver, "ahci-cd");
        assert!(matches!(spec.boot, Some(Boot::Kexec(ref k)) if k.cmdline == "console=ttyS0"));
        assert_eq!(spec.pid_file(), PathBuf::from("/var/run/vm1/pid"));
        assert_eq!(spec.mac_file("lan"), PathBuf::from("/var/run/vm1/lan_mac"));
    }

    #[test]
    fn test_boot_requires_exactly_one_variant() {
        #[derive(Debug, Deserialize)]
        struct Doc {
            #[allow(dead_code)]
            boot: Boot,
        }

        let two = "[boot.kexec]\nkernel = \"k\"\n[boot.firmware]\npath = \"fw\"\n";
        let err = toml::from_str::<Doc>(two).unwrap_err();
        assert!(err.to_string().contains("more than one"));

        let none = "[boot]\n";
        assert!(toml::from_str::<Doc>(none).is_err());

        let fbsd: Doc = toml::from_str(
            "[boot.fbsd]\nuserboot = \"userboot.so\"\nbootvolume = \"disk.img\"\nkernelenv = \"\"\n",
        )
        .unwrap();
        assert!(matches!(fbsd.boot, Boot::FreeBsd(_)));
    }

    #[test]
    fn test_device_path() {
        assert_eq!(
            NetConf::tap("tap3", "lan").device_path(),
            Some(PathBuf::from("/dev/tap3"))
        );
        assert_eq!(
            NetConf::tap("/tmp/tapdev", "lan").device_path(),
            Some(PathBuf::from("/tmp/tapdev"))
        );
        assert_eq!(NetConf::default().device_path(), None);
    }

    #[test]
    fn test_devices_in() {
        let spec = VmSpec {
            network: vec![
                NetConf::tap("tap0", "lan"),
                NetConf::tap("tap1", "dmz"),
                NetConf::tap("tap2", "lan"),
            ],
            ..Default::default()
        };
        assert_eq!(spec.devices_in("lan").collect::<Vec<_>>(), vec!["tap0", "tap2"]);
        assert_eq!(spec.devices_in("wan").count(), 0);
    }
}
