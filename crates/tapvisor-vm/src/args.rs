//! Hypervisor argument vector.
//!
//! The hypervisor is slot sensitive, so the order below is part of the
//! contract: identity and resources, platform devices, serial console,
//! network (`2:n`), disks (`3:n`), optical drives (`4:n`), then boot.

use crate::config::{Boot, VmSpec};
use std::path::Path;

const PLATFORM: [&str; 7] = ["-A", "-s", "0:0,hostbridge", "-s", "31,lpc", "-s", "1,virtio-rnd"];

/// Build the hypervisor arguments for `spec`.
pub fn build_args(spec: &VmSpec) -> Vec<String> {
    let mut args = Vec::new();

    if !spec.uuid.is_empty() {
        push(&mut args, "-U", spec.uuid.clone());
    }
    if spec.cores != 0 {
        push(&mut args, "-c", spec.cores.to_string());
    }
    if !spec.memory.is_empty() {
        push(&mut args, "-m", spec.memory.clone());
    }

    args.extend(PLATFORM.iter().map(|s| s.to_string()));

    if !spec.run_dir.as_os_str().is_empty() {
        push(&mut args, "-l", serial(&spec.run_dir));
    }

    for (i, net) in spec.network.iter().enumerate() {
        let mut slot = format!("2:{i},{}", net.driver);
        if let Some(device) = net.device.as_deref().filter(|d| !d.is_empty()) {
            slot.push(',');
            slot.push_str(device);
        }
        if let Some(mac) = net.mac.as_deref().filter(|m| !m.is_empty()) {
            slot.push_str(",mac=");
            slot.push_str(mac);
        }
        push(&mut args, "-s", slot);
    }

    for (i, hdd) in spec.hdd.iter().enumerate() {
        let slot = format!(
            "3:{i},{},file://{},format={}",
            hdd.driver,
            hdd.path.display(),
            hdd.format
        );
        push(&mut args, "-s", slot);
    }

    for (i, cd) in spec.cdrom.iter().enumerate() {
        push(&mut args, "-s", format!("4:{i},{},{}", cd.driver, cd.path.display()));
    }

    if let Some(boot) = &spec.boot {
        push(&mut args, "-f", boot_flag(boot));
    }

    args
}

fn push(args: &mut Vec<String>, flag: &str, value: String) {
    args.push(flag.to_string());
    args.push(value);
}

fn serial(run_dir: &Path) -> String {
    format!(
        "com1,autopty={},log={}",
        run_dir.join("tty").display(),
        run_dir.join("console.log").display()
    )
}

fn boot_flag(boot: &Boot) -> String {
    match boot {
        Boot::Kexec(k) => format!(
            "kexec,{},{},{}",
            k.kernel.display(),
            k.initrd.display(),
            k.cmdline
        ),
        Boot::Firmware(f) => format!("bootrom,{},,", f.path.display()),
        Boot::FreeBsd(b) => format!(
            "fbsd,{},{},{}",
            b.userboot.display(),
            b.bootvolume.display(),
            b.kernelenv
        ),
    }
}
