//! Process lifecycle tests against a stub hypervisor.
//!
//! The stub is a shell script that ignores its arguments and idles, which
//! is enough to exercise launch, PID tracking and signalling.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;
use tapvisor_vm::{VmBuilder, VmController, VmError, VmSpec, VmStatus};
use tempfile::TempDir;

fn stub_hypervisor(dir: &Path) -> PathBuf {
    let path = dir.join("fake-hv");
    fs::write(&path, "#!/bin/sh\nwhile :; do sleep 1; done\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn spec(dir: &Path) -> VmSpec {
    VmBuilder::new("stub")
        .uuid("6ba7b810-9dad-11d1-80b4-00c04fd430c8")
        .cores(1)
        .memory("128M")
        .run_dir(dir.join("run"))
        .firmware("/nonexistent/fw.fd")
        .build_spec()
}

fn wait_for(controller: &VmController, spec: &VmSpec, want: fn(&VmStatus) -> bool) -> VmStatus {
    let mut status = controller.status(spec);
    for _ in 0..50 {
        if want(&status) {
            break;
        }
        sleep(Duration::from_millis(100));
        status = controller.status(spec);
    }
    status
}

/// up -> running -> up again (no-op) -> down -> stopped
#[test]
fn test_stub_lifecycle() {
    let dir = TempDir::new().unwrap();
    let controller = VmController::new(stub_hypervisor(dir.path()));
    let spec = spec(dir.path());
    fs::create_dir_all(&spec.run_dir).unwrap();

    assert_eq!(controller.status(&spec), VmStatus::NotFound);
    controller.validate(&spec).expect("stub spec should validate");

    let outcome = controller.up(&spec).expect("Failed to launch stub");
    let pid = outcome.pid();
    assert_eq!(
        fs::read_to_string(spec.pid_file()).unwrap(),
        pid.to_string()
    );

    let status = wait_for(&controller, &spec, VmStatus::is_running);
    assert_eq!(status, VmStatus::Running(pid));

    let again = controller.up(&spec).unwrap();
    assert_eq!(again, tapvisor_vm::UpOutcome::AlreadyRunning(pid));

    controller.down(&spec, Some("TERM")).expect("Failed to stop stub");
    let status = wait_for(&controller, &spec, |s| !s.is_running());
    assert_eq!(status, VmStatus::Stopped(pid));

    // PID file stays behind; liveness is derived on demand
    assert!(spec.pid_file().exists());
    assert!(matches!(
        controller.down(&spec, None),
        Err(VmError::NotRunning(_))
    ));
}

/// A live PID that is not the hypervisor counts as stopped.
#[test]
fn test_pid_reuse_is_stopped() {
    let dir = TempDir::new().unwrap();
    let controller = VmController::new(dir.path().join("fake-hv"));
    let spec = spec(dir.path());
    fs::create_dir_all(&spec.run_dir).unwrap();

    let me = std::process::id();
    fs::write(spec.pid_file(), me.to_string()).unwrap();

    assert_eq!(controller.status(&spec), VmStatus::Stopped(me));
    assert!(matches!(
        controller.down(&spec, Some("SIGKILL")),
        Err(VmError::NotRunning(_))
    ));
}
