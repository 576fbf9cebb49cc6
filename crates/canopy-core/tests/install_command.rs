//! Integration tests for the install, deploy and status commands against the
//! filesystem replica

use std::path::Path;

use tempfile::TempDir;

use canopy_core::commands::{
    CommandContext, DeployCommand, DeployOptions, InstallCommand, InstallOptions, StatusCommand,
    StatusOptions,
};
use canopy_core::error::CanopyError;
use canopy_core::install::PlanAction;
use canopy_core::orchestration::ModuleStatus;
use canopy_core::types::InstallMode;

const CONFIG: &str = r#"
[modules.hello]
type = "prebuilt"
wasm = "dist/hello.wasm"
"#;

fn setup_project() -> (TempDir, CommandContext) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let project = temp.path().join("project");
    let state = temp.path().join("state");
    std::fs::create_dir_all(project.join("dist")).expect("Failed to create project dir");
    std::fs::write(project.join("canopy.toml"), CONFIG).expect("Failed to write config");
    write_module(&project, b"\0asm\x01\0\0\0 v1");

    let ctx = CommandContext::new(project, state);
    (temp, ctx)
}

fn write_module(project: &Path, bytes: &[u8]) {
    std::fs::write(project.join("dist/hello.wasm"), bytes).expect("Failed to write module");
}

#[test]
fn install_upgrade_and_forced_upgrade() {
    let (_temp, ctx) = setup_project();
    let command = InstallCommand::new(ctx.clone());

    let report = command.execute(&InstallOptions::all()).unwrap();
    assert!(!report.has_failures());
    let ModuleStatus::Installed { module_id, .. } = &report.module("hello").unwrap().status else {
        panic!("expected install");
    };
    let replica = ctx.project_root().join(".canopy/replica/modules");
    assert!(replica.join(format!("{}.wasm", module_id)).exists());

    let report = command
        .execute(&InstallOptions::all().with_mode(InstallMode::Upgrade))
        .unwrap();
    let module = report.module("hello").unwrap();
    assert!(matches!(module.status, ModuleStatus::Unchanged { .. }));
    assert!(module.notices.iter().any(|n| {
        n.message.starts_with("Module hash ") && n.message.ends_with("is already installed.")
    }));

    let report = command
        .execute(
            &InstallOptions::all()
                .with_mode(InstallMode::Upgrade)
                .with_upgrade_unchanged(true),
        )
        .unwrap();
    assert!(matches!(
        report.module("hello").unwrap().status,
        ModuleStatus::Installed {
            action: PlanAction::Upgrade,
            ..
        }
    ));
}

#[test]
fn records_persist_between_commands() {
    let (_temp, ctx) = setup_project();
    InstallCommand::new(ctx.clone())
        .execute(&InstallOptions::module("hello"))
        .unwrap();

    let status = StatusCommand::new(ctx.clone())
        .execute(&StatusOptions::default())
        .unwrap();
    let entry = &status.modules[0];
    assert_eq!(entry.name, "hello");
    assert!(entry.declared);
    assert_eq!(entry.record.as_ref().unwrap().mode, InstallMode::Install);

    // a second plain install conflicts
    let report = InstallCommand::new(ctx)
        .execute(&InstallOptions::module("hello"))
        .unwrap();
    assert!(report.has_failures());
    assert!(matches!(
        report.module("hello").unwrap().status,
        ModuleStatus::Rejected { .. }
    ));
}

#[test]
fn deploy_installs_then_upgrades_on_change() {
    let (_temp, ctx) = setup_project();
    let deploy = DeployCommand::new(ctx.clone());

    let first = deploy.execute(&DeployOptions::default()).unwrap();
    assert!(matches!(
        first.module("hello").unwrap().status,
        ModuleStatus::Installed {
            action: PlanAction::Install,
            ..
        }
    ));

    let unchanged = deploy.execute(&DeployOptions::default()).unwrap();
    assert!(matches!(
        unchanged.module("hello").unwrap().status,
        ModuleStatus::Unchanged { .. }
    ));

    write_module(ctx.project_root(), b"\0asm\x01\0\0\0 v2");
    let changed = deploy.execute(&DeployOptions::default()).unwrap();
    assert!(matches!(
        changed.module("hello").unwrap().status,
        ModuleStatus::Installed {
            action: PlanAction::Upgrade,
            ..
        }
    ));

    let reinstall = deploy
        .execute(&DeployOptions::module("hello").with_mode(InstallMode::Reinstall))
        .unwrap();
    assert!(matches!(
        reinstall.module("hello").unwrap().status,
        ModuleStatus::Installed {
            action: PlanAction::Reinstall,
            ..
        }
    ));
}

#[test]
fn unknown_network_leaves_no_trace() {
    let (_temp, ctx) = setup_project();
    let err = InstallCommand::new(ctx.clone())
        .execute(&InstallOptions::all().with_network("staging"))
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CanopyError>(),
        Some(CanopyError::NetworkNotFound(_))
    ));
    assert!(!ctx.project_root().join(".canopy").exists());
    assert!(!ctx.state_dir().join("records").exists());
}

#[test]
fn remote_provider_fails_per_module() {
    let (_temp, ctx) = setup_project();
    std::fs::write(
        ctx.project_root().join("canopy.toml"),
        format!("{CONFIG}\n[networks.ic]\nproviders = [\"https://icp0.io\"]\n"),
    )
    .unwrap();

    let report = InstallCommand::new(ctx.clone())
        .execute(&InstallOptions::all().with_network("ic"))
        .unwrap();

    assert!(report.has_failures());
    let ModuleStatus::InstallFailed { reason } = &report.module("hello").unwrap().status else {
        panic!("expected install failure");
    };
    assert!(reason.contains("Unsupported provider scheme 'https'"));
    assert!(
        StatusCommand::new(ctx)
            .execute(&StatusOptions::default().with_network("ic"))
            .unwrap()
            .modules[0]
            .record
            .is_none()
    );
}
