//! Fakes for the capability interfaces.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use canopy_core::audit::{
    AuditCapability, AuditError, AuditFinding, AuditGate, AuditTool, Severity,
};
use canopy_core::build::{BuildError, BuildPipeline, Compiler};
use canopy_core::install::InstallExecutor;
use canopy_core::network::{NetworkHandle, NetworkResolver};
use canopy_core::orchestration::Orchestrator;
use canopy_core::platform::{
    InstallRequest, MemoryRegistry, ModuleId, Transport, TransportError,
};
use canopy_core::types::{InstallMode, ModuleSpec};

/// Compiler returning canned bytes or diagnostics per module.
#[derive(Default)]
pub struct FakeCompiler {
    outputs: Mutex<HashMap<String, Result<Vec<u8>, String>>>,
    pub calls: AtomicUsize,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(self, module: &str, bytes: &[u8]) -> Self {
        self.set_output(module, bytes);
        self
    }

    pub fn with_failure(self, module: &str, diagnostics: &str) -> Self {
        self.outputs
            .lock()
            .unwrap()
            .insert(module.to_string(), Err(diagnostics.to_string()));
        self
    }

    pub fn set_output(&self, module: &str, bytes: &[u8]) {
        self.outputs
            .lock()
            .unwrap()
            .insert(module.to_string(), Ok(bytes.to_vec()));
    }
}

#[async_trait]
impl Compiler for FakeCompiler {
    async fn compile(&self, module: &ModuleSpec) -> Result<Vec<u8>, BuildError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let output = self.outputs.lock().unwrap().get(&module.name).cloned();
        match output {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(diagnostics)) => Err(BuildError::Compile {
                package: module.name.clone(),
                diagnostics,
            }),
            None => Err(BuildError::Compile {
                package: module.name.clone(),
                diagnostics: format!("no fake output for {}", module.name),
            }),
        }
    }
}

pub enum AuditBehavior {
    Findings(Vec<AuditFinding>),
    Error(String),
}

pub struct FakeAuditor {
    behavior: AuditBehavior,
    pub calls: Arc<AtomicUsize>,
}

impl FakeAuditor {
    pub fn clean() -> Self {
        Self::new(AuditBehavior::Findings(Vec::new()))
    }

    pub fn with_findings(findings: Vec<AuditFinding>) -> Self {
        Self::new(AuditBehavior::Findings(findings))
    }

    pub fn failing(reason: &str) -> Self {
        Self::new(AuditBehavior::Error(reason.to_string()))
    }

    fn new(behavior: AuditBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl AuditTool for FakeAuditor {
    fn name(&self) -> &str {
        "fake-audit"
    }

    async fn audit(&self, _module: &ModuleSpec) -> Result<Vec<AuditFinding>, AuditError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            AuditBehavior::Findings(findings) => Ok(findings.clone()),
            AuditBehavior::Error(reason) => Err(AuditError::Exit {
                status: "exit status: 2".to_string(),
                stderr: reason.clone(),
            }),
        }
    }
}

pub fn vulnerability(package: &str) -> AuditFinding {
    AuditFinding {
        severity: Severity::Vulnerability,
        advisory_id: "RUSTSEC-2020-0071".to_string(),
        package: package.to_string(),
        version: "0.1.45".to_string(),
        title: Some("Potential segfault".to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Create { module: String },
    Install { module: String, mode: InstallMode },
}

/// Transport that records every call and can be told to fail installs.
#[derive(Default)]
pub struct RecordingTransport {
    pub calls: Mutex<Vec<TransportCall>>,
    pub fail_install: AtomicBool,
    pub install_delay: Mutex<Duration>,
    active: AtomicUsize,
    pub peak_concurrency: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let transport = Self::default();
        transport.fail_install.store(true, Ordering::SeqCst);
        transport
    }

    pub fn with_install_delay(self, delay: Duration) -> Self {
        *self.install_delay.lock().unwrap() = delay;
        self
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn installs(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, TransportCall::Install { .. }))
            .count()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn create_module(
        &self,
        _network: &NetworkHandle,
        module: &str,
    ) -> Result<ModuleId, TransportError> {
        self.calls.lock().unwrap().push(TransportCall::Create {
            module: module.to_string(),
        });
        Ok(ModuleId::new(format!("{module}-id")))
    }

    async fn install_code(
        &self,
        _network: &NetworkHandle,
        request: InstallRequest<'_>,
    ) -> Result<(), TransportError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_concurrency.fetch_max(now, Ordering::SeqCst);

        self.calls.lock().unwrap().push(TransportCall::Install {
            module: request.module.to_string(),
            mode: request.mode,
        });
        let delay = *self.install_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.fail_install.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected {
                module_id: request.module_id.clone(),
                mode: request.mode,
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

pub fn local_network() -> NetworkHandle {
    NetworkHandle::new(
        "local",
        vec![Url::parse("file:///tmp/canopy-test-replica/").unwrap()],
    )
}

pub fn resolver() -> NetworkResolver {
    NetworkResolver::from_networks([local_network()])
}

/// Everything an orchestrator test needs to inspect afterwards.
pub struct Harness {
    pub compiler: Arc<FakeCompiler>,
    pub transport: Arc<RecordingTransport>,
    pub registry: Arc<MemoryRegistry>,
    pub audit: AuditCapability,
}

impl Harness {
    pub fn new(compiler: FakeCompiler) -> Self {
        Self {
            compiler: Arc::new(compiler),
            transport: Arc::new(RecordingTransport::new()),
            registry: Arc::new(MemoryRegistry::new()),
            audit: AuditCapability::unavailable("cargo-audit"),
        }
    }

    pub fn with_transport(mut self, transport: RecordingTransport) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn with_audit(mut self, audit: AuditCapability) -> Self {
        self.audit = audit;
        self
    }

    pub fn orchestrator(&self, modules: Vec<ModuleSpec>) -> Orchestrator {
        let pipeline =
            BuildPipeline::new(self.compiler.clone(), AuditGate::new(self.audit.clone()));
        let executor = InstallExecutor::new(self.transport.clone(), self.registry.clone());
        Orchestrator::new(modules, resolver(), pipeline, executor)
    }
}
