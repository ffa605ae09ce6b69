//! The `VmCore` seam: a real `deno_core`-backed implementation and a
//! fake for app-handler tests that don't need an actual V8 isolate.

use super::bootstrap::{self, script_tags};
use super::captured::CapturedData;
use super::config::VmConfig;
use super::ops::{self, SharedCaptured, SharedConfig};
use crate::error::AppError;
use deno_core::{JsRuntime, RuntimeOptions};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// `NEW` until the first `Configure` runs host-API binding; `READY` after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmStatus {
    /// No `Configure` has run yet; the bootstrap script hasn't executed.
    New,
    /// Bootstrapped and ready to `Execute`.
    Ready,
}

/// Capability seam for one VM. Implementations are never `Sync`: a
/// `VmCore` belongs to exactly one worker thread (see
/// [`super::worker`]) for its whole lifetime.
pub trait VmCore {
    /// Whether the bootstrap script has run yet.
    fn status(&self) -> VmStatus;
    /// Runs the bootstrap script on first call, then rebinds per-request
    /// data onto the existing context.
    fn configure(&mut self, config: VmConfig) -> Result<(), AppError>;
    /// Runs `source` under a cooperative `timeout`, returning whatever
    /// `server.response.*` calls recorded.
    fn execute(&mut self, name: &str, source: &str, timeout: Duration) -> Result<CapturedData, AppError>;
    /// Clears captured response effects, leaving the context intact.
    fn reset(&mut self);
}

/// Real VM backed by a `deno_core::JsRuntime`.
pub struct DenoVmCore {
    runtime: JsRuntime,
    status: VmStatus,
    captured: SharedCaptured,
    config_cell: SharedConfig,
}

impl DenoVmCore {
    pub fn new() -> Result<Self, AppError> {
        let captured: SharedCaptured = Rc::new(RefCell::new(CapturedData::default()));
        let config_cell: SharedConfig = Rc::new(RefCell::new(VmConfig::default()));

        let mut runtime = JsRuntime::new(RuntimeOptions {
            extensions: vec![ops::extension()],
            ..Default::default()
        });

        {
            let op_state = runtime.op_state();
            let mut op_state = op_state.borrow_mut();
            op_state.put(Rc::clone(&captured));
            op_state.put(Rc::clone(&config_cell));
        }

        Ok(Self {
            runtime,
            status: VmStatus::New,
            captured,
            config_cell,
        })
    }

    fn take_captured(&self) -> CapturedData {
        self.captured.borrow().clone()
    }
}

impl VmCore for DenoVmCore {
    fn status(&self) -> VmStatus {
        self.status
    }

    fn configure(&mut self, config: VmConfig) -> Result<(), AppError> {
        if self.status == VmStatus::New {
            self.runtime
                .execute_script(script_tags::BOOTSTRAP, bootstrap::BOOTSTRAP_SCRIPT)
                .map_err(|e| AppError::VmConfigure(format!("bootstrap failed: {e:?}")))?;
            self.status = VmStatus::Ready;
        }

        let request_json = serde_json::to_string(&config.request)
            .map_err(|e| AppError::VmConfigure(format!("request serialize failed: {e}")))?;
        let script = bootstrap::configure_script(&config.env, &request_json);
        *self.config_cell.borrow_mut() = config;

        self.runtime
            .execute_script(script_tags::CONFIGURE, script)
            .map_err(|e| AppError::VmConfigure(format!("configure binding failed: {e:?}")))?;
        Ok(())
    }

    fn execute(
        &mut self,
        name: &str,
        source: &str,
        timeout: Duration,
    ) -> Result<CapturedData, AppError> {
        let completed = Arc::new(AtomicBool::new(false));
        let terminated = Arc::new(AtomicBool::new(false));
        let wake = Arc::new((Mutex::new(false), Condvar::new()));
        let isolate_handle = self.runtime.v8_isolate().thread_safe_handle();

        let watcher = {
            let completed = Arc::clone(&completed);
            let terminated = Arc::clone(&terminated);
            let wake = Arc::clone(&wake);
            std::thread::spawn(move || {
                let (lock, cvar) = &*wake;
                let guard = lock.lock().unwrap();
                let (_guard, timed_out) = cvar
                    .wait_timeout_while(guard, timeout, |done| !*done)
                    .unwrap();
                if timed_out.timed_out() && !completed.load(Ordering::SeqCst) {
                    terminated.store(true, Ordering::SeqCst);
                    isolate_handle.terminate_execution();
                }
            })
        };

        let wrapped = bootstrap::wrap_execute(source);
        let result = self.runtime.execute_script(script_tags::EXECUTE, wrapped);

        completed.store(true, Ordering::SeqCst);
        {
            let (lock, cvar) = &*wake;
            let mut done = lock.lock().unwrap();
            *done = true;
            cvar.notify_one();
        }
        let _ = watcher.join();
        tracing::debug!(script = name, "vm execute finished");

        match result {
            Ok(_) => Ok(self.take_captured()),
            Err(e) => {
                if terminated.load(Ordering::SeqCst) {
                    self.runtime.v8_isolate().cancel_terminate_execution();
                    Err(AppError::VmTimeout)
                } else {
                    Err(AppError::VmExecute {
                        stack: format!("{e:?}"),
                    })
                }
            }
        }
    }

    fn reset(&mut self) {
        *self.captured.borrow_mut() = CapturedData::default();
    }
}

/// Canned-response double for app-handler tests. Never touches V8.
#[derive(Default)]
pub struct FakeVmCore {
    /// Canned `status()` reply. `None` behaves like `VmStatus::New`.
    pub status: Option<VmStatus>,
    /// Canned `configure()` outcome. `None` means "succeed".
    pub configure_result: Option<Result<(), String>>,
    /// Canned `execute()` outcome. `None` means "succeed with an empty result".
    pub execute_result: Option<Result<CapturedData, FakeExecuteError>>,
    /// The config passed to the most recent `configure()` call.
    pub last_config: Option<VmConfig>,
    /// How many times `reset()` has been called.
    pub reset_count: usize,
}

/// The three ways a fake execution can fail, mirroring the real taxonomy.
#[derive(Debug, Clone)]
pub enum FakeExecuteError {
    /// Fails as if `Configure` itself had failed.
    Configure(String),
    /// Fails as if the bundle threw during `Execute`.
    Execute(String),
    /// Fails as if the execution timed out.
    Timeout,
}

impl VmCore for FakeVmCore {
    fn status(&self) -> VmStatus {
        self.status.unwrap_or(VmStatus::New)
    }

    fn configure(&mut self, config: VmConfig) -> Result<(), AppError> {
        self.last_config = Some(config);
        match self.configure_result.clone() {
            Some(Ok(())) | None => {
                self.status = Some(VmStatus::Ready);
                Ok(())
            }
            Some(Err(msg)) => Err(AppError::VmConfigure(msg)),
        }
    }

    fn execute(
        &mut self,
        _name: &str,
        _source: &str,
        _timeout: Duration,
    ) -> Result<CapturedData, AppError> {
        match self.execute_result.clone() {
            Some(Ok(data)) => Ok(data),
            Some(Err(FakeExecuteError::Configure(msg))) => Err(AppError::VmConfigure(msg)),
            Some(Err(FakeExecuteError::Execute(msg))) => Err(AppError::VmExecute { stack: msg }),
            Some(Err(FakeExecuteError::Timeout)) => Err(AppError::VmTimeout),
            None => Ok(CapturedData::default()),
        }
    }

    fn reset(&mut self) {
        self.reset_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_configure_records_last_config() {
        let mut vm = FakeVmCore::default();
        let config = VmConfig {
            env: "test".into(),
            ..Default::default()
        };
        vm.configure(config.clone()).unwrap();
        assert_eq!(vm.status(), VmStatus::Ready);
        assert_eq!(vm.last_config.unwrap().env, "test");
    }

    #[test]
    fn fake_execute_defaults_to_empty_success() {
        let mut vm = FakeVmCore::default();
        let captured = vm.execute("<t>", "", Duration::from_millis(1)).unwrap();
        assert!(captured.render_html.is_none());
    }

    #[test]
    fn fake_reset_counts_calls() {
        let mut vm = FakeVmCore::default();
        vm.reset();
        vm.reset();
        assert_eq!(vm.reset_count, 2);
    }

    #[test]
    fn deno_execute_times_out_on_an_infinite_loop() {
        let mut vm = DenoVmCore::new().unwrap();
        vm.configure(VmConfig::default()).unwrap();

        let start = std::time::Instant::now();
        let result = vm.execute("<loop>", "while (true) {}", Duration::from_millis(50));
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(AppError::VmTimeout)));
        assert!(elapsed < Duration::from_millis(500), "timeout should fire within a bounded multiple of the 50ms budget");
    }

    #[test]
    fn deno_vm_is_reusable_after_a_timeout() {
        let mut vm = DenoVmCore::new().unwrap();
        vm.configure(VmConfig::default()).unwrap();
        let _ = vm.execute("<loop>", "while (true) {}", Duration::from_millis(50));

        let captured = vm
            .execute("<ok>", "server.response.render('<p>ok</p>', 200)", Duration::from_secs(1))
            .unwrap();
        assert_eq!(captured.render_html.as_deref(), Some("<p>ok</p>"));
    }

    #[test]
    fn deno_execute_runs_host_api_round_trip() {
        let mut vm = DenoVmCore::new().unwrap();
        vm.configure(VmConfig::default()).unwrap();
        let captured = vm
            .execute(
                "<t>",
                "server.response.setTitle('hi'); server.response.render('<p>x</p>', 201)",
                Duration::from_secs(1),
            )
            .unwrap();
        assert_eq!(captured.title.as_deref(), Some("hi"));
        assert_eq!(captured.render_html.as_deref(), Some("<p>x</p>"));
        assert_eq!(captured.status, Some(201));
    }
}
