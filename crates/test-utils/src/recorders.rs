use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sitepipe::pipeline::{BuildObserver, BuildReport, ReloadSignal, ReloadSink, StageError};

/// Observer that keeps everything it is told.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub failures: Mutex<Vec<(PathBuf, StageError)>>,
    pub warnings: Mutex<Vec<(PathBuf, String)>>,
    pub reports: Mutex<Vec<BuildReport>>,
}

impl RecordingObserver {
    pub fn failures(&self) -> Vec<(PathBuf, StageError)> {
        self.failures.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<(PathBuf, String)> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn reports(&self) -> Vec<BuildReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl BuildObserver for RecordingObserver {
    fn file_failed(&self, _task: &str, source: &Path, error: &StageError) {
        self.failures
            .lock()
            .unwrap()
            .push((source.to_path_buf(), error.clone()));
    }

    fn file_warning(&self, _task: &str, source: &Path, _stage: &str, message: &str) {
        self.warnings
            .lock()
            .unwrap()
            .push((source.to_path_buf(), message.to_string()));
    }

    fn task_finished(&self, report: &BuildReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

/// Reload sink that keeps every signal.
#[derive(Debug, Default)]
pub struct RecordingReloadSink {
    signals: Mutex<Vec<ReloadSignal>>,
}

impl RecordingReloadSink {
    pub fn signals(&self) -> Vec<ReloadSignal> {
        self.signals.lock().unwrap().clone()
    }
}

impl ReloadSink for RecordingReloadSink {
    fn reload(&self, signal: ReloadSignal) {
        self.signals.lock().unwrap().push(signal);
    }
}
