use async_trait::async_trait;
use dockhand_container::{
    BranchDeploymentManager, ContainerControl, DeployOptions, PortProbe, Result,
};
use dockhand_core::{MemoryLog, RecordingRunner};
use std::sync::{Arc, Mutex};

/// 削除要求を記録するだけのコンテナ操作
#[derive(Default)]
pub struct FakeControl {
    removed: Mutex<Vec<String>>,
}

impl FakeControl {
    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerControl for FakeControl {
    async fn remove(&self, name: &str) -> Result<()> {
        self.removed.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// 指定ポート以外はすべて空いている
pub struct BusyPorts(pub Vec<u16>);

impl PortProbe for BusyPorts {
    fn is_free(&self, port: u16) -> bool {
        !self.0.contains(&port)
    }
}

pub struct Harness {
    pub manager: BranchDeploymentManager,
    pub runner: Arc<RecordingRunner>,
    pub control: Arc<FakeControl>,
    pub log: Arc<MemoryLog>,
}

/// 起動するとすぐ "Listening on 3000" を出すコンテナ
pub fn ready_runner() -> RecordingRunner {
    RecordingRunner::new().output("docker run", 0, "Listening on 3000\n")
}

pub fn harness(runner: RecordingRunner, busy: Vec<u16>) -> Harness {
    let runner = Arc::new(runner);
    let control = Arc::new(FakeControl::default());
    let log = Arc::new(MemoryLog::new());
    let options = DeployOptions {
        source_port: 3000,
        ..Default::default()
    };
    let manager = BranchDeploymentManager::new(options, runner.clone(), control.clone())
        .unwrap()
        .with_probe(Arc::new(BusyPorts(busy)))
        .with_log(log.clone());
    Harness {
        manager,
        runner,
        control,
        log,
    }
}
