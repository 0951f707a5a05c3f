//! 外部プロセスの実行
//!
//! docker / kaniko などの外部ツールはすべて [`ProcessRunner`] 経由で起動する。
//! 出力は [`ProcessEvent`] のストリームとして届き、`Exited` は常に最後に届く。

use crate::error::{CoreError, Result};
use crate::log::RunLog;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;

/// 起動するコマンド
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    /// コマンドラインを実行ログに書くか（認証情報を含む場合は false）
    pub log_command: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            log_command: true,
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// コマンドラインをログに残さない
    pub fn quiet(mut self) -> Self {
        self.log_command = false;
        self
    }

    /// ログ表示用のコマンドライン
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// プロセスから届くイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
    /// 終了コード（シグナル終了の場合は None）。常に最後のイベント
    Exited(Option<i32>),
}

/// 起動済みプロセス
#[derive(Debug)]
pub struct SpawnedProcess {
    pub pid: Option<u32>,
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
}

/// 完了したプロセスの出力
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// 出力チャンクを改行区切りの行にまとめる
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    /// チャンクを追加し、完成した行を返す
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            lines.push(line.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }

    /// 改行で終わっていない残りを返す
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

/// 外部プロセスを起動するランナー
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// プロセスを起動する。起動自体に失敗した場合は即座に `CoreError::Spawn`
    fn spawn(&self, spec: &CommandSpec) -> Result<SpawnedProcess>;

    /// 完了まで実行し、出力を行単位でログに流す
    async fn run(&self, spec: &CommandSpec, log: &dyn RunLog) -> Result<ProcessOutput> {
        if spec.log_command {
            log.write(&format!("Running '{}'", spec.display()));
        }

        let mut process = self.spawn(spec)?;
        let mut output = ProcessOutput {
            code: -1,
            ..Default::default()
        };
        let mut lines = LineBuffer::default();

        while let Some(event) = process.events.recv().await {
            match event {
                ProcessEvent::Stdout(chunk) => {
                    output.stdout.push_str(&chunk);
                    for line in lines.push(&chunk) {
                        log.write(&line);
                    }
                }
                ProcessEvent::Stderr(chunk) => {
                    output.stderr.push_str(&chunk);
                    for line in lines.push(&chunk) {
                        log.write(&line);
                    }
                }
                ProcessEvent::Exited(code) => {
                    output.code = code.unwrap_or(-1);
                    break;
                }
            }
        }

        if let Some(rest) = lines.flush() {
            log.write(&rest);
        }

        Ok(output)
    }
}

/// tokio::process によるローカル実行
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProcessRunner;

impl ProcessRunner for LocalProcessRunner {
    fn spawn(&self, spec: &CommandSpec) -> Result<SpawnedProcess> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        if spec.log_command {
            tracing::debug!("Spawning: {}", spec.display());
        } else {
            tracing::debug!("Spawning: {} (arguments hidden)", spec.program);
        }

        let mut child = cmd.spawn().map_err(|source| CoreError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        let pid = child.id();

        let (tx, rx) = mpsc::unbounded_channel();
        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward(out, tx.clone(), ProcessEvent::Stdout)));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward(err, tx.clone(), ProcessEvent::Stderr)));

        // 両方のストリームを読み切ってから終了イベントを送る
        tokio::spawn(async move {
            if let Some(task) = stdout_task {
                let _ = task.await;
            }
            if let Some(task) = stderr_task {
                let _ = task.await;
            }
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!("Failed to wait for process {:?}: {}", pid, e);
                    None
                }
            };
            let _ = tx.send(ProcessEvent::Exited(code));
        });

        Ok(SpawnedProcess { pid, events: rx })
    }
}

async fn forward<R>(
    mut reader: R,
    tx: mpsc::UnboundedSender<ProcessEvent>,
    wrap: fn(String) -> ProcessEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                // 受信側が閉じてもパイプは読み切る
                let _ = tx.send(wrap(String::from_utf8_lossy(&buf[..n]).into_owned()));
            }
            Err(e) => {
                tracing::debug!("Process output stream closed: {}", e);
                break;
            }
        }
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    //! テスト用のランナー

    use super::*;
    use std::sync::Mutex;

    enum Behavior {
        Exit {
            code: i32,
            stdout: String,
            stderr: String,
        },
        SpawnError,
    }

    struct Rule {
        prefix: String,
        behavior: Behavior,
    }

    /// 起動されたコマンドを記録し、前方一致ルールで結果を返すランナー
    ///
    /// ルールに一致しないコマンドは出力なしで exit 0 になる。
    #[derive(Default)]
    pub struct RecordingRunner {
        rules: Vec<Rule>,
        specs: Mutex<Vec<CommandSpec>>,
    }

    impl RecordingRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// `prefix` で始まるコマンドを `code` で終了させる
        pub fn exit_with(self, prefix: &str, code: i32) -> Self {
            self.output(prefix, code, "")
        }

        /// `prefix` で始まるコマンドに標準出力と終了コードを与える
        pub fn output(mut self, prefix: &str, code: i32, stdout: &str) -> Self {
            self.rules.push(Rule {
                prefix: prefix.to_string(),
                behavior: Behavior::Exit {
                    code,
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                },
            });
            self
        }

        /// `prefix` で始まるコマンドに標準エラーと終了コードを与える
        pub fn stderr(mut self, prefix: &str, code: i32, stderr: &str) -> Self {
            self.rules.push(Rule {
                prefix: prefix.to_string(),
                behavior: Behavior::Exit {
                    code,
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                },
            });
            self
        }

        /// `prefix` で始まるコマンドの起動自体を失敗させる
        pub fn spawn_error(mut self, prefix: &str) -> Self {
            self.rules.push(Rule {
                prefix: prefix.to_string(),
                behavior: Behavior::SpawnError,
            });
            self
        }

        pub fn specs(&self) -> Vec<CommandSpec> {
            self.specs.lock().map(|s| s.clone()).unwrap_or_default()
        }

        /// 記録されたコマンドライン
        pub fn commands(&self) -> Vec<String> {
            self.specs().iter().map(CommandSpec::display).collect()
        }
    }

    impl ProcessRunner for RecordingRunner {
        fn spawn(&self, spec: &CommandSpec) -> Result<SpawnedProcess> {
            if let Ok(mut specs) = self.specs.lock() {
                specs.push(spec.clone());
            }

            let line = spec.display();
            let rule = self.rules.iter().find(|r| line.starts_with(&r.prefix));

            let (tx, rx) = mpsc::unbounded_channel();
            match rule.map(|r| &r.behavior) {
                Some(Behavior::SpawnError) => {
                    return Err(CoreError::Spawn {
                        program: spec.program.clone(),
                        source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                    });
                }
                Some(Behavior::Exit {
                    code,
                    stdout,
                    stderr,
                }) => {
                    if !stdout.is_empty() {
                        let _ = tx.send(ProcessEvent::Stdout(stdout.clone()));
                    }
                    if !stderr.is_empty() {
                        let _ = tx.send(ProcessEvent::Stderr(stderr.clone()));
                    }
                    let _ = tx.send(ProcessEvent::Exited(Some(*code)));
                }
                None => {
                    let _ = tx.send(ProcessEvent::Exited(Some(0)));
                }
            }

            Ok(SpawnedProcess {
                pid: Some(4242),
                events: rx,
            })
        }
    }
}
