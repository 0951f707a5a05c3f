//! コンテナの起動完了検知
//!
//! `docker run` の標準出力を蓄積し、チャンクを受け取るたびと終了時に
//! 起動判定パターンを評価する。最初に一致した時点で一度だけ通知し、
//! その後もプロセス終了まで出力をログへ流し続ける。

use crate::error::Result;
use dockhand_core::{LineBuffer, ProcessEvent, RunLog, SpawnedProcess};
use regex::Regex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// 起動完了を判定する正規表現の並び（先頭から評価）
#[derive(Debug, Clone)]
pub struct SuccessPatterns(Vec<Regex>);

impl SuccessPatterns {
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let compiled = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self(compiled))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 一致した最初のパターン
    pub fn find(&self, text: &str) -> Option<&Regex> {
        self.0.iter().find(|re| re.is_match(text))
    }
}

/// 起動待ちの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// パターンに一致する前に終了した
    Exited {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// 判定待ちの間だけ持つ出力バッファ
struct Pending {
    tx: oneshot::Sender<Readiness>,
    stdout: String,
    stderr: String,
}

/// プロセスのイベントを監視するタスクを起動し、起動完了の受信側を返す
///
/// パターンが空なら `Ready` にはならず、終了時に `Exited` を通知する。
/// 判定後と受信側が破棄された後は出力を蓄積せず、ログへの転送だけ続ける。
pub fn watch_readiness(
    mut process: SpawnedProcess,
    patterns: SuccessPatterns,
    log: Arc<dyn RunLog>,
) -> oneshot::Receiver<Readiness> {
    let (tx, rx) = oneshot::channel();
    let mut pending = Some(Pending {
        tx,
        stdout: String::new(),
        stderr: String::new(),
    });

    tokio::spawn(async move {
        let mut out_lines = LineBuffer::default();
        let mut err_lines = LineBuffer::default();
        let mut code = None;

        while let Some(event) = process.events.recv().await {
            if pending.as_ref().is_some_and(|p| p.tx.is_closed()) {
                tracing::debug!("Readiness receiver dropped, forwarding output only");
                pending = None;
            }

            match event {
                ProcessEvent::Stdout(chunk) => {
                    for line in out_lines.push(&chunk) {
                        log.write(&line);
                    }
                    let Some(p) = pending.as_mut() else {
                        continue;
                    };
                    p.stdout.push_str(&chunk);
                    if let Some(re) = patterns.find(&p.stdout) {
                        tracing::debug!("Readiness pattern '{}' matched", re.as_str());
                        if let Some(p) = pending.take() {
                            let _ = p.tx.send(Readiness::Ready);
                        }
                    }
                }
                ProcessEvent::Stderr(chunk) => {
                    for line in err_lines.push(&chunk) {
                        log.write(&line);
                    }
                    if let Some(p) = pending.as_mut() {
                        p.stderr.push_str(&chunk);
                    }
                }
                ProcessEvent::Exited(exit) => {
                    code = exit;
                    break;
                }
            }
        }

        for rest in [out_lines.flush(), err_lines.flush()].into_iter().flatten() {
            log.write(&rest);
        }
        tracing::debug!("Container process {:?} exited with {:?}", process.pid, code);

        // stdout はチャンクごとに評価済み
        if let Some(p) = pending.take() {
            let _ = p.tx.send(Readiness::Exited {
                code,
                stdout: p.stdout,
                stderr: p.stderr,
            });
        }
    });

    rx
}
