//! 実行ログ
//!
//! サブプロセスの出力や診断メッセージを書き込む追記専用のシンク。

use std::sync::Mutex;

/// 行指向の追記専用ログ
pub trait RunLog: Send + Sync {
    /// テキストを追記する。改行を含む場合は行ごとに扱う
    fn write(&self, text: &str);
}

/// tracing にそのまま流すログ
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl RunLog for TracingLog {
    fn write(&self, text: &str) {
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!(target: "dockhand::run", "{}", line);
        }
    }
}

/// メモリ上に行を蓄積するログ
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl RunLog for MemoryLog {
    fn write(&self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.extend(text.lines().map(str::to_string));
        }
    }
}
