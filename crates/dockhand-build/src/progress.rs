use colored::Colorize;
use dockhand_core::RunLog;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// スピナーの上にサブプロセス出力を流す実行ログ
pub struct ConsoleLog {
    progress_bar: ProgressBar,
    interactive: bool,
}

impl ConsoleLog {
    pub fn new(name: &str) -> Self {
        let interactive = std::io::stderr().is_terminal();
        let pb = if interactive {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Building {}...", name));
        if interactive {
            pb.enable_steady_tick(Duration::from_millis(120));
        }

        Self {
            progress_bar: pb,
            interactive,
        }
    }

    pub fn finish_success(&self) {
        self.progress_bar
            .finish_with_message(format!("{} Release completed", "✓".green()));
    }

    pub fn finish_error(&self, error: &str) {
        self.progress_bar
            .finish_with_message(format!("{} Release failed: {}", "✗".red(), error));
    }
}

impl RunLog for ConsoleLog {
    fn write(&self, text: &str) {
        for line in text.lines() {
            if self.interactive {
                self.progress_bar.println(format!("  {}", line.dimmed()));
            } else {
                // 非TTYでは hidden バーが println を捨てるため直接書く
                eprintln!("  {}", line);
            }
        }
    }
}
