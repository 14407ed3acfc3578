//! Common test utilities for SEOPilot integration tests
#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::{tempdir, TempDir};

/// Isolated home directory for one test
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempdir()?;
        let data_dir = temp_dir.path().join(".seopilot");
        Ok(Self { temp_dir, data_dir })
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// `pilot` with HOME pointed at the temp dir and no provider keys
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pilot"));
        cmd.env("HOME", self.temp_dir.path());
        for var in ["OPENAI_API_KEY", "ANTHROPIC_API_KEY", "OPENROUTER_API_KEY", "RUST_LOG"] {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Write `config.json` with the given content
    pub fn write_config(&self, content: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::write(self.data_file("config.json"), content)?;
        Ok(())
    }

    /// Write a knowledge note into the default knowledge folder
    pub fn write_note(&self, name: &str, content: &str) -> anyhow::Result<()> {
        let dir = self.data_dir.join("knowledge");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(name), content)?;
        Ok(())
    }
}
