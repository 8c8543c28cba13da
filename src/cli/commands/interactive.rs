use crate::cli::output;
use crate::core::config::Config;
use clap::Args;
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

#[derive(Args, Debug, Clone)]
pub struct InteractiveArgs {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Collect,
    Render,
    FullCycle,
    ClearCache,
    Exit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 5] = [
        MenuAction::Collect,
        MenuAction::Render,
        MenuAction::FullCycle,
        MenuAction::ClearCache,
        MenuAction::Exit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::Collect => "Collect observation data",
            MenuAction::Render => "Generate diagrams",
            MenuAction::FullCycle => "Full cycle (collect + generate)",
            MenuAction::ClearCache => "Clear photo cache",
            MenuAction::Exit => "Exit",
        }
    }
}

/// Runs pipeline stages as child processes of this executable, so a failing
/// stage reports an exit code instead of ending the menu.
pub struct StageRunner {
    exe: PathBuf,
    config: Option<PathBuf>,
}

impl StageRunner {
    pub fn new(exe: PathBuf, config: Option<PathBuf>) -> Self {
        Self { exe, config }
    }

    pub fn command(&self, stage: &str, extra: &[OsString]) -> Command {
        let mut cmd = Command::new(&self.exe);
        if let Some(config) = &self.config {
            cmd.arg("--config").arg(config);
        }
        cmd.arg(stage).args(extra);
        cmd
    }

    /// True if the stage exited successfully
    pub fn run_stage(&self, stage: &str, extra: &[OsString]) -> bool {
        let mut cmd = self.command(stage, extra);
        debug!("Running {:?}", cmd);
        match cmd.status() {
            Ok(status) if status.success() => {
                output::success(&format!("Stage '{}' finished", stage));
                true
            }
            Ok(status) => {
                output::error(&format!("Stage '{}' failed ({})", stage, status));
                false
            }
            Err(e) => {
                output::error(&format!("Could not start stage '{}': {}", stage, e));
                false
            }
        }
    }
}

pub fn run(_args: InteractiveArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let runner = StageRunner::new(std::env::current_exe()?, config_path.map(Path::to_path_buf));
    let theme = ColorfulTheme::default();
    let labels: Vec<&str> = MenuAction::ALL.iter().map(MenuAction::label).collect();

    loop {
        println!("\n{}", "=== iNaturalist Tree Generator ===".bold().cyan());
        let choice = Select::with_theme(&theme)
            .with_prompt("Choose an action")
            .items(&labels)
            .default(0)
            .interact()?;

        match MenuAction::ALL[choice] {
            MenuAction::Collect => {
                let extra = collect_args(&theme, &config.collection.user_login)?;
                runner.run_stage("collect", &extra);
            }
            MenuAction::Render => {
                let nodes_file = render_input(&config, std::env::var_os("TAXATREE_NODES_FILE"));
                if !nodes_file.exists() {
                    output::warning(&format!(
                        "{} not found, collect observation data first",
                        nodes_file.display()
                    ));
                    continue;
                }
                runner.run_stage("render", &[OsString::from("--input"), nodes_file.into_os_string()]);
            }
            MenuAction::FullCycle => {
                let extra = collect_args(&theme, &config.collection.user_login)?;
                if runner.run_stage("collect", &extra) {
                    runner.run_stage("render", &[]);
                }
            }
            MenuAction::ClearCache => {
                let confirmed = Confirm::with_theme(&theme)
                    .with_prompt(format!("Delete all photos in {}?", config.photos_dir().display()))
                    .default(false)
                    .interact()?;
                if confirmed {
                    runner.run_stage("clear-cache", &[]);
                }
            }
            MenuAction::Exit => {
                output::info("Goodbye!");
                return Ok(());
            }
        }
    }
}

/// Node file the render stage will read: TAXATREE_NODES_FILE wins over the config
fn render_input(config: &Config, env_override: Option<OsString>) -> PathBuf {
    env_override
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| config.nodes_file())
}

/// Ask for the user login when neither the config nor TAXATREE_USER has one
fn collect_args(theme: &ColorfulTheme, configured_user: &str) -> anyhow::Result<Vec<OsString>> {
    if !configured_user.trim().is_empty() || std::env::var_os("TAXATREE_USER").is_some() {
        return Ok(Vec::new());
    }

    let user: String = Input::with_theme(theme)
        .with_prompt("iNaturalist login")
        .validate_with(|input: &String| {
            if input.trim().is_empty() {
                Err("Login cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(vec!["--user".into(), user.trim().into()])
}
