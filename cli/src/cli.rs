//! CLI command definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Multi-agent code reviewer
#[derive(Parser, Debug)]
#[command(name = "multi-reviewer")]
#[command(author, version, about = "Run several review agents against a repository in parallel")]
#[command(long_about = r#"
Multi-reviewer fans a set of review agents (security, performance, style, ...)
out against one target through GitHub Copilot and writes one markdown report
per agent plus a summary.

Targets are either a GitHub repository (read through the GitHub MCP server)
or a local directory (source files are collected and embedded in the prompt).

Example:
  multi-reviewer run --repo octo/service --agents security,performance
  multi-reviewer run --local ./src --all --passes 2
  multi-reviewer list
  multi-reviewer skill audit --param repository=octo/service
  multi-reviewer skill --list
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Path to a configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Ignore all configuration files and environment overrides
    #[arg(long, global = true, conflicts_with = "config")]
    pub no_config: bool,

    /// Additional agent directory (can be repeated)
    #[arg(long = "agents-dir", value_name = "DIR", global = true)]
    pub agents_dirs: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a review
    Run(RunArgs),

    /// List the agents found in the agent directories
    List,

    /// Run one agent skill, or list the available skills
    Skill(SkillArgs),
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["repo", "local"])))]
#[command(group(clap::ArgGroup::new("selection").required(true).args(["agents", "all"])))]
pub struct RunArgs {
    /// GitHub repository to review (owner/name)
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo: Option<String>,

    /// Local directory to review
    #[arg(long, value_name = "DIR")]
    pub local: Option<PathBuf>,

    /// Agents to run, comma-separated
    #[arg(short, long, value_delimiter = ',', value_name = "NAMES")]
    pub agents: Vec<String>,

    /// Run every discovered agent
    #[arg(long)]
    pub all: bool,

    /// Maximum number of concurrent sessions
    #[arg(short, long)]
    pub parallelism: Option<usize>,

    /// Number of review passes per agent (results are merged when > 1)
    #[arg(long)]
    pub passes: Option<u32>,

    /// Retries after a failed attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Execution strategy (futures, scoped)
    #[arg(long, value_name = "STRATEGY")]
    pub strategy: Option<String>,

    /// Review model for every agent (e.g. claude-sonnet-4.5, gpt-5.2-codex)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Directory reports are written to
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// GitHub token for the MCP server
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("action").required(true).args(["id", "list"])))]
pub struct SkillArgs {
    /// Skill to run
    pub id: Option<String>,

    /// Skill parameters as key=value, comma-separated or repeated
    #[arg(short, long = "param", value_delimiter = ',', value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Model for this run instead of the agent's
    #[arg(short, long)]
    pub model: Option<String>,

    /// GitHub token for the MCP server and the Copilot session
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// List skills with their parameters
    #[arg(long, conflicts_with = "id")]
    pub list: bool,
}
