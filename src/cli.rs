use clap::Parser;
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;

/// Mirror Jira issues into Azure DevOps work items.
///
/// Settings come from the config file; any flag given here wins over it.
#[derive(Debug, Parser)]
#[command(name = "jira2devops", version, about)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Jira URL, or the bare Atlassian site name.
    #[arg(long)]
    pub jira_url: Option<String>,

    /// Jira user ID.
    #[arg(long)]
    pub jira_user: Option<String>,

    /// Jira password or API token.
    #[arg(long, env = "JIRA_PASSWORD", hide_env_values = true)]
    pub jira_password: Option<String>,

    /// Jira project key whose boards supply the active sprints.
    #[arg(long)]
    pub jira_project: Option<String>,

    /// Azure DevOps organisation URL, or the bare organisation name.
    #[arg(long, alias = "vsts-url")]
    pub devops_url: Option<String>,

    /// Azure DevOps project name.
    #[arg(long, alias = "vsts-project")]
    pub devops_project: Option<String>,

    /// Azure DevOps personal access token.
    #[arg(long, alias = "vsts-pat", env = "DEVOPS_PAT", hide_env_values = true)]
    pub devops_pat: Option<String>,

    /// Submit every write with validateOnly; nothing is committed.
    #[arg(short, long)]
    pub readonly: bool,

    /// Issues fetched per search request.
    #[arg(long)]
    pub page_size: Option<usize>,
}
