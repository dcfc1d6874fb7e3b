use std::io::{self, Write};

use crate::agent::extract::ScopingResult;
use crate::agent::{prompt, AgentApi};
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::platform::IssueSource;
use crate::render;

use super::pr::{PrTuning, PullRequestPoller};
use super::scope::{ScopeTuning, ScopingSession};
use super::types::{PrOutcome, ScopeOutcome};

/// List open issues as a table.
pub async fn list_issues(issues: &dyn IssueSource, repo: &str) -> Result<()> {
    let open = issues.list_open_issues(repo).await?;
    render::issue_table(repo, &open);
    Ok(())
}

/// Scope one issue end to end: create a session, wait for the scoping block,
/// present it, and optionally shepherd the session to a pull request.
pub async fn scope_issue(
    config: &AppConfig,
    issues: &dyn IssueSource,
    agent: &dyn AgentApi,
    repo: &str,
    number: u64,
) -> Result<()> {
    let issue = issues.get_issue(repo, number).await?;

    render::section(&format!("Scoping issue #{number}"), &issue.title);

    let scope_prompt = prompt::scoping_prompt(repo, &issue.title, &issue.body);
    let mut session = ScopingSession::open(
        agent,
        ScopeTuning::from(&config.scope),
        &scope_prompt,
        &format!("Scope {repo}#{number}"),
    )
    .await?;

    if let Some(url) = &session.session().url {
        println!("Session: {url}");
    }

    let outcome = session.wait_for_scoping().await?;

    render::rule(&format!("Scoping result for #{number}"));

    let result = match outcome {
        ScopeOutcome::Final(result) => result,
        ScopeOutcome::Interim(texts) => {
            println!("No final scoping block yet; showing the latest agent output.\n");
            let combined = texts.join("\n\n");
            // Interim output occasionally carries a usable confidence line.
            ScopingResult::parse(&combined).unwrap_or_else(|_| ScopingResult::raw_only(&combined))
        }
        ScopeOutcome::TimedOut => {
            return Err(AppError::Timeout(format!(
                "No agent response for issue #{number} within the scoping window"
            )));
        }
    };

    render::scoping_result(&result);

    if !confirm(&format!("\nCreate a PR for issue #{number}? [y/N]: "))? {
        println!("Skipped PR creation.");
        return Ok(());
    }

    if !config.devin.use_gh_app {
        println!(
            "devin.use_gh_app is disabled -- not asking the agent to open a PR.\n\
             Enable it to let the agent open PRs through its GitHub integration."
        );
        return Ok(());
    }

    let session_id = session.session().session_id.clone();
    agent
        .send_message(&session_id, &prompt::pull_request_prompt(repo, number))
        .await?;

    let poller = PullRequestPoller::new(agent, PrTuning::from(&config.pr));
    match poller.wait_for_pr(&session_id).await? {
        PrOutcome::Found(url) => {
            render::section("PR created", &url);
        }
        PrOutcome::TimedOut => {
            let watch = session
                .session()
                .url
                .clone()
                .unwrap_or_else(|| "(session url unavailable)".to_string());
            render::section(
                "No PR URL detected yet",
                &format!("The agent may still open one; watch the session:\n{watch}"),
            );
        }
    }

    Ok(())
}

/// Plain y/N prompt on stdin; anything but an explicit yes declines.
fn confirm(question: &str) -> Result<bool> {
    print!("{question}");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
