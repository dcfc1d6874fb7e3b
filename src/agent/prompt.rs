/// Opening message for a scoping session.
pub fn scoping_prompt(repo_full_name: &str, issue_title: &str, issue_body: &str) -> String {
    format!(
        r#"Scope this issue in repo https://github.com/{repo_full_name}.
Title: {issue_title}

Body:
{issue_body}

Please write your scoping in the conversation (Current / Requested / Files / Tests / Risks if any).
Include a line exactly like:
Confidence: High 🟢 - <why>   (or Medium 🟡 / Low 🔴)
Then wait for next instruction."#
    )
}

/// Follow-up instruction asking the agent to implement and open a PR.
pub fn pull_request_prompt(repo_full_name: &str, issue_number: u64) -> String {
    format!(
        r#"Create a branch `devin/issue-{issue_number}` in https://github.com/{repo_full_name}.
Implement the scoped changes with minimal safe tests and open a PR.
When done, write the PR URL into structured_output.artifacts.pr_url."#
    )
}
