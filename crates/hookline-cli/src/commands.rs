use std::error::Error;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use hookline_core::agents::{AgentOperation, SessionRef};
use hookline_core::permission::Decision;
use hookline_core::{AgentType, HooklineContext};
use tokio::io::AsyncReadExt;

type CommandResult = Result<ExitCode, Box<dyn Error>>;

/// Build the operation from the `run` flags. The CLI rejects conflicting
/// flags, so at most one session source is set.
pub fn operation(
    prompt: String,
    resume: Option<String>,
    latest: bool,
    fork: Option<String>,
    fork_name: Option<String>,
) -> AgentOperation {
    let fork = fork.map(SessionRef::id).or_else(|| fork_name.map(SessionRef::name));
    match (resume, latest, fork) {
        (_, _, Some(from)) => AgentOperation::Fork { from, prompt },
        (Some(id), _, None) => AgentOperation::Resume {
            session: SessionRef::id(id),
            prompt,
        },
        (None, true, None) => AgentOperation::Resume {
            session: SessionRef::Latest,
            prompt,
        },
        (None, false, None) => AgentOperation::Generate { prompt },
    }
}

pub async fn probe(ctx: &HooklineContext, agent: Option<AgentType>) -> CommandResult {
    let agents = match agent {
        Some(agent) => vec![agent],
        None => ctx.agents(),
    };

    let mut missing = 0;
    for agent in agents {
        let service = ctx.service(agent)?;
        if service.is_available().await {
            println!("{agent}: {}", ctx.config.binary_for(agent));
        } else {
            println!("{agent}: not available");
            missing += 1;
        }
    }
    Ok(if missing == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub async fn run(
    ctx: &HooklineContext,
    agent: AgentType,
    op: AgentOperation,
    cwd: Option<&Path>,
    stream: bool,
) -> CommandResult {
    let service = ctx.service(agent)?;

    let output = if stream {
        let on_chunk = |chunk: &str| {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(chunk.as_bytes());
            let _ = stdout.flush();
        };
        let output = service.run_streaming(&op, cwd, &on_chunk).await?;
        println!();
        output
    } else {
        let output = service.run(&op, cwd).await?;
        println!("{}", output.text);
        output
    };

    if let Some(ref session_id) = output.session_id {
        eprintln!("session: {session_id}");
    }
    Ok(ExitCode::SUCCESS)
}

/// One hook callback: the payload arrives on stdin and the answer must be
/// the only thing written to stdout.
pub async fn hook(ctx: &HooklineContext) -> CommandResult {
    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    let raw: serde_json::Value = serde_json::from_str(&input)?;

    let output = ctx.hooks.handle(&raw).await;
    println!("{}", serde_json::to_string(&output.to_json())?);
    Ok(ExitCode::SUCCESS)
}

pub async fn scan(ctx: &HooklineContext, agent: AgentType, file: Option<&Path>) -> CommandResult {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            text
        }
    };

    let events = ctx.adapters.parse_terminal_output(agent, &text);
    log::debug!("Detected {} event(s) in {} bytes", events.len(), text.len());
    for event in &events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(ExitCode::SUCCESS)
}

/// Exit code: 0 allow, 1 deny, 2 ask.
pub fn policy_check(
    ctx: &HooklineContext,
    tool: &str,
    command: Option<&str>,
    cwd: Option<&str>,
) -> CommandResult {
    let decision = ctx.policies.for_workspace(cwd).evaluate(tool, command, cwd);
    println!("{decision}");
    Ok(ExitCode::from(decision_code(decision)))
}

fn decision_code(decision: Decision) -> u8 {
    match decision {
        Decision::Allow => 0,
        Decision::Deny => 1,
        Decision::Ask => 2,
    }
}

pub fn policy_show(ctx: &HooklineContext, project: &str) -> CommandResult {
    let policy = ctx.policies.get(project);
    println!("{}", serde_json::to_string_pretty(policy.config())?);
    Ok(ExitCode::SUCCESS)
}
