//! Bulwark CLI — inspect and exercise the action gate from a terminal.

mod prompt;

use anyhow::{Context, Result};
use bulwark_config::{BulwarkConfig, CliOverrides};
use bulwark_core::{ActionGate, GateOutcome};
use bulwark_hooks::{HookAction, HookEventType, HookPipeline};
use bulwark_permissions::{
    ArgumentShape, PermissionDecision, PermissionEngine, PermissionMode, PermissionRequest,
    PromptHandler, RuleMatcher,
};
use bulwark_shell::CommandSession;
use bulwark_tools::{SharedSession, ToolRegistry};
use clap::{Parser, Subcommand};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "bulwark", version, about = "Policy gate for autonomous agent actions")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Permission mode (default, acceptEdits, plan, bypassPermissions)
    #[arg(long, global = true)]
    mode: Option<PermissionMode>,

    /// Project directory (default: current directory)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a shell command and print the security verdict
    Classify {
        /// The command text
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Evaluate permission rules for a tool call
    Check {
        /// Tool name, e.g. Bash
        tool: String,
        /// Tool arguments as JSON, e.g. '{"command":"git push"}'
        arguments: String,
    },
    /// Run a shell command through the full gate as the Bash tool
    Exec {
        /// The command text
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// List registered hooks per event
    Hooks,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    let config = BulwarkConfig::load(CliOverrides {
        permission_mode: cli.mode,
        project_dir: cli.project_dir,
    })
    .context("Failed to load configuration")?;

    match cli.command {
        Command::Classify { command } => classify(&command.join(" ")),
        Command::Check { tool, arguments } => check(&config, &tool, &arguments),
        Command::Exec { command } => exec(&config, &command.join(" ")).await,
        Command::Hooks => list_hooks(&config),
    }
}

fn classify(command: &str) -> Result<ExitCode> {
    let verdict = bulwark_shell::classify(command);
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(if verdict.is_blocked() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn check(config: &BulwarkConfig, tool: &str, arguments: &str) -> Result<ExitCode> {
    let arguments: serde_json::Value =
        serde_json::from_str(arguments).context("Tool arguments must be valid JSON")?;
    let (report, decision) = check_report(config, tool, arguments)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(match decision {
        PermissionDecision::Deny { .. } => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

/// Evaluate the permission stage the gate would run for `tool`.
fn check_report(
    config: &BulwarkConfig,
    tool: &str,
    arguments: serde_json::Value,
) -> Result<(serde_json::Value, PermissionDecision)> {
    let request = PermissionRequest::new(tool, arguments);

    let engine = PermissionEngine::new(config.permission_rules.clone(), None)
        .with_mode(config.permission_mode);
    // Tools the gate does not know are treated as mutating.
    let tools = gate_tools(config, open_session(config)?);
    let is_read_only = tools.is_read_only(tool).unwrap_or(false);
    let decision = engine.check(&request, is_read_only);
    let rule = RuleMatcher::first_match(&config.permission_rules, &request);

    let (level, detail) = match &decision {
        PermissionDecision::Allow => ("allow", None),
        PermissionDecision::Deny { reason } => ("deny", Some(reason.as_str())),
        PermissionDecision::Ask { description, .. } => ("ask", Some(description.as_str())),
    };
    let shape = ArgumentShape::classify(&request.arguments);
    let report = serde_json::json!({
        "tool": tool,
        "mode": config.permission_mode.as_str(),
        "read_only": is_read_only,
        "projection": shape.as_str(),
        "decision": level,
        "detail": detail,
        "rule": rule.map(|r| r.description),
    });
    Ok((report, decision))
}

fn open_session(config: &BulwarkConfig) -> Result<SharedSession> {
    let session = CommandSession::new(&config.project_dir).with_context(|| {
        format!("Cannot start a session in {}", config.project_dir.display())
    })?;
    Ok(Arc::new(tokio::sync::Mutex::new(session)))
}

/// The tools the gate exposes.
fn gate_tools(config: &BulwarkConfig, session: SharedSession) -> ToolRegistry {
    ToolRegistry::with_bash(session, config.shell_timeout_ms)
}

async fn exec(config: &BulwarkConfig, command: &str) -> Result<ExitCode> {
    let session = open_session(config)?;

    let prompt_handler: Option<Arc<dyn PromptHandler>> = if io::stdin().is_terminal() {
        Some(Arc::new(prompt::TerminalPromptHandler))
    } else {
        None
    };
    let permissions = PermissionEngine::new(config.permission_rules.clone(), prompt_handler)
        .with_mode(config.permission_mode);
    let hooks = HookPipeline::new(config.load_hook_registry(), config.hook_executor());
    let tools = gate_tools(config, session.clone());
    let gate = ActionGate::new(Arc::new(permissions), Arc::new(hooks), tools, session);

    let start = gate.notify(HookEventType::SessionStart, Some("startup".into())).await;
    print_messages(&start.system_messages);

    let result = gate
        .invoke("Bash", serde_json::json!({ "command": command }))
        .await;

    let end = gate.notify(HookEventType::SessionEnd, Some("exit".into())).await;
    print_messages(&end.system_messages);

    let outcome = result.context("Command was not run")?;
    let code = match outcome {
        GateOutcome::Completed {
            output,
            pre_hooks,
            post_hooks,
            ..
        } => {
            print_messages(&pre_hooks.system_messages);
            print!("{}", output.text);
            io::stdout().flush()?;
            for warning in &output.warnings {
                eprintln!("warning: {warning}");
            }
            print_messages(&post_hooks.system_messages);
            output.exit_code.unwrap_or(if output.is_error { 1 } else { 0 })
        }
        GateOutcome::HookBlocked {
            reasons,
            system_messages,
            ..
        } => {
            print_messages(&system_messages);
            for reason in &reasons {
                eprintln!("blocked by hook: {reason}");
            }
            2
        }
    };
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}

fn list_hooks(config: &BulwarkConfig) -> Result<ExitCode> {
    let registry = config.load_hook_registry();
    if registry.is_empty() {
        println!("No hooks registered.");
        return Ok(ExitCode::SUCCESS);
    }

    for event in HookEventType::ALL {
        let hooks = registry.hooks_for(event);
        if hooks.is_empty() {
            continue;
        }
        println!("{event}");
        for hook in hooks {
            let def = &hook.definition;
            let matcher = if def.matcher.is_empty() { "*" } else { def.matcher.as_str() };
            let action = match &def.action {
                HookAction::Command(command) => format!("command: {command}"),
                HookAction::Prompt(prompt) => format!("prompt: {prompt}"),
            };
            let mut flags = Vec::new();
            if def.once {
                flags.push("once");
            }
            if !def.enabled {
                flags.push("disabled");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            };
            println!("  {} [{matcher}] {action}{flags}", def.id);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_messages(messages: &[String]) {
    for message in messages {
        eprintln!("{message}");
    }
}
