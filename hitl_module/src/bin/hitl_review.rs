//! Reviewer CLI for pending HITL approvals.
//!
//! Lists review requests captured by the webhook listener, records
//! approve/reject decisions by clearing them from the shared store, and can
//! trigger a new run of the support-email flow.

use std::env;
use std::process::exit;
use std::thread;
use std::time::{Duration, Instant};

use hitl_module::{
    get_pending_approvals, record_decision, remove_approval, ApprovalStore, Decision, HitlConfig,
    KickoffClient, KickoffRequest, PendingApproval, WebhookServer, DEFAULT_TASK_ID,
};

const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_WAIT_SECS: u64 = 600;

fn print_usage() {
    eprintln!(
        r##"Usage: hitl-review <command> [arguments]

Commands:
  list                                   List pending approval requests
  show <execution_id> [task_id]          Print one request with its draft
  approve <execution_id> [task_id]       Record approval and clear the request
  reject <execution_id> [task_id]        Record rejection and clear the request
  remove <execution_id> [task_id]        Clear a request without a decision
  trigger [--listen] [--wait=SECONDS]    Kick off the support flow on AMP
                                         --listen starts the webhook listener
                                         and waits for the review request

task_id defaults to "request_review".

Environment Variables:
  HITL_STORE_PATH          - Approval store file (default ./pending_hitl_approvals.json)
  HITL_WEBHOOK_PORT        - Listener port for --listen (default 5050)
  CREWAI_AMP_URL           - Base URL of the deployed flow
  CREWAI_BEARER_TOKEN      - Bearer token for the deployed flow
  CREWAI_WEBHOOK_BASE_URL  - Public URL reaching the listener (e.g. ngrok)
"##
    );
}

fn parse_arg(args: &[String], flag: &str) -> Option<String> {
    let prefix = format!("{}=", flag);
    args.iter()
        .find_map(|arg| arg.strip_prefix(&prefix).map(|value| value.to_string()))
}

fn key_args(args: &[String]) -> (String, String) {
    let Some(execution_id) = args.get(2).filter(|value| !value.starts_with("--")) else {
        eprintln!("Error: execution ID required");
        print_usage();
        exit(1);
    };
    let task_id = args
        .get(3)
        .filter(|value| !value.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| DEFAULT_TASK_ID.to_string());
    (execution_id.clone(), task_id)
}

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        exit(1);
    }

    let config = HitlConfig::from_env();
    let store = config.approval_store();

    let result = match args[1].as_str() {
        "list" => cmd_list(&store),
        "show" => {
            let (execution_id, task_id) = key_args(&args);
            cmd_show(&store, &execution_id, &task_id)
        }
        "approve" => {
            let (execution_id, task_id) = key_args(&args);
            cmd_decide(&store, &execution_id, &task_id, Decision::Approve)
        }
        "reject" => {
            let (execution_id, task_id) = key_args(&args);
            cmd_decide(&store, &execution_id, &task_id, Decision::Reject)
        }
        "remove" => {
            let (execution_id, task_id) = key_args(&args);
            cmd_remove(&store, &execution_id, &task_id)
        }
        "trigger" => {
            let listen = args.iter().any(|arg| arg == "--listen");
            let wait = parse_arg(&args, "--wait")
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(DEFAULT_WAIT_SECS);
            cmd_trigger(&config, &store, listen, Duration::from_secs(wait))
        }
        "--help" | "-h" | "help" => {
            print_usage();
            exit(0);
        }
        other => {
            eprintln!("Error: unknown command '{}'", other);
            print_usage();
            exit(1);
        }
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(err) => {
            eprintln!("Error: {}", err);
            exit(1);
        }
    }
}

fn cmd_list(store: &ApprovalStore) -> Result<String, String> {
    let approvals = get_pending_approvals(store).map_err(|e| e.to_string())?;
    if approvals.is_empty() {
        return Ok("No pending approvals.".to_string());
    }
    let mut output = format!("Found {} pending approvals:\n", approvals.len());
    for approval in &approvals {
        output.push_str(&format!(
            "\n- {} / {}\n  {}\n",
            approval.execution_id,
            approval.task_id,
            preview(&approval.content, 120)
        ));
    }
    Ok(output)
}

fn cmd_show(store: &ApprovalStore, execution_id: &str, task_id: &str) -> Result<String, String> {
    let approval = store
        .get(execution_id, task_id)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("no pending approval for {} / {}", execution_id, task_id))?;
    Ok(render_approval(&approval))
}

fn cmd_decide(
    store: &ApprovalStore,
    execution_id: &str,
    task_id: &str,
    decision: Decision,
) -> Result<String, String> {
    let outcome =
        record_decision(store, execution_id, task_id, decision).map_err(|e| e.to_string())?;
    if outcome.was_pending {
        Ok(format!("{} / {} {}", execution_id, task_id, outcome.decision))
    } else {
        Err(format!(
            "no pending approval for {} / {}",
            execution_id, task_id
        ))
    }
}

fn cmd_remove(store: &ApprovalStore, execution_id: &str, task_id: &str) -> Result<String, String> {
    let removed = remove_approval(store, execution_id, task_id).map_err(|e| e.to_string())?;
    if removed {
        Ok(format!("Removed {} / {}", execution_id, task_id))
    } else {
        Ok(format!("Nothing pending for {} / {}", execution_id, task_id))
    }
}

fn cmd_trigger(
    config: &HitlConfig,
    store: &ApprovalStore,
    listen: bool,
    wait: Duration,
) -> Result<String, String> {
    let client = KickoffClient::from_config(config).map_err(|e| e.to_string())?;

    let server = WebhookServer::new(config.clone());
    if listen && !server.start(None) {
        return Err(format!("failed to start webhook listener on port {}", config.port));
    }

    let request = KickoffRequest::with_webhook_base(config.webhook_base_url.as_deref());
    let result = client.kickoff(&request).map_err(|e| e.to_string())?;

    let mut output = "Flow triggered successfully.".to_string();
    let Some(kickoff_id) = result.kickoff_id else {
        return Ok(output);
    };
    output.push_str(&format!("\nKickoff ID: {}", kickoff_id));
    output.push_str(&format!("\nCheck status: GET {}", client.status_url(&kickoff_id)));
    if !listen {
        return Ok(output);
    }

    println!("{}\nWaiting for review request...", output);
    let deadline = Instant::now() + wait;
    while Instant::now() < deadline {
        let approvals = get_pending_approvals(store).map_err(|e| e.to_string())?;
        if let Some(approval) = approvals
            .iter()
            .find(|approval| approval.execution_id == kickoff_id)
        {
            return Ok(format!(
                "{}\n\nApprove with: hitl-review approve {} {}",
                render_approval(approval),
                approval.execution_id,
                approval.task_id
            ));
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
    Err(format!(
        "no review request for {} after {}s",
        kickoff_id,
        wait.as_secs()
    ))
}

fn render_approval(approval: &PendingApproval) -> String {
    format!(
        "Execution: {}\nTask: {}\n\n{}",
        approval.execution_id, approval.task_id, approval.content
    )
}

fn preview(value: &str, max_chars: usize) -> String {
    let line = value.lines().next().unwrap_or_default();
    let truncated: String = line.chars().take(max_chars).collect();
    if truncated.len() == line.len() && line.len() == value.trim_end().len() {
        truncated
    } else {
        format!("{}...", truncated)
    }
}
