use std::sync::Arc;

use futures::{StreamExt, stream};
use tokio::io::{AsyncBufReadExt, BufReader};

use job_bridge::bridge::{DispatchBridge, JobId, JobParams, JobSignalReceiver};
use job_bridge::config::BridgeConfig;
use job_bridge::demo::{SleepDelegate, StdoutNotifier};

/// One line of harness input, standing in for an OS scheduler callback.
#[derive(Debug, PartialEq)]
enum Command {
    Start { id: JobId, params: JobParams },
    Stop { id: JobId },
    Status,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match verb {
            "start" => {
                let (id, raw_params) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if id.is_empty() {
                    return Err("usage: start <id> [json-params]".to_string());
                }
                let params = match raw_params.trim() {
                    "" => JobParams::empty(),
                    raw => serde_json::from_str(raw).map_err(|e| format!("invalid params: {e}"))?,
                };
                Ok(Self::Start {
                    id: JobId::from(id),
                    params,
                })
            }
            "stop" if !rest.is_empty() => Ok(Self::Stop {
                id: JobId::from(rest),
            }),
            "stop" => Err("usage: stop <id>".to_string()),
            "status" => Ok(Self::Status),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

#[tokio::main]
async fn main() -> job_bridge::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let bridge = DispatchBridge::new(
        BridgeConfig::from_env()?,
        Arc::new(SleepDelegate),
        Arc::new(StdoutNotifier),
        tokio::runtime::Handle::current(),
    );

    let config = bridge.config();
    eprintln!("Job Bridge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Cancel grace: {:?}", config.cancel_grace_period);
    eprintln!(
        "   Reschedule on cancel/fault: {}/{}",
        config.reschedule_on_cancel, config.reschedule_on_fault
    );
    eprintln!("   Max active jobs: {}", config.max_active_jobs);
    eprintln!("   Commands: start <id> [json] | stop <id> | status | quit\n");

    let receiver = JobSignalReceiver::new(bridge);

    let reader = BufReader::new(tokio::io::stdin()).lines();
    let mut lines = Box::pin(stream::unfold(reader, |mut reader| async move {
        match reader.next_line().await {
            Ok(Some(line)) => Some((line, reader)),
            Ok(None) => None,
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                None
            }
        }
    }));

    while let Some(line) = lines.next().await {
        if line.trim().is_empty() {
            continue;
        }
        match Command::parse(&line) {
            Ok(Command::Start { id, params }) => {
                let outcome = receiver.on_start(id.clone(), params);
                println!("start {id} -> {outcome:?}");
            }
            Ok(Command::Stop { id }) => {
                let wants_reschedule = receiver.on_stop(id.clone());
                println!("stop {id} -> wants_reschedule={wants_reschedule}");
            }
            Ok(Command::Status) => {
                let bridge = receiver.bridge();
                println!("{} running", bridge.running_count());
                for id in bridge.running_jobs() {
                    if let Some(snapshot) = bridge.snapshot(&id) {
                        println!("{}", serde_json::to_string(&snapshot)?);
                    }
                }
            }
            Ok(Command::Quit) => break,
            Err(msg) => eprintln!("{msg}"),
        }
    }

    receiver.bridge().shutdown().await;
    Ok(())
}
