use std::time::Duration;

use conduitwire::Session;
use tokio::time::Instant;

use crate::cmd::{block_on, next_event, open_session, parse_duration, EndpointArgs, RetrieveArgs};
use crate::exit::{session_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_event, OutputFormat};

pub fn run(endpoint: &EndpointArgs, args: RetrieveArgs, format: OutputFormat) -> CliResult<i32> {
    let wait = parse_duration(&args.wait)?;
    block_on(async move {
        let session = open_session(endpoint).await?;
        let result = collect(&session, &args, wait, format).await;
        session.close().await;
        result
    })
}

/// Answers to print before exiting; `None` collects until the wait expires.
fn answer_limit(args: &RetrieveArgs) -> Option<usize> {
    args.count.or(args.single.then_some(1))
}

async fn collect(
    session: &Session,
    args: &RetrieveArgs,
    wait: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    let limit = answer_limit(args);
    let mut events = session.subscribe();
    session
        .retrieve(args.conduit.as_str(), args.key.as_str(), args.single)
        .await
        .map_err(|err| session_error("retrieve failed", err))?;

    let deadline = Instant::now() + wait;
    let mut printed = 0usize;
    while limit.is_none_or(|limit| printed < limit) {
        match tokio::time::timeout_at(deadline, next_event(session, &mut events)).await {
            Ok(Some(event)) => {
                print_event(&event, format);
                printed += 1;
            }
            Ok(None) if printed > 0 => break,
            Ok(None) => {
                return Err(CliError::new(
                    FAILURE,
                    "connection closed before an answer arrived",
                ))
            }
            Err(_) => break,
        }
    }

    if printed == 0 {
        return Err(CliError::new(
            TIMEOUT,
            format!("no answer for key {:?} within {}", args.key, args.wait),
        ));
    }
    Ok(SUCCESS)
}
