use std::time::Duration;

use conduitwire::Session;

use crate::cmd::{block_on, next_event, open_session, parse_duration, EndpointArgs, SendArgs};
use crate::exit::{session_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_event, OutputFormat};

pub fn run(endpoint: &EndpointArgs, args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    block_on(async move {
        let session = open_session(endpoint).await?;
        let result = send(&session, &args, wait_timeout, format).await;
        session.close().await;
        result
    })
}

async fn send(
    session: &Session,
    args: &SendArgs,
    wait_timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    let conduit = args.conduit.as_str();
    if args.join {
        session
            .join(conduit)
            .await
            .map_err(|err| session_error("join failed", err))?;
    }

    // Subscribe first so an immediate answer is not missed.
    let mut events = args.wait.then(|| session.subscribe());
    session
        .send_message(conduit, args.message.as_str())
        .await
        .map_err(|err| session_error("send failed", err))?;

    if let Some(events) = events.as_mut() {
        match tokio::time::timeout(wait_timeout, next_event(session, events)).await {
            Ok(Some(event)) => print_event(&event, format),
            Ok(None) => {
                return Err(CliError::new(
                    FAILURE,
                    "connection closed before an event arrived",
                ))
            }
            Err(_) => {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("no event within {}", args.wait_timeout),
                ))
            }
        }
    }

    if args.join {
        session
            .leave(conduit)
            .await
            .map_err(|err| session_error("leave failed", err))?;
    }
    Ok(SUCCESS)
}
