use conduitwire::{ConduitId, Session};
use tracing::{debug, info};

use crate::cmd::{block_on, next_event, open_session, EndpointArgs, ListenArgs};
use crate::exit::{io_error, session_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_event, OutputFormat};

pub fn run(endpoint: &EndpointArgs, args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    block_on(async move {
        let session = open_session(endpoint).await?;
        let result = listen(&session, &args, format).await;

        if session.is_connected() {
            if let Err(err) = session.reconcile(std::iter::empty::<ConduitId>()).await {
                debug!(error = %err, "leaving conduits failed");
            }
        }
        session.close().await;
        result
    })
}

async fn listen(session: &Session, args: &ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let mut events = session.subscribe();
    session
        .reconcile(args.conduits.iter().map(String::as_str))
        .await
        .map_err(|err| session_error("join failed", err))?;
    info!(conduits = ?session.joined(), "listening");

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    let mut printed = 0usize;
    loop {
        let event = tokio::select! {
            signal = &mut interrupted => {
                signal.map_err(|err| io_error("signal handler setup failed", err))?;
                info!(printed, "interrupted");
                return Ok(SUCCESS);
            }
            event = next_event(session, &mut events) => event,
        };

        let Some(event) = event else {
            return Err(CliError::new(FAILURE, "connection closed by peer"));
        };
        print_event(&event, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            return Ok(SUCCESS);
        }
    }
}
