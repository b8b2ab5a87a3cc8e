use tracing::info;

use crate::cmd::{block_on, open_session, EndpointArgs, StoreArgs};
use crate::exit::{session_error, CliResult, SUCCESS};

pub fn run(endpoint: &EndpointArgs, args: StoreArgs) -> CliResult<i32> {
    block_on(async move {
        let session = open_session(endpoint).await?;
        let result = session
            .store(args.conduit.as_str(), args.key.as_str(), args.value.as_str())
            .await;
        session.close().await;

        result.map_err(|err| session_error("store failed", err))?;
        info!(conduit = %args.conduit, key = %args.key, "value stored");
        Ok(SUCCESS)
    })
}
