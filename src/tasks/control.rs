use crate::mosaic::actions::Action;
use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Read whitespace-separated control tokens and forward them as actions.
///
/// Returns when the input ends, the driver goes away or `cancel` fires.
#[instrument(skip_all)]
pub async fn run<R>(input: R, to_driver: Sender<Action>, cancel: CancellationToken) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            info!("control input closed");
            break;
        };
        for token in line.split_whitespace() {
            match Action::from_token(token) {
                Some(action) => {
                    debug!(token, %action, "control token");
                    if to_driver.send(action).await.is_err() {
                        return Ok(());
                    }
                }
                None => warn!(token, "unknown control token"),
            }
        }
    }
    Ok(())
}
