//! The tool dispatcher: reads one JSON request per line from stdin, routes
//! it through [`tools::dispatch`], and writes one JSON response per line to
//! stdout. Single-threaded cooperative — one call, persist included,
//! completes before the next request is read.

pub mod context;
pub mod intents;
pub mod protocol;
pub mod tools;

use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, warn};

pub use context::DispatcherContext;
use protocol::{Request, Response};

/// Runs the dispatcher to completion. Returns on stdin EOF (clean shutdown);
/// propagates only unrecoverable transport errors — a malformed or
/// unhandleable request becomes an error response, never a crash.
pub async fn run(mut ctx: DispatcherContext) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut reader = BufReader::new(stdin).lines();

    while let Some(line) = reader.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(req) => {
                let result = tools::dispatch(&mut ctx, &req.params.name, req.params.arguments).await;
                match result {
                    Ok(payload) => Response::success(&payload),
                    Err(err) => {
                        warn!(tool = %req.params.name, %err, "tool call failed");
                        Response::error(&err)
                    }
                }
            }
            Err(e) => {
                error!(%e, "malformed request line");
                Response::error(&crate::error::LaneError::parse(format!("malformed request: {e}")))
            }
        };

        let body = serde_json::to_string(&response)
            .unwrap_or_else(|e| format!(r#"{{"content":[{{"type":"text","text":"serialization error: {e}"}}],"isError":true}}"#));
        stdout.write_all(body.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}
