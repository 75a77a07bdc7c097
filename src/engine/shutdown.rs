use tokio::select;
use tokio_util::sync::CancellationToken;

/// Turns ctrl-c into cancellation. The token can also be cancelled from
/// elsewhere (the browser closing the message channel), in which case this
/// simply returns.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => {}
    };
}
