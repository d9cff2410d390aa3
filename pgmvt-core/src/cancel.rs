use deadpool_postgres::Object;
use deadpool_postgres::tokio_postgres::{CancelToken, NoTls};
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// A pooled connection running a tile query.
///
/// If dropped before [`CancelOnDrop::release`], e.g. because the HTTP client disconnected and the
/// request future was dropped, the backend query is cancelled. The connection goes back to the
/// pool and the responses of the cancelled query are discarded by the client.
pub(crate) struct CancelOnDrop {
    conn: Object,
    /// `None` once the query has finished
    token: Option<CancelToken>,
}

impl CancelOnDrop {
    pub fn new(conn: Object) -> Self {
        let token = Some(conn.cancel_token());
        Self { conn, token }
    }

    pub fn client(&mut self) -> &mut Object {
        &mut self.conn
    }

    /// The query has finished, return the connection to the pool.
    pub fn release(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match token.cancel_query(NoTls).await {
                        Ok(()) => debug!("Cancelled an abandoned tile query"),
                        Err(e) => warn!("Unable to cancel an abandoned tile query: {e}"),
                    }
                });
            }
            Err(_) => warn!("No async runtime left to cancel an abandoned tile query"),
        }
    }
}
