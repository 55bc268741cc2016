//! Throwaway HTTP servers for adapter tests.

use axum::Router;

pub(crate) struct TestServer {
    pub(crate) base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub(crate) async fn spawn(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
