use anyhow::{bail, Result};
use course_blog_store::BlogStore;
use course_proto::{
    blog::blog_service_server::BlogServiceServer,
    calculator::calculator_service_server::CalculatorServiceServer,
    greet::greet_service_server::GreetServiceServer,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info};

mod blog;
mod calculator;
mod greet;

pub use blog::BlogServiceImpl;
pub use calculator::{
    prime_factors, prime_factors_until, CalculatorServiceImpl, PrimeFactors, RunningAverage,
    RunningMax,
};
pub use greet::{parse_grpc_timeout, GreetServiceImpl};

const BLOG_DB_FILE: &str = "blog.db";

/// Resolves on Ctrl-C or once `stop` is cancelled.
async fn shutdown_signal(stop: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Received interrupt"),
            Err(e) => {
                error!(%e, "could not listen for interrupt");
                stop.cancelled().await;
            }
        },
        _ = stop.cancelled() => {}
    }
    info!("Stopping the server");
}

pub struct GreetServiceGrpc;

impl GreetServiceGrpc {
    pub async fn run_server(config: course_config::Greet) -> Result<()> {
        let addr = config.server_addr;
        info!("Greet gRPC Server listening on {}", addr);

        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(course_proto::FILE_DESCRIPTOR_SET)
            .build_v1()?;

        Server::builder()
            .add_service(reflection_service)
            .add_service(GreetServiceServer::new(GreetServiceImpl::new(
                config.stream_interval(),
            )))
            .serve_with_shutdown(addr, shutdown_signal(CancellationToken::new()))
            .await?;

        Ok(())
    }
}

pub struct CalculatorServiceGrpc;

impl CalculatorServiceGrpc {
    pub async fn run_server(config: course_config::Grpc) -> Result<()> {
        let addr = config.server_addr;
        info!("Calculator gRPC Server listening on {}", addr);

        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(course_proto::FILE_DESCRIPTOR_SET)
            .build_v1()?;

        Server::builder()
            .add_service(reflection_service)
            .add_service(CalculatorServiceServer::new(CalculatorServiceImpl))
            .serve_with_shutdown(addr, shutdown_signal(CancellationToken::new()))
            .await?;

        Ok(())
    }
}

pub struct BlogServiceGrpc;

impl BlogServiceGrpc {
    /// Serves until Ctrl-C, or until the database fails, in which case an
    /// error is returned so the process exits.
    pub async fn run_server(config: course_config::Blog) -> Result<()> {
        let store = BlogStore::open(config.db_path.join(BLOG_DB_FILE))?;
        let listener = TcpListener::bind(config.server_addr).await?;
        info!("Blog gRPC Server listening on {}", config.server_addr);

        Self::serve(store, listener, CancellationToken::new()).await
    }

    async fn serve(
        store: BlogStore,
        listener: TcpListener,
        storage_failed: CancellationToken,
    ) -> Result<()> {
        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(course_proto::FILE_DESCRIPTOR_SET)
            .build_v1()?;

        Server::builder()
            .add_service(reflection_service)
            .add_service(BlogServiceServer::new(BlogServiceImpl::new(
                store.clone(),
                storage_failed.clone(),
            )))
            .serve_with_incoming_shutdown(
                TcpListenerStream::new(listener),
                shutdown_signal(storage_failed.clone()),
            )
            .await?;

        info!("Closing the blog database");
        store.flush()?;

        if storage_failed.is_cancelled() {
            bail!("blog server stopped after a storage failure");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_blog_store::BlogStoreError;
    use std::time::Duration;

    async fn spawn_blog_server(
        storage_failed: CancellationToken,
    ) -> (tempfile::TempDir, tokio::task::JoinHandle<Result<()>>) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlogStore::open(dir.path().join(BLOG_DB_FILE)).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = tokio::spawn(BlogServiceGrpc::serve(store, listener, storage_failed));
        (dir, server)
    }

    #[tokio::test]
    async fn blog_server_fails_after_storage_error() {
        let storage_failed = CancellationToken::new();
        let (_dir, server) = spawn_blog_server(storage_failed.clone()).await;

        let err = BlogStoreError::Database(sled::Error::Unsupported("disk gone".to_string()));
        blog::to_status(err, &storage_failed);

        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("storage failure"), "{err}");
    }

    #[tokio::test]
    async fn blog_server_keeps_running_after_missing_blog() {
        let storage_failed = CancellationToken::new();
        let (_dir, server) = spawn_blog_server(storage_failed.clone()).await;

        blog::to_status(BlogStoreError::NotFound(7), &storage_failed);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!server.is_finished());
        server.abort();
    }
}
