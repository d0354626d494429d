use course_blog_store::{BlogStore, BlogStoreError};
use course_proto::blog::{
    blog_service_server::BlogService, Blog, CreateBlogRequest, CreateBlogResponse,
    DeleteBlogRequest, DeleteBlogResponse, ListBlogRequest, ListBlogResponse, ReadBlogRequest,
    ReadBlogResponse, UpdateBlogRequest, UpdateBlogResponse,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info};

const STREAM_BUFFER: usize = 16;

#[derive(Clone)]
pub struct BlogServiceImpl {
    store: BlogStore,
    storage_failed: CancellationToken,
}

impl BlogServiceImpl {
    /// `storage_failed` is cancelled on the first database error so the
    /// server hosting this service can shut down.
    pub fn new(store: BlogStore, storage_failed: CancellationToken) -> Self {
        Self {
            store,
            storage_failed,
        }
    }

    /// Runs `op` against the store on the blocking pool.
    async fn with_store<T, F>(&self, op: F) -> Result<T, Status>
    where
        F: FnOnce(&BlogStore) -> Result<T, BlogStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| Status::internal(format!("blog storage task failed: {e}")))?
            .map_err(|e| to_status(e, &self.storage_failed))
    }
}

pub(crate) fn to_status(err: BlogStoreError, storage_failed: &CancellationToken) -> Status {
    match err {
        BlogStoreError::NotFound(id) => {
            info!(id, "Could not find blog");
            Status::not_found(err.to_string())
        }
        BlogStoreError::Decode(_) | BlogStoreError::InvalidKey(_) => {
            error!(%err, "Unmarshal error");
            Status::internal(format!("Unmarshal error: {err}"))
        }
        BlogStoreError::Database(_) => {
            error!(%err, "blog storage failed, shutting down");
            storage_failed.cancel();
            Status::internal(format!("Internal error: {err}"))
        }
    }
}

/// Sends every stored blog in id order. Stops after the first error or once
/// the receiver is gone, and returns how many blogs were delivered.
fn send_blogs(
    store: &BlogStore,
    tx: &mpsc::Sender<Result<ListBlogResponse, Status>>,
    storage_failed: &CancellationToken,
) -> usize {
    let mut sent = 0;
    for blog in store.iter() {
        let item = blog
            .map(|blog| ListBlogResponse { blog: Some(blog) })
            .map_err(|e| to_status(e, storage_failed));
        let failed = item.is_err();

        if tx.blocking_send(item).is_err() {
            debug!(sent, "client dropped the blog listing");
            break;
        }
        if failed {
            break;
        }
        sent += 1;
    }
    sent
}

fn required(blog: Option<Blog>) -> Result<Blog, Status> {
    blog.ok_or_else(|| Status::invalid_argument("blog is required"))
}

#[tonic::async_trait]
impl BlogService for BlogServiceImpl {
    type ListBlogStream = ReceiverStream<Result<ListBlogResponse, Status>>;

    async fn create_blog(
        &self,
        request: Request<CreateBlogRequest>,
    ) -> Result<Response<CreateBlogResponse>, Status> {
        let blog = required(request.into_inner().blog)?;
        info!(author_id = %blog.author_id, title = %blog.title, "CreateBlog was invoked");

        let blog = self.with_store(move |store| store.create(blog)).await?;

        Ok(Response::new(CreateBlogResponse { blog: Some(blog) }))
    }

    async fn read_blog(
        &self,
        request: Request<ReadBlogRequest>,
    ) -> Result<Response<ReadBlogResponse>, Status> {
        let blog_id = request.into_inner().blog_id;
        info!(blog_id, "ReadBlog was invoked");

        let blog = self.with_store(move |store| store.get(blog_id)).await?;

        Ok(Response::new(ReadBlogResponse { blog: Some(blog) }))
    }

    async fn update_blog(
        &self,
        request: Request<UpdateBlogRequest>,
    ) -> Result<Response<UpdateBlogResponse>, Status> {
        let blog = required(request.into_inner().blog)?;
        info!(blog_id = blog.id, "UpdateBlog was invoked");

        let blog = self.with_store(move |store| store.update(blog)).await?;
        info!(blog_id = blog.id, "Blog updated successfully");

        Ok(Response::new(UpdateBlogResponse { blog: Some(blog) }))
    }

    async fn delete_blog(
        &self,
        request: Request<DeleteBlogRequest>,
    ) -> Result<Response<DeleteBlogResponse>, Status> {
        let blog_id = request.into_inner().blog_id;
        info!(blog_id, "DeleteBlog was invoked");

        let blog_id = self.with_store(move |store| store.delete(blog_id)).await?;

        Ok(Response::new(DeleteBlogResponse { blog_id }))
    }

    async fn list_blog(
        &self,
        _request: Request<ListBlogRequest>,
    ) -> Result<Response<Self::ListBlogStream>, Status> {
        info!("ListBlog was invoked");
        let store = self.store.clone();
        let storage_failed = self.storage_failed.clone();
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::task::spawn_blocking(move || send_blogs(&store, &tx, &storage_failed));

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
