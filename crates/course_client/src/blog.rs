use super::{bounded, request, ClientError, Result};
use course_proto::blog::{
    blog_service_client::BlogServiceClient, Blog, CreateBlogRequest, DeleteBlogRequest,
    ListBlogRequest, ReadBlogRequest, UpdateBlogRequest,
};
use std::time::Duration;
use tonic::{transport::Channel, Status};
use tracing::info;

pub struct BlogClient {
    client: BlogServiceClient<Channel>,
    timeout: Option<Duration>,
}

/// Author, title and content of the posts `seed_blogs` creates.
pub const SEED_BLOGS: [(&str, &str, &str); 4] = [
    (
        "Son Coomer",
        "Son Coomer's blog",
        "Content of Son Coomer's awesome blog",
    ),
    ("CC S.", "CC's blog", "Content of CC's awesome blog"),
    ("Axl", "Axl's blog", "Content of Axl's awesome blog"),
    (
        "Trivago developer",
        "Trivago developer's blog",
        "Content of Trivago developer's awesome blog",
    ),
];

impl BlogClient {
    pub async fn connect(config: course_config::Client) -> Result<Self> {
        let client = BlogServiceClient::connect(config.endpoint.clone()).await?;
        Ok(Self {
            client,
            timeout: config.timeout(),
        })
    }

    pub async fn create_blog(
        &mut self,
        author_id: &str,
        title: &str,
        content: &str,
    ) -> Result<Blog> {
        let timeout = self.timeout;
        let client = &mut self.client;
        let message = CreateBlogRequest {
            blog: Some(Blog {
                id: 0,
                author_id: author_id.to_string(),
                title: title.to_string(),
                content: content.to_string(),
            }),
        };

        let blog = bounded(timeout, async {
            let response = client.create_blog(request(message, timeout)).await?;
            Ok::<_, Status>(response.into_inner().blog)
        })
        .await?
        .ok_or(ClientError::MissingBlog)?;

        info!(?blog, "Response from CreateBlog");
        Ok(blog)
    }

    pub async fn read_blog(&mut self, blog_id: u64) -> Result<Blog> {
        let timeout = self.timeout;
        let client = &mut self.client;

        let blog = bounded(timeout, async {
            let response = client
                .read_blog(request(ReadBlogRequest { blog_id }, timeout))
                .await?;
            Ok::<_, Status>(response.into_inner().blog)
        })
        .await?
        .ok_or(ClientError::MissingBlog)?;

        info!(?blog, "Response from ReadBlog");
        Ok(blog)
    }

    /// Replaces the post with `blog.id`.
    pub async fn update_blog(&mut self, blog: Blog) -> Result<Blog> {
        let timeout = self.timeout;
        let client = &mut self.client;
        let message = UpdateBlogRequest { blog: Some(blog) };

        let blog = bounded(timeout, async {
            let response = client.update_blog(request(message, timeout)).await?;
            Ok::<_, Status>(response.into_inner().blog)
        })
        .await?
        .ok_or(ClientError::MissingBlog)?;

        info!(?blog, "Response from UpdateBlog");
        Ok(blog)
    }

    pub async fn delete_blog(&mut self, blog_id: u64) -> Result<u64> {
        let timeout = self.timeout;
        let client = &mut self.client;

        let deleted = bounded(timeout, async {
            let response = client
                .delete_blog(request(DeleteBlogRequest { blog_id }, timeout))
                .await?;
            Ok::<_, Status>(response.into_inner().blog_id)
        })
        .await?;

        info!(blog_id = deleted, "Response from DeleteBlog");
        Ok(deleted)
    }

    pub async fn list_blog(&mut self) -> Result<Vec<Blog>> {
        let timeout = self.timeout;
        let client = &mut self.client;

        let blogs = bounded(timeout, async {
            let mut stream = client
                .list_blog(request(ListBlogRequest {}, timeout))
                .await?
                .into_inner();

            let mut blogs = Vec::new();
            while let Some(response) = stream.message().await? {
                blogs.extend(response.blog);
            }
            Ok::<_, Status>(blogs)
        })
        .await?;

        for blog in &blogs {
            info!(?blog, "ListBlog response");
        }
        Ok(blogs)
    }

    pub async fn seed_blogs(&mut self) -> Result<Vec<Blog>> {
        let mut created = Vec::with_capacity(SEED_BLOGS.len());
        for (author_id, title, content) in SEED_BLOGS {
            created.push(self.create_blog(author_id, title, content).await?);
        }
        Ok(created)
    }
}
