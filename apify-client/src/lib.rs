pub mod api;
pub mod retry;
pub mod types;

mod tests;

pub use api::ApifyClient;
pub use retry::{RetryConfig, RetryExecutor};

use instasense_core::{Comment, CoreError, Post};

/// Fetches the recent posts of an account.
pub trait PostSource {
    async fn fetch_posts(&self, account: &str) -> Result<Vec<Post>, CoreError>;
}

/// Fetches the comments of one post.
pub trait CommentSource {
    async fn fetch_comments(&self, post_url: &str) -> Result<Vec<Comment>, CoreError>;
}

impl<T: PostSource + ?Sized> PostSource for &T {
    async fn fetch_posts(&self, account: &str) -> Result<Vec<Post>, CoreError> {
        (**self).fetch_posts(account).await
    }
}

impl<T: CommentSource + ?Sized> CommentSource for &T {
    async fn fetch_comments(&self, post_url: &str) -> Result<Vec<Comment>, CoreError> {
        (**self).fetch_comments(post_url).await
    }
}

impl PostSource for ApifyClient {
    async fn fetch_posts(&self, account: &str) -> Result<Vec<Post>, CoreError> {
        self.scrape_posts(account).await
    }
}

impl CommentSource for ApifyClient {
    async fn fetch_comments(&self, post_url: &str) -> Result<Vec<Comment>, CoreError> {
        self.scrape_comments(post_url).await
    }
}
