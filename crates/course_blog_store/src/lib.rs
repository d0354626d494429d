//! Blog persistence on top of an embedded sled database.
//!
//! Every record lives in the single `Blog` tree keyed by its big-endian id.
//! Ids are handed out by a per-bucket sequence kept in the `sequences` tree,
//! starting at 1.

mod codec;

pub use codec::{decode_blog, encode_blog, id_to_key, key_to_id};

use course_proto::blog::Blog;
use sled::{
    transaction::{ConflictableTransactionError, TransactionError},
    Db, Transactional, Tree,
};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const BLOG_BUCKET: &str = "Blog";
const SEQUENCES_TREE: &str = "sequences";

#[derive(Debug, Error)]
pub enum BlogStoreError {
    #[error("Could not find blog with id {0}")]
    NotFound(u64),

    #[error("stored blog could not be decoded: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("stored key has {0} bytes, expected 8")]
    InvalidKey(usize),

    #[error("database action failed with: {0}")]
    Database(#[from] sled::Error),
}

impl BlogStoreError {
    /// Errors from the database itself rather than from the data in it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BlogStoreError::Database(_))
    }
}

impl From<TransactionError<BlogStoreError>> for BlogStoreError {
    fn from(err: TransactionError<BlogStoreError>) -> Self {
        match err {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => BlogStoreError::Database(err),
        }
    }
}

type Result<T> = std::result::Result<T, BlogStoreError>;
type TxResult<T> = std::result::Result<T, ConflictableTransactionError<BlogStoreError>>;

#[derive(Clone)]
pub struct BlogStore {
    db: Db,
    blogs: Tree,
    sequences: Tree,
}

impl BlogStore {
    /// Opens the database at `path`, creating it and the blog bucket if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path.as_ref())?;
        let blogs = db.open_tree(BLOG_BUCKET)?;
        let sequences = db.open_tree(SEQUENCES_TREE)?;
        info!(path = %path.as_ref().display(), empty = blogs.is_empty(), "Opened blog database");

        Ok(Self {
            db,
            blogs,
            sequences,
        })
    }

    /// Stores `blog` under the next id of the bucket sequence. Any id already
    /// set on `blog` is ignored.
    pub fn create(&self, blog: Blog) -> Result<Blog> {
        let created = (&self.blogs, &self.sequences).transaction(|(blogs, sequences)| {
            let next = match sequences.get(BLOG_BUCKET)? {
                Some(current) => {
                    key_to_id(&current).map_err(ConflictableTransactionError::Abort)? + 1
                }
                None => 1,
            };
            let key = id_to_key(next);
            let blog = Blog {
                id: next,
                ..blog.clone()
            };

            sequences.insert(BLOG_BUCKET, &key[..])?;
            blogs.insert(&key[..], encode_blog(&blog))?;
            TxResult::Ok(blog)
        })?;

        debug!(id = created.id, "Created blog");
        Ok(created)
    }

    pub fn get(&self, id: u64) -> Result<Blog> {
        match self.blogs.get(id_to_key(id))? {
            Some(bytes) => decode_blog(&bytes),
            None => Err(BlogStoreError::NotFound(id)),
        }
    }

    /// Overwrites an existing record; the id must already be assigned.
    pub fn update(&self, blog: Blog) -> Result<Blog> {
        let key = id_to_key(blog.id);
        let bytes = encode_blog(&blog);

        self.blogs.transaction(|blogs| {
            if blogs.get(key)?.is_none() {
                return Err(ConflictableTransactionError::Abort(BlogStoreError::NotFound(
                    blog.id,
                )));
            }
            blogs.insert(&key[..], bytes.clone())?;
            Ok(())
        })?;

        debug!(id = blog.id, "Updated blog");
        Ok(blog)
    }

    pub fn delete(&self, id: u64) -> Result<u64> {
        let key = id_to_key(id);

        self.blogs.transaction(|blogs| match blogs.remove(&key[..])? {
            Some(_) => Ok(()),
            None => Err(ConflictableTransactionError::Abort(BlogStoreError::NotFound(id))),
        })?;

        debug!(id, "Deleted blog");
        Ok(id)
    }

    /// Every record in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Blog>> {
        self.blogs.iter().map(|item| {
            let (_, value) = item?;
            decode_blog(&value)
        })
    }

    pub fn len(&self) -> usize {
        self.blogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blogs.is_empty()
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, BlogStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BlogStore::open(dir.path().join("blog.db")).unwrap();
        (dir, store)
    }

    fn blog(author: &str) -> Blog {
        Blog {
            id: 0,
            author_id: author.to_string(),
            title: format!("{author}'s blog"),
            content: format!("Content of {author}'s awesome blog"),
        }
    }

    #[test]
    fn create_assigns_increasing_ids_from_one() {
        let (_dir, store) = open_store();

        let first = store.create(blog("Son Coomer")).unwrap();
        let second = store.create(blog("CC S.")).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn create_ignores_caller_id() {
        let (_dir, store) = open_store();

        let created = store
            .create(Blog {
                id: 99,
                ..blog("Axl")
            })
            .unwrap();

        assert_eq!(created.id, 1);
        assert!(matches!(store.get(99), Err(BlogStoreError::NotFound(99))));
    }

    #[test]
    fn get_returns_stored_fields() {
        let (_dir, store) = open_store();
        let created = store.create(blog("Axl")).unwrap();

        let read = store.get(created.id).unwrap();

        assert_eq!(read, created);
        assert_eq!(read.author_id, "Axl");
        assert_eq!(read.title, "Axl's blog");
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_dir, store) = open_store();

        assert!(matches!(store.get(5), Err(BlogStoreError::NotFound(5))));
    }

    #[test]
    fn update_overwrites_existing() {
        let (_dir, store) = open_store();
        let created = store.create(blog("luisg-villegas")).unwrap();

        let updated = store
            .update(Blog {
                content: "Updated content of my first blog".to_string(),
                ..created.clone()
            })
            .unwrap();

        assert_eq!(store.get(created.id).unwrap(), updated);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_missing_is_not_found() {
        let (_dir, store) = open_store();

        let err = store
            .update(Blog {
                id: 5,
                ..blog("luisg-villegas")
            })
            .unwrap_err();

        assert!(matches!(err, BlogStoreError::NotFound(5)));
        assert!(store.is_empty());
    }

    #[test]
    fn delete_removes_record() {
        let (_dir, store) = open_store();
        let created = store.create(blog("Axl")).unwrap();

        assert_eq!(store.delete(created.id).unwrap(), created.id);
        assert!(matches!(
            store.get(created.id),
            Err(BlogStoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let (_dir, store) = open_store();

        let err = store.delete(2).unwrap_err();

        assert!(matches!(err, BlogStoreError::NotFound(2)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn deleted_ids_are_not_reused() {
        let (_dir, store) = open_store();
        store.create(blog("a")).unwrap();
        let second = store.create(blog("b")).unwrap();
        store.delete(second.id).unwrap();

        let third = store.create(blog("c")).unwrap();

        assert_eq!(third.id, 3);
    }

    #[test]
    fn iter_walks_in_id_order() {
        let (_dir, store) = open_store();
        for i in 0..300 {
            store.create(blog(&format!("author-{i}"))).unwrap();
        }
        store.delete(10).unwrap();

        let ids: Vec<u64> = store.iter().map(|blog| blog.unwrap().id).collect();

        assert_eq!(ids.len(), 299);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(!ids.contains(&10));
        assert_eq!(ids.last(), Some(&300));
    }

    #[test]
    fn corrupt_record_fails_to_decode() {
        let (_dir, store) = open_store();
        store
            .blogs
            .insert(id_to_key(1), &[0x0a_u8, 0x05][..])
            .unwrap();

        let err = store.get(1).unwrap_err();

        assert!(matches!(err, BlogStoreError::Decode(_)));
        assert!(!err.is_fatal());
        assert!(store.iter().next().unwrap().is_err());
    }

    #[test]
    fn sequence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blog.db");
        {
            let store = BlogStore::open(&path).unwrap();
            store.create(blog("a")).unwrap();
            store.create(blog("b")).unwrap();
            store.flush().unwrap();
        }

        let store = BlogStore::open(&path).unwrap();
        let created = store.create(blog("c")).unwrap();

        assert_eq!(created.id, 3);
        assert_eq!(store.get(1).unwrap().author_id, "a");
    }
}
