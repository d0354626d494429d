use crate::BlogStoreError;
use course_proto::blog::Blog;
use prost::Message;

pub const KEY_LEN: usize = 8;

/// Big-endian so that the tree's byte order is the numeric id order.
pub fn id_to_key(id: u64) -> [u8; KEY_LEN] {
    id.to_be_bytes()
}

pub fn key_to_id(key: &[u8]) -> Result<u64, BlogStoreError> {
    let bytes: [u8; KEY_LEN] = key
        .try_into()
        .map_err(|_| BlogStoreError::InvalidKey(key.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

pub fn encode_blog(blog: &Blog) -> Vec<u8> {
    blog.encode_to_vec()
}

pub fn decode_blog(bytes: &[u8]) -> Result<Blog, BlogStoreError> {
    Ok(Blog::decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_numerically() {
        let ids = [0u64, 1, 255, 256, 65_535, 65_536, u64::MAX];
        let keys: Vec<_> = ids.iter().map(|id| id_to_key(*id)).collect();

        let mut sorted = keys.clone();
        sorted.sort();

        assert_eq!(keys, sorted);
        assert_eq!(id_to_key(1), [0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn key_back_to_id() {
        assert_eq!(key_to_id(&id_to_key(42)).unwrap(), 42);
        assert_eq!(key_to_id(&id_to_key(u64::MAX)).unwrap(), u64::MAX);
    }

    #[test]
    fn short_key_is_rejected() {
        assert!(matches!(
            key_to_id(&[0, 1, 2]),
            Err(BlogStoreError::InvalidKey(3))
        ));
    }

    #[test]
    fn blog_survives_encoding() {
        let blog = Blog {
            id: 7,
            author_id: "Axl".to_string(),
            title: "Axl's blog".to_string(),
            content: "Content of Axl's awesome blog".to_string(),
        };

        let decoded = decode_blog(&encode_blog(&blog)).unwrap();

        assert_eq!(decoded, blog);
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(matches!(
            decode_blog(&[0x0a, 0x05]),
            Err(BlogStoreError::Decode(_))
        ));
    }
}
