//! Key/value resources: individually declared `keys` and whole `key_prefix`
//! trees

pub mod keys;
pub mod prefix;

use crate::resource::Resource;

/// Every KV resource type
pub fn resources() -> Vec<Box<dyn Resource>> {
    vec![Box::new(keys::KeysResource), Box::new(prefix::KeyPrefixResource)]
}
