//! Remote location descriptor parsing
//!
//! Parses bucket URLs of the form `https://s3-us-west-2.amazonaws.com/my-bucket`
//! into the region and bucket they name.

use crate::error::{CacheError, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Region and bucket named by a bucket URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketLocation {
    pub region: String,
    pub bucket: String,
}

// scheme://[s3-|s3.]<region>.<rest of host>[/path...]/<bucket>[/]
static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://(?:s3[-.])?([\w-]+)\.[^/\s]+(?:/\S*)?/([\w-]+)/?$")
        .unwrap()
});

impl BucketLocation {
    /// Parse a bucket URL. Anything that does not match is a configuration error.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let caps = LOCATION_RE.captures(descriptor.trim()).ok_or_else(|| {
            CacheError::Config(format!(
                "bucket URL {:?} does not look like scheme://[s3-]region.host/bucket",
                descriptor
            ))
        })?;

        // `https://s3.amazonaws.com/b` has no region label; the host's
        // domain would otherwise be taken as one
        let region = &caps[1];
        if region.eq_ignore_ascii_case("amazonaws") {
            return Err(CacheError::Config(format!(
                "bucket URL {:?} names no region (expected e.g. s3-us-west-2.amazonaws.com)",
                descriptor
            )));
        }

        Ok(Self {
            region: region.to_string(),
            bucket: caps[2].to_string(),
        })
    }
}

impl fmt::Display for BucketLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{} ({})", self.bucket, self.region)
    }
}
