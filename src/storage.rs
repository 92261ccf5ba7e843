//! Signed delivery URLs from object storage.
//!
//! Mints short-lived SigV4 query-presigned GET URLs for a single object, the
//! capability that gates every download. No SDK: presigning is pure HMAC
//! computation over a canonical request, and keeping it local avoids a
//! network dependency in the resolver's hot path.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// S3-compatible object storage endpoint plus the credentials to presign
/// requests against it. Cheaply cloneable; lives in `AppState`.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    /// Full endpoint URL, e.g. "https://s3.ap-south-1.amazonaws.com".
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

fn hmac_raw(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Percent-encode a path segment or query value per RFC 3986 (unreserved
/// characters only), which is what SigV4 canonicalization requires.
/// `urlencoding::encode` leaves exactly `A-Za-z0-9-_.~` unescaped.
fn uri_encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

impl ObjectStore {
    pub fn new(config: &crate::config::StorageConfig) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            region: config.region.clone(),
            bucket: config.bucket.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    fn host(&self) -> &str {
        self.endpoint
            .strip_prefix("https://")
            .or_else(|| self.endpoint.strip_prefix("http://"))
            .unwrap_or(&self.endpoint)
    }

    /// Presign a GET for one object, valid for `expires_secs` seconds from
    /// now. `disposition` sets the response content-disposition so callers
    /// can choose inline preview versus attachment download.
    pub fn presigned_get_url(
        &self,
        key: &str,
        expires_secs: u64,
        disposition: Option<&str>,
    ) -> String {
        self.presigned_get_url_at(key, expires_secs, disposition, Utc::now())
    }

    /// Same as `presigned_get_url`, with an explicit signing time so tests
    /// can assert deterministic output.
    pub fn presigned_get_url_at(
        &self,
        key: &str,
        expires_secs: u64,
        disposition: Option<&str>,
        now: DateTime<Utc>,
    ) -> String {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let credential = format!("{}/{}", self.access_key, scope);

        // Path-style addressing: /{bucket}/{key}, each key segment encoded.
        let encoded_key: Vec<String> = key.split('/').map(|seg| uri_encode(seg)).collect();
        let canonical_uri = format!("/{}/{}", self.bucket, encoded_key.join("/"));

        // Canonical query string must be sorted by encoded parameter name;
        // "X-Amz-*" precedes "response-content-disposition" lexicographically,
        // so building in this order keeps it sorted.
        let mut query_pairs: Vec<(String, String)> = vec![
            ("X-Amz-Algorithm".into(), "AWS4-HMAC-SHA256".into()),
            ("X-Amz-Credential".into(), uri_encode(&credential)),
            ("X-Amz-Date".into(), amz_date.clone()),
            ("X-Amz-Expires".into(), expires_secs.to_string()),
            ("X-Amz-SignedHeaders".into(), "host".into()),
        ];
        if let Some(d) = disposition {
            query_pairs.push(("response-content-disposition".into(), uri_encode(d)));
        }
        let canonical_query: String = query_pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            canonical_uri,
            canonical_query,
            self.host()
        );

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            sha256_hex(canonical_request.as_bytes())
        );

        // SigV4 key derivation chain.
        let k_date = hmac_raw(format!("AWS4{}", self.secret_key).as_bytes(), date_stamp.as_bytes());
        let k_region = hmac_raw(&k_date, self.region.as_bytes());
        let k_service = hmac_raw(&k_region, b"s3");
        let k_signing = hmac_raw(&k_service, b"aws4_request");
        let signature = hex::encode(hmac_raw(&k_signing, string_to_sign.as_bytes()));

        format!(
            "{}{}?{}&X-Amz-Signature={}",
            self.endpoint, canonical_uri, canonical_query, signature
        )
    }
}
