#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rgw_dl::client::{HttpReply, Transport, TransportFuture};
use rgw_dl::retry::RetryPolicy;
use rgw_dl::{Client, Config};

pub const ENDPOINT: &str = "http://rgw.test";
pub const BUCKET_URL: &str = "http://rgw.test/ska:sdc3-simdata";

/// In-memory RGW bucket answering unsigned `ListObjectsV2` and object GETs.
#[derive(Clone)]
pub struct FakeBucket {
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    page_size: usize,
    deny_listing: bool,
    list_calls: Arc<AtomicUsize>,
    object_gets: Arc<AtomicUsize>,
}

impl FakeBucket {
    pub fn new(page_size: usize) -> Self {
        Self {
            objects: Default::default(),
            page_size,
            deny_listing: false,
            list_calls: Default::default(),
            object_gets: Default::default(),
        }
    }

    pub fn deny_listing(mut self) -> Self {
        self.deny_listing = true;
        self
    }

    pub fn put(&self, key: &str, body: impl Into<Vec<u8>>) {
        self.objects.lock().unwrap().insert(key.to_string(), body.into());
    }

    pub fn put_sized(&self, key: &str, size: usize) {
        self.put(key, vec![b'x'; size]);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn object_gets(&self) -> usize {
        self.object_gets.load(Ordering::SeqCst)
    }

    fn respond(&self, url: &str) -> HttpReply {
        let Some(rest) = url.strip_prefix(BUCKET_URL) else {
            return error_reply(404, "NoSuchBucket");
        };
        if rest.is_empty() || rest.starts_with('?') {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.deny_listing {
                return error_reply(403, "AccessDenied");
            }
            return self.list(rest.trim_start_matches('?'));
        }
        self.object_gets.fetch_add(1, Ordering::SeqCst);
        let key = urlencoding::decode(rest.trim_start_matches('/')).unwrap().into_owned();
        match self.objects.lock().unwrap().get(&key) {
            Some(body) => HttpReply::new(200, body.clone()),
            None => error_reply(404, "NoSuchKey"),
        }
    }

    fn list(&self, query: &str) -> HttpReply {
        let mut prefix = String::new();
        let mut delimiter = String::new();
        let mut token = String::new();
        let mut max_keys = self.page_size;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let v = urlencoding::decode(v).unwrap().into_owned();
            match k {
                "prefix" => prefix = v,
                "delimiter" => delimiter = v,
                "continuation-token" => token = v,
                "max-keys" => max_keys = max_keys.min(v.parse().unwrap()),
                _ => {}
            }
        }

        // (name, Some(size)) for objects, (name, None) for common prefixes
        let mut entries: Vec<(String, Option<usize>)> = Vec::new();
        for (key, body) in self.objects.lock().unwrap().iter() {
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            match rest.find(delimiter.as_str()).filter(|_| !delimiter.is_empty()) {
                Some(idx) => {
                    let common = format!("{}{}", prefix, &rest[..idx + delimiter.len()]);
                    if entries.last().map(|e| &e.0) != Some(&common) {
                        entries.push((common, None));
                    }
                }
                None => entries.push((key.clone(), Some(body.len()))),
            }
        }
        let remaining: Vec<_> = entries.into_iter().filter(|(name, _)| token.is_empty() || *name > token).collect();
        let truncated = remaining.len() > max_keys;
        let page = &remaining[..remaining.len().min(max_keys)];

        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#,
        );
        xml.push_str(&format!(
            "<Name>sdc3-simdata</Name><Prefix>{}</Prefix><MaxKeys>{}</MaxKeys><KeyCount>{}</KeyCount><IsTruncated>{}</IsTruncated>",
            escape(&prefix),
            max_keys,
            page.len(),
            truncated
        ));
        if truncated {
            if let Some((last, _)) = page.last() {
                xml.push_str(&format!("<NextContinuationToken>{}</NextContinuationToken>", escape(last)));
            }
        }
        for (name, size) in page {
            match size {
                Some(size) => xml.push_str(&format!(
                    "<Contents><Key>{}</Key><LastModified>2024-05-01T10:00:00.000Z</LastModified>\
                     <ETag>&quot;0f0f&quot;</ETag><Size>{}</Size><StorageClass>STANDARD</StorageClass></Contents>",
                    escape(name),
                    size
                )),
                None => xml.push_str(&format!("<CommonPrefixes><Prefix>{}</Prefix></CommonPrefixes>", escape(name))),
            }
        }
        xml.push_str("</ListBucketResult>");
        HttpReply::new(200, xml)
    }
}

impl Transport for FakeBucket {
    fn get(&self, url: String) -> TransportFuture {
        let reply = self.respond(&url);
        Box::pin(async move { Ok(reply) })
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn error_reply(status: u16, code: &str) -> HttpReply {
    HttpReply::new(
        status,
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>{}</Code><RequestId>tx000</RequestId></Error>",
            code
        ),
    )
}

pub fn get_test_client(bucket: &FakeBucket, dest: &Path, prefix: Option<&str>) -> Client {
    let config = Config::builder()
        .endpoint(ENDPOINT)
        .dest(dest)
        .prefix(prefix)
        .retry(RetryPolicy::new().with_base_delay(Duration::from_millis(1)))
        .build()
        .unwrap();
    Client::builder(config).transport(bucket.clone()).build().unwrap()
}
