use std::collections::HashSet;

use async_stream::try_stream;
use futures::stream::BoxStream;
use futures_util::{stream, StreamExt, TryStreamExt};
use tracing::debug;

use super::Client;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::{ListBucketResult, ListObjectsArgs, ListingPage, ObjectRecord};

/// Listing operations.
impl Client {
    /// Fetch a single `ListObjectsV2` page, retrying transient failures.
    /// ## Example
    /// ```rust
    /// use rgw_dl::types::ListObjectsArgs;
    /// # use rgw_dl::Client;
    /// # async fn example(client: Client){
    /// let args = ListObjectsArgs::new().prefix("SDC3/").delimiter(Some("/"));
    /// let page = client.list_page(args).await;
    /// # }
    /// ```
    pub async fn list_page(&self, args: ListObjectsArgs) -> Result<ListingPage> {
        let querys = args.args_query_map();
        let res: ListBucketResult = with_retry(self.config().retry(), "list_objects", || {
            self.executor().querys(querys.clone()).send_xml_ok()
        })
        .await?;
        let page = ListingPage::try_from(res)?;
        debug!(
            prefix = args.prefix.as_deref().unwrap_or(""),
            objects = page.records.len(),
            prefixes = page.common_prefixes.len(),
            truncated = !page.is_last(),
            "listed page"
        );
        Ok(page)
    }

    /// Lazily walk every page under `prefix`.
    ///
    /// A page is only requested once the previous one has been consumed. The
    /// stream fails with [`Error::ProtocolError`] as soon as the server hands
    /// back a continuation token it already issued in this walk.
    pub fn list_pages<P>(&self, prefix: P, delimiter: Option<&str>) -> BoxStream<'static, Result<ListingPage>>
    where
        P: Into<String>,
    {
        let client = self.clone();
        let prefix: String = prefix.into();
        let delimiter = delimiter.map(str::to_string);
        let max_keys = self.config().max_keys();
        let stm = try_stream! {
            let mut token: Option<String> = None;
            let mut seen: HashSet<String> = HashSet::new();
            loop {
                let args = ListObjectsArgs::new()
                    .prefix(prefix.as_str())
                    .delimiter(delimiter.as_deref())
                    .continuation_token(token.take())
                    .max_keys(max_keys);
                let page = client.list_page(args).await?;
                let next = page.continuation_token.clone();
                yield page;
                match next {
                    None => break,
                    Some(next) => {
                        if !seen.insert(next.clone()) {
                            Err::<(), Error>(Error::ProtocolError(format!(
                                "continuation token `{}` repeated, listing of `{}` is not advancing",
                                next, prefix
                            )))?;
                        }
                        token = Some(next);
                    }
                }
            }
        };
        stm.boxed()
    }

    /// Reads all objects starting with the prefix, recursively.
    /// Returns an async stream of [ObjectRecord] in server order.
    /// Directory placeholder keys are skipped.
    /// ## Example
    /// ```rust
    /// # use rgw_dl::Client;
    /// use futures_util::StreamExt;
    ///
    /// # async fn example(client: Client){
    /// let mut objs = client.list_objects_stream("SDC3/image/");
    /// while let Some(obj) = objs.next().await {
    ///  // .....
    /// }
    /// # }
    /// ```
    pub fn list_objects_stream<P>(&self, prefix: P) -> BoxStream<'static, Result<ObjectRecord>>
    where
        P: Into<String>,
    {
        self.list_pages(prefix, None)
            .map_ok(|page| {
                stream::iter(
                    page.records
                        .into_iter()
                        .filter(|r| !r.is_directory_marker())
                        .map(Ok),
                )
            })
            .try_flatten()
            .boxed()
    }

    /// Sub-prefixes one level below `prefix`, using `/` as delimiter.
    pub fn list_common_prefixes<P>(&self, prefix: P) -> BoxStream<'static, Result<String>>
    where
        P: Into<String>,
    {
        self.list_pages(prefix, Some("/"))
            .map_ok(|page| stream::iter(page.common_prefixes.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }

    /// Folders and files directly under `prefix`, both sorted by key.
    pub async fn list_top_level(&self, prefix: &str) -> Result<(Vec<String>, Vec<ObjectRecord>)> {
        let mut folders = Vec::new();
        let mut files = Vec::new();
        let mut pages = self.list_pages(prefix, Some("/"));
        while let Some(page) = pages.try_next().await? {
            folders.extend(page.common_prefixes);
            files.extend(page.records.into_iter().filter(|r| !r.is_directory_marker()));
        }
        folders.sort();
        files.sort_by(|a, b| a.key.cmp(&b.key));
        Ok((folders, files))
    }

    /// List several independent prefixes, at most `concurrency` at a time.
    ///
    /// Order is preserved within a prefix but not across prefixes.
    pub fn list_prefixes_parallel(
        &self,
        prefixes: Vec<String>,
        concurrency: usize,
    ) -> BoxStream<'static, Result<ObjectRecord>> {
        debug!(prefix_count = prefixes.len(), concurrency, "parallel listing");
        let client = self.clone();
        stream::iter(prefixes)
            .map(move |prefix| client.list_objects_stream(prefix))
            .flatten_unordered(concurrency.max(1))
            .boxed()
    }
}
