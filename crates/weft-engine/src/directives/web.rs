//! `?web` — fetch a URL as plain text.

use tracing::warn;

use super::gen::resolve_model;
use super::{DirectiveCaches, DirectiveContext};
use crate::components::latest_param;
use crate::query::{QueryError, RATE_LIMIT_PLACEHOLDER};

/// Fetches the URL named by the resolved instruction.
///
/// Results are cached per URL (with the post-processing mode folded
/// into the key) so a page is pulled at most once per run. With
/// `parse=readable` the raw extraction is additionally cleaned up
/// through the query service. Fetch failures render inline and are
/// never cached, so the next tick retries.
#[must_use]
pub fn execute_web(
    ctx: &DirectiveContext<'_>,
    instruction: &str,
    params: &[(String, Vec<String>)],
    caches: &mut DirectiveCaches,
) -> String {
    let url = instruction.trim();
    if url.is_empty() {
        return "The web directive needs a URL.".to_string();
    }

    let readable = matches!(latest_param(params, "parse"), Some("readable"));
    let key = if readable {
        format!("{url}|readable")
    } else {
        url.to_string()
    };
    if let Some(cached) = caches.web.get(&key) {
        return cached.clone();
    }

    let text = match ctx.fetcher.fetch(url) {
        Ok(text) => text,
        Err(e) => {
            warn!(url, error = %e, "page fetch failed");
            return format!("Could not fetch {url}: {e}");
        }
    };

    let text = if readable {
        let model = resolve_model(ctx, params);
        let prompt = format!(
            "Extract the readable article content from this page text, \
             dropping navigation and boilerplate:\n\n{text}"
        );
        match ctx.query.query(&prompt, &model) {
            Ok(cleaned) => cleaned,
            Err(QueryError::RateLimited) => return RATE_LIMIT_PLACEHOLDER.to_string(),
            Err(e) => {
                warn!(url, error = %e, "readable post-processing failed");
                return format!("Could not post-process {url}: {e}");
            }
        }
    } else {
        text
    };

    caches.web.insert(key, text.clone());
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ParamList;
    use crate::config::WeftConfig;
    use crate::fetch::{FetchError, PageFetcher};
    use crate::query::{ModelSpec, QueryService};
    use parking_lot::Mutex;
    use std::path::Path;
    use weft_store::World;

    struct CountingFetcher {
        calls: Mutex<usize>,
        fail: bool,
    }

    impl CountingFetcher {
        fn ok() -> Self {
            Self {
                calls: Mutex::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: Mutex::new(0),
                fail: true,
            }
        }

        fn call_count(&self) -> usize {
            *self.calls.lock()
        }
    }

    impl PageFetcher for CountingFetcher {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            *self.calls.lock() += 1;
            if self.fail {
                Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            } else {
                Ok(format!("page text of {url}"))
            }
        }
    }

    struct EchoQuery;
    impl QueryService for EchoQuery {
        fn query(&self, prompt: &str, _: &ModelSpec) -> Result<String, QueryError> {
            Ok(format!("readable({} bytes)", prompt.len()))
        }
    }

    fn ctx<'a>(
        world: &'a World,
        config: &'a WeftConfig,
        fetcher: &'a CountingFetcher,
    ) -> DirectiveContext<'a> {
        DirectiveContext {
            world,
            config,
            query: &EchoQuery,
            fetcher,
            base_dir: Path::new("."),
        }
    }

    #[test]
    fn fetch_is_cached_per_url() {
        let world = World::new();
        let config = WeftConfig::default();
        let fetcher = CountingFetcher::ok();
        let mut caches = DirectiveCaches::default();

        for _ in 0..3 {
            let out = execute_web(
                &ctx(&world, &config, &fetcher),
                "https://example.com",
                &[],
                &mut caches,
            );
            assert_eq!(out, "page text of https://example.com");
        }
        assert_eq!(fetcher.call_count(), 1);
    }

    #[test]
    fn readable_mode_post_processes_and_caches_separately() {
        let world = World::new();
        let config = WeftConfig::default();
        let fetcher = CountingFetcher::ok();
        let mut caches = DirectiveCaches::default();

        let params: ParamList = vec![("parse".into(), vec!["readable".into()])];
        let cleaned = execute_web(
            &ctx(&world, &config, &fetcher),
            "https://example.com",
            &params,
            &mut caches,
        );
        assert!(cleaned.starts_with("readable("));

        let raw = execute_web(
            &ctx(&world, &config, &fetcher),
            "https://example.com",
            &[],
            &mut caches,
        );
        assert_eq!(raw, "page text of https://example.com");
        assert_eq!(fetcher.call_count(), 2, "modes cache independently");
    }

    #[test]
    fn fetch_failure_renders_inline_and_is_not_cached() {
        let world = World::new();
        let config = WeftConfig::default();
        let fetcher = CountingFetcher::failing();
        let mut caches = DirectiveCaches::default();

        for _ in 0..2 {
            let out = execute_web(
                &ctx(&world, &config, &fetcher),
                "https://example.com/missing",
                &[],
                &mut caches,
            );
            assert!(out.contains("Could not fetch"));
        }
        assert_eq!(fetcher.call_count(), 2, "failures must retry");
        assert!(caches.web.is_empty());
    }

    #[test]
    fn empty_url_reports_inline() {
        let world = World::new();
        let config = WeftConfig::default();
        let fetcher = CountingFetcher::ok();
        let mut caches = DirectiveCaches::default();

        let out = execute_web(&ctx(&world, &config, &fetcher), "  ", &[], &mut caches);
        assert!(out.contains("needs a URL"));
        assert_eq!(fetcher.call_count(), 0);
    }
}
